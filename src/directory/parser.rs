//! Total parsers for the peer-list representations.
//!
//! Two grammars exist: a newline-separated address list and a bracketed,
//! quoted list. Both parsers trim, validate and silently drop anything
//! that is not a relay address; malformed input yields an empty result,
//! never an error.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Fixed substring every overlay address carries.
pub const ONION_SUFFIX: &str = ".onion";

/// A token is a relay address iff it is non-empty after trimming and
/// contains the overlay suffix marker.
pub fn is_relay_address(token: &str) -> bool {
    let token = token.trim();
    !token.is_empty() && token.contains(ONION_SUFFIX)
}

/// Newline grammar: one plain-text address per line, trimmed and
/// validated. Lines carrying bracket or quote characters belong to the
/// bracketed grammar and are not addresses here.
pub fn parse_lines(input: &str) -> Vec<String> {
    let mut out = vec![];
    for line in input.lines() {
        let line = line.trim();
        if line.contains('"') || line.contains('[') || line.contains(']') {
            continue;
        }
        if is_relay_address(line) {
            out.push(line.to_string());
        }
    }
    out
}

/// Every `"..."` substring of the input, in order.
pub fn quoted_strings(input: &str) -> Vec<String> {
    let mut out = vec![];
    let mut rest = input;
    while let Some(open) = rest.find('"') {
        let after = &rest[open + 1..];
        match after.find('"') {
            Some(close) => {
                out.push(after[..close].to_string());
                rest = &after[close + 1..];
            }
            None => break,
        }
    }
    out
}

/// Bracketed grammar: quoted entries between the first `[` and the last
/// `]`, trimmed and validated.
pub fn parse_bracketed(input: &str) -> Vec<String> {
    let open = match input.find('[') {
        Some(at) => at,
        None => return vec![],
    };
    let close = match input.rfind(']') {
        Some(at) if at > open => at,
        _ => return vec![],
    };
    quoted_strings(&input[open + 1..close])
        .iter()
        .map(|item| item.trim().to_string())
        .filter(|item| is_relay_address(item))
        .collect()
}

/// Operator-supplied bootstrap blob: base64 of either grammar. The
/// newline form takes precedence when it yields any valid address.
pub fn parse_blob(encoded: &str) -> Vec<String> {
    let decoded = match BASE64.decode(encoded.trim().as_bytes()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
        Err(_) => return vec![],
    };
    let parsed = parse_lines(&decoded);
    if parsed.is_empty() {
        parse_bracketed(&decoded)
    } else {
        parsed
    }
}

/// Encodes a peer list as a base64 blob of the newline grammar.
pub fn encode_blob(addresses: &[String]) -> String {
    BASE64.encode(addresses.join("\n").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_address_filter() {
        assert!(is_relay_address("abc.onion"));
        assert!(is_relay_address("  abc.onion  "));
        assert!(!is_relay_address(""));
        assert!(!is_relay_address("   "));
        assert!(!is_relay_address("example.com"));
    }

    #[test]
    fn test_parse_lines() {
        let input = "  a.onion \nnot-a-peer\n\nb.onion\n";
        assert_eq!(parse_lines(input), vec!["a.onion", "b.onion"]);
        assert!(parse_lines("garbage\n\n").is_empty());
    }

    #[test]
    fn test_parse_bracketed() {
        let input = "[\n  \"a.onion\",\n  \"b.onion\"\n]\n";
        assert_eq!(parse_bracketed(input), vec!["a.onion", "b.onion"]);
    }

    #[test]
    fn test_parse_bracketed_is_total_on_garbage() {
        assert!(parse_bracketed("").is_empty());
        assert!(parse_bracketed("]...[").is_empty());
        assert!(parse_bracketed("[\"unterminated").is_empty());
        assert!(parse_bracketed("[\"no-suffix\", 42]").is_empty());
    }

    #[test]
    fn test_blob_newline_form_takes_precedence() {
        let blob = encode_blob(&["a.onion".to_string(), "b.onion".to_string()]);
        assert_eq!(parse_blob(&blob), vec!["a.onion", "b.onion"]);
    }

    #[test]
    fn test_blob_bracketed_fallback() {
        let encoded = BASE64.encode(b"[\"a.onion\",\"b.onion\"]");
        assert_eq!(parse_blob(&encoded), vec!["a.onion", "b.onion"]);
    }

    #[test]
    fn test_blob_rejects_bad_base64() {
        assert!(parse_blob("!!! not base64 !!!").is_empty());
        assert!(parse_blob("").is_empty());
    }
}
