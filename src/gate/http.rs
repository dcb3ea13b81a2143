//! Just enough HTTP/1.x to serve the gate's two-endpoint control plane.
//!
//! The responder handles one connection at a time, so the reader and
//! writer here are plain one-shot helpers over a `TcpStream`.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::Result;

/// Requests past this size are treated as malformed.
const MAX_REQUEST_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// Parses the request line and extracts a content-length. `None` on
/// anything malformed.
pub fn parse_head(head: &str) -> Option<(String, String, usize)> {
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();
    parts.next()?;
    let mut content_length = 0;
    for line in lines {
        if let Some(colon) = line.find(':') {
            let (name, value) = line.split_at(colon);
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value[1..].trim().parse().ok()?;
            }
        }
    }
    Some((method, path, content_length))
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}

/// Reads one request off the stream. `Ok(None)` means the request was
/// malformed, oversized or the peer hung up early.
pub async fn read_request(stream: &mut TcpStream) -> Result<Option<HttpRequest>> {
    let mut buf: Vec<u8> = vec![];
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        if let Some(at) = find_header_end(&buf) {
            break at;
        }
        if buf.len() > MAX_REQUEST_BYTES {
            return Ok(None);
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let (method, path, content_length) = match parse_head(&head) {
        Some(parsed) => parsed,
        None => return Ok(None),
    };
    if content_length > MAX_REQUEST_BYTES {
        return Ok(None);
    }

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Ok(Some(HttpRequest {
        method,
        path,
        body: String::from_utf8_lossy(&body).to_string(),
    }))
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        404 => "Not Found",
        _ => "Unknown",
    }
}

/// Writes a `text/plain` response and shuts the stream down.
pub async fn write_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason(status),
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    let _ = stream.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_head() {
        let head = "POST /add_pionnier HTTP/1.1\r\nHost: x\r\nContent-Length: 12";
        assert_eq!(
            parse_head(head),
            Some(("POST".to_string(), "/add_pionnier".to_string(), 12))
        );

        let head = "GET /get_pionniers HTTP/1.1\r\nHost: x";
        assert_eq!(
            parse_head(head),
            Some(("GET".to_string(), "/get_pionniers".to_string(), 0))
        );
    }

    #[test]
    fn test_parse_head_malformed() {
        assert_eq!(parse_head(""), None);
        assert_eq!(parse_head("GET"), None);
        assert_eq!(parse_head("GET /"), None);
        assert_eq!(
            parse_head("GET / HTTP/1.1\r\nContent-Length: banana"),
            None
        );
    }

    #[test]
    fn test_find_header_end() {
        assert_eq!(find_header_end(b"GET / HTTP/1.1\r\n\r\nbody"), Some(14));
        assert_eq!(find_header_end(b"partial"), None);
    }
}
