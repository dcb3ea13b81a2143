use std::time::Duration;

use tracing::{debug, info, warn};

use crate::directory::parser;
use crate::gate::AddPeer;
use crate::Result;

pub const DISCOVERY_PATH: &str = "/get_pionniers";
pub const CONTENT_PATH: &str = "/get_posts";
pub const PUBLISH_PATH: &str = "/add_post";
pub const ANNOUNCE_PATH: &str = "/add_pionnier";

/// Sentinel separating records in a content response.
pub const RECORD_DELIMITER: &str = "\n---END---\n";

/// Ceiling per proxied request so one slow peer cannot stall a broadcast.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Splits a content body on the record sentinel; records are trimmed,
/// empties dropped and a non-empty trailing remainder kept.
pub fn split_records(body: &str) -> Vec<String> {
    let mut records = vec![];
    for record in body.split(RECORD_DELIMITER) {
        let record = record.trim();
        if !record.is_empty() {
            records.push(record.to_string());
        }
    }
    records
}

/// Exchanges content with every known peer through the transport's SOCKS
/// proxy, tolerating arbitrary per-peer failure. Peers are contacted
/// sequentially per call; independent calls may run concurrently.
#[derive(Debug, Clone)]
pub struct FloodClient {
    http: reqwest::Client,
}

impl FloodClient {
    /// Builds a client whose every request is proxied through the local
    /// SOCKS endpoint with a bounded timeout.
    pub fn new(socks_port: u16) -> Result<FloodClient> {
        let proxy = reqwest::Proxy::all(&format!("socks5h://127.0.0.1:{}", socks_port))?;
        let http = reqwest::Client::builder()
            .proxy(proxy)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(FloodClient { http })
    }

    /// Unproxied variant so tests can target loopback peers.
    #[cfg(test)]
    pub(crate) fn direct() -> FloodClient {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        FloodClient { http }
    }

    /// Queries every gate for its peer list and accumulates a validated,
    /// deduplicated union. Gates that time out, refuse or answer with
    /// non-200/empty are skipped; partial success is success.
    pub async fn discover(&self, gates: &[String]) -> Vec<String> {
        let mut found: Vec<String> = vec![];
        for gate in gates.iter() {
            let url = format!("http://{}{}", gate, DISCOVERY_PATH);
            let body = match self.get(&url).await {
                Some((200, body)) if !body.is_empty() => body,
                Some((status, _)) => {
                    debug!("{} returned http {}", url, status);
                    continue;
                }
                None => continue,
            };
            for line in body.lines() {
                let line = line.trim();
                if parser::is_relay_address(line) && !found.iter().any(|p| p == line) {
                    found.push(line.to_string());
                }
            }
        }
        found
    }

    /// Fetches content from every peer. The aggregate accumulates in
    /// peer-list order with no cross-peer dedup; `any_success` is true
    /// iff at least one peer answered 200 (even with an empty body).
    pub async fn fetch(&self, peers: &[String]) -> (Vec<String>, bool) {
        let mut posts = vec![];
        let mut any_success = false;
        for peer in peers.iter() {
            let url = format!("http://{}{}", peer, CONTENT_PATH);
            match self.get(&url).await {
                Some((200, body)) => {
                    any_success = true;
                    if body.is_empty() {
                        debug!("{} has no posts yet", url);
                    } else {
                        posts.extend(split_records(&body));
                    }
                }
                Some((status, _)) => warn!("{} returned http {}", url, status),
                None => (),
            }
        }
        info!("fetched {} post(s) from {} peer(s)", posts.len(), peers.len());
        (posts, any_success)
    }

    /// Broadcasts one post to every peer; true iff any peer accepted it
    /// (http 200 or 201). Per-peer failures are logged and skipped.
    pub async fn publish(&self, post: &str, peers: &[String]) -> bool {
        let mut any_ok = false;
        for peer in peers.iter() {
            let url = format!("http://{}{}", peer, PUBLISH_PATH);
            match self.http.post(&url).body(post.to_string()).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if status == 200 || status == 201 {
                        info!("post published to {}", peer);
                        any_ok = true;
                    } else {
                        warn!("{} returned http {}", peer, status);
                    }
                }
                Err(err) => warn!("failed to reach {}: {}", peer, err),
            }
        }
        any_ok
    }

    /// Registers an address with every gate; true iff any gate accepted.
    pub async fn announce(&self, address: &str, gates: &[String]) -> bool {
        let payload = match serde_json::to_string(&AddPeer {
            onion_address: address.to_string(),
        }) {
            Ok(payload) => payload,
            Err(_) => return false,
        };
        let mut any_ok = false;
        for gate in gates.iter() {
            let url = format!("http://{}{}", gate, ANNOUNCE_PATH);
            match self.http.post(&url).body(payload.clone()).send().await {
                Ok(response) if response.status().as_u16() == 200 => {
                    info!("announced to {}", gate);
                    any_ok = true;
                }
                Ok(response) => {
                    warn!("{} returned http {}", gate, response.status().as_u16())
                }
                Err(err) => warn!("failed to reach {}: {}", gate, err),
            }
        }
        any_ok
    }

    async fn get(&self, url: &str) -> Option<(u16, String)> {
        match self.http.get(url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                Some((status, body))
            }
            Err(err) => {
                warn!("request to {} failed: {}", url, err);
                None
            }
        }
    }
}
