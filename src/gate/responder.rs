use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::directory::Directory;
use crate::event_log::EventLog;
use crate::flood::{ANNOUNCE_PATH, DISCOVERY_PATH};
use crate::gate::http::{self, HttpRequest};
use crate::Result;

/// Body of `POST /add_pionnier`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddPeer {
    pub onion_address: String,
}

/// Answers peer-discovery requests so other nodes can bootstrap their own
/// directory from this one.
///
/// The accept loop is strictly one connection at a time: this is an
/// infrequently polled control-plane endpoint, not a data-plane hot path.
pub struct Responder {
    ip: SocketAddr,
    directory: Directory,
    log: EventLog,
    requests: Arc<AtomicUsize>,
}

impl Responder {
    pub fn new(ip: SocketAddr, directory: Directory, log: EventLog) -> Responder {
        Responder { ip, directory, log, requests: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    /// Counter handle for display alongside the event log.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.requests.clone()
    }

    pub async fn listen(&self) -> Result<()> {
        let listener = TcpListener::bind(self.ip).await?;
        info!("gate responder listening on {:?}", self.ip);
        self.log.success(format!("gate ready on {}", self.ip));
        loop {
            let (mut stream, _) = listener.accept().await?;
            self.requests.fetch_add(1, Ordering::Relaxed);
            match http::read_request(&mut stream).await {
                Ok(Some(request)) => {
                    let (status, body) = self.handle(&request);
                    if let Err(err) = http::write_response(&mut stream, status, &body).await
                    {
                        warn!("failed to write response: {:?}", err);
                    }
                }
                Ok(None) => {
                    self.log.error("malformed request".to_string());
                    let _ = http::write_response(&mut stream, 400, "Bad Request").await;
                }
                Err(err) => warn!("failed to read request: {:?}", err),
            }
        }
    }

    /// Maps one request to a status and body. State changes only on a
    /// well-formed add request; everything else is read-only.
    pub fn handle(&self, request: &HttpRequest) -> (u16, String) {
        match (request.method.as_str(), request.path.as_str()) {
            ("GET", DISCOVERY_PATH) => {
                let peers = self.directory.snapshot();
                self.log.success(format!(
                    "GET {} - returned {} peer(s)",
                    DISCOVERY_PATH,
                    peers.len()
                ));
                let mut body = String::new();
                for peer in peers.iter() {
                    body.push_str(peer);
                    body.push('\n');
                }
                (200, body)
            }
            ("POST", ANNOUNCE_PATH) => match serde_json::from_str::<AddPeer>(&request.body)
            {
                Ok(AddPeer { onion_address }) => {
                    // validation is the announcing node's burden, not ours
                    self.directory.append_raw(onion_address.clone());
                    self.log
                        .success(format!("POST {} - added {}", ANNOUNCE_PATH, onion_address));
                    (200, "Pioneer added successfully".to_string())
                }
                Err(err) => {
                    self.log.error(format!("bad add request: {}", err));
                    (400, "Invalid request body".to_string())
                }
            },
            _ => {
                self.log.error(format!("404: {} {}", request.method, request.path));
                (404, "404 Not Found".to_string())
            }
        }
    }
}
