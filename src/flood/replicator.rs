use actix::{Actor, Context, Handler, Message, MessageResponse, ResponseFuture};
use tracing::debug;

use crate::directory::{Directory, Source};
use crate::event_log::EventLog;
use crate::flood::FloodClient;

/// Actor facade over [`FloodClient`] so fetch, publish and discovery run
/// concurrently with each other and with a presentation loop. Every
/// handler reads the directory through `snapshot` and never holds its
/// lock across network I/O.
pub struct Replicator {
    client: FloodClient,
    directory: Directory,
    log: EventLog,
}

impl Replicator {
    pub fn new(client: FloodClient, directory: Directory, log: EventLog) -> Replicator {
        Replicator { client, directory, log }
    }
}

impl Actor for Replicator {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Context<Self>) {
        debug!("started replicator");
    }
}

/// Query the gates and merge whatever they return; resolves to whether
/// the gates yielded anything at all.
#[derive(Debug, Clone, Message)]
#[rtype(result = "bool")]
pub struct DiscoverPeers {
    pub gates: Vec<String>,
}

impl Handler<DiscoverPeers> for Replicator {
    type Result = ResponseFuture<bool>;

    fn handle(&mut self, msg: DiscoverPeers, _ctx: &mut Context<Self>) -> Self::Result {
        let client = self.client.clone();
        let directory = self.directory.clone();
        let log = self.log.clone();
        Box::pin(async move {
            let found = client.discover(&msg.gates).await;
            if found.is_empty() {
                log.info("gates did not return any peers".to_string());
                return false;
            }
            let added = directory.merge(&found, Source::Gossip);
            log.success(format!(
                "discovery: {} new peer(s), {} total",
                added,
                directory.len()
            ));
            true
        })
    }
}

/// Fetch content from every known peer.
#[derive(Debug, Clone, Message)]
#[rtype(result = "FetchResult")]
pub struct FetchPosts;

#[derive(Debug, Clone, MessageResponse)]
pub struct FetchResult {
    pub posts: Vec<String>,
    pub any_success: bool,
}

impl Handler<FetchPosts> for Replicator {
    type Result = ResponseFuture<FetchResult>;

    fn handle(&mut self, _msg: FetchPosts, _ctx: &mut Context<Self>) -> Self::Result {
        let client = self.client.clone();
        let directory = self.directory.clone();
        let log = self.log.clone();
        Box::pin(async move {
            let peers = directory.snapshot();
            let (posts, any_success) = client.fetch(&peers).await;
            if any_success {
                log.success(format!("fetched {} post(s)", posts.len()));
            } else {
                log.error("every peer failed during fetch".to_string());
            }
            FetchResult { posts, any_success }
        })
    }
}

/// Broadcast one post to every known peer.
#[derive(Debug, Clone, Message)]
#[rtype(result = "bool")]
pub struct PublishPost {
    pub text: String,
}

impl Handler<PublishPost> for Replicator {
    type Result = ResponseFuture<bool>;

    fn handle(&mut self, msg: PublishPost, _ctx: &mut Context<Self>) -> Self::Result {
        let client = self.client.clone();
        let directory = self.directory.clone();
        let log = self.log.clone();
        Box::pin(async move {
            let peers = directory.snapshot();
            let any_ok = client.publish(&msg.text, &peers).await;
            if any_ok {
                log.success("post published".to_string());
            } else {
                log.error("no peer accepted the post".to_string());
            }
            any_ok
        })
    }
}

/// Register an address with the gates (hidden-service nodes only).
#[derive(Debug, Clone, Message)]
#[rtype(result = "bool")]
pub struct Announce {
    pub address: String,
    pub gates: Vec<String>,
}

impl Handler<Announce> for Replicator {
    type Result = ResponseFuture<bool>;

    fn handle(&mut self, msg: Announce, _ctx: &mut Context<Self>) -> Self::Result {
        let client = self.client.clone();
        let log = self.log.clone();
        Box::pin(async move {
            let any_ok = client.announce(&msg.address, &msg.gates).await;
            if any_ok {
                log.success(format!("announced {} to the gates", msg.address));
            }
            any_ok
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::directory::PeerStore;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn one_shot_gate(body: &str) -> String {
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let gate = format!("{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });
        gate
    }

    #[actix_rt::test]
    async fn test_discover_merges_into_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let directory = Directory::new(PeerStore::new(tmp.path().join("pioneers.json")));
        let replicator =
            Replicator::new(FloodClient::direct(), directory.clone(), EventLog::new())
                .start();

        let gate = one_shot_gate("p1.onion\np2.onion\n").await;
        let updated = replicator.send(DiscoverPeers { gates: vec![gate] }).await.unwrap();
        assert!(updated);
        assert_eq!(directory.snapshot(), vec!["p1.onion", "p2.onion"]);
        assert_eq!(directory.source(), Source::Gossip);
    }

    #[actix_rt::test]
    async fn test_discover_with_no_gates() {
        let tmp = tempfile::tempdir().unwrap();
        let directory = Directory::new(PeerStore::new(tmp.path().join("pioneers.json")));
        let replicator =
            Replicator::new(FloodClient::direct(), directory.clone(), EventLog::new())
                .start();

        let updated = replicator.send(DiscoverPeers { gates: vec![] }).await.unwrap();
        assert!(!updated);
        assert!(directory.is_empty());
    }
}
