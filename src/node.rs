//! Client-node wiring: seeds the peer directory, supervises the
//! transport from a dedicated thread and drives discovery and flood
//! operations through the [`Replicator`] actor.

use std::fs;
use std::sync::mpsc;
use std::thread;

use actix::{Actor, Addr};
use tracing::{error, info, warn};

use crate::colored::Colorize;
use crate::directory::{parser, Directory, GateStore, PeerStore, Source, DEFAULT_GATE};
use crate::event_log::EventLog;
use crate::flood::{
    DiscoverPeers, FetchPosts, FetchResult, FloodClient, PublishPost, Replicator,
};
use crate::settings::NodeSettings;
use crate::signal::{StateChange, StateTx};
use crate::tor::TorLauncher;
use crate::Result;

/// Seeds a directory in precedence order: persisted file, then the
/// operator blob, then the hard-coded default if still empty. Each layer
/// merges additively; initialization never leaves the directory empty.
pub fn seed_directory(directory: &Directory, blob: Option<&str>) {
    directory.init();
    if let Some(blob) = blob {
        let parsed = parser::parse_blob(blob);
        if parsed.is_empty() {
            warn!("bootstrap blob contained no valid addresses");
        } else {
            directory.merge(&parsed, Source::Argv);
        }
    }
    if directory.is_empty() {
        directory.reset_to_default();
    }
}

/// Gate list from disk, falling back to the well-known default gate.
pub fn load_gates(store: &GateStore, blob: Option<&str>) -> Vec<String> {
    if let Some(blob) = blob {
        let parsed = parser::parse_blob(blob);
        if !parsed.is_empty() {
            store.save(&parsed);
            return parsed;
        }
    }
    let gates = store.load();
    if gates.is_empty() {
        vec![DEFAULT_GATE.to_string()]
    } else {
        gates
    }
}

/// Owns the thread driving one launch attempt. The launcher blocks on the
/// bootstrap sequence, so it runs off the actor system; the outcome is
/// published as a [`StateChange`].
pub struct TransportHandle {
    shutdown: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl TransportHandle {
    /// Forceful teardown: stops tor and joins the supervisor thread.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Runs `launch` on a dedicated thread, reports the outcome, then parks
/// until shutdown so `stop` happens on the owning thread.
pub fn spawn_transport(mut launcher: TorLauncher, events: StateTx) -> TransportHandle {
    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    let thread = thread::spawn(move || {
        match launcher.launch() {
            Ok(hidden_address) => {
                info!("{}", "transport ready".green());
                let _ = events.send(StateChange::TorReady);
                if let Some(address) = hidden_address {
                    let _ = events.send(StateChange::HiddenAddress(address));
                }
            }
            Err(err) => {
                error!("transport launch failed: {}", err);
                let _ = events.send(StateChange::TorFailed(format!("{}", err)));
            }
        }
        let _ = shutdown_rx.recv();
        launcher.stop();
    });
    TransportHandle { shutdown: shutdown_tx, thread: Some(thread) }
}

/// A running client node. Cloneable; all clones share the directory, the
/// replicator address and the event channel.
#[derive(Clone)]
pub struct Node {
    pub directory: Directory,
    pub gates: Vec<String>,
    pub log: EventLog,
    replicator: Addr<Replicator>,
    events: StateTx,
}

/// Builds the directory, starts the replicator actor and the transport
/// supervisor thread. Must be called from within the actor system.
pub fn run(
    settings: &NodeSettings,
    events: StateTx,
    log: EventLog,
) -> Result<(Node, TransportHandle)> {
    fs::create_dir_all(&settings.data_dir)?;

    let directory = Directory::new(PeerStore::new(settings.pioneers_path()));
    seed_directory(&directory, settings.bootstrap_blob.as_deref());
    info!(
        "directory seeded with {} peer(s) (source: {})",
        directory.len(),
        directory.source()
    );

    let gate_store = GateStore::new(settings.gates_path());
    let gates = load_gates(&gate_store, settings.bootstrap_blob.as_deref());
    info!("using {} gate(s)", gates.len());

    let client = FloodClient::new(settings.socks_port)?;
    let replicator = Replicator::new(client, directory.clone(), log.clone()).start();

    let config = crate::tor::TorConfig::client("client", settings.socks_port);
    let launcher = TorLauncher::new(settings.tor_root.clone(), config, log.clone());
    let transport = spawn_transport(launcher, events.clone());

    let node = Node { directory, gates, log, replicator, events };
    Ok((node, transport))
}

impl Node {
    /// Enriches the directory by querying the gates; additive, commutes
    /// with concurrent merges.
    pub async fn refresh_peers(&self) -> Result<bool> {
        let updated = self
            .replicator
            .send(DiscoverPeers { gates: self.gates.clone() })
            .await?;
        let _ = self.events.send(StateChange::PeersUpdated(self.directory.len()));
        Ok(updated)
    }

    pub async fn fetch_posts(&self) -> Result<FetchResult> {
        let result = self.replicator.send(FetchPosts).await?;
        let _ = self.events.send(StateChange::PostsFetched {
            posts: result.posts.len(),
            any_success: result.any_success,
        });
        Ok(result)
    }

    pub async fn publish(&self, text: String) -> Result<bool> {
        let accepted = self.replicator.send(PublishPost { text }).await?;
        let _ = self.events.send(StateChange::Published(accepted));
        Ok(accepted)
    }

    /// Operator "clear" intent.
    pub fn clear_peers(&self) {
        self.directory.reset_to_default();
        let _ = self.events.send(StateChange::PeersUpdated(self.directory.len()));
    }

    /// Operator "export" intent: the current peer set as a base64 blob.
    pub fn export_blob(&self) -> String {
        parser::encode_blob(&self.directory.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::directory::DEFAULT_PIONEER;

    #[test]
    fn test_seed_falls_back_to_default() {
        let tmp = tempfile::tempdir().unwrap();
        let directory = Directory::new(PeerStore::new(tmp.path().join("pioneers.json")));
        seed_directory(&directory, None);
        assert_eq!(directory.snapshot(), vec![DEFAULT_PIONEER]);
        assert_eq!(directory.source(), Source::Default);
    }

    #[test]
    fn test_seed_merges_file_then_blob() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pioneers.json");
        PeerStore::new(path.clone()).save(&["disk.onion".to_string()]);

        let blob = parser::encode_blob(&["argv.onion".to_string()]);
        let directory = Directory::new(PeerStore::new(path));
        seed_directory(&directory, Some(&blob));
        assert_eq!(directory.snapshot(), vec!["disk.onion", "argv.onion"]);
        assert_eq!(directory.source(), Source::Argv);
    }

    #[test]
    fn test_seed_ignores_bad_blob() {
        let tmp = tempfile::tempdir().unwrap();
        let directory = Directory::new(PeerStore::new(tmp.path().join("pioneers.json")));
        seed_directory(&directory, Some("not base64"));
        assert_eq!(directory.snapshot(), vec![DEFAULT_PIONEER]);
    }

    #[test]
    fn test_load_gates_precedence() {
        let tmp = tempfile::tempdir().unwrap();
        let store = GateStore::new(tmp.path().join("gates.txt"));
        assert_eq!(load_gates(&store, None), vec![DEFAULT_GATE]);

        store.save(&["g1.onion".to_string()]);
        assert_eq!(load_gates(&store, None), vec!["g1.onion"]);

        // a valid blob overrides and is persisted
        let blob = parser::encode_blob(&["g2.onion".to_string()]);
        assert_eq!(load_gates(&store, Some(&blob)), vec!["g2.onion"]);
        assert_eq!(store.load(), vec!["g2.onion"]);
    }
}
