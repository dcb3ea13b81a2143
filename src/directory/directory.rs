use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::directory::parser;
use crate::directory::PeerStore;

/// Hard-coded fallback peer so the directory is never empty once
/// initialization completes.
pub const DEFAULT_PIONEER: &str =
    "5krka4isaabbpp7fbs3rqacryhvzxpx2b6sirabhbo73bolfbjs5yrqd.onion";

/// Well-known seed gate used when no gate list is supplied.
pub const DEFAULT_GATE: &str =
    "3oncms4bmvcv6jvwgzjvovfuhlx6pdho26lo6jny3ruu3hpgz7belzqd.onion";

/// Provenance of the most recent membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Default,
    File,
    Argv,
    Gossip,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Source::Default => write!(f, "default"),
            Source::File => write!(f, "file"),
            Source::Argv => write!(f, "argv"),
            Source::Gossip => write!(f, "gossip"),
        }
    }
}

#[derive(Debug)]
struct Inner {
    peers: Vec<String>,
    source: Source,
}

/// The authoritative, deduplicated set of known peer addresses.
///
/// All mutation and iteration happen under one lock shared by every clone
/// of the handle; `snapshot` is the only sanctioned way to read the list
/// for use outside the lock (network I/O in particular). Each public
/// operation locks exactly once, so internal helpers never re-lock.
/// Membership changes are persisted to the peer store as they happen.
#[derive(Debug, Clone)]
pub struct Directory {
    inner: Arc<Mutex<Inner>>,
    store: Arc<PeerStore>,
}

impl Directory {
    pub fn new(store: PeerStore) -> Directory {
        Directory {
            inner: Arc::new(Mutex::new(Inner { peers: vec![], source: Source::Default })),
            store: Arc::new(store),
        }
    }

    /// Seeds the directory from its persisted form. Does not apply the
    /// default fallback; callers decide when initialization is complete.
    pub fn init(&self) -> usize {
        let persisted = self.store.load();
        self.merge(&persisted, Source::File)
    }

    /// Filters candidates through the relay-address rule, appends any not
    /// already present and returns how many were added. Never removes
    /// entries. The provenance tag is updated only when at least one
    /// candidate was added.
    pub fn merge(&self, candidates: &[String], source: Source) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let mut added = 0;
        for candidate in candidates.iter() {
            let candidate = candidate.trim();
            if !parser::is_relay_address(candidate) {
                continue;
            }
            if inner.peers.iter().any(|p| p == candidate) {
                continue;
            }
            inner.peers.push(candidate.to_string());
            added += 1;
        }
        if added > 0 {
            inner.source = source;
            debug!("directory: {} added from {}", added, source);
            self.persist(&inner);
        }
        added
    }

    /// Appends an address verbatim: no validity filter, no dedup. Used by
    /// the gate responder, where validation is the caller's burden.
    pub fn append_raw(&self, address: String) {
        let mut inner = self.inner.lock().unwrap();
        inner.peers.push(address);
        self.persist(&inner);
    }

    /// Clears the set down to the single hard-coded fallback entry.
    pub fn reset_to_default(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.peers.clear();
        inner.peers.push(DEFAULT_PIONEER.to_string());
        inner.source = Source::Default;
        self.persist(&inner);
    }

    /// Point-in-time copy for safe concurrent use outside the lock.
    pub fn snapshot(&self) -> Vec<String> {
        self.inner.lock().unwrap().peers.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn source(&self) -> Source {
        self.inner.lock().unwrap().source
    }

    fn persist(&self, inner: &Inner) {
        if !self.store.save(&inner.peers) {
            warn!("failed to persist peer list to {:?}", self.store.path());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (tempfile::TempDir, Directory) {
        let dir = tempfile::tempdir().unwrap();
        let store = PeerStore::new(dir.path().join("pioneers.json"));
        (dir, Directory::new(store))
    }

    #[test]
    fn test_merge_filters_and_dedups() {
        let (_tmp, directory) = fresh();
        let candidates = vec![
            "a.onion".to_string(),
            "  b.onion ".to_string(),
            "".to_string(),
            "   ".to_string(),
            "no-suffix".to_string(),
            "a.onion".to_string(),
        ];
        assert_eq!(directory.merge(&candidates, Source::Gossip), 2);
        assert_eq!(directory.snapshot(), vec!["a.onion", "b.onion"]);
        assert_eq!(directory.source(), Source::Gossip);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let (_tmp, directory) = fresh();
        let candidates = vec!["a.onion".to_string(), "b.onion".to_string()];
        assert_eq!(directory.merge(&candidates, Source::File), 2);
        assert_eq!(directory.merge(&candidates, Source::File), 0);
        assert_eq!(directory.len(), 2);
    }

    #[test]
    fn test_merge_without_additions_keeps_source() {
        let (_tmp, directory) = fresh();
        directory.merge(&["a.onion".to_string()], Source::File);
        directory.merge(&["a.onion".to_string()], Source::Gossip);
        assert_eq!(directory.source(), Source::File);
    }

    #[test]
    fn test_reset_to_default() {
        let (_tmp, directory) = fresh();
        directory.merge(
            &["a.onion".to_string(), "b.onion".to_string()],
            Source::Gossip,
        );
        directory.reset_to_default();
        assert_eq!(directory.snapshot(), vec![DEFAULT_PIONEER]);
        assert_eq!(directory.source(), Source::Default);

        // regardless of prior state, including empty
        directory.reset_to_default();
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_persist_and_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pioneers.json");
        {
            let directory = Directory::new(PeerStore::new(path.clone()));
            directory.merge(
                &["a.onion".to_string(), "b.onion".to_string()],
                Source::Gossip,
            );
        }
        let directory = Directory::new(PeerStore::new(path));
        assert_eq!(directory.init(), 2);
        let mut addresses = directory.snapshot();
        addresses.sort();
        assert_eq!(addresses, vec!["a.onion", "b.onion"]);
        assert_eq!(directory.source(), Source::File);
    }

    #[test]
    fn test_append_raw_skips_validation_and_dedup() {
        let (_tmp, directory) = fresh();
        directory.append_raw("whatever".to_string());
        directory.append_raw("whatever".to_string());
        assert_eq!(directory.snapshot(), vec!["whatever", "whatever"]);
    }
}
