use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::directory::parser;

/// On-disk form of the pioneer list: a bracketed, quoted list with one
/// entry per line. Persistence is best-effort, not authoritative — a
/// missing or malformed file loads as empty.
#[derive(Debug)]
pub struct PeerStore {
    path: PathBuf,
}

impl PeerStore {
    pub fn new(path: PathBuf) -> PeerStore {
        PeerStore { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn load(&self) -> Vec<String> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(_) => return vec![],
        };
        parser::quoted_strings(&contents)
            .iter()
            .map(|item| item.trim().to_string())
            .filter(|item| parser::is_relay_address(item))
            .collect()
    }

    pub fn save(&self, peers: &[String]) -> bool {
        if let Some(parent) = self.path.parent() {
            if fs::create_dir_all(parent).is_err() {
                return false;
            }
        }
        let mut out = String::from("[\n");
        for (i, peer) in peers.iter().enumerate() {
            out.push_str("  \"");
            out.push_str(peer);
            out.push('"');
            if i + 1 < peers.len() {
                out.push(',');
            }
            out.push('\n');
        }
        out.push_str("]\n");
        match fs::write(&self.path, out) {
            Ok(()) => true,
            Err(err) => {
                debug!("peer store save failed: {:?}", err);
                false
            }
        }
    }
}

/// On-disk form of the gate list: one address per line, plain text.
#[derive(Debug)]
pub struct GateStore {
    path: PathBuf,
}

impl GateStore {
    pub fn new(path: PathBuf) -> GateStore {
        GateStore { path }
    }

    pub fn load(&self) -> Vec<String> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => parser::parse_lines(&contents),
            Err(_) => vec![],
        }
    }

    pub fn save(&self, gates: &[String]) -> bool {
        if let Some(parent) = self.path.parent() {
            if fs::create_dir_all(parent).is_err() {
                return false;
            }
        }
        let mut out = String::new();
        for gate in gates.iter() {
            out.push_str(gate);
            out.push('\n');
        }
        fs::write(&self.path, out).is_ok()
    }
}
