use std::path::PathBuf;

pub const PIONEERS_FILE: &str = "pioneers.json";
pub const GATES_FILE: &str = "gates.txt";

pub const DEFAULT_SOCKS_PORT: u16 = 9050;
pub const GATE_SOCKS_PORT: u16 = 9052;
pub const GATE_LOCAL_PORT: u16 = 5002;

/// Settings for a client/pioneer node, assembled from CLI arguments.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    /// Where the peer and gate list files live.
    pub data_dir: PathBuf,
    /// Root under which `tor/` and the per-instance namespaces live.
    pub tor_root: PathBuf,
    pub socks_port: u16,
    /// Operator-supplied base64 bootstrap blob, if any.
    pub bootstrap_blob: Option<String>,
}

impl NodeSettings {
    pub fn new(
        data_dir: PathBuf,
        tor_root: PathBuf,
        socks_port: u16,
        bootstrap_blob: Option<String>,
    ) -> Self {
        NodeSettings { data_dir, tor_root, socks_port, bootstrap_blob }
    }

    pub fn pioneers_path(&self) -> PathBuf {
        self.data_dir.join(PIONEERS_FILE)
    }

    pub fn gates_path(&self) -> PathBuf {
        self.data_dir.join(GATES_FILE)
    }
}

/// Settings for a discovery gate node.
#[derive(Debug, Clone)]
pub struct GateSettings {
    pub data_dir: PathBuf,
    pub tor_root: PathBuf,
    pub socks_port: u16,
    /// Local port the hidden listener forwards to; the responder binds it.
    pub local_port: u16,
}

impl GateSettings {
    pub fn new(data_dir: PathBuf, tor_root: PathBuf, socks_port: u16, local_port: u16) -> Self {
        GateSettings { data_dir, tor_root, socks_port, local_port }
    }

    pub fn pioneers_path(&self) -> PathBuf {
        self.data_dir.join(PIONEERS_FILE)
    }

    pub fn listen_ip(&self) -> std::net::SocketAddr {
        format!("127.0.0.1:{}", self.local_port).parse().unwrap()
    }
}
