use std::path::{Path, PathBuf};

/// Whether the transport instance only provides the local SOCKS proxy or
/// additionally exposes an inbound hidden listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorMode {
    Client,
    HiddenService { local_port: u16 },
}

/// Immutable description of one tor instance. Created once at startup.
///
/// All per-instance artifacts live under `<root>/data/<name>/` so that
/// multiple instances never collide.
#[derive(Debug, Clone)]
pub struct TorConfig {
    pub name: String,
    pub socks_port: u16,
    pub mode: TorMode,
}

impl TorConfig {
    pub fn client(name: &str, socks_port: u16) -> Self {
        TorConfig { name: name.to_string(), socks_port, mode: TorMode::Client }
    }

    pub fn hidden_service(name: &str, socks_port: u16, local_port: u16) -> Self {
        TorConfig {
            name: name.to_string(),
            socks_port,
            mode: TorMode::HiddenService { local_port },
        }
    }

    pub fn data_dir(&self, root: &Path) -> PathBuf {
        root.join("data").join(&self.name)
    }

    pub fn torrc_path(&self, root: &Path) -> PathBuf {
        self.data_dir(root).join(format!("torrc_{}", self.name))
    }

    pub fn tor_data_dir(&self, root: &Path) -> PathBuf {
        self.data_dir(root).join(format!("tor_data_{}", self.name))
    }

    pub fn hidden_dir(&self, root: &Path) -> PathBuf {
        self.data_dir(root).join("hidden_service")
    }

    pub fn log_path(&self, root: &Path) -> PathBuf {
        self.data_dir(root).join("tor.log")
    }

    /// Renders the torrc written fresh on every launch.
    pub fn torrc_contents(&self, root: &Path) -> String {
        let mut torrc = String::new();
        torrc.push_str(&format!("SocksPort {}\n", self.socks_port));
        torrc.push_str(&format!(
            "DataDirectory {}\n",
            self.tor_data_dir(root).display()
        ));
        if let TorMode::HiddenService { local_port } = self.mode {
            torrc.push_str(&format!(
                "HiddenServiceDir {}\n",
                self.hidden_dir(root).display()
            ));
            torrc.push_str(&format!("HiddenServicePort 80 127.0.0.1:{}\n", local_port));
        }
        torrc.push_str(&format!("Log notice file {}\n", self.log_path(root).display()));
        torrc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_namespace() {
        let root = Path::new("/tmp/overlay");
        let a = TorConfig::client("client", 9050);
        let b = TorConfig::hidden_service("gate", 9052, 5002);
        assert_eq!(a.data_dir(root), root.join("data").join("client"));
        assert_eq!(b.data_dir(root), root.join("data").join("gate"));
        assert!(a.torrc_path(root).starts_with(a.data_dir(root)));
        assert!(b.hidden_dir(root).starts_with(b.data_dir(root)));
        assert_ne!(a.log_path(root), b.log_path(root));
    }

    #[test]
    fn test_torrc_client_mode() {
        let root = Path::new("/tmp/overlay");
        let torrc = TorConfig::client("client", 9050).torrc_contents(root);
        assert!(torrc.contains("SocksPort 9050\n"));
        assert!(torrc.contains("DataDirectory "));
        assert!(torrc.contains("Log notice file "));
        assert!(!torrc.contains("HiddenService"));
    }

    #[test]
    fn test_torrc_hidden_service_mode() {
        let root = Path::new("/tmp/overlay");
        let torrc = TorConfig::hidden_service("gate", 9052, 5002).torrc_contents(root);
        assert!(torrc.contains("SocksPort 9052\n"));
        assert!(torrc.contains("HiddenServiceDir "));
        assert!(torrc.contains("HiddenServicePort 80 127.0.0.1:5002\n"));
    }
}
