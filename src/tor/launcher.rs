use std::fs;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::event_log::EventLog;
use crate::tor::{TorConfig, TorMode};
use crate::{Error, Result};

/// Log lines tor emits once the network bootstrap sequence has completed.
pub const BOOTSTRAP_READY_MARKERS: [&str; 2] =
    ["Bootstrapped 100% (done)", "Bootstrapped 100%"];

/// Log content indicating the bootstrap sequence cannot complete.
pub const BOOTSTRAP_ERROR_MARKERS: [&str; 2] = ["[err]", "Problem bootstrapping"];

/// How much of the tor log is attached to liveness failures.
const LOG_TAIL_CHARS: usize = 1000;

/// Grace window after spawn before the process is considered launched.
const LAUNCH_GRACE: Duration = Duration::from_secs(2);

/// Bounded wait for the child to exit after a kill in `stop`.
const STOP_WAIT: PollBudget = PollBudget { attempts: 10, interval: Duration::from_millis(500) };

/// Conceptual states of one launch attempt. `Ready` and `Failed` are
/// terminal; a failed launch requires a fresh launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorState {
    NotStarted,
    Launching,
    BootstrappingNetwork,
    AwaitingHiddenAddress,
    Ready,
    Failed,
    Stopped,
}

/// A fixed retry budget for one wait phase. Bootstrap progress is only
/// observable through the growing log file and process liveness, so every
/// wait is a bounded poll loop rather than an event subscription.
#[derive(Debug, Clone)]
pub struct PollBudget {
    pub attempts: u32,
    pub interval: Duration,
}

impl PollBudget {
    /// 120 x 500ms, ~60s for the network bootstrap.
    pub fn bootstrap_default() -> PollBudget {
        PollBudget { attempts: 120, interval: Duration::from_millis(500) }
    }

    /// Same budget for the hostname artifact.
    pub fn hostname_default() -> PollBudget {
        PollBudget { attempts: 120, interval: Duration::from_millis(500) }
    }
}

/// One step of a poll loop: `Err` aborts, `Ok(Some)` completes, `Ok(None)`
/// sleeps one interval and retries. Returns `Ok(None)` when the attempt
/// budget is exhausted.
pub fn poll<T, F>(budget: &PollBudget, mut step: F) -> Result<Option<T>>
where
    F: FnMut() -> Result<Option<T>>,
{
    for _ in 0..budget.attempts {
        if let Some(value) = step()? {
            return Ok(Some(value));
        }
        std::thread::sleep(budget.interval);
    }
    Ok(None)
}

/// Verdict of one scan over the tor log during bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogVerdict {
    Ready,
    Failed(String),
    Pending,
}

/// Scans the log for bootstrap markers. When both a ready and an error
/// marker are present, whichever occurs earliest in the text wins.
pub fn scan_bootstrap_log(log: &str) -> LogVerdict {
    let ready = BOOTSTRAP_READY_MARKERS.iter().filter_map(|m| log.find(m)).min();
    let failed = BOOTSTRAP_ERROR_MARKERS
        .iter()
        .filter_map(|m| log.find(m).map(|at| (at, *m)))
        .min_by_key(|(at, _)| *at);
    match (ready, failed) {
        (Some(r), Some((f, marker))) => {
            if f < r {
                LogVerdict::Failed(marker.to_string())
            } else {
                LogVerdict::Ready
            }
        }
        (Some(_), None) => LogVerdict::Ready,
        (None, Some((_, marker))) => LogVerdict::Failed(marker.to_string()),
        (None, None) => LogVerdict::Pending,
    }
}

/// Last `LOG_TAIL_CHARS` characters of the log, for diagnostics.
pub fn log_tail(log: &str) -> String {
    let total = log.chars().count();
    log.chars().skip(total.saturating_sub(LOG_TAIL_CHARS)).collect()
}

#[cfg(windows)]
const TOR_BINARY: &str = "tor.exe";
#[cfg(not(windows))]
const TOR_BINARY: &str = "tor";

/// Starts, supervises and stops one external tor process.
///
/// `launch` blocks the calling thread until the whole bootstrap sequence
/// has completed or failed, so it is normally driven from a dedicated
/// thread (see [`node::spawn_transport`][crate::node::spawn_transport]).
pub struct TorLauncher {
    root: PathBuf,
    config: TorConfig,
    child: Option<Child>,
    state: TorState,
    bootstrap_budget: PollBudget,
    hostname_budget: PollBudget,
    log: EventLog,
}

impl TorLauncher {
    pub fn new(root: PathBuf, config: TorConfig, log: EventLog) -> Self {
        TorLauncher {
            root,
            config,
            child: None,
            state: TorState::NotStarted,
            bootstrap_budget: PollBudget::bootstrap_default(),
            hostname_budget: PollBudget::hostname_default(),
            log,
        }
    }

    /// Overrides the wait budgets, used by tests to avoid real timing.
    pub fn with_budgets(mut self, bootstrap: PollBudget, hostname: PollBudget) -> Self {
        self.bootstrap_budget = bootstrap;
        self.hostname_budget = hostname;
        self
    }

    pub fn state(&self) -> TorState {
        self.state
    }

    pub fn config(&self) -> &TorConfig {
        &self.config
    }

    /// Launches tor and waits for the full bootstrap sequence. Returns the
    /// onion hostname in hidden-service mode, `None` in client mode.
    pub fn launch(&mut self) -> Result<Option<String>> {
        match self.try_launch() {
            Ok(address) => {
                self.state = TorState::Ready;
                Ok(address)
            }
            Err(err) => {
                self.state = TorState::Failed;
                Err(err)
            }
        }
    }

    fn try_launch(&mut self) -> Result<Option<String>> {
        let tor_path = self.root.join("tor").join(TOR_BINARY);
        if !tor_path.exists() {
            return Err(Error::TorExecutableNotFound(tor_path));
        }
        self.log.info(format!("found tor at {}", tor_path.display()));

        fs::create_dir_all(self.config.tor_data_dir(&self.root))?;
        fs::create_dir_all(self.config.hidden_dir(&self.root))?;
        let torrc_path = self.config.torrc_path(&self.root);
        fs::write(&torrc_path, self.config.torrc_contents(&self.root))?;
        self.log.info(format!("wrote torrc at {}", torrc_path.display()));

        self.state = TorState::Launching;
        let child = Command::new(&tor_path)
            .arg("-f")
            .arg(&torrc_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| Error::TorLaunchFailed(err.to_string()))?;
        info!("tor process started (pid: {})", child.id());
        self.log.success(format!("tor process started (pid: {})", child.id()));
        self.child = Some(child);

        std::thread::sleep(LAUNCH_GRACE);
        if !self.is_running() {
            return Err(Error::TorDiedEarly);
        }

        self.state = TorState::BootstrappingNetwork;
        self.wait_for_bootstrap()?;
        self.log.success("tor bootstrapped".to_string());

        match self.config.mode {
            TorMode::Client => Ok(None),
            TorMode::HiddenService { .. } => {
                self.state = TorState::AwaitingHiddenAddress;
                let hostname = self.wait_for_hostname()?;
                self.log.success(format!("onion hostname ready: {}", hostname));
                Ok(Some(hostname))
            }
        }
    }

    /// Idempotent forceful teardown: kill, bounded wait, release the handle.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            self.log.info("stopping tor process".to_string());
            if let Err(err) = child.kill() {
                debug!("kill: {:?}", err);
            }
            let waited = poll(&STOP_WAIT, || Ok(child.try_wait()?));
            match waited {
                Ok(Some(status)) => debug!("tor exited: {:?}", status),
                _ => warn!("tor did not exit within the stop window"),
            }
            self.log.success("tor stopped".to_string());
        }
        self.state = TorState::Stopped;
    }

    fn is_running(&mut self) -> bool {
        match self.child {
            Some(ref mut child) => match child.try_wait() {
                Ok(None) => true,
                _ => false,
            },
            None => false,
        }
    }

    fn read_log(&self) -> String {
        fs::read_to_string(self.config.log_path(&self.root)).unwrap_or_default()
    }

    fn wait_for_bootstrap(&mut self) -> Result<()> {
        self.log.info("waiting for tor bootstrap".to_string());
        let budget = self.bootstrap_budget.clone();
        let done = poll(&budget, || {
            if !self.is_running() {
                return Err(Error::TorDied { log_tail: log_tail(&self.read_log()) });
            }
            match scan_bootstrap_log(&self.read_log()) {
                LogVerdict::Ready => Ok(Some(())),
                LogVerdict::Failed(marker) => {
                    Err(Error::BootstrapFailed { detail: marker })
                }
                LogVerdict::Pending => Ok(None),
            }
        })?;
        match done {
            Some(()) => Ok(()),
            None => Err(Error::BootstrapTimeout),
        }
    }

    fn wait_for_hostname(&mut self) -> Result<String> {
        self.log.info("waiting for onion hostname".to_string());
        let hostname_path = self.config.hidden_dir(&self.root).join("hostname");
        let budget = self.hostname_budget.clone();
        let found = poll(&budget, || {
            if !self.is_running() {
                return Err(Error::TorDied { log_tail: log_tail(&self.read_log()) });
            }
            match fs::read_to_string(&hostname_path) {
                Ok(contents) => {
                    let hostname = contents.lines().next().unwrap_or("").trim();
                    if hostname.is_empty() {
                        Ok(None)
                    } else {
                        Ok(Some(hostname.to_string()))
                    }
                }
                Err(_) => Ok(None),
            }
        })?;
        match found {
            Some(hostname) => Ok(hostname),
            None => Err(Error::HostnameTimeout),
        }
    }
}

impl Drop for TorLauncher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_ready_marker() {
        let log = "Bootstrapped 90% (ap_handshake)\nBootstrapped 100% (done): Done\n";
        assert_eq!(scan_bootstrap_log(log), LogVerdict::Ready);
    }

    #[test]
    fn test_scan_error_marker() {
        let log = "Jan 01 [err] Reading config failed\n";
        assert_eq!(scan_bootstrap_log(log), LogVerdict::Failed("[err]".to_string()));
    }

    #[test]
    fn test_scan_warn_marker() {
        let log = "Jan 01 [warn] Problem bootstrapping. Stuck at 10%\n";
        assert_eq!(
            scan_bootstrap_log(log),
            LogVerdict::Failed("Problem bootstrapping".to_string())
        );
    }

    #[test]
    fn test_error_before_success_wins() {
        // A success marker later in the same poll window must not mask an
        // earlier error.
        let log = "[err] bootstrap problem\nBootstrapped 100% (done)\n";
        assert_eq!(scan_bootstrap_log(log), LogVerdict::Failed("[err]".to_string()));
    }

    #[test]
    fn test_success_before_error_wins() {
        let log = "Bootstrapped 100% (done)\nsome later [err] entry\n";
        assert_eq!(scan_bootstrap_log(log), LogVerdict::Ready);
    }

    #[test]
    fn test_scan_pending() {
        assert_eq!(scan_bootstrap_log("Bootstrapped 45%\n"), LogVerdict::Pending);
        assert_eq!(scan_bootstrap_log(""), LogVerdict::Pending);
    }

    #[test]
    fn test_poll_budget_exhaustion() {
        let budget = PollBudget { attempts: 3, interval: Duration::from_millis(1) };
        let mut calls = 0;
        let outcome: Result<Option<()>> = poll(&budget, || {
            calls += 1;
            Ok(None)
        });
        assert!(matches!(outcome, Ok(None)));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_poll_stops_on_success_and_error() {
        let budget = PollBudget { attempts: 10, interval: Duration::from_millis(1) };
        let mut calls = 0;
        let outcome = poll(&budget, || {
            calls += 1;
            if calls == 2 {
                Ok(Some(calls))
            } else {
                Ok(None)
            }
        });
        assert!(matches!(outcome, Ok(Some(2))));

        let outcome: Result<Option<()>> = poll(&budget, || Err(Error::BootstrapTimeout));
        assert!(matches!(outcome, Err(Error::BootstrapTimeout)));
    }

    #[test]
    fn test_log_tail_keeps_last_chars() {
        let log = "a".repeat(1500) + "end";
        let tail = log_tail(&log);
        assert_eq!(tail.chars().count(), 1000);
        assert!(tail.ends_with("end"));
        assert_eq!(log_tail("short"), "short");
    }

    #[test]
    fn test_launch_without_executable() {
        let dir = tempfile::tempdir().unwrap();
        let config = TorConfig::client("client", 9050);
        let mut launcher =
            TorLauncher::new(dir.path().to_path_buf(), config, EventLog::new());
        match launcher.launch() {
            Err(Error::TorExecutableNotFound(path)) => {
                assert!(path.starts_with(dir.path()))
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(launcher.state(), TorState::Failed);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = TorConfig::client("client", 9050);
        let mut launcher =
            TorLauncher::new(dir.path().to_path_buf(), config, EventLog::new());
        launcher.stop();
        launcher.stop();
        assert_eq!(launcher.state(), TorState::Stopped);
    }
}
