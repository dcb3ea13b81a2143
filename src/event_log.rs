//! Bounded in-process log ring for operator visibility.
//!
//! Entries are purely observational; nothing reads them back for control
//! decisions. The ring has its own lock, independent of the directory's.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const LOG_CAP: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: String,
    pub message: String,
    pub severity: Severity,
}

/// Cloneable handle to the shared ring. Oldest entries are dropped past
/// `LOG_CAP`.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
}

impl EventLog {
    pub fn new() -> EventLog {
        EventLog { entries: Arc::new(Mutex::new(VecDeque::new())) }
    }

    pub fn info(&self, message: String) {
        self.append(message, Severity::Info);
    }

    pub fn success(&self, message: String) {
        self.append(message, Severity::Success);
    }

    pub fn error(&self, message: String) {
        self.append(message, Severity::Error);
    }

    fn append(&self, message: String, severity: Severity) {
        let timestamp = chrono::Local::now().format("%H:%M:%S").to_string();
        let mut entries = self.entries.lock().unwrap();
        entries.push_back(LogEntry { timestamp, message, severity });
        while entries.len() > LOG_CAP {
            entries.pop_front();
        }
    }

    /// Point-in-time copy, oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_snapshot() {
        let log = EventLog::new();
        log.info("starting".to_string());
        log.success("done".to_string());
        log.error("oops".to_string());
        let entries = log.snapshot();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].severity, Severity::Info);
        assert_eq!(entries[1].severity, Severity::Success);
        assert_eq!(entries[2].severity, Severity::Error);
        assert_eq!(entries[2].message, "oops");
    }

    #[test]
    fn test_ring_drops_oldest() {
        let log = EventLog::new();
        for i in 0..60 {
            log.info(format!("entry {}", i));
        }
        let entries = log.snapshot();
        assert_eq!(entries.len(), 50);
        assert_eq!(entries[0].message, "entry 10");
        assert_eq!(entries[49].message, "entry 59");
    }
}
