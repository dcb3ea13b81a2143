#[macro_use]
extern crate serde_derive;
extern crate colored;

pub mod directory;
pub mod event_log;
pub mod flood;
pub mod gate;
pub mod node;
pub mod settings;
pub mod signal;
pub mod tor;

use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    IO(std::io::Error),
    Actix(actix::MailboxError),
    Http(reqwest::Error),

    // transport launcher errors
    /// The tor binary was not found at the expected location
    TorExecutableNotFound(PathBuf),
    /// The OS refused to create the tor process
    TorLaunchFailed(String),
    /// The tor process exited within the grace window after start
    TorDiedEarly,
    /// The tor process exited during a wait phase
    TorDied { log_tail: String },
    /// The tor log contained an error marker before any success marker
    BootstrapFailed { detail: String },
    BootstrapTimeout,
    HostnameTimeout,
}

impl std::error::Error for Error {}

impl std::convert::From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::IO(error)
    }
}

impl std::convert::From<actix::MailboxError> for Error {
    fn from(error: actix::MailboxError) -> Self {
        Error::Actix(error)
    }
}

impl std::convert::From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::Http(error)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
