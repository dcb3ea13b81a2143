mod config;
mod launcher;

pub use config::*;
pub use launcher::*;
