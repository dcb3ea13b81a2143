mod client;
mod replicator;

pub use client::*;
pub use replicator::*;
