mod directory;
pub mod parser;
mod store;

pub use directory::*;
pub use store::*;
