pub mod http;
mod responder;

pub use responder::*;
