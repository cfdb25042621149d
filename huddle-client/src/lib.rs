mod batcher;
mod config;
mod engine;
mod error;
mod link;
mod roster;
mod runtime;
mod session;
mod transport;

pub use batcher::*;
pub use config::*;
pub use engine::*;
pub use error::*;
pub use link::*;
pub use roster::*;
pub use runtime::*;
pub use session::*;
pub use transport::*;
