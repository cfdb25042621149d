mod broadcast;
mod config;
mod directory;
mod error;
mod http;
mod huddle;
mod presence;
mod push;
mod relay;
mod server;

pub use broadcast::*;
pub use config::*;
pub use directory::*;
pub use error::*;
pub use http::*;
pub use huddle::*;
pub use presence::*;
pub use push::*;
pub use relay::*;
pub use server::*;
