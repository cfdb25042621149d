mod push_channel;
mod push_hub;
mod ws_handler;

pub use push_channel::*;
pub use push_hub::*;
pub use ws_handler::*;
