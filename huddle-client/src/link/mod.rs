mod peer_link;
#[cfg(target_arch = "wasm32")]
mod web_link;
#[cfg(not(target_arch = "wasm32"))]
mod webrtc_link;

pub use peer_link::*;
#[cfg(target_arch = "wasm32")]
pub use web_link::*;
#[cfg(not(target_arch = "wasm32"))]
pub use webrtc_link::*;
