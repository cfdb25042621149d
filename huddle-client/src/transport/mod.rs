#[cfg(not(target_arch = "wasm32"))]
mod http_transport;
mod signal_transport;

#[cfg(not(target_arch = "wasm32"))]
pub use http_transport::*;
pub use signal_transport::*;
