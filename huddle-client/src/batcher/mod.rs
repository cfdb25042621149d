mod signal_batcher;

pub use signal_batcher::*;
