mod memory_store;
mod presence_store;

pub use memory_store::*;
pub use presence_store::*;
