mod directory_broadcaster;
mod presence_broadcaster;

pub use directory_broadcaster::*;
pub use presence_broadcaster::*;
