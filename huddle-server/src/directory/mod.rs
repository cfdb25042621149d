mod accounts;
mod room;
mod room_directory;

pub use accounts::*;
pub use room::*;
pub use room_directory::*;
