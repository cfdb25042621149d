pub mod mock_push;

pub use fixtures::*;
pub use mock_push::*;
