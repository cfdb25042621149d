mod app_state;
mod auth;
mod routes;

pub use app_state::*;
pub use auth::*;
pub use routes::*;
