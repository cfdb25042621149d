use crate::presence::PresenceError;
use crate::push::PushError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use huddle_core::NormalizeError;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("not allowed to {0}")]
    Forbidden(&'static str),

    #[error("room not found")]
    NotFound,

    #[error("room is full")]
    RoomFull,

    #[error("temporarily unavailable: {0}")]
    Unavailable(String),
}

impl Error {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound => "not_found",
            Self::RoomFull => "room_full",
            Self::Unavailable(_) => "unavailable",
        }
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RoomFull => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<PresenceError> for Error {
    fn from(e: PresenceError) -> Self {
        Self::Unavailable(e.to_string())
    }
}

impl From<PushError> for Error {
    fn from(e: PushError) -> Self {
        Self::Unavailable(e.to_string())
    }
}

impl From<NormalizeError> for Error {
    fn from(e: NormalizeError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}
