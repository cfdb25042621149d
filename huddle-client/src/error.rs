use thiserror::Error;

/// Failure of one signaling request. Cloned into every caller awaiting the
/// flush that carried its event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("cancelled before it was sent")]
    Cancelled,
}

impl TransportError {
    /// The server refused the request itself; repeating it will not help.
    pub fn is_client_error(&self) -> bool {
        matches!(self, TransportError::Rejected { status, .. } if (400..500).contains(status))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("{0} is not supported by this link")]
    Unsupported(&'static str),
    #[error("link operation failed: {0}")]
    Failed(String),
}

impl LinkError {
    pub fn failed(err: impl std::fmt::Display) -> Self {
        LinkError::Failed(err.to_string())
    }
}
