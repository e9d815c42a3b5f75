//! Server error types.

use ucapi_core::StatusCode;

/// Failure of a single hub request. Every variant is answered with a
/// correlated response carrying [`RequestError::status`].
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Missing or malformed `msg_data`.
    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error("client is not authenticated")]
    Unauthorized,

    #[error("not found: {message}")]
    NotFound { message: String },

    /// The request `msg` is not part of the protocol.
    #[error("unknown request message: {msg}")]
    UnknownMessage { msg: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl RequestError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Status code sent to the hub.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BadRequest,
            Self::Unauthorized => StatusCode::Unauthorized,
            Self::NotFound { .. } => StatusCode::NotFound,
            Self::UnknownMessage { .. } | Self::Internal { .. } => StatusCode::ServerError,
        }
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal {
            message: err.to_string(),
        }
    }
}

/// Failure to start or run the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}
