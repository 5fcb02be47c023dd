//! Error types for the PlugBoleto client.
//!
//! # Design
//! Three failure kinds matter to callers and each gets its own variant:
//! a request that was never sent because required data was missing
//! (`InvalidRequest`), a request the service rejected (`RemoteOperation`),
//! and a request that could not be completed at all (`Transport`).

use thiserror::Error;

/// Errors returned by `PlugBoletoClient` operations and `interpret`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A required identifier, payload or attachment field is missing. Raised
    /// before any network access.
    #[error("cannot {operation} without {missing}")]
    InvalidRequest {
        operation: &'static str,
        missing: &'static str,
    },

    /// The service answered with a non-200 status. `message` is the
    /// normalized error text.
    #[error("{message}")]
    RemoteOperation { status: u16, message: String },

    /// The request could not be completed or the response was unreadable.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ApiError {
    pub(crate) fn invalid(operation: &'static str, missing: &'static str) -> Self {
        ApiError::InvalidRequest { operation, missing }
    }

    /// The normalized remote message, if this is a `RemoteOperation` error.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            ApiError::RemoteOperation { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Failures below the HTTP status line: connection, timeout, local file
/// access for uploads, or a success body that does not decode.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("transport error: {0}")]
    Other(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ApiError>;
