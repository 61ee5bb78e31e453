//! Client error types.

use rqap_protocol::{ProtocolError, ServerErrorKind};
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    /// The server acknowledged the request with an error code. `tail`
    /// holds whatever trailing bytes the server sent; for R evaluation
    /// errors this is usually a human-readable message.
    #[error("server error: {kind}")]
    Server { kind: ServerErrorKind, tail: Vec<u8> },
}

impl ClientError {
    /// Returns whether retrying (possibly on a fresh connection) may
    /// succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Io(_) => true,
            ClientError::Timeout => true,
            ClientError::ConnectionClosed => true,
            ClientError::Server { kind, .. } => kind.is_retryable(),
            _ => false,
        }
    }

    /// The server's trailing message, if this is a server error with a
    /// printable tail.
    pub fn server_message(&self) -> Option<String> {
        match self {
            ClientError::Server { tail, .. } if !tail.is_empty() => {
                let text = String::from_utf8_lossy(tail);
                Some(text.trim_matches('\0').trim().to_string())
            }
            _ => None,
        }
    }
}
