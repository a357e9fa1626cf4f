// src/core/errors.rs

//! Defines the primary error type for the client.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Every failure the client can report, from socket setup to operator input.
///
/// I/O errors are wrapped in an `Arc` so the enum stays cheap to clone when a
/// failure has to be both logged by a task and handed back to the controller.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: Arc<std::io::Error>,
    },

    #[error("Connection attempt to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Send failed: {0}")]
    Send(Arc<std::io::Error>),

    #[error("Receive failed: {0}")]
    Recv(Arc<std::io::Error>),

    #[error("Connection closed by peer")]
    PeerClosed,

    #[error("Connection is closed")]
    Closed,

    #[error("Received bytes are not valid {0}")]
    Decode(&'static str),

    #[error("Line exceeds the maximum length of {0} bytes")]
    LineTooLong(usize),

    #[error("No reply received within {0:?}")]
    ReplyTimeout(Duration),

    #[error("Invalid command: {0}")]
    Rejected(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// Returns `false` only for failures that leave the session usable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ClientError::Rejected(_))
    }

    /// Wraps an I/O error that happened while writing to the socket.
    pub(crate) fn send(e: std::io::Error) -> Self {
        ClientError::Send(Arc::new(e))
    }
}

impl PartialEq for ClientError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ClientError::Send(e1), ClientError::Send(e2))
            | (ClientError::Recv(e1), ClientError::Recv(e2)) => e1.kind() == e2.kind(),
            (ClientError::Handshake(s1), ClientError::Handshake(s2)) => s1 == s2,
            (ClientError::Rejected(s1), ClientError::Rejected(s2)) => s1 == s2,
            (ClientError::InvalidConfig(s1), ClientError::InvalidConfig(s2)) => s1 == s2,
            (ClientError::Decode(s1), ClientError::Decode(s2)) => s1 == s2,
            (ClientError::LineTooLong(n1), ClientError::LineTooLong(n2)) => n1 == n2,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

// Reads are the only place where a bare `io::Error` is converted implicitly;
// writes go through `ClientError::send` so the two directions stay distinguishable.
impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Recv(Arc::new(e))
    }
}
