//! Structured faults reported by a [`RemoteClient`](crate::RemoteClient).
//!
//! Callers branch on the variant, never on the message: a missing collection
//! and an unreachable server must not be confused.

use thiserror::Error;

pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The collection or resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The server rejected the content as not well-formed
    #[error("parse error: {0}")]
    Parse(String),

    /// Authentication or authorization was refused
    #[error("access denied: {0}")]
    Auth(String),

    /// Any other fault raised by the server
    #[error("server fault: {0}")]
    Fault(String),

    /// The server could not be reached or the connection dropped
    #[error("transport error: {0}")]
    Transport(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, RemoteError::Parse(_))
    }

    /// Connectivity or authentication failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport(_) | RemoteError::Auth(_))
    }

    /// First line of the fault message.
    pub fn summary(&self) -> &str {
        let msg = match self {
            RemoteError::NotFound(m)
            | RemoteError::Parse(m)
            | RemoteError::Auth(m)
            | RemoteError::Fault(m)
            | RemoteError::Transport(m) => m,
        };
        msg.lines().next().unwrap_or("")
    }
}
