//! Session error taxonomy

use rg_proto::{CodecError, EntityId};
use rg_units::UnitError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::sketch::SketchError;

/// Error type for session operations
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// Connection could not be (re-)established within the retry budget.
    /// Fatal for the session; open a new one.
    #[error("Connection lost after {attempts} attempts: {reason}")]
    ConnectionLost { attempts: u32, reason: String },

    /// An operand no longer resolves in the identity registry
    #[error("Stale reference: {0}")]
    StaleReference(EntityId),

    /// A quantity had the wrong dimension or no unit at all
    #[error("Unit error: {0}")]
    Unit(#[from] UnitError),

    /// The server declined the operation; local state is unchanged
    #[error("{operation} rejected by server: {diagnostic}")]
    OperationRejected {
        operation: &'static str,
        diagnostic: String,
    },

    /// The caller cancelled the in-flight call; affected entities are
    /// resynchronized before they are trusted again
    #[error("Operation cancelled: {0}")]
    Cancelled(&'static str),

    /// The response was malformed or unexpected; the session stays usable
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The per-call timeout expired; the operation may or may not have happened
    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// The transport failed while a mutating call was in flight
    #[error("Transport failure during {operation}: {reason}")]
    Transport {
        operation: &'static str,
        reason: String,
    },

    #[error("Session is closed")]
    Closed,

    #[error("Sketch error: {0}")]
    Sketch(#[from] SketchError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SessionError {
    /// Whether the session must be reopened before any further call
    pub fn is_fatal_for_session(&self) -> bool {
        matches!(
            self,
            SessionError::ConnectionLost { .. } | SessionError::Closed
        )
    }

    /// Whether the outcome of the operation on the server is unknown
    pub fn outcome_unknown(&self) -> bool {
        matches!(
            self,
            SessionError::Cancelled(_)
                | SessionError::Timeout { .. }
                | SessionError::Transport { .. }
        )
    }
}

impl From<CodecError> for SessionError {
    fn from(e: CodecError) -> Self {
        SessionError::ProtocolError(e.to_string())
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
