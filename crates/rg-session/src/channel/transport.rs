//! Transport trait definitions
//!
//! A `Connector` opens connections to a geometry server; a `Transport` is one
//! open connection carrying request/response frames. The channel worker owns
//! at most one transport at a time and never issues two calls on it at once.

use async_trait::async_trait;
use rg_proto::{CodecError, RequestFrame, ResponseFrame};
use thiserror::Error;

/// Error type for transport operations
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed by peer")]
    PeerClosed,

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Response sequence {got} does not match request {expected}")]
    UnexpectedSequence { expected: u64, got: u64 },

    #[error("Transport not available: {0}")]
    NotAvailable(String),
}

impl TransportError {
    /// Whether the connection is unusable after this error
    ///
    /// Codec and sequencing errors leave the byte stream intact; everything
    /// else means the connection must be re-established.
    pub fn breaks_connection(&self) -> bool {
        !matches!(
            self,
            TransportError::Codec(_) | TransportError::UnexpectedSequence { .. }
        )
    }
}

/// One open connection to a geometry server
#[async_trait]
pub trait Transport: Send {
    /// Send a frame and wait for the response carrying the same sequence number
    async fn call(&mut self, frame: RequestFrame) -> Result<ResponseFrame, TransportError>;

    /// Close the connection
    async fn shutdown(&mut self);

    /// Peer description for logs
    fn peer(&self) -> String;
}

/// Factory for transports
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new connection
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError>;

    /// Get the connector name
    fn name(&self) -> &str;
}

/// A connector that never connects (placeholder when no server is configured)
pub struct NullConnector;

#[async_trait]
impl Connector for NullConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError> {
        Err(TransportError::NotAvailable(
            "No geometry server configured".into(),
        ))
    }

    fn name(&self) -> &str {
        "null"
    }
}
