//! TCP transport
//!
//! Wire format: every frame is a 4-byte big-endian length followed by the
//! payload, which is a `RequestFrame`/`ResponseFrame` encoded with the
//! configured `Codec`.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use rg_proto::{Codec, RequestFrame, ResponseFrame};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, warn};

use super::transport::{Connector, Transport, TransportError};
use crate::config::ConnectionTarget;

/// Largest frame accepted in either direction (64 MiB; tessellations are big)
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Build the length-delimited codec used on both ends of a connection
pub fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .big_endian()
        .max_frame_length(MAX_FRAME_SIZE)
        .new_codec()
}

/// Opens TCP connections to a configured target
pub struct TcpConnector {
    target: ConnectionTarget,
    codec: Codec,
}

impl TcpConnector {
    pub fn new(target: ConnectionTarget, codec: Codec) -> Self {
        Self { target, codec }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError> {
        let address = self.target.address();
        let stream = TcpStream::connect(&address)
            .await
            .map_err(|e| TransportError::Connect(format!("{address}: {e}")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| TransportError::Io(e.to_string()))?;

        debug!("Connected to {} ({} codec)", address, self.codec.name());
        Ok(Box::new(TcpTransport {
            framed: Framed::new(stream, frame_codec()),
            codec: self.codec,
            peer: address,
        }))
    }

    fn name(&self) -> &str {
        "tcp"
    }
}

/// One framed TCP connection
pub struct TcpTransport {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    codec: Codec,
    peer: String,
}

#[async_trait]
impl Transport for TcpTransport {
    async fn call(&mut self, frame: RequestFrame) -> Result<ResponseFrame, TransportError> {
        let seq = frame.seq;
        let payload = self.codec.encode(&frame)?;
        self.framed
            .send(payload)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;

        loop {
            let bytes = match self.framed.next().await {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => return Err(TransportError::Io(e.to_string())),
                None => return Err(TransportError::PeerClosed),
            };
            let response: ResponseFrame = self.codec.decode(&bytes)?;

            // Leftover answer to a call that was cancelled or timed out
            if response.seq < seq {
                debug!(
                    "Discarding stale response seq={} ({}) while waiting for {}",
                    response.seq,
                    response.response.name(),
                    seq
                );
                continue;
            }
            if response.seq > seq {
                warn!("Response seq={} from the future (expected {})", response.seq, seq);
                return Err(TransportError::UnexpectedSequence {
                    expected: seq,
                    got: response.seq,
                });
            }
            return Ok(response);
        }
    }

    async fn shutdown(&mut self) {
        if let Err(e) = SinkExt::<Bytes>::close(&mut self.framed).await {
            debug!("Error closing connection to {}: {}", self.peer, e);
        }
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }
}
