//! Session Channel
//!
//! Owns the connection to the geometry server. A single worker task holds the
//! transport and drains a request queue, so requests reach the server in the
//! order they were issued no matter how many tasks share the channel.
//!
//! Lifecycle:
//! - `Disconnected -> Connecting -> Healthy` on `connect()`
//! - `Healthy -> Degraded` on a transport error or timeout
//! - `Degraded -> Healthy` when the next call reconnects
//! - `Degraded -> Disconnected` when reconnecting runs out of attempts
//! - any state `-> Closed` on `close()`

mod state;
mod tcp;
mod transport;

pub use state::ChannelState;
pub use tcp::{MAX_FRAME_SIZE, TcpConnector, TcpTransport, frame_codec};
pub use transport::{Connector, NullConnector, Transport, TransportError};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rg_proto::{PROTOCOL_VERSION, Request, RequestFrame, Response};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{RetryPolicy, SessionConfig};
use crate::error::{SessionError, SessionResult};

/// Depth of the request queue in front of the worker
const QUEUE_DEPTH: usize = 256;

/// Snapshot of per-channel counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Frames written to a transport (health checks included)
    pub requests_sent: u64,
    /// Successful reconnects after a degradation
    pub reconnects: u64,
    /// Calls that hit the per-call timeout
    pub timeouts: u64,
}

struct Shared {
    label: &'static str,
    state: Mutex<ChannelState>,
    shutdown: CancellationToken,
    requests_sent: AtomicU64,
    reconnects: AtomicU64,
    timeouts: AtomicU64,
}

impl Shared {
    fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    fn set_state(&self, next: ChannelState) {
        let mut state = self.state.lock();
        if *state == next {
            return;
        }
        if !state.can_transition_to(next) {
            warn!(
                "{} channel: ignoring transition {} -> {}",
                self.label, *state, next
            );
            return;
        }
        info!("{} channel: {} -> {}", self.label, *state, next);
        *state = next;
    }
}

enum Command {
    Connect {
        reply: oneshot::Sender<SessionResult<()>>,
    },
    Call(Envelope),
    Close {
        reply: oneshot::Sender<()>,
    },
}

struct Envelope {
    request: Request,
    cancel: Option<CancellationToken>,
    reply: oneshot::Sender<SessionResult<Response>>,
}

/// Handle to a channel worker
///
/// Cheap to clone; all clones feed the same queue.
#[derive(Clone)]
pub struct Channel {
    tx: mpsc::Sender<Command>,
    shared: Arc<Shared>,
}

impl Channel {
    /// Spawn a worker for `connector`; the channel starts `Disconnected`
    pub fn spawn(
        connector: Arc<dyn Connector>,
        config: &SessionConfig,
        client: impl Into<String>,
        label: &'static str,
    ) -> Self {
        let shared = Arc::new(Shared {
            label,
            state: Mutex::new(ChannelState::Disconnected),
            shutdown: CancellationToken::new(),
            requests_sent: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
        });
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);

        let worker = Worker {
            connector,
            retry: config.retry.clone(),
            call_timeout: config.call_timeout(),
            client: client.into(),
            transport: None,
            next_seq: 0,
            lost: None,
            shared: shared.clone(),
        };
        tokio::spawn(worker.run(rx));

        Self { tx, shared }
    }

    /// Connect and perform the health-check handshake
    pub async fn connect(&self) -> SessionResult<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Connect { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Issue a request and wait for its response
    ///
    /// Cancelling `cancel` abandons the call; the server may or may not have
    /// processed it.
    pub async fn call(
        &self,
        request: Request,
        cancel: Option<&CancellationToken>,
    ) -> SessionResult<Response> {
        if self.state() == ChannelState::Closed {
            return Err(SessionError::Closed);
        }
        let operation = request.name();
        let (reply, rx) = oneshot::channel();
        let envelope = Envelope {
            request,
            cancel: cancel.cloned(),
            reply,
        };
        self.tx
            .send(Command::Call(envelope))
            .await
            .map_err(|_| SessionError::Closed)?;

        match cancel {
            Some(token) => tokio::select! {
                result = rx => result.map_err(|_| SessionError::Closed)?,
                _ = token.cancelled() => Err(SessionError::Cancelled(operation)),
            },
            None => rx.await.map_err(|_| SessionError::Closed)?,
        }
    }

    /// Close the channel; in-flight and queued calls fail with `Closed`
    pub async fn close(&self) {
        self.shared.shutdown.cancel();
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Close { reply }).await.is_ok() {
            let _ = rx.await;
        }
        self.shared.set_state(ChannelState::Closed);
    }

    pub fn state(&self) -> ChannelState {
        self.shared.state()
    }

    pub fn is_healthy(&self) -> bool {
        self.state() == ChannelState::Healthy
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            requests_sent: self.shared.requests_sent.load(Ordering::Relaxed),
            reconnects: self.shared.reconnects.load(Ordering::Relaxed),
            timeouts: self.shared.timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Outcome of one connection attempt
enum AttemptError {
    /// Worth retrying after backoff
    Retry(String),
    /// Retrying cannot help
    Fatal(SessionError),
}

struct Worker {
    connector: Arc<dyn Connector>,
    retry: RetryPolicy,
    call_timeout: Duration,
    client: String,
    transport: Option<Box<dyn Transport>>,
    next_seq: u64,
    /// Set once reconnecting ran out of attempts
    lost: Option<SessionError>,
    shared: Arc<Shared>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Connect { reply } => {
                    let result = self.connect().await;
                    let _ = reply.send(result);
                }
                Command::Call(envelope) => self.handle_call(envelope).await,
                Command::Close { reply } => {
                    self.drop_transport().await;
                    self.shared.set_state(ChannelState::Closed);
                    rx.close();
                    while let Some(pending) = rx.recv().await {
                        reject(pending);
                    }
                    let _ = reply.send(());
                    debug!("{} channel worker stopped", self.shared.label);
                    return;
                }
            }
        }
        // Every handle dropped
        self.drop_transport().await;
    }

    async fn handle_call(&mut self, envelope: Envelope) {
        let Envelope {
            request,
            cancel,
            mut reply,
        } = envelope;
        let operation = request.name();

        let shared = self.shared.clone();
        if shared.shutdown.is_cancelled() {
            let _ = reply.send(Err(SessionError::Closed));
            return;
        }
        let cancel = cancel.unwrap_or_default();
        if cancel.is_cancelled() {
            debug!("{} cancelled before it was sent", operation);
            let _ = reply.send(Err(SessionError::Cancelled(operation)));
            return;
        }

        let result = tokio::select! {
            result = self.dispatch(&request) => result,
            _ = cancel.cancelled() => {
                warn!("{} cancelled in flight; outcome unknown", operation);
                Err(SessionError::Cancelled(operation))
            }
            _ = reply.closed() => {
                debug!("{} abandoned by caller", operation);
                Err(SessionError::Cancelled(operation))
            }
            _ = shared.shutdown.cancelled() => Err(SessionError::Closed),
        };
        let _ = reply.send(result);
    }

    /// Send a request, reconnecting first when degraded
    ///
    /// Requests without side effects are re-sent after a broken connection;
    /// mutating requests never are.
    async fn dispatch(&mut self, request: &Request) -> SessionResult<Response> {
        let operation = request.name();
        let mut attempts = 0;

        loop {
            self.ready().await?;
            let Some(transport) = self.transport.as_mut() else {
                return Err(SessionError::ProtocolError(
                    "channel has no transport".into(),
                ));
            };

            self.next_seq += 1;
            let frame = RequestFrame {
                seq: self.next_seq,
                request: request.clone(),
            };
            debug!("-> {} seq={}", operation, frame.seq);
            self.shared.requests_sent.fetch_add(1, Ordering::Relaxed);

            let failure = match tokio::time::timeout(self.call_timeout, transport.call(frame)).await
            {
                Ok(Ok(response)) => {
                    debug!("<- {} seq={}", response.response.name(), response.seq);
                    return Ok(response.response);
                }
                Ok(Err(e)) if !e.breaks_connection() => {
                    return Err(SessionError::ProtocolError(e.to_string()));
                }
                Ok(Err(e)) => e,
                Err(_) => {
                    self.shared.timeouts.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "{} timed out after {} ms",
                        operation,
                        self.call_timeout.as_millis()
                    );
                    self.degrade().await;
                    return Err(SessionError::Timeout {
                        operation,
                        timeout_ms: self.call_timeout.as_millis() as u64,
                    });
                }
            };

            warn!("Transport failure during {}: {}", operation, failure);
            self.degrade().await;
            attempts += 1;
            if request.is_mutating() || attempts >= self.retry.max_attempts {
                return Err(SessionError::Transport {
                    operation,
                    reason: failure.to_string(),
                });
            }
            debug!("Re-sending {} after reconnect (attempt {})", operation, attempts + 1);
        }
    }

    /// Make sure there is a healthy transport
    async fn ready(&mut self) -> SessionResult<()> {
        match self.shared.state() {
            ChannelState::Healthy if self.transport.is_some() => Ok(()),
            ChannelState::Healthy | ChannelState::Degraded => self.recover().await,
            ChannelState::Disconnected | ChannelState::Connecting => {
                Err(self.lost.clone().unwrap_or(SessionError::ConnectionLost {
                    attempts: 0,
                    reason: "not connected".into(),
                }))
            }
            ChannelState::Closed => Err(SessionError::Closed),
        }
    }

    async fn connect(&mut self) -> SessionResult<()> {
        match self.shared.state() {
            ChannelState::Healthy => return Ok(()),
            ChannelState::Degraded => return self.recover().await,
            ChannelState::Closed => return Err(SessionError::Closed),
            ChannelState::Disconnected | ChannelState::Connecting => {}
        }
        if let Some(lost) = &self.lost {
            return Err(lost.clone());
        }

        self.shared.set_state(ChannelState::Connecting);
        match self.establish().await {
            Ok(()) => {
                self.shared.set_state(ChannelState::Healthy);
                Ok(())
            }
            Err(e) => {
                self.shared.set_state(ChannelState::Disconnected);
                self.lost = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Reconnect from `Degraded`
    async fn recover(&mut self) -> SessionResult<()> {
        info!("{} channel reconnecting", self.shared.label);
        self.drop_transport().await;
        match self.establish().await {
            Ok(()) => {
                self.shared.reconnects.fetch_add(1, Ordering::Relaxed);
                self.shared.set_state(ChannelState::Healthy);
                Ok(())
            }
            Err(e) => {
                self.shared.set_state(ChannelState::Disconnected);
                self.lost = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Connect with bounded exponential backoff
    async fn establish(&mut self) -> SessionResult<()> {
        let max_attempts = self.retry.max_attempts;
        let mut last_reason = String::from("no attempt made");

        for attempt in 1..=max_attempts {
            match self.attempt().await {
                Ok(transport) => {
                    info!(
                        "{} channel connected to {} via {} (attempt {})",
                        self.shared.label,
                        transport.peer(),
                        self.connector.name(),
                        attempt
                    );
                    self.transport = Some(transport);
                    return Ok(());
                }
                Err(AttemptError::Fatal(e)) => {
                    error!("{} channel handshake failed: {}", self.shared.label, e);
                    return Err(e);
                }
                Err(AttemptError::Retry(reason)) => {
                    warn!(
                        "{} channel connect attempt {}/{} failed: {}",
                        self.shared.label, attempt, max_attempts, reason
                    );
                    last_reason = reason;
                    if attempt < max_attempts {
                        tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    }
                }
            }
        }

        error!(
            "{} channel gave up after {} attempts",
            self.shared.label, max_attempts
        );
        Err(SessionError::ConnectionLost {
            attempts: max_attempts,
            reason: last_reason,
        })
    }

    /// One connect + health-check round
    async fn attempt(&mut self) -> Result<Box<dyn Transport>, AttemptError> {
        let mut transport = tokio::time::timeout(self.call_timeout, self.connector.connect())
            .await
            .map_err(|_| AttemptError::Retry("connect timed out".into()))?
            .map_err(|e| AttemptError::Retry(e.to_string()))?;

        self.next_seq += 1;
        let frame = RequestFrame {
            seq: self.next_seq,
            request: Request::HealthCheck {
                client: self.client.clone(),
                protocol: PROTOCOL_VERSION,
            },
        };
        self.shared.requests_sent.fetch_add(1, Ordering::Relaxed);

        let response = match tokio::time::timeout(self.call_timeout, transport.call(frame)).await {
            Ok(Ok(response)) => response.response,
            Ok(Err(e)) => {
                transport.shutdown().await;
                return Err(AttemptError::Retry(format!("health check: {e}")));
            }
            Err(_) => {
                transport.shutdown().await;
                return Err(AttemptError::Retry("health check timed out".into()));
            }
        };

        match response {
            Response::Health { server, protocol } if protocol == PROTOCOL_VERSION => {
                debug!("Server {} speaks protocol {}", server, protocol);
                Ok(transport)
            }
            Response::Health { server, protocol } => {
                transport.shutdown().await;
                Err(AttemptError::Fatal(SessionError::ProtocolError(format!(
                    "server {server} speaks protocol {protocol}, client speaks {PROTOCOL_VERSION}"
                ))))
            }
            other => {
                transport.shutdown().await;
                Err(AttemptError::Retry(format!(
                    "health check answered with {}",
                    other.name()
                )))
            }
        }
    }

    async fn degrade(&mut self) {
        self.drop_transport().await;
        self.shared.set_state(ChannelState::Degraded);
    }

    async fn drop_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.shutdown().await;
        }
    }
}

fn reject(command: Command) {
    match command {
        Command::Connect { reply } => {
            let _ = reply.send(Err(SessionError::Closed));
        }
        Command::Call(envelope) => {
            let _ = envelope.reply.send(Err(SessionError::Closed));
        }
        Command::Close { reply } => {
            let _ = reply.send(());
        }
    }
}
