//! Remote geometry session
//!
//! A `Session` is an explicit, cloneable context: it owns the channel(s) to
//! one geometry server and the local mirror of every design opened through
//! it. Independent sessions share nothing.

use std::sync::Arc;

use rg_proto::{EntityId, Request};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::cache::CacheStats;
use crate::channel::{Channel, ChannelState, ChannelStats, Connector, TcpConnector};
use crate::config::SessionConfig;
use crate::derived::{DerivedKind, DerivedValue};
use crate::error::{SessionError, SessionResult};
use crate::graph::{Design, Entity};
use crate::journal::Journal;
use crate::operation::{Gap, Operation, Query};
use crate::registry::Proxy;
use crate::translator::{MutationOutcome, QueryOutput, Translator};

struct Inner {
    id: Uuid,
    config: SessionConfig,
    translator: Translator,
}

/// Handle to an open geometry session
///
/// Cheap to clone; every clone and every graph handle share one session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Open a session over TCP to the configured target
    pub async fn open(config: SessionConfig) -> SessionResult<Self> {
        let connector = TcpConnector::new(config.target.clone(), config.codec);
        Self::open_with(Arc::new(connector), config).await
    }

    /// Open a session over any connector
    ///
    /// Connects, performs the health-check handshake and, when configured,
    /// opens a second channel dedicated to queries.
    pub async fn open_with(connector: Arc<dyn Connector>, config: SessionConfig) -> SessionResult<Self> {
        config.validate()?;
        let id = Uuid::new_v4();
        let client = format!("rg-session/{id}");

        let primary = Channel::spawn(connector.clone(), &config, client.clone(), "primary");
        if let Err(e) = primary.connect().await {
            primary.close().await;
            return Err(e);
        }

        let queries = if config.dedicated_query_channel {
            let channel = Channel::spawn(connector, &config, client, "query");
            if let Err(e) = channel.connect().await {
                channel.close().await;
                primary.close().await;
                return Err(e);
            }
            Some(channel)
        } else {
            None
        };

        info!(
            "Session {} open to {} ({} query channel)",
            id,
            config.target.address(),
            if queries.is_some() { "dedicated" } else { "shared" }
        );
        let translator = Translator::new(
            primary,
            queries,
            config.units,
            config.tessellation_tolerance,
        );
        Ok(Self {
            inner: Arc::new(Inner {
                id,
                config,
                translator,
            }),
        })
    }

    /// Close every channel; the session cannot be used afterwards
    pub async fn close(&self) {
        let translator = &self.inner.translator;
        translator.primary().close().await;
        if let Some(queries) = translator.dedicated_query_channel() {
            queries.close().await;
        }
        info!("Session {} closed", self.inner.id);
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Whether the primary channel is healthy
    pub fn is_healthy(&self) -> bool {
        self.inner.translator.primary().is_healthy()
    }

    /// State of the primary channel
    pub fn state(&self) -> ChannelState {
        self.inner.translator.primary().state()
    }

    pub fn channel_stats(&self) -> ChannelStats {
        self.inner.translator.primary().stats()
    }

    /// Counters of the query channel (the primary channel when not dedicated)
    pub fn query_channel_stats(&self) -> ChannelStats {
        self.inner.translator.query_channel().stats()
    }

    // ============== Designs ==============

    /// Create an empty design at revision 0
    pub async fn new_design(&self, name: &str) -> SessionResult<Design> {
        let request = Request::NewDesign {
            name: name.to_string(),
        };
        let proxy = self.inner.translator.open_design(request).await?;
        Ok(Design::new(self.clone(), proxy))
    }

    /// Open a document on the server and register its whole tree
    pub async fn open_file(&self, path: &str) -> SessionResult<Design> {
        if path.trim().is_empty() {
            return Err(SessionError::InvalidParameter("file path is empty".into()));
        }
        let request = Request::OpenFile {
            path: path.to_string(),
        };
        let proxy = self.inner.translator.open_design(request).await?;
        Ok(Design::new(self.clone(), proxy))
    }

    /// Close a design; returns how many local entities were invalidated
    pub async fn close_design(&self, design: &EntityId) -> SessionResult<usize> {
        self.inner.translator.close_design(design).await
    }

    /// Live designs of this session
    pub fn designs(&self) -> Vec<Design> {
        self.inner
            .translator
            .designs()
            .iter()
            .filter_map(|id| self.inner.translator.resolve(id))
            .map(|proxy| Design::new(self.clone(), proxy))
            .collect()
    }

    // ============== Identity ==============

    /// Look up a live entity; None for unknown or deleted ids
    pub fn resolve(&self, id: &EntityId) -> Option<Proxy> {
        self.inner.translator.resolve(id)
    }

    /// Typed handle for a live entity
    pub fn entity(&self, id: &EntityId) -> Option<Entity> {
        self.resolve(id)
            .map(|proxy| Entity::from_proxy(self.clone(), proxy))
    }

    /// Live children known locally
    pub fn children(&self, id: &EntityId) -> Vec<Proxy> {
        self.inner.translator.children(id)
    }

    pub fn revision(&self, design: &EntityId) -> Option<u64> {
        self.inner.translator.revision(design)
    }

    /// Number of live entities across all designs
    pub fn live_count(&self) -> usize {
        self.inner.translator.live_count()
    }

    // ============== Operations ==============

    pub async fn execute(&self, op: &Operation) -> SessionResult<MutationOutcome> {
        self.inner.translator.execute(op, None).await
    }

    /// Execute with a cancellation token
    ///
    /// A cancelled operation may still have happened on the server; its
    /// operands are resynchronized before they are used again.
    pub async fn execute_cancellable(
        &self,
        op: &Operation,
        cancel: &CancellationToken,
    ) -> SessionResult<MutationOutcome> {
        self.inner.translator.execute(op, Some(cancel)).await
    }

    pub async fn query(&self, query: &Query) -> SessionResult<QueryOutput> {
        self.inner.translator.query(query, None).await
    }

    pub async fn query_cancellable(
        &self,
        query: &Query,
        cancel: &CancellationToken,
    ) -> SessionResult<QueryOutput> {
        self.inner.translator.query(query, Some(cancel)).await
    }

    /// Derived data, memoized per design revision
    pub async fn derived(&self, id: &EntityId, kind: DerivedKind) -> SessionResult<DerivedValue> {
        self.inner.translator.derived(id, kind, None).await
    }

    /// Shortest distance between two entities
    pub async fn min_distance(&self, a: &EntityId, b: &EntityId) -> SessionResult<Gap> {
        let query = Query::MinDistance {
            a: a.clone(),
            b: b.clone(),
        };
        match self.query(&query).await? {
            QueryOutput::Gap(gap) => Ok(gap),
            _ => Err(SessionError::ProtocolError(
                "distance query returned no distance".into(),
            )),
        }
    }

    /// Resynchronize entities left uncertain by interrupted calls
    pub async fn resynchronize(&self) -> SessionResult<usize> {
        self.inner.translator.resynchronize().await
    }

    /// Whether the entity awaits resynchronization
    pub fn is_pending(&self, id: &EntityId) -> bool {
        self.inner.translator.is_pending(id)
    }

    // ============== Introspection ==============

    /// Snapshot of the acknowledged operations so far
    pub fn journal(&self) -> Journal {
        self.inner.translator.journal()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.translator.cache_stats()
    }

    /// Whether any cached value exists for the entity
    pub fn is_cached(&self, id: &EntityId, kind: DerivedKind) -> bool {
        self.inner.translator.is_cached(id, kind)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("target", &self.inner.config.target.address())
            .finish()
    }
}
