//! Remote Geometry Session and Object-Graph Synchronization
//!
//! This crate provides:
//! - A resilient channel to a remote geometry server (health checks,
//!   reconnection with backoff, ordered delivery, timeouts, cancellation)
//! - An identity registry mapping server-issued ids to live proxies
//! - A command translator folding acknowledged operations into a local mirror
//! - A derived-data cache keyed by per-design revision
//! - A typed object graph (designs, components, bodies, faces, edges,
//!   vertices) with capability traits
//! - Sketch construction in explicit units

pub mod cache;
pub mod channel;
pub mod config;
pub mod derived;
pub mod error;
pub mod graph;
pub mod journal;
pub mod operation;
pub mod registry;
pub mod session;
pub mod sketch;
pub mod translator;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use cache::{CacheStats, DerivedCache};
pub use channel::{Channel, ChannelState, ChannelStats, Connector, TcpConnector, Transport, TransportError};
pub use config::{ConfigError, ConnectionTarget, RetryPolicy, SessionConfig};
pub use derived::{BoundingBox, DerivedKind, DerivedValue, MassProperties, Mesh, MidSurface, Point3D};
pub use error::{SessionError, SessionResult};
pub use graph::{
    Body, Component, Container, Design, Edge, Entity, Face, Handle, Measurable, Named, Tessellable,
    Transformable, Vertex,
};
pub use journal::{Journal, JournalEntry};
pub use operation::{Axis, Gap, Operation, Query};
pub use registry::{Proxy, Registry};
pub use session::Session;
pub use sketch::{DummyGear, Gear, Plane, Point2D, Sketch, SketchCurve, SketchError, SpurGear};
pub use translator::{MutationOutcome, QueryOutput};

pub use rg_proto::{BooleanType, EntityId, EntityKind, ExtrudeDirection, MidSurfaceOffsetType};
pub use rg_units::{Angle, Dimension, Distance, Quantity, Unit, UnitSystem};
