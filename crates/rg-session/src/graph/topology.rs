//! Face, edge and vertex handles
//!
//! Topology is discovered through queries and registered on first sight;
//! it is never created directly.

use async_trait::async_trait;
use rg_units::Quantity;

use super::{Handle, Measurable, Tessellable, handle, listed};
use crate::derived::{DerivedKind, Point3D};
use crate::error::{SessionError, SessionResult};
use crate::operation::Query;

handle!(
    /// A bounded surface of a body
    Face
);

handle!(
    /// A bounded curve of a body
    Edge
);

handle!(
    /// A topological point of a body
    Vertex
);

/// Type tag of a live entity
fn type_tag(handle: &impl Handle) -> Option<String> {
    handle
        .session()
        .resolve(handle.id())
        .and_then(|proxy| proxy.type_tag().map(str::to_string))
}

impl Face {
    pub async fn area(&self) -> SessionResult<Quantity> {
        let value = self.session.derived(self.id(), DerivedKind::Area).await?;
        value.as_quantity().ok_or_else(|| {
            SessionError::ProtocolError(format!("expected area, got {}", value.kind_name()))
        })
    }

    /// Surface type reported by the server (plane, cylinder, ...)
    pub fn surface_type(&self) -> Option<String> {
        type_tag(self)
    }

    pub async fn edges(&self) -> SessionResult<Vec<Edge>> {
        let query = Query::Edges {
            id: self.id().clone(),
        };
        listed(self.session.query(&query).await?, &self.session, Edge::new)
    }
}

impl Edge {
    pub async fn length(&self) -> SessionResult<Quantity> {
        let value = self.session.derived(self.id(), DerivedKind::Length).await?;
        value.as_quantity().ok_or_else(|| {
            SessionError::ProtocolError(format!("expected length, got {}", value.kind_name()))
        })
    }

    /// Curve type reported by the server (line, circle, ...)
    pub fn curve_type(&self) -> Option<String> {
        type_tag(self)
    }

    pub async fn vertices(&self) -> SessionResult<Vec<Vertex>> {
        let query = Query::Vertices {
            id: self.id().clone(),
        };
        listed(self.session.query(&query).await?, &self.session, Vertex::new)
    }
}

impl Vertex {
    pub async fn position(&self) -> SessionResult<Point3D> {
        let value = self.session.derived(self.id(), DerivedKind::Position).await?;
        value.as_position().ok_or_else(|| {
            SessionError::ProtocolError(format!("expected position, got {}", value.kind_name()))
        })
    }
}

#[async_trait]
impl Measurable for Face {}

#[async_trait]
impl Tessellable for Face {}

#[async_trait]
impl Measurable for Edge {}

#[async_trait]
impl Measurable for Vertex {}
