//! Object Graph
//!
//! Typed handles over registry proxies. Every handle carries a clone of its
//! session; mutating methods go through the command translator and derived
//! accessors through the revision-keyed cache. Two handles are equal when
//! they refer to the same entity id.
//!
//! Capabilities by kind:
//!
//! | Kind      | Named | Transformable | Measurable | Tessellable |
//! |-----------|-------|---------------|------------|-------------|
//! | Design    | yes   |               | yes        | yes         |
//! | Component | yes   | yes           | yes        | yes         |
//! | Body      | yes   | yes           | yes        | yes         |
//! | Face      |       |               | yes        | yes         |
//! | Edge      |       |               | yes        |             |
//! | Vertex    |       |               | yes        |             |

mod body;
mod component;
mod design;
mod topology;

pub use body::Body;
pub use component::Component;
pub use design::Design;
pub use topology::{Edge, Face, Vertex};

use std::sync::Arc;

use async_trait::async_trait;
use glam::DVec3;
use rg_proto::{EntityId, EntityKind, ExtrudeDirection};
use rg_units::{Angle, Distance};

use crate::derived::{BoundingBox, DerivedKind, Mesh};
use crate::error::{SessionError, SessionResult};
use crate::operation::{Axis, Operation, Query};
use crate::registry::Proxy;
use crate::session::Session;
use crate::sketch::Sketch;
use crate::translator::{MutationOutcome, QueryOutput};

/// Common surface of every handle
pub trait Handle {
    fn proxy(&self) -> &Proxy;

    fn session(&self) -> &Session;

    fn id(&self) -> &EntityId {
        self.proxy().id()
    }

    fn kind(&self) -> EntityKind {
        self.proxy().kind()
    }

    /// Whether the entity is still live in the session
    fn is_alive(&self) -> bool {
        self.session().resolve(self.id()).is_some()
    }
}

/// Entities with a user-visible name
#[async_trait]
pub trait Named: Handle + Sync {
    /// Current name, falling back to the snapshot taken when the handle was made
    fn name(&self) -> String {
        self.session()
            .resolve(self.id())
            .map(|proxy| proxy.name().to_string())
            .unwrap_or_else(|| self.proxy().name().to_string())
    }

    async fn rename(&self, name: &str) -> SessionResult<MutationOutcome> {
        self.session()
            .execute(&Operation::rename(self.id(), name))
            .await
    }
}

/// Entities that can be moved rigidly
#[async_trait]
pub trait Transformable: Handle + Sync {
    async fn translate(&self, direction: DVec3, distance: Distance) -> SessionResult<MutationOutcome> {
        let op = Operation::translate(vec![self.id().clone()], direction, distance)?;
        self.session().execute(&op).await
    }

    async fn rotate(&self, axis: Axis, angle: Angle) -> SessionResult<MutationOutcome> {
        let op = Operation::rotate(vec![self.id().clone()], axis, angle)?;
        self.session().execute(&op).await
    }
}

/// Entities with a bounding box
#[async_trait]
pub trait Measurable: Handle + Sync {
    async fn bounding_box(&self) -> SessionResult<BoundingBox> {
        let value = self
            .session()
            .derived(self.id(), DerivedKind::BoundingBox)
            .await?;
        value
            .as_bounding_box()
            .ok_or_else(|| unexpected(DerivedKind::BoundingBox, value.kind_name()))
    }
}

/// Entities that can be tessellated for display
#[async_trait]
pub trait Tessellable: Handle + Sync {
    /// Mesh at the session's default tolerance (cached)
    async fn mesh(&self) -> SessionResult<Arc<Mesh>> {
        let value = self.session().derived(self.id(), DerivedKind::Mesh).await?;
        value
            .as_mesh()
            .cloned()
            .ok_or_else(|| unexpected(DerivedKind::Mesh, value.kind_name()))
    }

    /// Mesh at an explicit chordal tolerance (not cached)
    async fn mesh_with_tolerance(&self, tolerance: Distance) -> SessionResult<Arc<Mesh>> {
        let query = Query::Tessellate {
            id: self.id().clone(),
            tolerance: Some(tolerance),
        };
        match self.session().query(&query).await? {
            QueryOutput::Derived(value) => value
                .as_mesh()
                .cloned()
                .ok_or_else(|| unexpected(DerivedKind::Mesh, value.kind_name())),
            _ => Err(SessionError::ProtocolError(
                "tessellation returned no mesh".into(),
            )),
        }
    }
}

/// Designs and components: entities that own components and bodies
#[async_trait]
pub trait Container: Handle + Sync {
    async fn create_component(&self, name: &str) -> SessionResult<Component> {
        let op = Operation::create_component(self.id(), name);
        let outcome = self.session().execute(&op).await?;
        let proxy = created(&outcome, EntityKind::Component)?;
        Ok(Component::new(self.session().clone(), proxy))
    }

    /// Extrude a sketch into a new body
    async fn extrude(
        &self,
        name: &str,
        sketch: Sketch,
        distance: Distance,
        direction: ExtrudeDirection,
    ) -> SessionResult<Body> {
        let op = Operation::extrude(self.id(), name, sketch, distance, direction)?;
        let outcome = self.session().execute(&op).await?;
        let proxy = created(&outcome, EntityKind::Body)?;
        Ok(Body::new(self.session().clone(), proxy))
    }

    /// Revolve a sketch around an axis into a new body
    async fn revolve(
        &self,
        name: &str,
        sketch: Sketch,
        axis: Axis,
        angle: Angle,
    ) -> SessionResult<Body> {
        let op = Operation::revolve(self.id(), name, sketch, axis, angle)?;
        let outcome = self.session().execute(&op).await?;
        let proxy = created(&outcome, EntityKind::Body)?;
        Ok(Body::new(self.session().clone(), proxy))
    }

    /// Create a planar surface body bounded by a sketch
    async fn create_surface(&self, name: &str, sketch: Sketch) -> SessionResult<Body> {
        let op = Operation::create_surface(self.id(), name, sketch)?;
        let outcome = self.session().execute(&op).await?;
        let proxy = created(&outcome, EntityKind::Body)?;
        Ok(Body::new(self.session().clone(), proxy))
    }

    /// Child components known locally
    fn components(&self) -> Vec<Component> {
        self.session()
            .children(self.id())
            .into_iter()
            .filter(|proxy| proxy.kind() == EntityKind::Component)
            .map(|proxy| Component::new(self.session().clone(), proxy))
            .collect()
    }

    /// Bodies directly owned by this container, known locally
    fn bodies(&self) -> Vec<Body> {
        self.session()
            .children(self.id())
            .into_iter()
            .filter(|proxy| proxy.kind() == EntityKind::Body)
            .map(|proxy| Body::new(self.session().clone(), proxy))
            .collect()
    }

    /// Ask the server for the children and register any not yet known
    async fn refresh(&self) -> SessionResult<usize> {
        let query = Query::Children {
            id: self.id().clone(),
        };
        match self.session().query(&query).await? {
            QueryOutput::Entities(children) => Ok(children.len()),
            _ => Err(SessionError::ProtocolError(
                "child listing returned no entities".into(),
            )),
        }
    }
}

/// Any handle, by kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Entity {
    Design(Design),
    Component(Component),
    Body(Body),
    Face(Face),
    Edge(Edge),
    Vertex(Vertex),
}

impl Entity {
    /// Wrap a proxy in the handle type of its kind
    pub fn from_proxy(session: Session, proxy: Proxy) -> Self {
        match proxy.kind() {
            EntityKind::Design => Entity::Design(Design::new(session, proxy)),
            EntityKind::Component => Entity::Component(Component::new(session, proxy)),
            EntityKind::Body => Entity::Body(Body::new(session, proxy)),
            EntityKind::Face => Entity::Face(Face::new(session, proxy)),
            EntityKind::Edge => Entity::Edge(Edge::new(session, proxy)),
            EntityKind::Vertex => Entity::Vertex(Vertex::new(session, proxy)),
        }
    }

    pub fn as_handle(&self) -> &dyn Handle {
        match self {
            Entity::Design(h) => h,
            Entity::Component(h) => h,
            Entity::Body(h) => h,
            Entity::Face(h) => h,
            Entity::Edge(h) => h,
            Entity::Vertex(h) => h,
        }
    }

    pub fn id(&self) -> &EntityId {
        self.as_handle().id()
    }

    pub fn kind(&self) -> EntityKind {
        self.as_handle().kind()
    }
}

/// Pick the created entity of a kind out of a mutation outcome
pub(crate) fn created(outcome: &MutationOutcome, kind: EntityKind) -> SessionResult<Proxy> {
    outcome.first_created(kind).cloned().ok_or_else(|| {
        SessionError::ProtocolError(format!(
            "{} acknowledged without creating a {kind}",
            outcome.operation
        ))
    })
}

fn unexpected(kind: DerivedKind, got: &str) -> SessionError {
    SessionError::ProtocolError(format!("expected {kind}, got {got}"))
}

/// Wrap proxies returned by an entity listing
pub(crate) fn listed<T>(
    output: QueryOutput,
    session: &Session,
    wrap: impl Fn(Session, Proxy) -> T,
) -> SessionResult<Vec<T>> {
    match output {
        QueryOutput::Entities(proxies) => Ok(proxies
            .into_iter()
            .map(|proxy| wrap(session.clone(), proxy))
            .collect()),
        _ => Err(SessionError::ProtocolError(
            "entity listing returned no entities".into(),
        )),
    }
}

/// Defines a handle struct with identity-based equality
macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            session: $crate::session::Session,
            proxy: $crate::registry::Proxy,
        }

        impl $name {
            pub(crate) fn new(
                session: $crate::session::Session,
                proxy: $crate::registry::Proxy,
            ) -> Self {
                Self { session, proxy }
            }
        }

        impl $crate::graph::Handle for $name {
            fn proxy(&self) -> &$crate::registry::Proxy {
                &self.proxy
            }

            fn session(&self) -> &$crate::session::Session {
                &self.session
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.proxy == other.proxy
            }
        }

        impl Eq for $name {}

        impl std::hash::Hash for $name {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.proxy.hash(state);
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("id", self.proxy.id())
                    .field("name", &self.proxy.name())
                    .finish()
            }
        }
    };
}

pub(crate) use handle;
