//! Body handle

use async_trait::async_trait;
use glam::DVec3;
use rg_proto::{BooleanType, EntityKind, MidSurfaceOffsetType};
use rg_units::{Dimension, Distance, Quantity};

use super::{
    Container, Edge, Face, Handle, Measurable, Named, Tessellable, Transformable, created, handle,
    listed,
};
use crate::derived::{DerivedKind, MassProperties, MidSurface};
use crate::error::{SessionError, SessionResult};
use crate::operation::{Operation, Query};
use crate::sketch::Sketch;
use crate::translator::MutationOutcome;

handle!(
    /// A solid or surface body
    Body
);

impl Body {
    /// Solid/surface tag reported by the server
    pub fn body_type(&self) -> Option<String> {
        self.session
            .resolve(self.id())
            .and_then(|proxy| proxy.type_tag().map(str::to_string))
    }

    /// Whether the server reports this body as a surface
    pub fn is_surface(&self) -> bool {
        self.session
            .resolve(self.id())
            .is_some_and(|proxy| proxy.is_surface())
    }

    /// Volume; a surface body has none and is not asked for one
    pub async fn volume(&self) -> SessionResult<Quantity> {
        if self.is_surface() {
            return Ok(self.session.config().units.tag(0.0, Dimension::Volume));
        }
        let value = self.session.derived(self.id(), DerivedKind::Volume).await?;
        value.as_quantity().ok_or_else(|| {
            SessionError::ProtocolError(format!("expected volume, got {}", value.kind_name()))
        })
    }

    pub async fn mass_properties(&self) -> SessionResult<MassProperties> {
        let value = self
            .session
            .derived(self.id(), DerivedKind::MassProperties)
            .await?;
        value.as_mass_properties().ok_or_else(|| {
            SessionError::ProtocolError(format!(
                "expected mass properties, got {}",
                value.kind_name()
            ))
        })
    }

    async fn mid_surface(&self) -> SessionResult<MidSurface> {
        let value = self
            .session
            .derived(self.id(), DerivedKind::MidSurface)
            .await?;
        value.as_mid_surface().ok_or_else(|| {
            SessionError::ProtocolError(format!(
                "expected mid-surface data, got {}",
                value.kind_name()
            ))
        })
    }

    /// Assigned mid-surface thickness; None for solids
    pub async fn surface_thickness(&self) -> SessionResult<Option<Distance>> {
        if !self.is_surface() {
            return Ok(None);
        }
        Ok(self.mid_surface().await?.thickness)
    }

    /// Assigned mid-surface offset; None for solids
    pub async fn surface_offset(&self) -> SessionResult<Option<MidSurfaceOffsetType>> {
        if !self.is_surface() {
            return Ok(None);
        }
        Ok(self.mid_surface().await?.offset)
    }

    pub async fn add_midsurface_thickness(&self, thickness: Distance) -> SessionResult<MutationOutcome> {
        let op = Operation::midsurface_thickness(vec![self.id().clone()], thickness)?;
        self.session.execute(&op).await
    }

    pub async fn add_midsurface_offset(
        &self,
        offset: MidSurfaceOffsetType,
    ) -> SessionResult<MutationOutcome> {
        let op = Operation::midsurface_offset(vec![self.id().clone()], offset)?;
        self.session.execute(&op).await
    }

    pub async fn faces(&self) -> SessionResult<Vec<Face>> {
        let query = Query::Faces {
            body: self.id().clone(),
        };
        listed(self.session.query(&query).await?, &self.session, Face::new)
    }

    pub async fn edges(&self) -> SessionResult<Vec<Edge>> {
        let query = Query::Edges {
            id: self.id().clone(),
        };
        listed(self.session.query(&query).await?, &self.session, Edge::new)
    }

    /// Copy the body into a container
    pub async fn copy(&self, parent: &(impl Container + ?Sized), name: &str) -> SessionResult<Body> {
        let op = Operation::copy_body(self.id(), parent.id(), name);
        let outcome = self.session.execute(&op).await?;
        Ok(Body::new(
            self.session.clone(),
            created(&outcome, EntityKind::Body)?,
        ))
    }

    pub async fn assign_material(&self, material: &str) -> SessionResult<MutationOutcome> {
        let op = Operation::assign_material(self.id(), material)?;
        self.session.execute(&op).await
    }

    /// Imprint sketch curves onto faces of this body
    pub async fn imprint_curves(&self, faces: &[Face], sketch: Sketch) -> SessionResult<MutationOutcome> {
        let faces = faces.iter().map(|face| face.id().clone()).collect();
        let op = Operation::imprint_curves(self.id(), faces, sketch)?;
        self.session.execute(&op).await
    }

    /// Project sketch curves onto this body along a direction
    pub async fn project_curves(
        &self,
        sketch: Sketch,
        direction: DVec3,
        closest_face: bool,
    ) -> SessionResult<MutationOutcome> {
        let op = Operation::project_curves(self.id(), sketch, direction, closest_face)?;
        self.session.execute(&op).await
    }

    pub async fn union(&self, tools: &[Body], keep_tools: bool) -> SessionResult<Body> {
        self.boolean(tools, BooleanType::Union, keep_tools).await
    }

    pub async fn subtract(&self, tools: &[Body], keep_tools: bool) -> SessionResult<Body> {
        self.boolean(tools, BooleanType::Subtract, keep_tools).await
    }

    pub async fn intersect(&self, tools: &[Body], keep_tools: bool) -> SessionResult<Body> {
        self.boolean(tools, BooleanType::Intersect, keep_tools).await
    }

    /// Run a boolean and return the resulting body
    ///
    /// The result is a new body when the server created one, otherwise this
    /// body modified in place.
    async fn boolean(&self, tools: &[Body], op: BooleanType, keep_tools: bool) -> SessionResult<Body> {
        let tools = tools.iter().map(|tool| tool.id().clone()).collect();
        let op = Operation::boolean(self.id(), tools, op, keep_tools)?;
        let outcome = self.session.execute(&op).await?;
        match outcome.first_created(EntityKind::Body) {
            Some(proxy) => Ok(Body::new(self.session.clone(), proxy.clone())),
            None => match self.session.resolve(self.id()) {
                Some(proxy) => Ok(Body::new(self.session.clone(), proxy)),
                None => Err(SessionError::ProtocolError(format!(
                    "{} left no result body",
                    outcome.operation
                ))),
            },
        }
    }

    pub async fn fillet(&self, edges: &[Edge], radius: Distance) -> SessionResult<MutationOutcome> {
        let edges = edges.iter().map(|edge| edge.id().clone()).collect();
        let op = Operation::fillet(self.id(), edges, radius)?;
        self.session.execute(&op).await
    }

    pub async fn chamfer(&self, edges: &[Edge], distance: Distance) -> SessionResult<MutationOutcome> {
        let edges = edges.iter().map(|edge| edge.id().clone()).collect();
        let op = Operation::chamfer(self.id(), edges, distance)?;
        self.session.execute(&op).await
    }

    pub async fn delete(&self) -> SessionResult<MutationOutcome> {
        self.session.execute(&Operation::delete(self.id())).await
    }
}

#[async_trait]
impl Named for Body {}

#[async_trait]
impl Transformable for Body {}

#[async_trait]
impl Measurable for Body {}

#[async_trait]
impl Tessellable for Body {}
