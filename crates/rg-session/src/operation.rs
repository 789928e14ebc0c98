//! Typed Operations
//!
//! The closed set of mutating operations and pure queries a session can send.
//! Constructors check units, dimensions and parameter ranges, so an
//! `Operation` or `Query` that exists is already valid locally; converting it
//! to a request only rescales its quantities to the server's unit system.

use std::fmt;

use glam::DVec3;
use rg_proto::{AxisData, BooleanType, EntityId, ExtrudeDirection, MidSurfaceOffsetType, Request};
use rg_units::{Angle, Dimension, Distance, Quantity, UnitSystem};

use crate::derived::DerivedKind;
use crate::error::{SessionError, SessionResult};
use crate::sketch::{Sketch, SketchError};

/// An axis in model space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axis {
    /// Origin in meters
    origin: DVec3,
    direction: DVec3,
}

impl Axis {
    /// Create an axis through `origin` along `direction`
    pub fn new(origin: [Distance; 3], direction: DVec3) -> SessionResult<Self> {
        let direction = direction.try_normalize().ok_or_else(|| {
            SessionError::InvalidParameter("axis direction has zero length".into())
        })?;
        Ok(Self {
            origin: DVec3::new(
                origin[0].as_meters(),
                origin[1].as_meters(),
                origin[2].as_meters(),
            ),
            direction,
        })
    }

    /// World X axis
    pub fn x() -> Self {
        Self {
            origin: DVec3::ZERO,
            direction: DVec3::X,
        }
    }

    /// World Y axis
    pub fn y() -> Self {
        Self {
            origin: DVec3::ZERO,
            direction: DVec3::Y,
        }
    }

    /// World Z axis
    pub fn z() -> Self {
        Self {
            origin: DVec3::ZERO,
            direction: DVec3::Z,
        }
    }

    pub fn direction(&self) -> DVec3 {
        self.direction
    }

    fn to_wire(&self, units: &UnitSystem) -> SessionResult<AxisData> {
        let origin = DVec3::new(
            units.canonical_as(Distance::meters(self.origin.x).quantity(), Dimension::Length)?,
            units.canonical_as(Distance::meters(self.origin.y).quantity(), Dimension::Length)?,
            units.canonical_as(Distance::meters(self.origin.z).quantity(), Dimension::Length)?,
        );
        Ok(AxisData::new(origin, self.direction))
    }
}

/// Shortest distance between two entities
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gap {
    pub distance: Distance,
}

impl fmt::Display for Gap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gap of {}", self.distance)
    }
}

fn to_distance(value: impl Into<Quantity>) -> SessionResult<Distance> {
    Ok(Distance::new(value.into())?)
}

fn to_angle(value: impl Into<Quantity>) -> SessionResult<Angle> {
    Ok(Angle::new(value.into())?)
}

fn positive(what: &str, value: Distance) -> SessionResult<Distance> {
    if value.is_positive() {
        Ok(value)
    } else {
        Err(SessionError::InvalidParameter(format!(
            "{what} must be positive, got {value}"
        )))
    }
}

fn non_empty(what: &str, ids: &[EntityId]) -> SessionResult<()> {
    if ids.is_empty() {
        Err(SessionError::InvalidParameter(format!("{what} is empty")))
    } else {
        Ok(())
    }
}

fn drawn(sketch: Sketch) -> SessionResult<Sketch> {
    if sketch.is_empty() {
        Err(SketchError::Empty.into())
    } else {
        Ok(sketch)
    }
}

/// A mutating operation
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    CreateComponent {
        parent: EntityId,
        name: String,
    },
    ExtrudeSketch {
        parent: EntityId,
        name: String,
        sketch: Sketch,
        distance: Distance,
        direction: ExtrudeDirection,
    },
    RevolveSketch {
        parent: EntityId,
        name: String,
        sketch: Sketch,
        axis: Axis,
        angle: Angle,
    },
    /// Planar surface body bounded by a sketch
    CreateSurface {
        parent: EntityId,
        name: String,
        sketch: Sketch,
    },
    Boolean {
        target: EntityId,
        tools: Vec<EntityId>,
        op: BooleanType,
        keep_tools: bool,
    },
    Translate {
        ids: Vec<EntityId>,
        direction: DVec3,
        distance: Distance,
    },
    Rotate {
        ids: Vec<EntityId>,
        axis: Axis,
        angle: Angle,
    },
    Fillet {
        body: EntityId,
        edges: Vec<EntityId>,
        radius: Distance,
    },
    Chamfer {
        body: EntityId,
        edges: Vec<EntityId>,
        distance: Distance,
    },
    CopyBody {
        body: EntityId,
        parent: EntityId,
        name: String,
    },
    Delete {
        id: EntityId,
    },
    Rename {
        id: EntityId,
        name: String,
    },
    AssignMaterial {
        body: EntityId,
        material: String,
    },
    ImprintCurves {
        body: EntityId,
        faces: Vec<EntityId>,
        sketch: Sketch,
    },
    ProjectCurves {
        body: EntityId,
        sketch: Sketch,
        direction: DVec3,
        closest_face: bool,
    },
    /// Only surface bodies take a mid-surface thickness or offset
    AssignMidSurfaceThickness {
        bodies: Vec<EntityId>,
        thickness: Distance,
    },
    AssignMidSurfaceOffset {
        bodies: Vec<EntityId>,
        offset: MidSurfaceOffsetType,
    },
}

impl Operation {
    pub fn create_component(parent: &EntityId, name: impl Into<String>) -> Self {
        Operation::CreateComponent {
            parent: parent.clone(),
            name: name.into(),
        }
    }

    /// Extrude a sketch into a new body under `parent`
    pub fn extrude(
        parent: &EntityId,
        name: impl Into<String>,
        sketch: Sketch,
        distance: impl Into<Quantity>,
        direction: ExtrudeDirection,
    ) -> SessionResult<Self> {
        Ok(Operation::ExtrudeSketch {
            parent: parent.clone(),
            name: name.into(),
            sketch: drawn(sketch)?,
            distance: positive("extrude distance", to_distance(distance)?)?,
            direction,
        })
    }

    /// Revolve a sketch around an axis into a new body under `parent`
    pub fn revolve(
        parent: &EntityId,
        name: impl Into<String>,
        sketch: Sketch,
        axis: Axis,
        angle: impl Into<Quantity>,
    ) -> SessionResult<Self> {
        let angle = to_angle(angle)?;
        if angle.as_radians() == 0.0 {
            return Err(SessionError::InvalidParameter(
                "revolve angle must not be zero".into(),
            ));
        }
        Ok(Operation::RevolveSketch {
            parent: parent.clone(),
            name: name.into(),
            sketch: drawn(sketch)?,
            axis,
            angle,
        })
    }

    pub fn create_surface(
        parent: &EntityId,
        name: impl Into<String>,
        sketch: Sketch,
    ) -> SessionResult<Self> {
        Ok(Operation::CreateSurface {
            parent: parent.clone(),
            name: name.into(),
            sketch: drawn(sketch)?,
        })
    }

    pub fn boolean(
        target: &EntityId,
        tools: Vec<EntityId>,
        op: BooleanType,
        keep_tools: bool,
    ) -> SessionResult<Self> {
        non_empty("boolean tool list", &tools)?;
        if tools.contains(target) {
            return Err(SessionError::InvalidParameter(format!(
                "boolean target {target} is also a tool"
            )));
        }
        Ok(Operation::Boolean {
            target: target.clone(),
            tools,
            op,
            keep_tools,
        })
    }

    pub fn translate(
        ids: Vec<EntityId>,
        direction: DVec3,
        distance: impl Into<Quantity>,
    ) -> SessionResult<Self> {
        non_empty("translate id list", &ids)?;
        let direction = direction.try_normalize().ok_or_else(|| {
            SessionError::InvalidParameter("translate direction has zero length".into())
        })?;
        Ok(Operation::Translate {
            ids,
            direction,
            distance: to_distance(distance)?,
        })
    }

    pub fn rotate(ids: Vec<EntityId>, axis: Axis, angle: impl Into<Quantity>) -> SessionResult<Self> {
        non_empty("rotate id list", &ids)?;
        Ok(Operation::Rotate {
            ids,
            axis,
            angle: to_angle(angle)?,
        })
    }

    pub fn fillet(
        body: &EntityId,
        edges: Vec<EntityId>,
        radius: impl Into<Quantity>,
    ) -> SessionResult<Self> {
        non_empty("fillet edge list", &edges)?;
        Ok(Operation::Fillet {
            body: body.clone(),
            edges,
            radius: positive("fillet radius", to_distance(radius)?)?,
        })
    }

    pub fn chamfer(
        body: &EntityId,
        edges: Vec<EntityId>,
        distance: impl Into<Quantity>,
    ) -> SessionResult<Self> {
        non_empty("chamfer edge list", &edges)?;
        Ok(Operation::Chamfer {
            body: body.clone(),
            edges,
            distance: positive("chamfer distance", to_distance(distance)?)?,
        })
    }

    pub fn copy_body(body: &EntityId, parent: &EntityId, name: impl Into<String>) -> Self {
        Operation::CopyBody {
            body: body.clone(),
            parent: parent.clone(),
            name: name.into(),
        }
    }

    pub fn delete(id: &EntityId) -> Self {
        Operation::Delete { id: id.clone() }
    }

    pub fn rename(id: &EntityId, name: impl Into<String>) -> Self {
        Operation::Rename {
            id: id.clone(),
            name: name.into(),
        }
    }

    pub fn assign_material(body: &EntityId, material: impl Into<String>) -> SessionResult<Self> {
        let material = material.into();
        if material.trim().is_empty() {
            return Err(SessionError::InvalidParameter(
                "material name is empty".into(),
            ));
        }
        Ok(Operation::AssignMaterial {
            body: body.clone(),
            material,
        })
    }

    pub fn imprint_curves(
        body: &EntityId,
        faces: Vec<EntityId>,
        sketch: Sketch,
    ) -> SessionResult<Self> {
        non_empty("imprint face list", &faces)?;
        Ok(Operation::ImprintCurves {
            body: body.clone(),
            faces,
            sketch: drawn(sketch)?,
        })
    }

    pub fn project_curves(
        body: &EntityId,
        sketch: Sketch,
        direction: DVec3,
        closest_face: bool,
    ) -> SessionResult<Self> {
        let direction = direction.try_normalize().ok_or_else(|| {
            SessionError::InvalidParameter("projection direction has zero length".into())
        })?;
        Ok(Operation::ProjectCurves {
            body: body.clone(),
            sketch: drawn(sketch)?,
            direction,
            closest_face,
        })
    }

    pub fn midsurface_thickness(
        bodies: Vec<EntityId>,
        thickness: impl Into<Quantity>,
    ) -> SessionResult<Self> {
        non_empty("mid-surface body list", &bodies)?;
        Ok(Operation::AssignMidSurfaceThickness {
            bodies,
            thickness: positive("mid-surface thickness", to_distance(thickness)?)?,
        })
    }

    pub fn midsurface_offset(
        bodies: Vec<EntityId>,
        offset: MidSurfaceOffsetType,
    ) -> SessionResult<Self> {
        non_empty("mid-surface body list", &bodies)?;
        Ok(Operation::AssignMidSurfaceOffset { bodies, offset })
    }

    /// Get the type name of this operation
    pub fn type_name(&self) -> &'static str {
        match self {
            Operation::CreateComponent { .. } => "CreateComponent",
            Operation::ExtrudeSketch { .. } => "ExtrudeSketch",
            Operation::RevolveSketch { .. } => "RevolveSketch",
            Operation::CreateSurface { .. } => "CreateSurface",
            Operation::Boolean { .. } => "Boolean",
            Operation::Translate { .. } => "Translate",
            Operation::Rotate { .. } => "Rotate",
            Operation::Fillet { .. } => "Fillet",
            Operation::Chamfer { .. } => "Chamfer",
            Operation::CopyBody { .. } => "CopyBody",
            Operation::Delete { .. } => "Delete",
            Operation::Rename { .. } => "Rename",
            Operation::AssignMaterial { .. } => "AssignMaterial",
            Operation::ImprintCurves { .. } => "ImprintCurves",
            Operation::ProjectCurves { .. } => "ProjectCurves",
            Operation::AssignMidSurfaceThickness { .. } => "AssignMidSurfaceThickness",
            Operation::AssignMidSurfaceOffset { .. } => "AssignMidSurfaceOffset",
        }
    }

    /// Entity ids the operation refers to; all must resolve before sending
    pub fn operands(&self) -> Vec<&EntityId> {
        match self {
            Operation::CreateComponent { parent, .. }
            | Operation::ExtrudeSketch { parent, .. }
            | Operation::RevolveSketch { parent, .. }
            | Operation::CreateSurface { parent, .. } => vec![parent],
            Operation::Boolean { target, tools, .. } => {
                std::iter::once(target).chain(tools.iter()).collect()
            }
            Operation::Translate { ids, .. } | Operation::Rotate { ids, .. } => ids.iter().collect(),
            Operation::Fillet { body, edges, .. } | Operation::Chamfer { body, edges, .. } => {
                std::iter::once(body).chain(edges.iter()).collect()
            }
            Operation::CopyBody { body, parent, .. } => vec![body, parent],
            Operation::Delete { id } | Operation::Rename { id, .. } => vec![id],
            Operation::AssignMaterial { body, .. } | Operation::ProjectCurves { body, .. } => {
                vec![body]
            }
            Operation::ImprintCurves { body, faces, .. } => {
                std::iter::once(body).chain(faces.iter()).collect()
            }
            Operation::AssignMidSurfaceThickness { bodies, .. }
            | Operation::AssignMidSurfaceOffset { bodies, .. } => bodies.iter().collect(),
        }
    }

    /// Build the wire request in the server's unit system
    pub fn to_request(&self, units: &UnitSystem) -> SessionResult<Request> {
        let length = |d: &Distance| units.canonical_as(d.quantity(), Dimension::Length);
        let angle = |a: &Angle| units.canonical_as(a.quantity(), Dimension::Angle);

        Ok(match self {
            Operation::CreateComponent { parent, name } => Request::CreateComponent {
                parent: parent.clone(),
                name: name.clone(),
            },
            Operation::ExtrudeSketch {
                parent,
                name,
                sketch,
                distance,
                direction,
            } => Request::ExtrudeSketch {
                parent: parent.clone(),
                name: name.clone(),
                profile: sketch.to_profile(units)?,
                distance: length(distance)?,
                direction: *direction,
            },
            Operation::RevolveSketch {
                parent,
                name,
                sketch,
                axis,
                angle: a,
            } => Request::RevolveSketch {
                parent: parent.clone(),
                name: name.clone(),
                profile: sketch.to_profile(units)?,
                axis: axis.to_wire(units)?,
                angle: angle(a)?,
            },
            Operation::CreateSurface {
                parent,
                name,
                sketch,
            } => Request::CreateSurface {
                parent: parent.clone(),
                name: name.clone(),
                profile: sketch.to_profile(units)?,
            },
            Operation::Boolean {
                target,
                tools,
                op,
                keep_tools,
            } => Request::Boolean {
                target: target.clone(),
                tools: tools.clone(),
                op: *op,
                keep_tools: *keep_tools,
            },
            Operation::Translate {
                ids,
                direction,
                distance,
            } => Request::Translate {
                ids: ids.clone(),
                direction: *direction,
                distance: length(distance)?,
            },
            Operation::Rotate { ids, axis, angle: a } => Request::Rotate {
                ids: ids.clone(),
                axis: axis.to_wire(units)?,
                angle: angle(a)?,
            },
            Operation::Fillet {
                body,
                edges,
                radius,
            } => Request::Fillet {
                body: body.clone(),
                edges: edges.clone(),
                radius: length(radius)?,
            },
            Operation::Chamfer {
                body,
                edges,
                distance,
            } => Request::Chamfer {
                body: body.clone(),
                edges: edges.clone(),
                distance: length(distance)?,
            },
            Operation::CopyBody { body, parent, name } => Request::CopyBody {
                body: body.clone(),
                parent: parent.clone(),
                name: name.clone(),
            },
            Operation::Delete { id } => Request::Delete { id: id.clone() },
            Operation::Rename { id, name } => Request::Rename {
                id: id.clone(),
                name: name.clone(),
            },
            Operation::AssignMaterial { body, material } => Request::AssignMaterial {
                body: body.clone(),
                material: material.clone(),
            },
            Operation::ImprintCurves {
                body,
                faces,
                sketch,
            } => Request::ImprintCurves {
                body: body.clone(),
                faces: faces.clone(),
                profile: sketch.to_profile(units)?,
            },
            Operation::ProjectCurves {
                body,
                sketch,
                direction,
                closest_face,
            } => Request::ProjectCurves {
                body: body.clone(),
                profile: sketch.to_profile(units)?,
                direction: *direction,
                closest_face: *closest_face,
            },
            Operation::AssignMidSurfaceThickness { bodies, thickness } => {
                Request::AssignMidSurfaceThickness {
                    bodies: bodies.clone(),
                    thickness: length(thickness)?,
                }
            }
            Operation::AssignMidSurfaceOffset { bodies, offset } => {
                Request::AssignMidSurfaceOffset {
                    bodies: bodies.clone(),
                    offset: *offset,
                }
            }
        })
    }
}

/// A pure query
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Tessellate {
        id: EntityId,
        /// Chordal tolerance; the session default when None
        tolerance: Option<Distance>,
    },
    BoundingBox {
        id: EntityId,
    },
    MassProperties {
        body: EntityId,
    },
    Volume {
        body: EntityId,
    },
    Area {
        face: EntityId,
    },
    Length {
        edge: EntityId,
    },
    Position {
        vertex: EntityId,
    },
    MidSurface {
        body: EntityId,
    },
    Faces {
        body: EntityId,
    },
    Edges {
        id: EntityId,
    },
    Vertices {
        id: EntityId,
    },
    Children {
        id: EntityId,
    },
    Describe {
        id: EntityId,
    },
    MinDistance {
        a: EntityId,
        b: EntityId,
    },
}

impl Query {
    /// The query that computes a kind of derived data for an entity
    pub fn for_kind(id: &EntityId, kind: DerivedKind) -> Self {
        let id = id.clone();
        match kind {
            DerivedKind::Mesh => Query::Tessellate {
                id,
                tolerance: None,
            },
            DerivedKind::BoundingBox => Query::BoundingBox { id },
            DerivedKind::MassProperties => Query::MassProperties { body: id },
            DerivedKind::Volume => Query::Volume { body: id },
            DerivedKind::Area => Query::Area { face: id },
            DerivedKind::Length => Query::Length { edge: id },
            DerivedKind::Position => Query::Position { vertex: id },
            DerivedKind::MidSurface => Query::MidSurface { body: id },
        }
    }

    /// Kind of derived data this query yields, if it is cacheable
    ///
    /// Tessellations at a non-default tolerance are not cached.
    pub fn derived_kind(&self) -> Option<DerivedKind> {
        match self {
            Query::Tessellate {
                tolerance: None, ..
            } => Some(DerivedKind::Mesh),
            Query::BoundingBox { .. } => Some(DerivedKind::BoundingBox),
            Query::MassProperties { .. } => Some(DerivedKind::MassProperties),
            Query::Volume { .. } => Some(DerivedKind::Volume),
            Query::Area { .. } => Some(DerivedKind::Area),
            Query::Length { .. } => Some(DerivedKind::Length),
            Query::Position { .. } => Some(DerivedKind::Position),
            Query::MidSurface { .. } => Some(DerivedKind::MidSurface),
            _ => None,
        }
    }

    /// Get the type name of this query
    pub fn type_name(&self) -> &'static str {
        match self {
            Query::Tessellate { .. } => "Tessellate",
            Query::BoundingBox { .. } => "BoundingBox",
            Query::MassProperties { .. } => "MassProperties",
            Query::Volume { .. } => "Volume",
            Query::Area { .. } => "Area",
            Query::Length { .. } => "Length",
            Query::Position { .. } => "Position",
            Query::MidSurface { .. } => "MidSurface",
            Query::Faces { .. } => "Faces",
            Query::Edges { .. } => "Edges",
            Query::Vertices { .. } => "Vertices",
            Query::Children { .. } => "Children",
            Query::Describe { .. } => "Describe",
            Query::MinDistance { .. } => "MinDistance",
        }
    }

    /// Entity ids the query refers to
    pub fn operands(&self) -> Vec<&EntityId> {
        match self {
            Query::Tessellate { id, .. }
            | Query::BoundingBox { id }
            | Query::Edges { id }
            | Query::Vertices { id }
            | Query::Children { id }
            | Query::Describe { id } => vec![id],
            Query::MassProperties { body }
            | Query::Volume { body }
            | Query::MidSurface { body }
            | Query::Faces { body } => vec![body],
            Query::Area { face } => vec![face],
            Query::Length { edge } => vec![edge],
            Query::Position { vertex } => vec![vertex],
            Query::MinDistance { a, b } => vec![a, b],
        }
    }

    /// Build the wire request; `default_tolerance` applies to tessellations
    /// without an explicit tolerance
    pub fn to_request(
        &self,
        units: &UnitSystem,
        default_tolerance: Quantity,
    ) -> SessionResult<Request> {
        Ok(match self {
            Query::Tessellate { id, tolerance } => {
                let tolerance = tolerance.map(Quantity::from).unwrap_or(default_tolerance);
                let tolerance = units.canonical_as(tolerance, Dimension::Length)?;
                if tolerance <= 0.0 {
                    return Err(SessionError::InvalidParameter(
                        "tessellation tolerance must be positive".into(),
                    ));
                }
                Request::GetTessellation {
                    id: id.clone(),
                    tolerance,
                }
            }
            Query::BoundingBox { id } => Request::GetBoundingBox { id: id.clone() },
            Query::MassProperties { body } => Request::GetMassProperties { body: body.clone() },
            Query::Volume { body } => Request::GetVolume { body: body.clone() },
            Query::Area { face } => Request::GetArea { face: face.clone() },
            Query::Length { edge } => Request::GetLength { edge: edge.clone() },
            Query::Position { vertex } => Request::GetPosition {
                vertex: vertex.clone(),
            },
            Query::MidSurface { body } => Request::GetMidSurface { body: body.clone() },
            Query::Faces { body } => Request::GetFaces { body: body.clone() },
            Query::Edges { id } => Request::GetEdges { id: id.clone() },
            Query::Vertices { id } => Request::GetVertices { id: id.clone() },
            Query::Children { id } => Request::GetChildren { id: id.clone() },
            Query::Describe { id } => Request::Describe { id: id.clone() },
            Query::MinDistance { a, b } => Request::MinDistance {
                a: a.clone(),
                b: b.clone(),
            },
        })
    }
}
