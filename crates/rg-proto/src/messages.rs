//! Request and response messages
//!
//! Every request travels in a `RequestFrame` carrying a sequence number; the
//! server echoes that number in the matching `ResponseFrame`.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::geometry::{
    AxisData, BooleanType, BoxData, ExtrudeDirection, MassData, MeshData, MidSurfaceData,
    MidSurfaceOffsetType, SketchProfile,
};
use crate::id::{EntityId, EntityKind};

/// Protocol revision spoken by this crate
pub const PROTOCOL_VERSION: u32 = 1;

/// Snapshot of an entity as reported by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityInfo {
    pub id: EntityId,
    pub kind: EntityKind,
    /// Owning entity (None only for designs)
    pub parent: Option<EntityId>,
    pub name: String,
    /// Read-only geometric type tag (surface type, curve type, solid/surface)
    pub type_tag: Option<String>,
}

impl EntityInfo {
    pub fn new(
        id: impl Into<EntityId>,
        kind: EntityKind,
        parent: Option<EntityId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            parent,
            name: name.into(),
            type_tag: None,
        }
    }

    pub fn with_type_tag(mut self, tag: impl Into<String>) -> Self {
        self.type_tag = Some(tag.into());
        self
    }
}

/// Entities affected by an acknowledged mutating request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationResult {
    /// Entities created by the request, parents before children
    pub created: Vec<EntityInfo>,
    /// Entities whose geometry or attributes changed
    pub modified: Vec<EntityId>,
    /// Entities removed by the request
    pub deleted: Vec<EntityId>,
}

impl MutationResult {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// A request to the geometry server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    // ============== Session ==============
    HealthCheck {
        client: String,
        protocol: u32,
    },

    // ============== Documents ==============
    NewDesign {
        name: String,
    },
    OpenFile {
        path: String,
    },
    CloseDesign {
        design: EntityId,
    },

    // ============== Mutations ==============
    CreateComponent {
        parent: EntityId,
        name: String,
    },
    ExtrudeSketch {
        parent: EntityId,
        name: String,
        profile: SketchProfile,
        distance: f64,
        direction: ExtrudeDirection,
    },
    RevolveSketch {
        parent: EntityId,
        name: String,
        profile: SketchProfile,
        axis: AxisData,
        angle: f64,
    },
    /// Planar surface body bounded by the profile
    CreateSurface {
        parent: EntityId,
        name: String,
        profile: SketchProfile,
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
        distance: f64,
    },
    Rotate {
        ids: Vec<EntityId>,
        axis: AxisData,
        angle: f64,
    },
    Fillet {
        body: EntityId,
        edges: Vec<EntityId>,
        radius: f64,
    },
    Chamfer {
        body: EntityId,
        edges: Vec<EntityId>,
        distance: f64,
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
        profile: SketchProfile,
    },
    ProjectCurves {
        body: EntityId,
        profile: SketchProfile,
        direction: DVec3,
        closest_face: bool,
    },
    AssignMidSurfaceThickness {
        bodies: Vec<EntityId>,
        thickness: f64,
    },
    AssignMidSurfaceOffset {
        bodies: Vec<EntityId>,
        offset: MidSurfaceOffsetType,
    },

    // ============== Queries ==============
    Describe {
        id: EntityId,
    },
    GetChildren {
        id: EntityId,
    },
    GetFaces {
        body: EntityId,
    },
    GetEdges {
        id: EntityId,
    },
    GetVertices {
        id: EntityId,
    },
    GetTessellation {
        id: EntityId,
        tolerance: f64,
    },
    GetBoundingBox {
        id: EntityId,
    },
    GetMassProperties {
        body: EntityId,
    },
    GetVolume {
        body: EntityId,
    },
    GetArea {
        face: EntityId,
    },
    GetLength {
        edge: EntityId,
    },
    GetPosition {
        vertex: EntityId,
    },
    GetMidSurface {
        body: EntityId,
    },
    MinDistance {
        a: EntityId,
        b: EntityId,
    },
}

impl Request {
    /// Get the type name of this request
    pub fn name(&self) -> &'static str {
        match self {
            Request::HealthCheck { .. } => "HealthCheck",
            Request::NewDesign { .. } => "NewDesign",
            Request::OpenFile { .. } => "OpenFile",
            Request::CloseDesign { .. } => "CloseDesign",
            Request::CreateComponent { .. } => "CreateComponent",
            Request::ExtrudeSketch { .. } => "ExtrudeSketch",
            Request::RevolveSketch { .. } => "RevolveSketch",
            Request::CreateSurface { .. } => "CreateSurface",
            Request::Boolean { .. } => "Boolean",
            Request::Translate { .. } => "Translate",
            Request::Rotate { .. } => "Rotate",
            Request::Fillet { .. } => "Fillet",
            Request::Chamfer { .. } => "Chamfer",
            Request::CopyBody { .. } => "CopyBody",
            Request::Delete { .. } => "Delete",
            Request::Rename { .. } => "Rename",
            Request::AssignMaterial { .. } => "AssignMaterial",
            Request::ImprintCurves { .. } => "ImprintCurves",
            Request::ProjectCurves { .. } => "ProjectCurves",
            Request::AssignMidSurfaceThickness { .. } => "AssignMidSurfaceThickness",
            Request::AssignMidSurfaceOffset { .. } => "AssignMidSurfaceOffset",
            Request::Describe { .. } => "Describe",
            Request::GetChildren { .. } => "GetChildren",
            Request::GetFaces { .. } => "GetFaces",
            Request::GetEdges { .. } => "GetEdges",
            Request::GetVertices { .. } => "GetVertices",
            Request::GetTessellation { .. } => "GetTessellation",
            Request::GetBoundingBox { .. } => "GetBoundingBox",
            Request::GetMassProperties { .. } => "GetMassProperties",
            Request::GetVolume { .. } => "GetVolume",
            Request::GetArea { .. } => "GetArea",
            Request::GetLength { .. } => "GetLength",
            Request::GetPosition { .. } => "GetPosition",
            Request::GetMidSurface { .. } => "GetMidSurface",
            Request::MinDistance { .. } => "MinDistance",
        }
    }

    /// Whether the request has server-side effects
    ///
    /// Requests with side effects are never re-sent after a transport failure.
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Request::HealthCheck { .. }
                | Request::Describe { .. }
                | Request::GetChildren { .. }
                | Request::GetFaces { .. }
                | Request::GetEdges { .. }
                | Request::GetVertices { .. }
                | Request::GetTessellation { .. }
                | Request::GetBoundingBox { .. }
                | Request::GetMassProperties { .. }
                | Request::GetVolume { .. }
                | Request::GetArea { .. }
                | Request::GetLength { .. }
                | Request::GetPosition { .. }
                | Request::GetMidSurface { .. }
                | Request::MinDistance { .. }
        )
    }
}

/// A response from the geometry server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Health {
        server: String,
        protocol: u32,
    },
    /// A design was created or opened; `entities` lists its existing contents
    /// with parents before children
    Opened {
        design: EntityInfo,
        entities: Vec<EntityInfo>,
    },
    Mutation(MutationResult),
    Entity(Option<EntityInfo>),
    Entities(Vec<EntityInfo>),
    Mesh(MeshData),
    BoundingBox(BoxData),
    MassProperties(MassData),
    Scalar(f64),
    Point(DVec3),
    MidSurface(MidSurfaceData),
    Ack,
    /// The server declined the operation on geometric grounds
    Rejected {
        diagnostic: String,
    },
    /// The server could not process the request at all
    Error {
        code: String,
        message: String,
    },
}

impl Response {
    /// Get the type name of this response
    pub fn name(&self) -> &'static str {
        match self {
            Response::Health { .. } => "Health",
            Response::Opened { .. } => "Opened",
            Response::Mutation(_) => "Mutation",
            Response::Entity(_) => "Entity",
            Response::Entities(_) => "Entities",
            Response::Mesh(_) => "Mesh",
            Response::BoundingBox(_) => "BoundingBox",
            Response::MassProperties(_) => "MassProperties",
            Response::Scalar(_) => "Scalar",
            Response::Point(_) => "Point",
            Response::MidSurface(_) => "MidSurface",
            Response::Ack => "Ack",
            Response::Rejected { .. } => "Rejected",
            Response::Error { .. } => "Error",
        }
    }
}

/// A request tagged with its sequence number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub seq: u64,
    pub request: Request,
}

/// A response tagged with the sequence number of the request it answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub seq: u64,
    pub response: Response,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_are_not_mutating() {
        let query = Request::GetBoundingBox { id: "b1".into() };
        assert!(!query.is_mutating());

        let delete = Request::Delete { id: "b1".into() };
        assert!(delete.is_mutating());

        let design = Request::NewDesign { name: "d".into() };
        assert!(design.is_mutating());
    }

    #[test]
    fn test_mutation_result_empty() {
        let mut result = MutationResult::default();
        assert!(result.is_empty());
        result.deleted.push("b1".into());
        assert!(!result.is_empty());
    }
}
