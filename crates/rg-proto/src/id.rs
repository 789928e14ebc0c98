use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier issued by the geometry server
///
/// Stable for the entity's lifetime and never reused after deletion within a
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Kind of server-side entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Design,
    Component,
    Body,
    Face,
    Edge,
    Vertex,
}

impl EntityKind {
    /// Get the type name of this kind
    pub fn type_name(&self) -> &'static str {
        match self {
            EntityKind::Design => "Design",
            EntityKind::Component => "Component",
            EntityKind::Body => "Body",
            EntityKind::Face => "Face",
            EntityKind::Edge => "Edge",
            EntityKind::Vertex => "Vertex",
        }
    }

    /// Whether entities of this kind may own components and bodies
    pub fn is_container(&self) -> bool {
        matches!(self, EntityKind::Design | EntityKind::Component)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}
