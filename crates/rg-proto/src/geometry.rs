//! Wire geometry
//!
//! All magnitudes are bare numbers in the server's canonical unit system;
//! unit tagging happens on the client side of the boundary.

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

/// A sketch plane: origin plus orthonormal in-plane directions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameData {
    pub origin: DVec3,
    pub dir_x: DVec3,
    pub dir_y: DVec3,
}

impl FrameData {
    /// Normal of the plane (x × y)
    pub fn normal(&self) -> DVec3 {
        self.dir_x.cross(self.dir_y)
    }

    /// Map a point in plane coordinates to 3D
    pub fn to_world(&self, p: DVec2) -> DVec3 {
        self.origin + self.dir_x * p.x + self.dir_y * p.y
    }
}

impl Default for FrameData {
    fn default() -> Self {
        Self {
            origin: DVec3::ZERO,
            dir_x: DVec3::X,
            dir_y: DVec3::Y,
        }
    }
}

/// A 2D curve in plane coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CurveGeometry {
    Segment {
        start: DVec2,
        end: DVec2,
    },
    Arc {
        center: DVec2,
        start: DVec2,
        end: DVec2,
        clockwise: bool,
    },
    Circle {
        center: DVec2,
        radius: f64,
    },
    Ellipse {
        center: DVec2,
        major_radius: f64,
        minor_radius: f64,
        /// Rotation of the major axis from the plane's x direction (canonical angle unit)
        rotation: f64,
    },
}

impl CurveGeometry {
    /// Axis-aligned bounds of the curve in plane coordinates
    pub fn bounds(&self) -> (DVec2, DVec2) {
        match self {
            CurveGeometry::Segment { start, end } => (start.min(*end), start.max(*end)),
            CurveGeometry::Arc { center, start, .. } => {
                let r = (*start - *center).length();
                (*center - DVec2::splat(r), *center + DVec2::splat(r))
            }
            CurveGeometry::Circle { center, radius } => {
                (*center - DVec2::splat(*radius), *center + DVec2::splat(*radius))
            }
            CurveGeometry::Ellipse {
                center,
                major_radius,
                ..
            } => (
                *center - DVec2::splat(*major_radius),
                *center + DVec2::splat(*major_radius),
            ),
        }
    }
}

/// A closed or open set of curves on a plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SketchProfile {
    pub plane: FrameData,
    pub curves: Vec<CurveGeometry>,
}

impl SketchProfile {
    /// Bounds of all curves in plane coordinates, if any
    pub fn bounds(&self) -> Option<(DVec2, DVec2)> {
        self.curves
            .iter()
            .map(CurveGeometry::bounds)
            .reduce(|(a_min, a_max), (b_min, b_max)| (a_min.min(b_min), a_max.max(b_max)))
    }
}

/// Axis definition for revolve and rotate operations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisData {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl AxisData {
    /// Create an axis from origin and direction
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }
}

/// Boolean operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BooleanType {
    /// Union (add)
    Union,
    /// Subtraction (cut)
    Subtract,
    /// Intersection (common)
    Intersect,
}

/// Direction for extrusion relative to the sketch plane normal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtrudeDirection {
    /// Extrude in the positive normal direction
    #[default]
    Positive,
    /// Extrude in the negative normal direction
    Negative,
    /// Extrude symmetrically in both directions
    Symmetric,
}

/// Where a surface body's thickness lies relative to the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MidSurfaceOffsetType {
    #[default]
    Middle,
    Top,
    Bottom,
    Variable,
    Custom,
}

impl MidSurfaceOffsetType {
    pub fn name(&self) -> &'static str {
        match self {
            MidSurfaceOffsetType::Middle => "Middle",
            MidSurfaceOffsetType::Top => "Top",
            MidSurfaceOffsetType::Bottom => "Bottom",
            MidSurfaceOffsetType::Variable => "Variable",
            MidSurfaceOffsetType::Custom => "Custom",
        }
    }
}

/// Mid-surface attributes of a body; both unset for solids
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MidSurfaceData {
    pub thickness: Option<f64>,
    pub offset: Option<MidSurfaceOffsetType>,
}

/// A tessellated mesh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    /// Vertex positions
    pub vertices: Vec<[f64; 3]>,
    /// Vertex normals
    pub normals: Vec<[f64; 3]>,
    /// Triangle indices (3 indices per triangle)
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Get the number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether every index refers to an existing vertex
    pub fn indices_in_bounds(&self) -> bool {
        let n = self.vertices.len() as u32;
        self.indices.iter().all(|&i| i < n) && self.indices.len() % 3 == 0
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxData {
    pub min: DVec3,
    pub max: DVec3,
}

impl BoxData {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing both
    pub fn union(&self, other: &BoxData) -> BoxData {
        BoxData::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Overlap of both boxes, if any
    pub fn intersection(&self, other: &BoxData) -> Option<BoxData> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        (min.cmple(max).all()).then_some(BoxData::new(min, max))
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min.cmple(self.max).all()
    }
}

/// Mass properties of a body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassData {
    pub volume: f64,
    pub surface_area: f64,
    pub centroid: DVec3,
}

impl MassData {
    /// Finite values with non-negative volume and area
    pub fn is_valid(&self) -> bool {
        self.volume.is_finite()
            && self.volume >= 0.0
            && self.surface_area.is_finite()
            && self.surface_area >= 0.0
            && self.centroid.is_finite()
    }
}
