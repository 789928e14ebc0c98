//! Derived data
//!
//! Values computed server-side on demand (meshes, boxes, measurements),
//! tagged with the canonical unit system when they arrive.

use std::fmt;
use std::sync::Arc;

use glam::DVec3;
use rg_proto::{BoxData, MassData, MeshData, MidSurfaceData, MidSurfaceOffsetType};
use rg_units::{Dimension, Distance, Quantity, Unit, UnitResult, UnitSystem};

/// Kind of derived data kept in the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedKind {
    Mesh,
    BoundingBox,
    MassProperties,
    Volume,
    Area,
    Length,
    Position,
    MidSurface,
}

impl DerivedKind {
    pub fn name(&self) -> &'static str {
        match self {
            DerivedKind::Mesh => "Mesh",
            DerivedKind::BoundingBox => "BoundingBox",
            DerivedKind::MassProperties => "MassProperties",
            DerivedKind::Volume => "Volume",
            DerivedKind::Area => "Area",
            DerivedKind::Length => "Length",
            DerivedKind::Position => "Position",
            DerivedKind::MidSurface => "MidSurface",
        }
    }
}

impl fmt::Display for DerivedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A triangle mesh for display
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub positions: Vec<DVec3>,
    pub normals: Vec<DVec3>,
    /// Triangle indices (3 per triangle)
    pub indices: Vec<u32>,
    /// Unit of `positions`
    pub unit: Unit,
}

impl Mesh {
    pub fn from_wire(data: MeshData, units: &UnitSystem) -> Self {
        Self {
            positions: data.vertices.into_iter().map(DVec3::from_array).collect(),
            normals: data.normals.into_iter().map(DVec3::from_array).collect(),
            indices: data.indices,
            unit: units.length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: DVec3,
    pub max: DVec3,
    /// Unit of `min` and `max`
    pub unit: Unit,
}

impl BoundingBox {
    pub fn from_wire(data: BoxData, units: &UnitSystem) -> Self {
        Self {
            min: data.min,
            max: data.max,
            unit: units.length,
        }
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Extent along each axis
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Length of the box diagonal
    pub fn diagonal(&self) -> Distance {
        Distance::with_unit(self.size().length(), self.unit)
            .unwrap_or_else(|_| Distance::meters(0.0))
    }

    /// Express the box in another length unit
    pub fn to(&self, unit: Unit) -> UnitResult<BoundingBox> {
        let scale = Quantity::new(1.0, self.unit).value_in(unit)?;
        Ok(BoundingBox {
            min: self.min * scale,
            max: self.max * scale,
            unit,
        })
    }
}

/// Volume, surface area and centroid of a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassProperties {
    pub volume: Quantity,
    pub surface_area: Quantity,
    pub centroid: DVec3,
    /// Unit of `centroid`
    pub unit: Unit,
}

impl MassProperties {
    pub fn from_wire(data: MassData, units: &UnitSystem) -> Self {
        Self {
            volume: units.tag(data.volume, Dimension::Volume),
            surface_area: units.tag(data.surface_area, Dimension::Area),
            centroid: data.centroid,
            unit: units.length,
        }
    }
}

/// Mid-surface thickness and offset of a surface body
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MidSurface {
    pub thickness: Option<Distance>,
    pub offset: Option<MidSurfaceOffsetType>,
}

impl MidSurface {
    pub fn from_wire(data: MidSurfaceData, units: &UnitSystem) -> UnitResult<Self> {
        let thickness = data
            .thickness
            .map(|t| Distance::new(units.tag(t, Dimension::Length)))
            .transpose()?;
        Ok(Self {
            thickness,
            offset: data.offset,
        })
    }
}

/// A point in model space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point3D {
    pub coords: DVec3,
    pub unit: Unit,
}

impl Point3D {
    pub fn new(coords: DVec3, unit: Unit) -> Self {
        Self { coords, unit }
    }

    pub fn x(&self) -> Quantity {
        Quantity::new(self.coords.x, self.unit)
    }

    pub fn y(&self) -> Quantity {
        Quantity::new(self.coords.y, self.unit)
    }

    pub fn z(&self) -> Quantity {
        Quantity::new(self.coords.z, self.unit)
    }
}

/// A cached derived value
#[derive(Debug, Clone, PartialEq)]
pub enum DerivedValue {
    Mesh(Arc<Mesh>),
    BoundingBox(BoundingBox),
    MassProperties(MassProperties),
    /// Volume, area or length
    Scalar(Quantity),
    Position(Point3D),
    MidSurface(MidSurface),
}

impl DerivedValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            DerivedValue::Mesh(_) => "Mesh",
            DerivedValue::BoundingBox(_) => "BoundingBox",
            DerivedValue::MassProperties(_) => "MassProperties",
            DerivedValue::Scalar(_) => "Scalar",
            DerivedValue::Position(_) => "Position",
            DerivedValue::MidSurface(_) => "MidSurface",
        }
    }

    pub fn as_mesh(&self) -> Option<&Arc<Mesh>> {
        match self {
            DerivedValue::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn as_bounding_box(&self) -> Option<BoundingBox> {
        match self {
            DerivedValue::BoundingBox(bbox) => Some(*bbox),
            _ => None,
        }
    }

    pub fn as_mass_properties(&self) -> Option<MassProperties> {
        match self {
            DerivedValue::MassProperties(props) => Some(*props),
            _ => None,
        }
    }

    pub fn as_quantity(&self) -> Option<Quantity> {
        match self {
            DerivedValue::Scalar(q) => Some(*q),
            _ => None,
        }
    }

    pub fn as_position(&self) -> Option<Point3D> {
        match self {
            DerivedValue::Position(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_mid_surface(&self) -> Option<MidSurface> {
        match self {
            DerivedValue::MidSurface(m) => Some(*m),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_tagged_and_converted() {
        let data = BoxData::new(DVec3::ZERO, DVec3::new(0.01, 0.005, 0.002));
        let bbox = BoundingBox::from_wire(data, &UnitSystem::si());
        assert_eq!(bbox.unit, Unit::Meter);

        let mm = bbox.to(Unit::Millimeter).unwrap();
        assert_relative_eq!(mm.size().x, 10.0, max_relative = 1e-12);
        assert_relative_eq!(mm.size().y, 5.0, max_relative = 1e-12);
        assert!(bbox.to(Unit::Degree).is_err());
    }

    #[test]
    fn test_mass_properties_units() {
        let data = MassData {
            volume: 1e-7,
            surface_area: 1.6e-4,
            centroid: DVec3::ZERO,
        };
        let props = MassProperties::from_wire(data, &UnitSystem::si());
        assert_eq!(props.volume.dimension(), Dimension::Volume);
        assert_relative_eq!(
            props.volume.value_in(Unit::CubicMillimeter).unwrap(),
            100.0,
            max_relative = 1e-9
        );
    }
}
