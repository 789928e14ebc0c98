//! Sketch System
//!
//! Sketches are built and validated locally with unit-carrying values and
//! only reach the server as the profile of an extrude, revolve, imprint or
//! projection. Building a sketch never contacts the server.

mod curve;
mod gear;
mod shapes;

pub use curve::{Circle, CurveEvaluation, Ellipse};
pub use gear::{DummyGear, Gear, SpurGear};

use glam::{DVec2, DVec3};
use rg_proto::{CurveGeometry, FrameData, SketchProfile};
use rg_units::{Dimension, Distance, Quantity, Unit, UnitError, UnitSystem};
use thiserror::Error;

/// Error type for sketch construction
#[derive(Debug, Clone, Error)]
pub enum SketchError {
    #[error("{what} must be positive, got {value}")]
    NonPositive { what: &'static str, value: String },

    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    #[error("Invalid plane: {0}")]
    InvalidPlane(String),

    #[error("Sketch has no curves")]
    Empty,

    #[error(transparent)]
    Unit(#[from] UnitError),
}

/// A point in sketch-plane coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    meters: DVec2,
}

impl Point2D {
    pub fn new(x: Distance, y: Distance) -> Self {
        Self {
            meters: DVec2::new(x.as_meters(), y.as_meters()),
        }
    }

    pub fn mm(x: f64, y: f64) -> Self {
        Self::new(Distance::mm(x), Distance::mm(y))
    }

    pub fn meters(x: f64, y: f64) -> Self {
        Self::from_meters(DVec2::new(x, y))
    }

    pub fn origin() -> Self {
        Self::from_meters(DVec2::ZERO)
    }

    pub(crate) fn from_meters(meters: DVec2) -> Self {
        Self { meters }
    }

    pub fn x(&self) -> Distance {
        Distance::meters(self.meters.x)
    }

    pub fn y(&self) -> Distance {
        Distance::meters(self.meters.y)
    }

    pub fn to_meters(&self) -> DVec2 {
        self.meters
    }

    /// Coordinates expressed in a length unit
    pub fn in_unit(&self, unit: Unit) -> Result<DVec2, UnitError> {
        let scale = Quantity::new(1.0, Unit::Meter).value_in(unit)?;
        Ok(self.meters * scale)
    }

    pub fn distance_to(&self, other: &Point2D) -> Distance {
        Distance::meters(self.meters.distance(other.meters))
    }
}

/// A sketch plane: origin plus orthonormal in-plane x and y directions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Origin in meters
    origin: DVec3,
    dir_x: DVec3,
    dir_y: DVec3,
}

impl Default for Plane {
    fn default() -> Self {
        Self::xy()
    }
}

impl Plane {
    /// Create a plane, normalizing the directions
    pub fn new(origin: [Distance; 3], dir_x: DVec3, dir_y: DVec3) -> Result<Self, SketchError> {
        let dir_x = dir_x.try_normalize().ok_or_else(|| {
            SketchError::InvalidPlane("x direction has zero length".into())
        })?;
        let dir_y = dir_y.try_normalize().ok_or_else(|| {
            SketchError::InvalidPlane("y direction has zero length".into())
        })?;
        if dir_x.dot(dir_y).abs() > 1e-9 {
            return Err(SketchError::InvalidPlane(
                "x and y directions are not perpendicular".into(),
            ));
        }
        Ok(Self {
            origin: DVec3::new(
                origin[0].as_meters(),
                origin[1].as_meters(),
                origin[2].as_meters(),
            ),
            dir_x,
            dir_y,
        })
    }

    /// World XY plane through the origin
    pub fn xy() -> Self {
        Self {
            origin: DVec3::ZERO,
            dir_x: DVec3::X,
            dir_y: DVec3::Y,
        }
    }

    /// World XZ plane through the origin
    pub fn xz() -> Self {
        Self {
            origin: DVec3::ZERO,
            dir_x: DVec3::X,
            dir_y: DVec3::Z,
        }
    }

    /// World YZ plane through the origin
    pub fn yz() -> Self {
        Self {
            origin: DVec3::ZERO,
            dir_x: DVec3::Y,
            dir_y: DVec3::Z,
        }
    }

    /// The same plane moved along its normal
    pub fn offset(mut self, distance: Distance) -> Self {
        self.origin += self.normal() * distance.as_meters();
        self
    }

    pub fn normal(&self) -> DVec3 {
        self.dir_x.cross(self.dir_y)
    }

    pub fn dir_x(&self) -> DVec3 {
        self.dir_x
    }

    pub fn dir_y(&self) -> DVec3 {
        self.dir_y
    }

    pub fn origin_meters(&self) -> DVec3 {
        self.origin
    }

    fn to_frame(&self, units: &UnitSystem) -> Result<FrameData, UnitError> {
        let scale = Quantity::new(1.0, Unit::Meter).value_in(units.length)?;
        Ok(FrameData {
            origin: self.origin * scale,
            dir_x: self.dir_x,
            dir_y: self.dir_y,
        })
    }
}

/// A curve in a sketch
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SketchCurve {
    Segment {
        start: Point2D,
        end: Point2D,
    },
    Arc {
        center: Point2D,
        start: Point2D,
        end: Point2D,
        clockwise: bool,
    },
    Circle(Circle),
    Ellipse(Ellipse),
}

impl SketchCurve {
    /// Get the type name of this curve
    pub fn type_name(&self) -> &'static str {
        match self {
            SketchCurve::Segment { .. } => "Segment",
            SketchCurve::Arc { .. } => "Arc",
            SketchCurve::Circle(_) => "Circle",
            SketchCurve::Ellipse(_) => "Ellipse",
        }
    }

    fn to_wire(&self, units: &UnitSystem) -> Result<CurveGeometry, UnitError> {
        let length = units.length;
        Ok(match self {
            SketchCurve::Segment { start, end } => CurveGeometry::Segment {
                start: start.in_unit(length)?,
                end: end.in_unit(length)?,
            },
            SketchCurve::Arc {
                center,
                start,
                end,
                clockwise,
            } => CurveGeometry::Arc {
                center: center.in_unit(length)?,
                start: start.in_unit(length)?,
                end: end.in_unit(length)?,
                clockwise: *clockwise,
            },
            SketchCurve::Circle(circle) => CurveGeometry::Circle {
                center: circle.center().in_unit(length)?,
                radius: units.canonical_as(circle.radius().quantity(), Dimension::Length)?,
            },
            SketchCurve::Ellipse(ellipse) => CurveGeometry::Ellipse {
                center: ellipse.center().in_unit(length)?,
                major_radius: units
                    .canonical_as(ellipse.major_radius().quantity(), Dimension::Length)?,
                minor_radius: units
                    .canonical_as(ellipse.minor_radius().quantity(), Dimension::Length)?,
                rotation: units.canonical_as(ellipse.rotation().quantity(), Dimension::Angle)?,
            },
        })
    }
}

/// A planar sketch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sketch {
    plane: Plane,
    curves: Vec<SketchCurve>,
}

impl Sketch {
    /// Create an empty sketch on a plane
    pub fn new(plane: Plane) -> Self {
        Self {
            plane,
            curves: Vec::new(),
        }
    }

    pub fn plane(&self) -> &Plane {
        &self.plane
    }

    pub fn curves(&self) -> &[SketchCurve] {
        &self.curves
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    pub fn curve_count(&self) -> usize {
        self.curves.len()
    }

    /// Convert to wire geometry in the server's canonical units
    pub fn to_profile(&self, units: &UnitSystem) -> Result<SketchProfile, SketchError> {
        if self.curves.is_empty() {
            return Err(SketchError::Empty);
        }
        let curves = self
            .curves
            .iter()
            .map(|curve| curve.to_wire(units))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SketchProfile {
            plane: self.plane.to_frame(units)?,
            curves,
        })
    }

    fn push(&mut self, curve: SketchCurve) -> &mut Self {
        self.curves.push(curve);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_sketch_has_no_profile() {
        let sketch = Sketch::new(Plane::xy());
        assert!(matches!(
            sketch.to_profile(&UnitSystem::si()),
            Err(SketchError::Empty)
        ));
    }

    #[test]
    fn test_profile_in_canonical_units() {
        let mut sketch = Sketch::new(Plane::xy().offset(Distance::mm(5.0)));
        sketch
            .circle(Point2D::mm(10.0, 0.0), Distance::mm(2.0))
            .unwrap();

        let profile = sketch.to_profile(&UnitSystem::si()).unwrap();
        assert_relative_eq!(profile.plane.origin.z, 0.005, max_relative = 1e-12);
        match &profile.curves[0] {
            CurveGeometry::Circle { center, radius } => {
                assert_relative_eq!(center.x, 0.01, max_relative = 1e-12);
                assert_relative_eq!(*radius, 0.002, max_relative = 1e-12);
            }
            other => panic!("unexpected curve {other:?}"),
        }

        let profile = sketch.to_profile(&UnitSystem::millimeter()).unwrap();
        assert_relative_eq!(profile.plane.origin.z, 5.0, max_relative = 1e-12);
    }

    #[test]
    fn test_plane_validation() {
        let origin = [Distance::mm(0.0); 3];
        assert!(Plane::new(origin, DVec3::X, DVec3::X).is_err());
        assert!(Plane::new(origin, DVec3::ZERO, DVec3::Y).is_err());

        let plane = Plane::new(origin, DVec3::new(2.0, 0.0, 0.0), DVec3::Y).unwrap();
        assert_eq!(plane.dir_x(), DVec3::X);
        assert_eq!(Plane::xz().normal(), -DVec3::Y);
    }

    #[test]
    fn test_point_units() {
        let p = Point2D::new(Distance::inches(1.0), Distance::mm(3.0));
        let mm = p.in_unit(Unit::Millimeter).unwrap();
        assert_relative_eq!(mm.x, 25.4, max_relative = 1e-12);
        assert_relative_eq!(mm.y, 3.0, max_relative = 1e-12);
        assert!(p.in_unit(Unit::Radian).is_err());
    }
}
