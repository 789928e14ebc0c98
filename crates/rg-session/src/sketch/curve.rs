//! Closed planar curves
//!
//! Circles and ellipses with the measurements and point evaluation the
//! sketch builder exposes. All evaluation happens in meters.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use glam::DVec2;
use rg_units::{Angle, Distance, Quantity, Unit};

use super::{Point2D, SketchError};

/// Intervals used to integrate the ellipse perimeter (Simpson's rule, even)
const PERIMETER_INTERVALS: usize = 1024;

/// Result of evaluating a curve at a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveEvaluation {
    pub parameter: f64,
    pub position: Point2D,
    /// Unit tangent in the direction of increasing parameter
    pub tangent: DVec2,
    /// Curvature in 1/m
    pub curvature: f64,
}

/// A full circle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    center: Point2D,
    radius: Distance,
}

impl Circle {
    pub fn new(center: Point2D, radius: Distance) -> Result<Self, SketchError> {
        if !radius.is_positive() {
            return Err(SketchError::NonPositive {
                what: "radius",
                value: radius.to_string(),
            });
        }
        Ok(Self { center, radius })
    }

    pub fn center(&self) -> Point2D {
        self.center
    }

    pub fn radius(&self) -> Distance {
        self.radius
    }

    pub fn diameter(&self) -> Distance {
        Distance::meters(2.0 * self.radius.as_meters())
    }

    pub fn perimeter(&self) -> Distance {
        Distance::meters(TAU * self.radius.as_meters())
    }

    pub fn area(&self) -> Quantity {
        let r = self.radius.as_meters();
        Quantity::new(PI * r * r, Unit::SquareMeter)
    }

    /// Point at `parameter` radians from the +x direction
    pub fn evaluate(&self, parameter: f64) -> CurveEvaluation {
        let r = self.radius.as_meters();
        let (sin, cos) = parameter.sin_cos();
        CurveEvaluation {
            parameter,
            position: Point2D::from_meters(self.center.to_meters() + DVec2::new(cos, sin) * r),
            tangent: DVec2::new(-sin, cos),
            curvature: 1.0 / r,
        }
    }
}

/// A full ellipse
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    center: Point2D,
    major_radius: Distance,
    minor_radius: Distance,
    /// Rotation of the major axis from the sketch x direction
    rotation: Angle,
}

impl Ellipse {
    pub fn new(
        center: Point2D,
        major_radius: Distance,
        minor_radius: Distance,
        rotation: Angle,
    ) -> Result<Self, SketchError> {
        for (what, radius) in [("major radius", major_radius), ("minor radius", minor_radius)] {
            if !radius.is_positive() {
                return Err(SketchError::NonPositive {
                    what,
                    value: radius.to_string(),
                });
            }
        }
        if minor_radius.as_meters() > major_radius.as_meters() {
            return Err(SketchError::InvalidShape(format!(
                "minor radius {minor_radius} exceeds major radius {major_radius}"
            )));
        }
        Ok(Self {
            center,
            major_radius,
            minor_radius,
            rotation,
        })
    }

    pub fn center(&self) -> Point2D {
        self.center
    }

    pub fn major_radius(&self) -> Distance {
        self.major_radius
    }

    pub fn minor_radius(&self) -> Distance {
        self.minor_radius
    }

    pub fn rotation(&self) -> Angle {
        self.rotation
    }

    /// 0 for a circle, approaching 1 as the ellipse flattens
    pub fn eccentricity(&self) -> f64 {
        let ratio = self.minor_radius.as_meters() / self.major_radius.as_meters();
        (1.0 - ratio * ratio).sqrt()
    }

    /// Distance from the center to either focus
    pub fn linear_eccentricity(&self) -> Distance {
        let a = self.major_radius.as_meters();
        let b = self.minor_radius.as_meters();
        Distance::meters((a * a - b * b).sqrt())
    }

    /// Perimeter from the complete elliptic integral of the second kind
    pub fn perimeter(&self) -> Distance {
        let e = self.eccentricity();
        let integrand = |theta: f64| (1.0 - (e * theta.sin()).powi(2)).sqrt();

        let h = FRAC_PI_2 / PERIMETER_INTERVALS as f64;
        let mut sum = integrand(0.0) + integrand(FRAC_PI_2);
        for i in 1..PERIMETER_INTERVALS {
            let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
            sum += weight * integrand(i as f64 * h);
        }
        let integral = sum * h / 3.0;

        Distance::meters(4.0 * self.major_radius.as_meters() * integral)
    }

    pub fn area(&self) -> Quantity {
        Quantity::new(
            PI * self.major_radius.as_meters() * self.minor_radius.as_meters(),
            Unit::SquareMeter,
        )
    }

    /// Point at eccentric anomaly `parameter` (radians)
    pub fn evaluate(&self, parameter: f64) -> CurveEvaluation {
        let a = self.major_radius.as_meters();
        let b = self.minor_radius.as_meters();
        let (sin, cos) = parameter.sin_cos();
        let rotation = DVec2::from_angle(self.rotation.as_radians());

        let local = DVec2::new(a * cos, b * sin);
        let first = DVec2::new(-a * sin, b * cos);
        let speed_sq = first.length_squared();

        CurveEvaluation {
            parameter,
            position: Point2D::from_meters(self.center.to_meters() + rotation.rotate(local)),
            tangent: rotation.rotate(first).normalize(),
            curvature: a * b / speed_sq.powf(1.5),
        }
    }
}
