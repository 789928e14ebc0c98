//! Sketch shape builders

use std::f64::consts::{PI, TAU};

use glam::DVec2;
use rg_units::{Angle, Distance};

use super::{Circle, Ellipse, Point2D, Sketch, SketchCurve, SketchError};

/// Relative tolerance for "same radius" checks on arcs
const RADIUS_TOLERANCE: f64 = 1e-9;

fn require_positive(what: &'static str, value: Distance) -> Result<f64, SketchError> {
    if value.is_positive() {
        Ok(value.as_meters())
    } else {
        Err(SketchError::NonPositive {
            what,
            value: value.to_string(),
        })
    }
}

impl Sketch {
    /// Add a line segment
    pub fn segment(&mut self, start: Point2D, end: Point2D) -> Result<&mut Self, SketchError> {
        if start.to_meters() == end.to_meters() {
            return Err(SketchError::InvalidShape(
                "segment start and end coincide".into(),
            ));
        }
        Ok(self.push(SketchCurve::Segment { start, end }))
    }

    /// Add a circular arc from `start` to `end` around `center`
    pub fn arc(
        &mut self,
        center: Point2D,
        start: Point2D,
        end: Point2D,
        clockwise: bool,
    ) -> Result<&mut Self, SketchError> {
        let r_start = center.distance_to(&start).as_meters();
        let r_end = center.distance_to(&end).as_meters();
        if r_start <= 0.0 {
            return Err(SketchError::NonPositive {
                what: "arc radius",
                value: format!("{r_start} m"),
            });
        }
        if (r_start - r_end).abs() > RADIUS_TOLERANCE * r_start.max(r_end) {
            return Err(SketchError::InvalidShape(format!(
                "arc endpoints are at different radii ({r_start} m, {r_end} m)"
            )));
        }
        Ok(self.push(SketchCurve::Arc {
            center,
            start,
            end,
            clockwise,
        }))
    }

    /// Add a full circle
    pub fn circle(&mut self, center: Point2D, radius: Distance) -> Result<&mut Self, SketchError> {
        let circle = Circle::new(center, radius)?;
        Ok(self.push(SketchCurve::Circle(circle)))
    }

    /// Add a full ellipse
    pub fn ellipse(
        &mut self,
        center: Point2D,
        major_radius: Distance,
        minor_radius: Distance,
        rotation: Angle,
    ) -> Result<&mut Self, SketchError> {
        let ellipse = Ellipse::new(center, major_radius, minor_radius, rotation)?;
        Ok(self.push(SketchCurve::Ellipse(ellipse)))
    }

    /// Add a closed polyline through the given points (meters, sketch frame)
    fn polygon(&mut self, corners: &[DVec2]) -> Result<&mut Self, SketchError> {
        for (i, start) in corners.iter().enumerate() {
            let end = corners[(i + 1) % corners.len()];
            self.segment(Point2D::from_meters(*start), Point2D::from_meters(end))?;
        }
        Ok(self)
    }

    /// Add a rectangle as four segments
    pub fn rectangle(
        &mut self,
        center: Point2D,
        width: Distance,
        height: Distance,
        rotation: Angle,
    ) -> Result<&mut Self, SketchError> {
        let half_w = require_positive("width", width)? / 2.0;
        let half_h = require_positive("height", height)? / 2.0;

        let c = center.to_meters();
        let rot = DVec2::from_angle(rotation.as_radians());
        let corners = [
            DVec2::new(-half_w, -half_h),
            DVec2::new(half_w, -half_h),
            DVec2::new(half_w, half_h),
            DVec2::new(-half_w, half_h),
        ]
        .map(|p| c + rot.rotate(p));
        self.polygon(&corners)
    }

    /// Add a trapezoid as four segments
    ///
    /// `slant_angle` is the interior angle at the bottom-left corner; the
    /// bottom-right corner uses `right_slant_angle` when given, making the
    /// trapezoid asymmetric.
    pub fn trapezoid(
        &mut self,
        center: Point2D,
        width: Distance,
        height: Distance,
        slant_angle: Angle,
        right_slant_angle: Option<Angle>,
        rotation: Angle,
    ) -> Result<&mut Self, SketchError> {
        let w = require_positive("width", width)?;
        let h = require_positive("height", height)?;

        let left = slant_angle.as_radians();
        let right = right_slant_angle.unwrap_or(slant_angle).as_radians();
        for angle in [left, right] {
            if angle <= 0.0 || angle >= PI {
                return Err(SketchError::InvalidShape(format!(
                    "slant angle {angle} rad is outside (0, pi)"
                )));
            }
        }

        let left_inset = h / left.tan();
        let right_inset = h / right.tan();
        if w - left_inset - right_inset <= 0.0 {
            return Err(SketchError::InvalidShape(
                "slant angles leave no top edge".into(),
            ));
        }

        let (half_w, half_h) = (w / 2.0, h / 2.0);
        let c = center.to_meters();
        let rot = DVec2::from_angle(rotation.as_radians());
        let corners = [
            DVec2::new(-half_w, -half_h),
            DVec2::new(half_w, -half_h),
            DVec2::new(half_w - right_inset, half_h),
            DVec2::new(-half_w + left_inset, half_h),
        ]
        .map(|p| c + rot.rotate(p));
        self.polygon(&corners)
    }

    /// Add a regular polygon with the given inner radius (apothem)
    pub fn regular_polygon(
        &mut self,
        center: Point2D,
        inner_radius: Distance,
        sides: usize,
        rotation: Angle,
    ) -> Result<&mut Self, SketchError> {
        let apothem = require_positive("inner radius", inner_radius)?;
        if sides < 3 {
            return Err(SketchError::InvalidShape(format!(
                "a polygon needs at least 3 sides, got {sides}"
            )));
        }

        let n = sides as f64;
        let outer = apothem / (PI / n).cos();
        let c = center.to_meters();
        let start = rotation.as_radians();
        let corners: Vec<DVec2> = (0..sides)
            .map(|k| c + DVec2::from_angle(start + TAU * k as f64 / n) * outer)
            .collect();
        self.polygon(&corners)
    }
}
