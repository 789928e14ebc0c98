//! Gear profiles
//!
//! A gear is drawn as one closed chain of curves around its origin. The spur
//! gear approximates each involute flank with circular arcs fitted through
//! consecutive sample points; tips and roots are arcs about the origin.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use glam::DVec2;
use rg_units::{Angle, Distance};

use super::{Point2D, Sketch, SketchCurve, SketchError};

/// Samples per involute flank
const INVOLUTE_STEPS: usize = 30;

/// Involute parameter limit, just short of a quarter turn
const INVOLUTE_MAX_ROLL: f64 = PI / 2.1;

/// Circular pitch over tooth thickness; slightly above 2 for backlash
const BACKLASH_DIVISOR: f64 = 2.05;

/// Share of each tooth pitch taken by the tooth on a dummy gear
const DUMMY_TOOTH_SHARE: f64 = 0.475;

/// Anything that draws as a closed gear outline
pub trait Gear {
    /// Curves of the outline, in drawing order
    fn curves(&self) -> Result<Vec<SketchCurve>, SketchError>;
}

impl Sketch {
    /// Add the outline of a gear
    pub fn gear(&mut self, gear: &impl Gear) -> Result<&mut Self, SketchError> {
        let curves = gear.curves()?;
        for curve in curves {
            self.push(curve);
        }
        Ok(self)
    }
}

/// Rotate points about the origin
fn rotated(points: &[DVec2], angle: f64) -> Vec<DVec2> {
    let rot = DVec2::from_angle(angle);
    points.iter().map(|p| rot.rotate(*p)).collect()
}

/// Counter-clockwise arc about `center`
fn arc_about(center: DVec2, start: DVec2, end: DVec2) -> SketchCurve {
    SketchCurve::Arc {
        center: Point2D::from_meters(center),
        start: Point2D::from_meters(start),
        end: Point2D::from_meters(end),
        clockwise: false,
    }
}

/// Center of the circle through three points, if they are not collinear
fn circumcenter(a: DVec2, b: DVec2, c: DVec2) -> Option<DVec2> {
    let ab = b - a;
    let ac = c - a;
    let d = 2.0 * ab.perp_dot(ac);
    if d.abs() <= f64::EPSILON * ab.length_squared().max(ac.length_squared()) {
        return None;
    }
    let offset = DVec2::new(
        ac.y * ab.length_squared() - ab.y * ac.length_squared(),
        ab.x * ac.length_squared() - ac.x * ab.length_squared(),
    ) / d;
    Some(a + offset)
}

/// Arcs through a polyline, each fitted to its own two points and the next
///
/// The last pair reuses the previous fit. Collinear runs become segments.
fn fitted_arcs(points: &[DVec2], origin: DVec2) -> Vec<SketchCurve> {
    let mut curves = Vec::with_capacity(points.len().saturating_sub(1));
    let mut fit: Option<(DVec2, bool)> = None;
    for i in 0..points.len().saturating_sub(1) {
        if let Some(&next) = points.get(i + 2) {
            let (a, b) = (points[i], points[i + 1]);
            fit = circumcenter(a, b, next).map(|center| (center, (b - a).perp_dot(next - b) < 0.0));
        }
        let start = Point2D::from_meters(points[i] + origin);
        let end = Point2D::from_meters(points[i + 1] + origin);
        curves.push(match fit {
            Some((center, clockwise)) => SketchCurve::Arc {
                center: Point2D::from_meters(center + origin),
                start,
                end,
                clockwise,
            },
            None => SketchCurve::Segment { start, end },
        });
    }
    curves
}

/// Spur gear with involute teeth
///
/// Sizes follow the module system: reference diameter is module times tooth
/// count, addendum one module and dedendum 1.25 modules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpurGear {
    origin: Point2D,
    module: Distance,
    pressure_angle: Angle,
    teeth: usize,
}

impl SpurGear {
    pub fn new(
        origin: Point2D,
        module: Distance,
        pressure_angle: Angle,
        teeth: usize,
    ) -> Result<Self, SketchError> {
        if !module.is_positive() {
            return Err(SketchError::NonPositive {
                what: "module",
                value: module.to_string(),
            });
        }
        let pressure = pressure_angle.as_radians();
        if pressure <= 0.0 || pressure >= FRAC_PI_2 {
            return Err(SketchError::InvalidShape(format!(
                "pressure angle {pressure} rad is outside (0, pi/2)"
            )));
        }
        // Root diameter is (teeth - 2.5) modules
        if teeth < 3 {
            return Err(SketchError::InvalidShape(format!(
                "a spur gear needs at least 3 teeth, got {teeth}"
            )));
        }
        Ok(Self {
            origin,
            module,
            pressure_angle,
            teeth,
        })
    }

    pub fn origin(&self) -> Point2D {
        self.origin
    }

    pub fn module(&self) -> Distance {
        self.module
    }

    pub fn pressure_angle(&self) -> Angle {
        self.pressure_angle
    }

    pub fn teeth(&self) -> usize {
        self.teeth
    }

    fn m(&self) -> f64 {
        self.module.as_meters()
    }

    /// Pitch circle diameter
    pub fn ref_diameter(&self) -> Distance {
        Distance::meters(self.m() * self.teeth as f64)
    }

    pub fn base_diameter(&self) -> Distance {
        Distance::meters(self.ref_diameter().as_meters() * self.pressure_angle.as_radians().cos())
    }

    pub fn addendum(&self) -> Distance {
        self.module
    }

    pub fn dedendum(&self) -> Distance {
        Distance::meters(1.25 * self.m())
    }

    pub fn tip_diameter(&self) -> Distance {
        Distance::meters(self.ref_diameter().as_meters() + 2.0 * self.m())
    }

    pub fn root_diameter(&self) -> Distance {
        Distance::meters(self.ref_diameter().as_meters() - 2.5 * self.m())
    }

    /// Involute samples from `radius` out to `max_radius`
    fn involute(radius: f64, max_radius: f64) -> Vec<DVec2> {
        let step = INVOLUTE_MAX_ROLL / INVOLUTE_STEPS as f64;
        let mut points: Vec<DVec2> = Vec::with_capacity(INVOLUTE_STEPS);
        for i in 0..INVOLUTE_STEPS {
            let t = i as f64 * step;
            let (s, c) = t.sin_cos();
            let point = DVec2::new(c + t * s, s - t * c) * radius;

            let dist = point.length();
            if dist > max_radius {
                if let Some(&last) = points.last() {
                    let r_last = last.length();
                    let share = (max_radius - r_last) / (dist - r_last);
                    let clipped = last.lerp(point, share);
                    points.push(clipped * (max_radius / clipped.length()));
                }
                break;
            }
            points.push(point);
        }
        points
    }

    /// One tooth as (rising flank, falling flank), centered on angle zero at
    /// the pitch circle crossing of the rising flank
    fn tooth(&self) -> Result<(Vec<DVec2>, Vec<DVec2>), SketchError> {
        let base = self.base_diameter().as_meters();
        let root = self.root_diameter().as_meters();
        let start = base.min(root) / 2.0;
        let flank = Self::involute(start, self.tip_diameter().as_meters() / 2.0);

        let pitch = self.ref_diameter().as_meters() / 2.0;
        let crossing = flank
            .windows(2)
            .find(|pair| pair[1].length() > pitch)
            .map(|pair| {
                let (r0, r1) = (pair[0].length(), pair[1].length());
                pair[0].lerp(pair[1], (pitch - r0) / (r1 - r0))
            })
            .ok_or_else(|| {
                SketchError::InvalidShape(format!(
                    "involute never reaches the pitch circle of a {}-tooth gear",
                    self.teeth
                ))
            })?;
        let rising = rotated(&flank, -crossing.y.atan2(crossing.x));

        let thickness = PI * self.m() / BACKLASH_DIVISOR;
        let falling: Vec<DVec2> = rising.iter().rev().map(|p| DVec2::new(p.x, -p.y)).collect();
        let falling = rotated(&falling, thickness / pitch);
        Ok((rising, falling))
    }
}

impl Gear for SpurGear {
    fn curves(&self) -> Result<Vec<SketchCurve>, SketchError> {
        let (rising, falling) = self.tooth()?;
        let origin = self.origin.to_meters();
        let pitch_angle = TAU / self.teeth as f64;

        let mut curves = Vec::new();
        let mut previous: Option<DVec2> = None;
        for k in 0..self.teeth {
            let angle = k as f64 * pitch_angle;
            let up = rotated(&rising, angle);
            let down = rotated(&falling, angle);
            let (Some(&up_first), Some(&up_last), Some(&down_first), Some(&down_last)) =
                (up.first(), up.last(), down.first(), down.last())
            else {
                return Err(SketchError::InvalidShape("empty involute".into()));
            };

            if let Some(root_start) = previous {
                curves.push(arc_about(origin, root_start + origin, up_first + origin));
            }
            curves.extend(fitted_arcs(&up, origin));
            curves.push(arc_about(origin, up_last + origin, down_first + origin));
            curves.extend(fitted_arcs(&down, origin));
            previous = Some(down_last);
        }

        if let (Some(last), Some(&first)) = (previous, rising.first()) {
            curves.push(arc_about(origin, last + origin, first + origin));
        }
        Ok(curves)
    }
}

/// Square-toothed gear: alternating outer and inner arcs joined radially
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DummyGear {
    origin: Point2D,
    outer_radius: Distance,
    inner_radius: Distance,
    teeth: usize,
}

impl DummyGear {
    pub fn new(
        origin: Point2D,
        outer_radius: Distance,
        inner_radius: Distance,
        teeth: usize,
    ) -> Result<Self, SketchError> {
        for (what, radius) in [("outer radius", outer_radius), ("inner radius", inner_radius)] {
            if !radius.is_positive() {
                return Err(SketchError::NonPositive {
                    what,
                    value: radius.to_string(),
                });
            }
        }
        if inner_radius.as_meters() >= outer_radius.as_meters() {
            return Err(SketchError::InvalidShape(format!(
                "inner radius {inner_radius} is not below outer radius {outer_radius}"
            )));
        }
        if teeth == 0 {
            return Err(SketchError::InvalidShape("a gear needs teeth".into()));
        }
        Ok(Self {
            origin,
            outer_radius,
            inner_radius,
            teeth,
        })
    }

    pub fn teeth(&self) -> usize {
        self.teeth
    }
}

impl Gear for DummyGear {
    fn curves(&self) -> Result<Vec<SketchCurve>, SketchError> {
        let origin = self.origin.to_meters();
        let outer = self.outer_radius.as_meters();
        let inner = self.inner_radius.as_meters();
        let pitch_angle = TAU / self.teeth as f64;
        let at = |radius: f64, angle: f64| origin + DVec2::from_angle(angle) * radius;

        let mut curves = Vec::with_capacity(4 * self.teeth);
        for k in 0..self.teeth {
            let start = k as f64 * pitch_angle;
            let tooth_end = start + DUMMY_TOOTH_SHARE * pitch_angle;
            let gap_end = start + pitch_angle;

            curves.push(arc_about(origin, at(outer, start), at(outer, tooth_end)));
            curves.push(SketchCurve::Segment {
                start: Point2D::from_meters(at(outer, tooth_end)),
                end: Point2D::from_meters(at(inner, tooth_end)),
            });
            curves.push(arc_about(origin, at(inner, tooth_end), at(inner, gap_end)));
            curves.push(SketchCurve::Segment {
                start: Point2D::from_meters(at(inner, gap_end)),
                end: Point2D::from_meters(at(outer, gap_end)),
            });
        }
        Ok(curves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sketch::Plane;
    use approx::assert_relative_eq;

    fn endpoints(curve: &SketchCurve) -> (DVec2, DVec2) {
        match curve {
            SketchCurve::Segment { start, end } | SketchCurve::Arc { start, end, .. } => {
                (start.to_meters(), end.to_meters())
            }
            other => panic!("unexpected {}", other.type_name()),
        }
    }

    fn assert_closed_chain(curves: &[SketchCurve]) {
        for (i, curve) in curves.iter().enumerate() {
            let (_, end) = endpoints(curve);
            let (next_start, _) = endpoints(&curves[(i + 1) % curves.len()]);
            assert!(end.distance(next_start) < 1e-12, "gap after curve {i}");
        }
    }

    fn standard_gear() -> SpurGear {
        SpurGear::new(Point2D::mm(5.0, -3.0), Distance::mm(2.0), Angle::degrees(20.0), 20).unwrap()
    }

    #[test]
    fn test_spur_gear_dimensions() {
        let gear = standard_gear();
        assert_relative_eq!(gear.ref_diameter().as_meters(), 0.040, max_relative = 1e-12);
        assert_relative_eq!(gear.tip_diameter().as_meters(), 0.044, max_relative = 1e-12);
        assert_relative_eq!(gear.root_diameter().as_meters(), 0.035, max_relative = 1e-12);
        assert_relative_eq!(gear.addendum().as_meters(), 0.002, max_relative = 1e-12);
        assert_relative_eq!(gear.dedendum().as_meters(), 0.0025, max_relative = 1e-12);
        assert_relative_eq!(
            gear.base_diameter().as_meters(),
            0.040 * 20f64.to_radians().cos(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_spur_gear_outline() {
        let gear = standard_gear();
        let curves = gear.curves().unwrap();
        assert_closed_chain(&curves);

        let origin = gear.origin().to_meters();
        let radii: Vec<f64> = curves
            .iter()
            .map(|curve| endpoints(curve).0.distance(origin))
            .collect();
        let max = radii.iter().copied().fold(f64::MIN, f64::max);
        let min = radii.iter().copied().fold(f64::MAX, f64::min);
        assert_relative_eq!(max, 0.022, max_relative = 1e-9);
        assert_relative_eq!(min, 0.0175, max_relative = 1e-9);

        // One tip arc per tooth, centered on the gear
        let tips = curves
            .iter()
            .filter(|curve| match curve {
                SketchCurve::Arc { center, start, .. } => {
                    center.to_meters().distance(origin) < 1e-12
                        && (start.to_meters().distance(origin) - 0.022).abs() < 1e-9
                }
                _ => false,
            })
            .count();
        assert_eq!(tips, 20);

        let mut sketch = Sketch::new(Plane::xy());
        sketch.gear(&gear).unwrap();
        assert_eq!(sketch.curve_count(), curves.len());
    }

    #[test]
    fn test_spur_gear_validation() {
        let origin = Point2D::origin();
        assert!(SpurGear::new(origin, Distance::mm(0.0), Angle::degrees(20.0), 20).is_err());
        assert!(SpurGear::new(origin, Distance::mm(1.0), Angle::degrees(90.0), 20).is_err());
        assert!(SpurGear::new(origin, Distance::mm(1.0), Angle::degrees(20.0), 2).is_err());
    }

    #[test]
    fn test_dummy_gear() {
        let gear =
            DummyGear::new(Point2D::origin(), Distance::mm(10.0), Distance::mm(8.0), 12).unwrap();
        let curves = gear.curves().unwrap();
        assert_eq!(curves.len(), 48);
        assert_closed_chain(&curves);

        assert!(DummyGear::new(Point2D::origin(), Distance::mm(8.0), Distance::mm(10.0), 12).is_err());
        assert!(DummyGear::new(Point2D::origin(), Distance::mm(10.0), Distance::mm(8.0), 0).is_err());
    }
}
