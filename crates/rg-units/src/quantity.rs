//! Unit-tagged numeric values

use std::fmt;
use std::ops::{Div, Mul, Neg};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{UnitError, UnitResult};
use crate::unit::{Dimension, Unit};

/// Convert a bare value between two units of the same dimension
pub fn convert(value: f64, from: Unit, to: Unit) -> UnitResult<f64> {
    if from.dimension() != to.dimension() {
        return Err(UnitError::IncompatibleDimension {
            expected: to.dimension(),
            found: from.dimension(),
        });
    }
    if !value.is_finite() {
        return Err(UnitError::NonFinite(value));
    }
    if from == to {
        return Ok(value);
    }
    Ok(value * from.si_scale() / to.si_scale())
}

/// A numeric value tagged with the unit it is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    value: f64,
    unit: Unit,
}

impl Quantity {
    /// Create a new quantity
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// Create a quantity, rejecting NaN and infinities
    pub fn finite(value: f64, unit: Unit) -> UnitResult<Self> {
        if value.is_finite() {
            Ok(Self { value, unit })
        } else {
            Err(UnitError::NonFinite(value))
        }
    }

    /// Magnitude in this quantity's own unit
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn dimension(&self) -> Dimension {
        self.unit.dimension()
    }

    /// Express this quantity in another unit of the same dimension
    pub fn to(&self, unit: Unit) -> UnitResult<Quantity> {
        Ok(Quantity::new(convert(self.value, self.unit, unit)?, unit))
    }

    /// Magnitude of this quantity expressed in `unit`
    pub fn value_in(&self, unit: Unit) -> UnitResult<f64> {
        convert(self.value, self.unit, unit)
    }

    /// Fail unless this quantity has the given dimension
    pub fn expect_dimension(&self, expected: Dimension) -> UnitResult<()> {
        if self.dimension() == expected {
            Ok(())
        } else {
            Err(UnitError::IncompatibleDimension {
                expected,
                found: self.dimension(),
            })
        }
    }

    /// Add two quantities of the same dimension; the result keeps `self`'s unit
    pub fn checked_add(&self, other: &Quantity) -> UnitResult<Quantity> {
        let rhs = other.value_in(self.unit)?;
        Ok(Quantity::new(self.value + rhs, self.unit))
    }

    /// Subtract two quantities of the same dimension; the result keeps `self`'s unit
    pub fn checked_sub(&self, other: &Quantity) -> UnitResult<Quantity> {
        let rhs = other.value_in(self.unit)?;
        Ok(Quantity::new(self.value - rhs, self.unit))
    }

    /// Multiply two quantities (length × length = area, area × length = volume)
    pub fn checked_mul(&self, other: &Quantity) -> UnitResult<Quantity> {
        let dimension = self.dimension().product(other.dimension()).ok_or(
            UnitError::IncompatibleDimension {
                expected: Dimension::Length,
                found: other.dimension(),
            },
        )?;

        if self.dimension() == Dimension::Dimensionless {
            return Ok(Quantity::new(self.value * other.value, other.unit));
        }
        if other.dimension() == Dimension::Dimensionless {
            return Ok(Quantity::new(self.value * other.value, self.unit));
        }

        // Keep the caller's length unit when the product has a named unit for it
        let length_unit = match (self.dimension(), other.dimension()) {
            (Dimension::Length, _) => Some(self.unit),
            (Dimension::Area, _) => self.unit.side(),
            _ => None,
        };
        let target = length_unit
            .and_then(|u| match dimension {
                Dimension::Area => u.squared(),
                Dimension::Volume => u.cubed(),
                _ => None,
            })
            .unwrap_or(dimension.si_unit());

        let si = self.value * self.unit.si_scale() * other.value * other.unit.si_scale();
        Ok(Quantity::new(si / target.si_scale(), target))
    }

    /// Absolute value
    pub fn abs(&self) -> Quantity {
        Quantity::new(self.value.abs(), self.unit)
    }

    /// Compare two quantities of the same dimension within a relative tolerance
    pub fn approx_eq(&self, other: &Quantity, rel_tolerance: f64) -> bool {
        match other.value_in(self.unit) {
            Ok(rhs) => {
                let scale = self.value.abs().max(rhs.abs()).max(f64::MIN_POSITIVE);
                (self.value - rhs).abs() <= rel_tolerance * scale
            }
            Err(_) => false,
        }
    }
}

impl Mul<f64> for Quantity {
    type Output = Quantity;

    fn mul(self, rhs: f64) -> Quantity {
        Quantity::new(self.value * rhs, self.unit)
    }
}

impl Div<f64> for Quantity {
    type Output = Quantity;

    fn div(self, rhs: f64) -> Quantity {
        Quantity::new(self.value / rhs, self.unit)
    }
}

impl Neg for Quantity {
    type Output = Quantity;

    fn neg(self) -> Quantity {
        Quantity::new(-self.value, self.unit)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit == Unit::Unitless {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{} {}", self.value, self.unit)
        }
    }
}

impl FromStr for Quantity {
    type Err = UnitError;

    /// Parse `"<number> <unit>"`; a bare number is rejected rather than
    /// assigned a default unit.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
            .unwrap_or(s.len());
        let (number, unit) = s.split_at(split);
        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| UnitError::UnknownUnit(s.to_string()))?;

        if unit.trim().is_empty() {
            return Err(UnitError::MissingUnit(s.to_string()));
        }
        let unit: Unit = unit.parse()?;
        Quantity::finite(value, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_convert_length() {
        assert_relative_eq!(convert(10.0, Unit::Millimeter, Unit::Meter).unwrap(), 0.01);
        assert_relative_eq!(convert(1.0, Unit::Inch, Unit::Millimeter).unwrap(), 25.4);
    }

    #[test]
    fn test_convert_incompatible() {
        let err = convert(1.0, Unit::Meter, Unit::Degree).unwrap_err();
        assert_eq!(
            err,
            UnitError::IncompatibleDimension {
                expected: Dimension::Angle,
                found: Dimension::Length,
            }
        );
    }

    #[test]
    fn test_round_trip_recovers_value() {
        for unit in Unit::ALL {
            let original = Quantity::new(123.456, unit);
            let canonical = original.to(unit.dimension().si_unit()).unwrap();
            let back = canonical.to(unit).unwrap();
            assert_relative_eq!(back.value(), original.value(), max_relative = 1e-12);
        }
    }

    #[test]
    fn test_checked_add_keeps_left_unit() {
        let a = Quantity::new(1.0, Unit::Meter);
        let b = Quantity::new(500.0, Unit::Millimeter);
        let sum = a.checked_add(&b).unwrap();
        assert_eq!(sum.unit(), Unit::Meter);
        assert_relative_eq!(sum.value(), 1.5);

        let angle = Quantity::new(1.0, Unit::Radian);
        assert!(a.checked_add(&angle).is_err());
    }

    #[test]
    fn test_checked_mul_dimensions() {
        let w = Quantity::new(10.0, Unit::Millimeter);
        let h = Quantity::new(5.0, Unit::Millimeter);
        let area = w.checked_mul(&h).unwrap();
        assert_eq!(area.unit(), Unit::SquareMillimeter);
        assert_relative_eq!(area.value(), 50.0);

        let depth = Quantity::new(2.0, Unit::Millimeter);
        let volume = area.checked_mul(&depth).unwrap();
        assert_eq!(volume.unit(), Unit::CubicMillimeter);
        assert_relative_eq!(volume.value(), 100.0);

        let mixed = Quantity::new(1.0, Unit::Foot)
            .checked_mul(&Quantity::new(1.0, Unit::Meter))
            .unwrap();
        assert_eq!(mixed.unit(), Unit::SquareMeter);
        assert_relative_eq!(mixed.value(), 0.3048);

        let angle = Quantity::new(1.0, Unit::Radian);
        assert!(w.checked_mul(&angle).is_err());
    }

    #[test]
    fn test_parse() {
        let q: Quantity = "10 mm".parse().unwrap();
        assert_eq!(q, Quantity::new(10.0, Unit::Millimeter));

        let q: Quantity = "-2.5e1deg".parse().unwrap();
        assert_eq!(q, Quantity::new(-25.0, Unit::Degree));

        assert!(matches!(
            "10".parse::<Quantity>(),
            Err(UnitError::MissingUnit(_))
        ));
        assert!(matches!(
            "10 furlong".parse::<Quantity>(),
            Err(UnitError::UnknownUnit(_))
        ));
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(Quantity::finite(f64::NAN, Unit::Meter).is_err());
        assert!(convert(f64::INFINITY, Unit::Meter, Unit::Millimeter).is_err());
    }

    #[test]
    fn test_approx_eq_across_units() {
        let a = Quantity::new(1.0, Unit::Inch);
        let b = Quantity::new(25.4, Unit::Millimeter);
        assert!(a.approx_eq(&b, 1e-9));
        assert!(!a.approx_eq(&Quantity::new(1.0, Unit::Radian), 1e-9));
    }
}
