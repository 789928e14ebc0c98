//! Dimension-checked quantity wrappers
//!
//! A `Distance` or `Angle` can only be constructed from a quantity of the
//! matching dimension, so operation parameters typed with them are validated
//! at construction rather than at call time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{UnitError, UnitResult};
use crate::quantity::Quantity;
use crate::unit::{Dimension, Unit};

macro_rules! dimensioned {
    ($name:ident, $dimension:expr) => {
        impl $name {
            /// Wrap a quantity, failing if it has the wrong dimension
            pub fn new(quantity: Quantity) -> UnitResult<Self> {
                quantity.expect_dimension($dimension)?;
                if !quantity.value().is_finite() {
                    return Err(UnitError::NonFinite(quantity.value()));
                }
                Ok(Self(quantity))
            }

            /// Create from a value and a unit, failing if the unit has the wrong dimension
            pub fn with_unit(value: f64, unit: Unit) -> UnitResult<Self> {
                Self::new(Quantity::new(value, unit))
            }

            pub fn quantity(&self) -> Quantity {
                self.0
            }

            pub fn value(&self) -> f64 {
                self.0.value()
            }

            pub fn unit(&self) -> Unit {
                self.0.unit()
            }

            /// Magnitude expressed in `unit`
            pub fn value_in(&self, unit: Unit) -> UnitResult<f64> {
                self.0.value_in(unit)
            }
        }

        impl TryFrom<Quantity> for $name {
            type Error = UnitError;

            fn try_from(quantity: Quantity) -> UnitResult<Self> {
                Self::new(quantity)
            }
        }

        impl From<$name> for Quantity {
            fn from(value: $name) -> Quantity {
                value.0
            }
        }

        impl FromStr for $name {
            type Err = UnitError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s.parse()?)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

/// A length quantity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Quantity", into = "Quantity")]
pub struct Distance(Quantity);

dimensioned!(Distance, Dimension::Length);

impl Distance {
    pub fn meters(value: f64) -> Self {
        Self(Quantity::new(value, Unit::Meter))
    }

    pub fn mm(value: f64) -> Self {
        Self(Quantity::new(value, Unit::Millimeter))
    }

    pub fn cm(value: f64) -> Self {
        Self(Quantity::new(value, Unit::Centimeter))
    }

    pub fn inches(value: f64) -> Self {
        Self(Quantity::new(value, Unit::Inch))
    }

    /// Magnitude in meters
    pub fn as_meters(&self) -> f64 {
        self.0.value() * self.0.unit().si_scale()
    }

    /// Whether the magnitude is strictly positive
    pub fn is_positive(&self) -> bool {
        self.0.value() > 0.0
    }
}

/// An angle quantity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Quantity", into = "Quantity")]
pub struct Angle(Quantity);

dimensioned!(Angle, Dimension::Angle);

impl Angle {
    pub fn radians(value: f64) -> Self {
        Self(Quantity::new(value, Unit::Radian))
    }

    pub fn degrees(value: f64) -> Self {
        Self(Quantity::new(value, Unit::Degree))
    }

    /// Magnitude in radians
    pub fn as_radians(&self) -> f64 {
        self.0.value() * self.0.unit().si_scale()
    }
}
