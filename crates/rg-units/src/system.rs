//! Unit systems

use serde::{Deserialize, Serialize};

use crate::error::{UnitError, UnitResult};
use crate::quantity::Quantity;
use crate::unit::{Dimension, Unit};

/// The unit used for each dimension when talking to a geometry server
///
/// Every value crossing into a request is converted to this system before
/// serialization, and every value coming back is tagged with it on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSystem {
    pub length: Unit,
    pub angle: Unit,
    pub area: Unit,
    pub volume: Unit,
    pub mass: Unit,
}

impl Default for UnitSystem {
    fn default() -> Self {
        Self::si()
    }
}

impl UnitSystem {
    /// Meters, radians, square and cubic meters, kilograms
    pub fn si() -> Self {
        Self {
            length: Unit::Meter,
            angle: Unit::Radian,
            area: Unit::SquareMeter,
            volume: Unit::CubicMeter,
            mass: Unit::Kilogram,
        }
    }

    /// Millimeter-based system (millimeters, radians, mm², mm³, kilograms)
    pub fn millimeter() -> Self {
        Self {
            length: Unit::Millimeter,
            angle: Unit::Radian,
            area: Unit::SquareMillimeter,
            volume: Unit::CubicMillimeter,
            mass: Unit::Kilogram,
        }
    }

    /// Unit this system uses for a dimension
    pub fn unit_for(&self, dimension: Dimension) -> Unit {
        match dimension {
            Dimension::Length => self.length,
            Dimension::Angle => self.angle,
            Dimension::Area => self.area,
            Dimension::Volume => self.volume,
            Dimension::Mass => self.mass,
            Dimension::Dimensionless => Unit::Unitless,
        }
    }

    /// Bare magnitude of `quantity` in this system
    pub fn canonical(&self, quantity: Quantity) -> UnitResult<f64> {
        quantity.value_in(self.unit_for(quantity.dimension()))
    }

    /// Bare magnitude of `quantity`, requiring a specific dimension
    pub fn canonical_as(&self, quantity: Quantity, dimension: Dimension) -> UnitResult<f64> {
        quantity.expect_dimension(dimension)?;
        self.canonical(quantity)
    }

    /// Tag a value received from the server with this system's unit
    pub fn tag(&self, value: f64, dimension: Dimension) -> Quantity {
        Quantity::new(value, self.unit_for(dimension))
    }

    /// Check that every slot holds a unit of the right dimension
    pub fn validate(&self) -> UnitResult<()> {
        let slots = [
            (self.length, Dimension::Length),
            (self.angle, Dimension::Angle),
            (self.area, Dimension::Area),
            (self.volume, Dimension::Volume),
            (self.mass, Dimension::Mass),
        ];
        for (unit, expected) in slots {
            if unit.dimension() != expected {
                return Err(UnitError::IncompatibleDimension {
                    expected,
                    found: unit.dimension(),
                });
            }
        }
        Ok(())
    }
}
