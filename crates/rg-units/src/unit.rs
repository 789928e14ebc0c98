//! Units and their physical dimensions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnitError;

/// Physical dimension of a quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Length,
    Angle,
    Area,
    Volume,
    Mass,
    Dimensionless,
}

impl Dimension {
    /// The SI unit for this dimension
    pub fn si_unit(self) -> Unit {
        match self {
            Dimension::Length => Unit::Meter,
            Dimension::Angle => Unit::Radian,
            Dimension::Area => Unit::SquareMeter,
            Dimension::Volume => Unit::CubicMeter,
            Dimension::Mass => Unit::Kilogram,
            Dimension::Dimensionless => Unit::Unitless,
        }
    }

    /// Dimension of the product of two dimensions, if it is representable
    pub fn product(self, other: Dimension) -> Option<Dimension> {
        use Dimension::*;
        match (self, other) {
            (Dimensionless, d) | (d, Dimensionless) => Some(d),
            (Length, Length) => Some(Area),
            (Length, Area) | (Area, Length) => Some(Volume),
            _ => None,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::Length => "length",
            Dimension::Angle => "angle",
            Dimension::Area => "area",
            Dimension::Volume => "volume",
            Dimension::Mass => "mass",
            Dimension::Dimensionless => "dimensionless",
        };
        f.write_str(name)
    }
}

/// A unit of measure
///
/// Every unit is a pure scale of its dimension's SI unit; no unit here needs
/// an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    // Length
    Meter,
    Centimeter,
    Millimeter,
    Micrometer,
    Inch,
    Foot,
    // Angle
    Radian,
    Degree,
    // Area
    SquareMeter,
    SquareCentimeter,
    SquareMillimeter,
    SquareInch,
    // Volume
    CubicMeter,
    CubicCentimeter,
    CubicMillimeter,
    CubicInch,
    // Mass
    Kilogram,
    Gram,
    Pound,
    // Pure number
    Unitless,
}

const INCH: f64 = 0.0254;

impl Unit {
    /// All known units
    pub const ALL: [Unit; 20] = [
        Unit::Meter,
        Unit::Centimeter,
        Unit::Millimeter,
        Unit::Micrometer,
        Unit::Inch,
        Unit::Foot,
        Unit::Radian,
        Unit::Degree,
        Unit::SquareMeter,
        Unit::SquareCentimeter,
        Unit::SquareMillimeter,
        Unit::SquareInch,
        Unit::CubicMeter,
        Unit::CubicCentimeter,
        Unit::CubicMillimeter,
        Unit::CubicInch,
        Unit::Kilogram,
        Unit::Gram,
        Unit::Pound,
        Unit::Unitless,
    ];

    /// The physical dimension measured by this unit
    pub fn dimension(self) -> Dimension {
        match self {
            Unit::Meter
            | Unit::Centimeter
            | Unit::Millimeter
            | Unit::Micrometer
            | Unit::Inch
            | Unit::Foot => Dimension::Length,
            Unit::Radian | Unit::Degree => Dimension::Angle,
            Unit::SquareMeter
            | Unit::SquareCentimeter
            | Unit::SquareMillimeter
            | Unit::SquareInch => Dimension::Area,
            Unit::CubicMeter
            | Unit::CubicCentimeter
            | Unit::CubicMillimeter
            | Unit::CubicInch => Dimension::Volume,
            Unit::Kilogram | Unit::Gram | Unit::Pound => Dimension::Mass,
            Unit::Unitless => Dimension::Dimensionless,
        }
    }

    /// Factor that converts a value in this unit to the dimension's SI unit
    pub fn si_scale(self) -> f64 {
        match self {
            Unit::Meter => 1.0,
            Unit::Centimeter => 1e-2,
            Unit::Millimeter => 1e-3,
            Unit::Micrometer => 1e-6,
            Unit::Inch => INCH,
            Unit::Foot => 0.3048,
            Unit::Radian => 1.0,
            Unit::Degree => std::f64::consts::PI / 180.0,
            Unit::SquareMeter => 1.0,
            Unit::SquareCentimeter => 1e-4,
            Unit::SquareMillimeter => 1e-6,
            Unit::SquareInch => INCH * INCH,
            Unit::CubicMeter => 1.0,
            Unit::CubicCentimeter => 1e-6,
            Unit::CubicMillimeter => 1e-9,
            Unit::CubicInch => INCH * INCH * INCH,
            Unit::Kilogram => 1.0,
            Unit::Gram => 1e-3,
            Unit::Pound => 0.453_592_37,
            Unit::Unitless => 1.0,
        }
    }

    /// Short symbol, as accepted by `FromStr`
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Meter => "m",
            Unit::Centimeter => "cm",
            Unit::Millimeter => "mm",
            Unit::Micrometer => "um",
            Unit::Inch => "in",
            Unit::Foot => "ft",
            Unit::Radian => "rad",
            Unit::Degree => "deg",
            Unit::SquareMeter => "m^2",
            Unit::SquareCentimeter => "cm^2",
            Unit::SquareMillimeter => "mm^2",
            Unit::SquareInch => "in^2",
            Unit::CubicMeter => "m^3",
            Unit::CubicCentimeter => "cm^3",
            Unit::CubicMillimeter => "mm^3",
            Unit::CubicInch => "in^3",
            Unit::Kilogram => "kg",
            Unit::Gram => "g",
            Unit::Pound => "lb",
            Unit::Unitless => "",
        }
    }

    /// Area unit whose side is this length unit
    pub(crate) fn squared(self) -> Option<Unit> {
        match self {
            Unit::Meter => Some(Unit::SquareMeter),
            Unit::Centimeter => Some(Unit::SquareCentimeter),
            Unit::Millimeter => Some(Unit::SquareMillimeter),
            Unit::Inch => Some(Unit::SquareInch),
            _ => None,
        }
    }

    /// Volume unit whose edge is this length unit
    pub(crate) fn cubed(self) -> Option<Unit> {
        match self {
            Unit::Meter => Some(Unit::CubicMeter),
            Unit::Centimeter => Some(Unit::CubicCentimeter),
            Unit::Millimeter => Some(Unit::CubicMillimeter),
            Unit::Inch => Some(Unit::CubicInch),
            _ => None,
        }
    }

    /// Length unit that squares to this area unit
    pub(crate) fn side(self) -> Option<Unit> {
        Unit::ALL
            .into_iter()
            .find(|u| u.dimension() == Dimension::Length && u.squared() == Some(self))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let unit = match s {
            "m" | "meter" | "meters" => Unit::Meter,
            "cm" | "centimeter" | "centimeters" => Unit::Centimeter,
            "mm" | "millimeter" | "millimeters" => Unit::Millimeter,
            "um" | "µm" | "micrometer" | "micrometers" => Unit::Micrometer,
            "in" | "inch" | "inches" => Unit::Inch,
            "ft" | "foot" | "feet" => Unit::Foot,
            "rad" | "radian" | "radians" => Unit::Radian,
            "deg" | "°" | "degree" | "degrees" => Unit::Degree,
            "m^2" | "m2" => Unit::SquareMeter,
            "cm^2" | "cm2" => Unit::SquareCentimeter,
            "mm^2" | "mm2" => Unit::SquareMillimeter,
            "in^2" | "in2" => Unit::SquareInch,
            "m^3" | "m3" => Unit::CubicMeter,
            "cm^3" | "cm3" => Unit::CubicCentimeter,
            "mm^3" | "mm3" => Unit::CubicMillimeter,
            "in^3" | "in3" => Unit::CubicInch,
            "kg" | "kilogram" | "kilograms" => Unit::Kilogram,
            "g" | "gram" | "grams" => Unit::Gram,
            "lb" | "pound" | "pounds" => Unit::Pound,
            "" => return Err(UnitError::MissingUnit(String::new())),
            other => return Err(UnitError::UnknownUnit(other.to_string())),
        };
        Ok(unit)
    }
}
