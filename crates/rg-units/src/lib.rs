//! Physical Quantities and Units
//!
//! This crate provides:
//! - Physical dimensions and the units that measure them
//! - Dimension-checked quantities with unit-consistent arithmetic
//! - Typed `Distance` and `Angle` wrappers validated at construction
//! - Unit systems describing the canonical units a geometry server expects

mod error;
mod measure;
mod quantity;
mod system;
mod unit;

pub use error::{UnitError, UnitResult};
pub use measure::{Angle, Distance};
pub use quantity::{Quantity, convert};
pub use system::UnitSystem;
pub use unit::{Dimension, Unit};
