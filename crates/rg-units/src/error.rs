use thiserror::Error;

use crate::unit::Dimension;

/// Error type for quantity validation and conversion
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    #[error("Incompatible dimension: expected {expected}, found {found}")]
    IncompatibleDimension {
        expected: Dimension,
        found: Dimension,
    },

    #[error("Missing unit for value: {0}")]
    MissingUnit(String),

    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    #[error("Value is not finite: {0}")]
    NonFinite(f64),
}

/// Result type for unit operations
pub type UnitResult<T> = Result<T, UnitError>;
