//! Error types for uhroute

use thiserror::Error;

/// Main error type for uhroute operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required external resource is missing or unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Shape mismatch in {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Invalid unit hydrograph for outlet ({y}, {x}): {reason}")]
    InvalidUnitHydrograph { y: usize, x: usize, reason: String },

    #[error("No restart state for outlet ({y}, {x})")]
    MissingState { y: usize, x: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("State can only be restored before the first timestep")]
    StateAfterStart,

    #[error("Invalid grid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in grid of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shape mismatch between two 2-D shapes
    pub fn shape_mismatch(
        what: impl Into<String>,
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> Self {
        Error::ShapeMismatch {
            what: what.into(),
            expected: vec![expected.0, expected.1],
            actual: vec![actual.0, actual.1],
        }
    }
}

/// Result type alias for uhroute operations
pub type Result<T> = std::result::Result<T, Error>;
