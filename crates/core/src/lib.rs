//! # uhroute core
//!
//! Core types and I/O shared by the uhroute routing crates.
//!
//! This crate provides:
//! - `Grid<T>`: georeferenced 2-D grid used for areas, fluxes and gridded output
//! - `GeoTransform`: cell index to latitude/longitude mapping
//! - Area-unit conversion and the physical constants used by routing
//! - The error taxonomy and soft warnings
//! - GeoTIFF and JSON I/O

pub mod error;
pub mod grid;
pub mod io;
pub mod units;
pub mod warning;

pub use error::{Error, Result};
pub use grid::{GeoTransform, Grid, GridElement};
pub use units::AreaUnits;
pub use warning::SoftWarning;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::grid::{GeoTransform, Grid, GridElement};
    pub use crate::units::AreaUnits;
    pub use crate::warning::SoftWarning;
    pub use crate::Algorithm;
}

/// Core trait for stateless transforms in uhroute.
///
/// Algorithms are pure functions that map an input to an output under a set
/// of parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;
}
