//! # uhroute routing
//!
//! Streamflow routing by unit-hydrograph convolution.
//!
//! Every outlet owns a ring of pending streamflow, one slot per lag of its
//! unit hydrograph. Each timestep the combined land-surface flux is spread
//! over the ring through the outlet's coefficient matrix, the slot due now is
//! emitted and the ring rotates by one.
//!
//! ## Modules
//!
//! - **ring**: circular accumulator of in-transit water
//! - **registry**: outlets with their coefficients and rings, in registration order
//! - **scaling**: raw impulse responses to volume or mass coefficients
//! - **flux**: runoff + baseflow depth grids to a volumetric flux grid
//! - **engine**: one convolution step over every outlet, sequential or parallel
//! - **snapshot**: capture and restore of ring state
//! - **output**: flat or gridded placement of emitted values
//! - **files**, **config**, **router**: file contracts and the run driver

pub mod config;
pub mod engine;
pub mod files;
pub mod flux;
pub(crate) mod maybe_rayon;
pub mod output;
pub mod registry;
pub mod ring;
pub mod router;
pub mod scaling;
pub mod snapshot;

pub use config::RunConfig;
pub use engine::{ConvolutionEngine, ProcessingMode, StepOutput};
pub use flux::{FluxCombiner, FluxMetadata};
pub use output::{Assembled, LayoutKind, OutputAssembler};
pub use registry::{CellIndex, Outlet, OutletKey, UnitHydrograph, UnitHydrographRegistry};
pub use ring::Ring;
pub use router::{Router, RunSummary};
pub use scaling::OutputUnits;
pub use snapshot::{Snapshot, SnapshotEntry};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::RunConfig;
    pub use crate::engine::{ConvolutionEngine, ProcessingMode, StepOutput};
    pub use crate::flux::{combine, FluxCombiner, FluxMetadata};
    pub use crate::output::{Assembled, LayoutKind, OutputAssembler};
    pub use crate::registry::{CellIndex, OutletKey, UnitHydrograph, UnitHydrographRegistry};
    pub use crate::router::{load_registry, Router, RunSummary};
    pub use crate::scaling::{scale_unit_hydrograph, OutputUnits};
    pub use crate::snapshot::{Snapshot, SnapshotEntry};
    pub use uhroute_core::prelude::*;
}
