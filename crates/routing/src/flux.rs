//! Combining land-model runoff into a volumetric flux grid
//!
//! Surface runoff and baseflow arrive as depth totals per timestep. Their sum
//! is divided by a single divisor derived from the output frequency, the
//! averaging mode and the depth units:
//!
//! | frequency | mode          | seconds |
//! |-----------|---------------|---------|
//! | hourly    | instantaneous | 1200    |
//! | hourly    | averaged      | 3600    |
//! | daily     | averaged      | 86400   |
//! | other     | other         | 3600 (warning) |
//!
//! times 1000 for mm or 100 for cm (anything else: mm, with a warning).

use serde::{Deserialize, Serialize};
use uhroute_core::units::{CM_PER_METER, MM_PER_METER, SECS_PER_DAY, SECS_PER_HOUR};
use uhroute_core::warning::emit_all;
use uhroute_core::{Algorithm, Error, Grid, Result, SoftWarning};

/// Hourly instantaneous output is assumed to be sampled from a 20 minute
/// land-model step.
pub const HOURLY_INSTANTANEOUS_SECS: f64 = 1200.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFrequency {
    Hourly,
    Daily,
    Other(String),
}

impl OutputFrequency {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" => OutputFrequency::Hourly,
            "daily" => OutputFrequency::Daily,
            _ => OutputFrequency::Other(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AveragingMode {
    Instantaneous,
    Averaged,
    Other(String),
}

impl AveragingMode {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "instantaneous" => AveragingMode::Instantaneous,
            "averaged" => AveragingMode::Averaged,
            _ => AveragingMode::Other(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepthUnits {
    Millimeters,
    Centimeters,
    Other(String),
}

impl DepthUnits {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "mm" => DepthUnits::Millimeters,
            "cm" => DepthUnits::Centimeters,
            _ => DepthUnits::Other(s.to_string()),
        }
    }
}

/// Metadata describing how a flux timestep was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluxMetadata {
    pub output_frequency: String,
    pub output_mode: String,
    pub depth_units: String,
}

impl FluxMetadata {
    pub fn new(
        output_frequency: impl Into<String>,
        output_mode: impl Into<String>,
        depth_units: impl Into<String>,
    ) -> Self {
        Self {
            output_frequency: output_frequency.into(),
            output_mode: output_mode.into(),
            depth_units: depth_units.into(),
        }
    }
}

/// Seconds per flux accumulation period, `None` outside the policy table
pub fn period_seconds(frequency: &OutputFrequency, mode: &AveragingMode) -> Option<f64> {
    match (frequency, mode) {
        (OutputFrequency::Hourly, AveragingMode::Instantaneous) => Some(HOURLY_INSTANTANEOUS_SECS),
        (OutputFrequency::Hourly, AveragingMode::Averaged) => Some(SECS_PER_HOUR),
        (OutputFrequency::Daily, AveragingMode::Averaged) => Some(SECS_PER_DAY),
        _ => None,
    }
}

/// Depth units per meter, `None` for unrecognized units
pub fn depth_factor(units: &DepthUnits) -> Option<f64> {
    match units {
        DepthUnits::Millimeters => Some(MM_PER_METER),
        DepthUnits::Centimeters => Some(CM_PER_METER),
        DepthUnits::Other(_) => None,
    }
}

/// Converts runoff + baseflow depth grids to a volumetric rate grid.
///
/// Built once per distinct [`FluxMetadata`]; soft warnings are collected at
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxCombiner {
    divisor: f64,
    warnings: Vec<SoftWarning>,
}

impl FluxCombiner {
    pub fn new(metadata: &FluxMetadata) -> Self {
        let frequency = OutputFrequency::parse(&metadata.output_frequency);
        let mode = AveragingMode::parse(&metadata.output_mode);
        let units = DepthUnits::parse(&metadata.depth_units);

        let mut warnings = Vec::new();

        let secs = period_seconds(&frequency, &mode).unwrap_or_else(|| {
            warnings.push(SoftWarning::UnrecognizedFrequency {
                frequency: metadata.output_frequency.clone(),
                mode: metadata.output_mode.clone(),
            });
            SECS_PER_HOUR
        });
        let factor = depth_factor(&units).unwrap_or_else(|| {
            warnings.push(SoftWarning::UnrecognizedDepthUnits(
                metadata.depth_units.clone(),
            ));
            MM_PER_METER
        });

        Self {
            divisor: secs * factor,
            warnings,
        }
    }

    pub fn divisor(&self) -> f64 {
        self.divisor
    }

    pub fn warnings(&self) -> &[SoftWarning] {
        &self.warnings
    }

    /// `(runoff + baseflow) / divisor`, cell by cell
    pub fn combine(&self, runoff: &Grid<f64>, baseflow: &Grid<f64>) -> Result<Grid<f64>> {
        let div = self.divisor;
        runoff.zip_map(baseflow, "runoff vs baseflow grid", |r, b| (r + b) / div)
    }
}

impl Algorithm for FluxCombiner {
    type Input = (Grid<f64>, Grid<f64>);
    type Output = Grid<f64>;
    type Params = FluxMetadata;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flux Combiner"
    }

    fn description(&self) -> &'static str {
        "Combine surface runoff and baseflow depths into a volumetric flux rate"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        combine(&input.0, &input.1, &params)
    }
}

/// One-shot combine: build the divisor from `metadata`, report any soft
/// warnings and combine the two grids.
pub fn combine(runoff: &Grid<f64>, baseflow: &Grid<f64>, metadata: &FluxMetadata) -> Result<Grid<f64>> {
    let combiner = FluxCombiner::new(metadata);
    emit_all(combiner.warnings());
    combiner.combine(runoff, baseflow)
}
