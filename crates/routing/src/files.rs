//! On-disk contracts for grids, unit hydrographs, flux records and outputs
//!
//! Grids travel as GeoTIFF, everything else as JSON documents.

use crate::flux::FluxMetadata;
use crate::registry::{CellIndex, OutletMetadata, UnitHydrograph};
use crate::scaling::{scale_unit_hydrograph, OutputUnits};
use crate::snapshot::Snapshot;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uhroute_core::io::{read_geotiff, read_json};
use uhroute_core::units::{area_grid_to_square_meters, SECS_PER_DAY};
use uhroute_core::{Error, Grid, Result};

/// Time axis units that are converted from seconds to days
pub const SECONDS_SINCE_YEAR_ZERO: &str = "seconds since 0-01-01 00:00:00";

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

/// Timestep label of a flux record: its file stem
pub fn timestep_label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Grid descriptor: where the cell areas live and in which units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDescriptor {
    /// GeoTIFF of cell areas, relative to the descriptor
    pub area: PathBuf,
    pub area_units: String,
}

impl GridDescriptor {
    /// Read the descriptor and return the area grid in square meters.
    ///
    /// The grid keeps the GeoTIFF's georeferencing, which provides the
    /// cell-centre coordinates of gridded output.
    pub fn load_area(path: &Path) -> Result<Grid<f64>> {
        let descriptor: GridDescriptor = read_json(path)?;
        let area_path = resolve(parent_dir(path), &descriptor.area);
        let area: Grid<f64> = read_geotiff(&area_path)?;
        Ok(area_grid_to_square_meters(&area, &descriptor.area_units))
    }
}

/// One outlet's unit-hydrograph file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitHydrographFile {
    pub outlet_y: usize,
    pub outlet_x: usize,
    pub outlet_lat: f64,
    pub outlet_lon: f64,
    /// Contributing cell rows
    pub yi: Vec<usize>,
    /// Contributing cell columns
    pub xi: Vec<usize>,
    /// Raw impulse response, `[lag][cell]`
    pub unit_hydrograph: Vec<Vec<f64>>,
    /// Fraction of each contributing cell draining to this outlet
    pub fraction: Vec<f64>,
    /// Lag offsets, one per row of `unit_hydrograph`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_units: Option<String>,
}

impl UnitHydrographFile {
    pub fn read(path: &Path) -> Result<Self> {
        read_json(path)
    }

    pub fn outlet(&self) -> CellIndex {
        CellIndex::new(self.outlet_y, self.outlet_x)
    }

    /// Lag offsets in days
    pub fn time_offsets_days(&self) -> Option<Vec<f64>> {
        let time = self.time.as_ref()?;
        match self.time_units.as_deref() {
            Some(SECONDS_SINCE_YEAR_ZERO) => Some(time.iter().map(|t| t / SECS_PER_DAY).collect()),
            _ => Some(time.clone()),
        }
    }

    pub fn cells(&self) -> Result<Vec<CellIndex>> {
        if self.yi.len() != self.xi.len() {
            return Err(Error::ShapeMismatch {
                what: format!("yi/xi of outlet {}", self.outlet()),
                expected: vec![self.yi.len()],
                actual: vec![self.xi.len()],
            });
        }
        Ok(self
            .yi
            .iter()
            .zip(&self.xi)
            .map(|(&y, &x)| CellIndex::new(y, x))
            .collect())
    }

    /// Raw response as an `[L, K]` matrix
    pub fn raw_matrix(&self) -> Result<Array2<f64>> {
        let n_cells = self.yi.len();
        let lags = self.unit_hydrograph.len();
        if let Some((lag, row)) = self
            .unit_hydrograph
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != n_cells)
        {
            return Err(Error::InvalidUnitHydrograph {
                y: self.outlet_y,
                x: self.outlet_x,
                reason: format!("lag {} has {} values for {} cells", lag, row.len(), n_cells),
            });
        }
        let flat: Vec<f64> = self.unit_hydrograph.iter().flatten().copied().collect();
        Array2::from_shape_vec((lags, n_cells), flat).map_err(|e| Error::Other(e.to_string()))
    }

    /// Scale against `area` (square meters) into a registrable unit hydrograph
    pub fn into_unit_hydrograph(self, area: &Grid<f64>, units: OutputUnits) -> Result<UnitHydrograph> {
        let cells = self.cells()?;
        let raw = self.raw_matrix()?;
        let coefficients =
            scale_unit_hydrograph(raw.view(), &self.fraction, &cells, self.outlet(), area, units)?;
        Ok(UnitHydrograph {
            key: self.outlet(),
            lat: self.outlet_lat,
            lon: self.outlet_lon,
            time_offsets: self.time_offsets_days(),
            cells,
            coefficients,
        })
    }
}

/// Time-axis attributes carried through to outputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar: Option<String>,
}

/// One timestep of land-model output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluxRecord {
    pub time: f64,
    #[serde(flatten)]
    pub attributes: TimeAttributes,
    #[serde(flatten)]
    pub metadata: FluxMetadata,
    /// Surface runoff GeoTIFF, relative to the record
    pub runoff: PathBuf,
    /// Subsurface runoff GeoTIFF, relative to the record
    pub baseflow: PathBuf,
}

impl FluxRecord {
    pub fn read(path: &Path) -> Result<Self> {
        read_json(path)
    }

    /// Read the runoff and baseflow grids, resolving paths against `record_path`
    pub fn load_grids(&self, record_path: &Path) -> Result<(Grid<f64>, Grid<f64>)> {
        let base = parent_dir(record_path);
        let runoff = read_geotiff(resolve(base, &self.runoff))?;
        let baseflow = read_geotiff(resolve(base, &self.baseflow))?;
        Ok((runoff, baseflow))
    }
}

/// Flat-layout streamflow for one timestep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatStreamflow {
    pub description: String,
    pub time: f64,
    #[serde(flatten)]
    pub attributes: TimeAttributes,
    pub units: String,
    #[serde(flatten)]
    pub outlets: OutletMetadata,
    pub streamflow: Vec<f64>,
}

/// Sidecar describing a gridded streamflow GeoTIFF
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridStreamflow {
    pub description: String,
    pub time: f64,
    #[serde(flatten)]
    pub attributes: TimeAttributes,
    pub units: String,
    /// Cell-centre latitude of each grid row
    pub latitudes: Vec<f64>,
    /// Cell-centre longitude of each grid column
    pub longitudes: Vec<f64>,
    /// GeoTIFF file name next to this sidecar
    pub grid: PathBuf,
}

/// State file: a snapshot plus the metadata needed to interpret it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub description: String,
    #[serde(flatten)]
    pub attributes: TimeAttributes,
    pub units: String,
    pub state: Snapshot,
}

impl StateFile {
    pub fn read(path: &Path) -> Result<Self> {
        read_json(path)
    }
}
