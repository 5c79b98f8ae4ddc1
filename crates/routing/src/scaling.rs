//! Turning raw impulse responses into routing coefficients
//!
//! A raw unit hydrograph distributes a unit depth over time. Multiplying by
//! the fraction of each contributing cell that drains to the outlet and by
//! that cell's area gives a volumetric response; for mass output it is
//! further multiplied by water density and divided by the outlet cell's area.
//! This runs once at start-up, never inside the timestep loop.

use crate::registry::CellIndex;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use uhroute_core::units::WATER_DENSITY;
use uhroute_core::{Error, Grid, Result};

/// Physical units of routed streamflow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputUnits {
    /// m3/s
    #[default]
    Volume,
    /// kg/m2*s over the outlet cell
    Mass,
}

impl OutputUnits {
    pub fn label(self) -> &'static str {
        match self {
            OutputUnits::Volume => "m3/s",
            OutputUnits::Mass => "kg/m2*s",
        }
    }
}

impl fmt::Display for OutputUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn area_at(area: &Grid<f64>, cell: CellIndex, what: &str) -> Result<f64> {
    if !area.contains(cell.y, cell.x) {
        return Err(Error::ShapeMismatch {
            what: format!("{} {} against area grid", what, cell),
            expected: vec![area.rows(), area.cols()],
            actual: vec![cell.y + 1, cell.x + 1],
        });
    }
    area.get(cell.y, cell.x)
}

/// Scale a raw `[L, K]` impulse response into routing coefficients.
///
/// `area` must already be in square meters.
pub fn scale_unit_hydrograph(
    raw: ArrayView2<'_, f64>,
    fraction: &[f64],
    cells: &[CellIndex],
    outlet: CellIndex,
    area: &Grid<f64>,
    units: OutputUnits,
) -> Result<Array2<f64>> {
    let (lags, n_cells) = raw.dim();
    if fraction.len() != n_cells || cells.len() != n_cells {
        return Err(Error::ShapeMismatch {
            what: format!("fraction/cell lists of outlet {}", outlet),
            expected: vec![n_cells, n_cells],
            actual: vec![fraction.len(), cells.len()],
        });
    }

    let mut weights = Vec::with_capacity(n_cells);
    for (&f, &cell) in fraction.iter().zip(cells) {
        weights.push(f * area_at(area, cell, "contributing cell")?);
    }

    let outlet_area = area_at(area, outlet, "outlet")?;
    if units == OutputUnits::Mass {
        if outlet_area == 0.0 {
            return Err(Error::InvalidUnitHydrograph {
                y: outlet.y,
                x: outlet.x,
                reason: "outlet cell has zero area".into(),
            });
        }
        for w in weights.iter_mut() {
            *w = *w * WATER_DENSITY / outlet_area;
        }
    }

    Ok(Array2::from_shape_fn((lags, n_cells), |(l, k)| raw[(l, k)] * weights[k]))
}
