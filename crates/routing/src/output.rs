//! Projecting per-outlet values into an output layout

use crate::registry::{CellIndex, UnitHydrographRegistry};
use serde::{Deserialize, Serialize};
use uhroute_core::{Error, GeoTransform, Grid, Result};

/// Output layout requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    /// One value per outlet, in registry order
    Flat,
    /// Values placed at each outlet's cell of the routing grid
    Grid,
    /// Routing runs but no streamflow is written
    None,
}

/// Per-outlet values placed into a layout
#[derive(Debug, Clone, PartialEq)]
pub enum Assembled {
    Flat(Vec<f64>),
    Grid(Grid<f64>),
}

/// Scatters emitted values into the chosen layout.
///
/// Holds only the outlet positions; it never looks at ring state.
#[derive(Debug, Clone)]
pub struct OutputAssembler {
    kind: LayoutKind,
    outlets: Vec<CellIndex>,
    shape: (usize, usize),
    transform: GeoTransform,
}

impl OutputAssembler {
    /// Flat layout in registry order
    pub fn flat(registry: &UnitHydrographRegistry) -> Self {
        Self {
            kind: LayoutKind::Flat,
            outlets: registry.keys().collect(),
            shape: (registry.len(), 1),
            transform: GeoTransform::default(),
        }
    }

    /// No streamflow output; emitted values still pass through `assemble`
    pub fn none(registry: &UnitHydrographRegistry) -> Self {
        Self {
            kind: LayoutKind::None,
            ..Self::flat(registry)
        }
    }

    /// Grid layout of `shape`; every outlet must fall inside it
    pub fn grid(
        registry: &UnitHydrographRegistry,
        shape: (usize, usize),
        transform: GeoTransform,
    ) -> Result<Self> {
        if let Some(bad) = registry.keys().find(|k| k.y >= shape.0 || k.x >= shape.1) {
            return Err(Error::ShapeMismatch {
                what: format!("outlet {} against output grid", bad),
                expected: vec![shape.0, shape.1],
                actual: vec![bad.y + 1, bad.x + 1],
            });
        }
        Ok(Self {
            kind: LayoutKind::Grid,
            outlets: registry.keys().collect(),
            shape,
            transform,
        })
    }

    /// Cell-centre latitudes (one per row) and longitudes (one per column)
    pub fn grid_axes(&self) -> (Vec<f64>, Vec<f64>) {
        let (rows, cols) = self.shape;
        let lats = (0..rows).map(|r| self.transform.cell_center(r, 0).1).collect();
        let lons = (0..cols).map(|c| self.transform.cell_center(0, c).0).collect();
        (lats, lons)
    }

    pub fn kind(&self) -> LayoutKind {
        self.kind
    }

    pub fn assemble(&self, emitted: &[f64]) -> Result<Assembled> {
        if emitted.len() != self.outlets.len() {
            return Err(Error::ShapeMismatch {
                what: "emitted values against outlets".into(),
                expected: vec![self.outlets.len()],
                actual: vec![emitted.len()],
            });
        }

        match self.kind {
            LayoutKind::Grid => {
                let mut grid = Grid::new(self.shape.0, self.shape.1).with_transform(self.transform);
                let data = grid.data_mut();
                for (cell, &v) in self.outlets.iter().zip(emitted) {
                    data[(cell.y, cell.x)] = v;
                }
                Ok(Assembled::Grid(grid))
            }
            LayoutKind::Flat | LayoutKind::None => Ok(Assembled::Flat(emitted.to_vec())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::UnitHydrograph;
    use ndarray::array;

    fn registry() -> UnitHydrographRegistry {
        let mut reg = UnitHydrographRegistry::new();
        for (y, x) in [(2, 1), (0, 0)] {
            reg.register(
                UnitHydrograph {
                    key: CellIndex::new(y, x),
                    lat: 0.0,
                    lon: 0.0,
                    cells: vec![CellIndex::new(0, 0)],
                    coefficients: array![[1.0]],
                    time_offsets: None,
                },
                None,
            )
            .unwrap();
        }
        reg
    }

    #[test]
    fn test_flat_keeps_registry_order() {
        let asm = OutputAssembler::flat(&registry());
        assert_eq!(asm.assemble(&[4.0, 5.0]).unwrap(), Assembled::Flat(vec![4.0, 5.0]));
    }

    #[test]
    fn test_grid_places_values_and_fills_zero() {
        let asm = OutputAssembler::grid(&registry(), (3, 2), GeoTransform::default()).unwrap();
        let Assembled::Grid(grid) = asm.assemble(&[4.0, 5.0]).unwrap() else {
            panic!("expected grid output");
        };
        assert_eq!(grid.get(2, 1).unwrap(), 4.0);
        assert_eq!(grid.get(0, 0).unwrap(), 5.0);
        assert_eq!(grid.get(1, 1).unwrap(), 0.0);
        assert_eq!(grid.finite_sum(), 9.0);
    }

    #[test]
    fn test_grid_axes() {
        let gt = GeoTransform::new(-122.0, 46.0, 0.5, -0.5);
        let asm = OutputAssembler::grid(&registry(), (3, 2), gt).unwrap();
        let (lats, lons) = asm.grid_axes();
        assert_eq!(lats, vec![45.75, 45.25, 44.75]);
        assert_eq!(lons, vec![-121.75, -121.25]);
    }

    #[test]
    fn test_grid_rejects_outlet_outside() {
        let err = OutputAssembler::grid(&registry(), (2, 2), GeoTransform::default()).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_none_layout() {
        let asm = OutputAssembler::none(&registry());
        assert_eq!(asm.kind(), LayoutKind::None);
        assert_eq!(asm.assemble(&[1.0, 2.0]).unwrap(), Assembled::Flat(vec![1.0, 2.0]));
    }

    #[test]
    fn test_length_mismatch() {
        let asm = OutputAssembler::flat(&registry());
        assert!(asm.assemble(&[1.0]).is_err());
    }
}
