//! Unit-hydrograph registry
//!
//! Owns every outlet's impulse-response coefficients, contributing cells and
//! convolution ring. Outlets keep their registration order, which is the
//! canonical order for flat output and for snapshots.

use crate::ring::Ring;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uhroute_core::{Error, Result};

/// Grid cell coordinates `(y, x)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellIndex {
    pub y: usize,
    pub x: usize,
}

impl CellIndex {
    pub const fn new(y: usize, x: usize) -> Self {
        Self { y, x }
    }
}

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.y, self.x)
    }
}

/// Outlets are addressed by their own cell coordinates
pub type OutletKey = CellIndex;

/// Everything needed to register one outlet.
///
/// `coefficients` are already scaled (see [`crate::scaling`]): row `l` holds
/// the weight of each contributing cell at lag `l`.
#[derive(Debug, Clone)]
pub struct UnitHydrograph {
    pub key: OutletKey,
    pub lat: f64,
    pub lon: f64,
    pub cells: Vec<CellIndex>,
    pub coefficients: Array2<f64>,
    /// Lag offsets in days, one per coefficient row
    pub time_offsets: Option<Vec<f64>>,
}

/// Result of advancing one outlet by one timestep
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    pub emitted: f64,
    pub state: Option<Vec<f64>>,
}

/// A registered outlet.
///
/// Only the ring changes after registration.
#[derive(Debug, Clone)]
pub struct Outlet {
    key: OutletKey,
    lat: f64,
    lon: f64,
    cells: Vec<CellIndex>,
    coefficients: Array2<f64>,
    time_offsets: Option<Vec<f64>>,
    ring: Ring,
}

impl Outlet {
    pub fn key(&self) -> OutletKey {
        self.key
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn cells(&self) -> &[CellIndex] {
        &self.cells
    }

    pub fn coefficients(&self) -> ArrayView2<'_, f64> {
        self.coefficients.view()
    }

    /// Temporal support length L
    pub fn lags(&self) -> usize {
        self.coefficients.nrows()
    }

    pub fn time_offsets(&self) -> Option<&[f64]> {
        self.time_offsets.as_deref()
    }

    /// Offset of the first lag, 0 when no time axis was supplied
    pub fn base_offset(&self) -> f64 {
        self.time_offsets
            .as_ref()
            .and_then(|t| t.first().copied())
            .unwrap_or(0.0)
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    pub(crate) fn ring_mut(&mut self) -> &mut Ring {
        &mut self.ring
    }

    /// Route one timestep of flux through this outlet.
    ///
    /// The caller guarantees every contributing cell lies inside `flux`.
    /// Contributions are accumulated into the ring, the amount due now is
    /// emitted and the ring advances by one lag.
    pub fn advance(&mut self, flux: &ArrayView2<'_, f64>, want_state: bool) -> Advance {
        for (lag, weights) in self.coefficients.outer_iter().enumerate() {
            let contribution: f64 = self
                .cells
                .iter()
                .zip(weights.iter())
                .map(|(cell, &w)| flux[(cell.y, cell.x)] * w)
                .sum();
            self.ring.add(lag, contribution);
        }

        let emitted = self.ring.emit();
        Advance {
            emitted,
            state: want_state.then(|| self.ring.to_vec()),
        }
    }
}

/// Per-outlet coordinate arrays in registry order, computed once at build time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutletMetadata {
    pub yi: Vec<usize>,
    pub xi: Vec<usize>,
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
}

/// Ordered collection of outlets keyed by outlet cell
#[derive(Debug, Clone, Default)]
pub struct UnitHydrographRegistry {
    outlets: Vec<Outlet>,
    positions: HashMap<OutletKey, usize>,
}

impl UnitHydrographRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an outlet.
    ///
    /// Without `initial_ring` the ring starts at zero (cold start).
    ///
    /// # Errors
    /// - `InvalidUnitHydrograph` for an empty coefficient matrix, non-finite
    ///   coefficients or a duplicate outlet key
    /// - `ShapeMismatch` when `cells`, `time_offsets` or `initial_ring` do not
    ///   agree with the coefficient shape
    /// - `InvalidInput` for a non-finite `initial_ring`
    pub fn register(
        &mut self,
        uh: UnitHydrograph,
        initial_ring: Option<Vec<f64>>,
    ) -> Result<&Outlet> {
        let (lags, n_cells) = uh.coefficients.dim();
        let invalid = |reason: String| Error::InvalidUnitHydrograph {
            y: uh.key.y,
            x: uh.key.x,
            reason,
        };

        if lags == 0 {
            return Err(invalid("impulse response has no lags".into()));
        }
        if n_cells == 0 {
            return Err(invalid("no contributing cells".into()));
        }
        if let Some(((lag, k), v)) = uh
            .coefficients
            .indexed_iter()
            .find(|(_, v)| !v.is_finite())
        {
            return Err(invalid(format!("coefficient [{}, {}] is {}", lag, k, v)));
        }
        if self.positions.contains_key(&uh.key) {
            return Err(invalid("outlet registered twice".into()));
        }
        if uh.cells.len() != n_cells {
            return Err(Error::ShapeMismatch {
                what: format!("contributing cells of outlet {}", uh.key),
                expected: vec![n_cells],
                actual: vec![uh.cells.len()],
            });
        }
        if let Some(offsets) = &uh.time_offsets {
            if offsets.len() != lags {
                return Err(Error::ShapeMismatch {
                    what: format!("time axis of outlet {}", uh.key),
                    expected: vec![lags],
                    actual: vec![offsets.len()],
                });
            }
        }

        let ring = match initial_ring {
            Some(values) => {
                if values.len() != lags {
                    return Err(Error::ShapeMismatch {
                        what: format!("initial ring of outlet {}", uh.key),
                        expected: vec![lags],
                        actual: vec![values.len()],
                    });
                }
                let ring = Ring::from_vec(values);
                if !ring.is_finite() {
                    return Err(Error::InvalidInput(format!(
                        "initial ring of outlet {} contains non-finite values",
                        uh.key
                    )));
                }
                ring
            }
            None => Ring::zeros(lags),
        };

        let position = self.outlets.len();
        self.positions.insert(uh.key, position);
        self.outlets.push(Outlet {
            key: uh.key,
            lat: uh.lat,
            lon: uh.lon,
            cells: uh.cells,
            coefficients: uh.coefficients,
            time_offsets: uh.time_offsets,
            ring,
        });
        tracing::debug!("registered outlet {} with {} lags x {} cells", uh.key, lags, n_cells);

        Ok(&self.outlets[position])
    }

    pub fn len(&self) -> usize {
        self.outlets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outlets.is_empty()
    }

    pub fn get(&self, key: &OutletKey) -> Option<&Outlet> {
        self.positions.get(key).map(|&i| &self.outlets[i])
    }

    pub(crate) fn get_mut(&mut self, key: &OutletKey) -> Option<&mut Outlet> {
        match self.positions.get(key) {
            Some(&i) => Some(&mut self.outlets[i]),
            None => None,
        }
    }

    /// Registration position of `key`
    pub fn position(&self, key: &OutletKey) -> Option<usize> {
        self.positions.get(key).copied()
    }

    /// Outlets in registration order
    pub fn iter(&self) -> std::slice::Iter<'_, Outlet> {
        self.outlets.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = OutletKey> + '_ {
        self.outlets.iter().map(|o| o.key)
    }

    pub(crate) fn outlets_mut(&mut self) -> &mut [Outlet] {
        &mut self.outlets
    }

    /// Smallest `(rows, cols)` grid that contains every contributing cell
    pub fn required_shape(&self) -> (usize, usize) {
        self.outlets
            .iter()
            .flat_map(|o| o.cells.iter())
            .fold((0, 0), |(rows, cols), c| (rows.max(c.y + 1), cols.max(c.x + 1)))
    }

    /// Water in transit summed over all outlets
    pub fn total_in_transit(&self) -> f64 {
        self.outlets.iter().map(|o| o.ring.total()).sum()
    }

    pub fn metadata(&self) -> OutletMetadata {
        OutletMetadata {
            yi: self.outlets.iter().map(|o| o.key.y).collect(),
            xi: self.outlets.iter().map(|o| o.key.x).collect(),
            latitudes: self.outlets.iter().map(|o| o.lat).collect(),
            longitudes: self.outlets.iter().map(|o| o.lon).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a UnitHydrographRegistry {
    type Item = &'a Outlet;
    type IntoIter = std::slice::Iter<'a, Outlet>;

    fn into_iter(self) -> Self::IntoIter {
        self.outlets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn uh(y: usize, x: usize, coefficients: Array2<f64>, cells: Vec<CellIndex>) -> UnitHydrograph {
        UnitHydrograph {
            key: CellIndex::new(y, x),
            lat: 45.0,
            lon: -120.0,
            cells,
            coefficients,
            time_offsets: None,
        }
    }

    #[test]
    fn test_register_cold_start() {
        let mut reg = UnitHydrographRegistry::new();
        let outlet = reg
            .register(
                uh(0, 0, array![[0.5], [0.3], [0.2]], vec![CellIndex::new(0, 0)]),
                None,
            )
            .unwrap();
        assert_eq!(outlet.lags(), 3);
        assert_eq!(outlet.ring().to_vec(), vec![0.0; 3]);
    }

    #[test]
    fn test_register_rejects_empty_and_non_finite() {
        let mut reg = UnitHydrographRegistry::new();
        let err = reg
            .register(uh(0, 0, Array2::zeros((0, 1)), vec![CellIndex::new(0, 0)]), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUnitHydrograph { .. }));

        let err = reg
            .register(uh(0, 0, Array2::zeros((2, 0)), vec![]), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUnitHydrograph { .. }));

        let err = reg
            .register(
                uh(0, 0, array![[0.5], [f64::NAN]], vec![CellIndex::new(0, 0)]),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUnitHydrograph { .. }));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_register_initial_ring_length() {
        let mut reg = UnitHydrographRegistry::new();
        let err = reg
            .register(
                uh(1, 1, array![[0.5], [0.5]], vec![CellIndex::new(0, 0)]),
                Some(vec![1.0, 2.0, 3.0]),
            )
            .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));

        let outlet = reg
            .register(
                uh(1, 1, array![[0.5], [0.5]], vec![CellIndex::new(0, 0)]),
                Some(vec![1.0, 2.0]),
            )
            .unwrap();
        assert_eq!(outlet.ring().to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_register_rejects_non_finite_initial_ring() {
        let mut reg = UnitHydrographRegistry::new();
        let err = reg
            .register(
                uh(1, 1, array![[0.5], [0.5]], vec![CellIndex::new(0, 0)]),
                Some(vec![1.0, f64::INFINITY]),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_register_rejects_duplicates_and_cell_count() {
        let mut reg = UnitHydrographRegistry::new();
        reg.register(uh(2, 3, array![[1.0]], vec![CellIndex::new(0, 0)]), None)
            .unwrap();
        let err = reg
            .register(uh(2, 3, array![[1.0]], vec![CellIndex::new(0, 0)]), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUnitHydrograph { y: 2, x: 3, .. }));

        let err = reg
            .register(
                uh(4, 4, array![[1.0, 1.0]], vec![CellIndex::new(0, 0)]),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_iteration_follows_insertion_order() {
        let mut reg = UnitHydrographRegistry::new();
        for (y, x) in [(5, 1), (0, 9), (3, 3)] {
            reg.register(uh(y, x, array![[1.0]], vec![CellIndex::new(y, x)]), None)
                .unwrap();
        }
        let keys: Vec<_> = reg.keys().collect();
        assert_eq!(
            keys,
            vec![CellIndex::new(5, 1), CellIndex::new(0, 9), CellIndex::new(3, 3)]
        );
        assert_eq!(reg.position(&CellIndex::new(0, 9)), Some(1));
        assert_eq!(reg.required_shape(), (6, 10));
        assert_eq!(reg.metadata().yi, vec![5, 0, 3]);
    }

    #[test]
    fn test_advance_concrete_scenario() {
        let mut reg = UnitHydrographRegistry::new();
        reg.register(
            uh(0, 0, array![[0.5], [0.3], [0.2]], vec![CellIndex::new(0, 0)]),
            None,
        )
        .unwrap();
        let outlet = reg.get_mut(&CellIndex::new(0, 0)).unwrap();

        let flux = array![[10.0]];
        let step = outlet.advance(&flux.view(), true);
        assert_eq!(step.emitted, 5.0);
        assert_eq!(step.state, Some(vec![3.0, 2.0, 0.0]));

        let zero = array![[0.0]];
        assert_eq!(outlet.advance(&zero.view(), false).emitted, 3.0);
        assert_eq!(outlet.advance(&zero.view(), false).emitted, 2.0);
        assert_eq!(outlet.advance(&zero.view(), false).emitted, 0.0);
        assert_eq!(outlet.ring().len(), 3);
    }

    #[test]
    fn test_advance_weights_each_contributing_cell() {
        let mut reg = UnitHydrographRegistry::new();
        reg.register(
            uh(
                1,
                1,
                array![[1.0, 0.0], [0.0, 2.0]],
                vec![CellIndex::new(0, 0), CellIndex::new(1, 0)],
            ),
            None,
        )
        .unwrap();
        let outlet = reg.get_mut(&CellIndex::new(1, 1)).unwrap();
        let flux = array![[3.0, 0.0], [4.0, 0.0]];
        let step = outlet.advance(&flux.view(), true);
        assert_eq!(step.emitted, 3.0);
        assert_eq!(step.state, Some(vec![8.0, 0.0]));
    }
}
