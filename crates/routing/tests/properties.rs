//! Behavioural properties of the convolution engine.
//!
//! Each test builds a small registry by hand and drives the engine directly,
//! without touching the file system.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use ndarray::{array, Array2};
use uhroute_core::units::area_to_square_meters;
use uhroute_core::Grid;
use uhroute_routing::prelude::*;

fn uh(key: (usize, usize), cells: &[(usize, usize)], coefficients: Array2<f64>) -> UnitHydrograph {
    UnitHydrograph {
        key: CellIndex::new(key.0, key.1),
        lat: key.0 as f64,
        lon: key.1 as f64,
        cells: cells.iter().map(|&(y, x)| CellIndex::new(y, x)).collect(),
        coefficients,
        time_offsets: None,
    }
}

/// Three outlets with different lag lengths over a 3x3 grid
fn basin() -> Vec<UnitHydrograph> {
    vec![
        uh((0, 0), &[(0, 0), (0, 1)], array![[0.4, 0.1], [0.3, 0.2], [0.3, 0.7]]),
        uh((2, 2), &[(1, 1), (2, 2), (2, 1)], array![[1.0, 0.0, 0.25], [0.0, 1.0, 0.75]]),
        uh((1, 0), &[(1, 0)], array![[0.1], [0.2], [0.3], [0.4], [0.0]]),
    ]
}

fn engine_from(uhs: Vec<UnitHydrograph>) -> ConvolutionEngine {
    let mut reg = UnitHydrographRegistry::new();
    for u in uhs {
        reg.register(u, None).unwrap();
    }
    ConvolutionEngine::new(reg)
}

/// Deterministic, uneven flux for timestep `t`
fn flux_at(t: usize) -> Grid<f64> {
    let values = (0..9).map(|i| ((t * 7 + i * 3) % 11) as f64 * 0.5).collect();
    Grid::from_vec(values, 3, 3).unwrap()
}

#[test]
fn concrete_single_outlet_sequence() {
    let mut engine = engine_from(vec![uh((0, 0), &[(0, 0)], array![[0.5], [0.3], [0.2]])]);

    let first = engine.step(&Grid::filled(1, 1, 10.0), 0.0, true).unwrap();
    assert_eq!(first.emitted, vec![5.0]);
    let entry = first.state.unwrap();
    assert_eq!(entry.get(&CellIndex::new(0, 0)).unwrap().ring, vec![3.0, 2.0, 0.0]);

    let zero = Grid::filled(1, 1, 0.0);
    let rest: Vec<f64> = (1..4)
        .map(|t| engine.step(&zero, t as f64, false).unwrap().emitted[0])
        .collect();
    assert_eq!(rest, vec![3.0, 2.0, 0.0]);
}

#[test]
fn ring_lengths_never_change() {
    let mut engine = engine_from(basin());
    let lags: Vec<usize> = engine.registry().iter().map(|o| o.lags()).collect();
    for t in 0..25 {
        engine.advance(&flux_at(t)).unwrap();
        let now: Vec<usize> = engine.registry().iter().map(|o| o.ring().len()).collect();
        assert_eq!(now, lags);
    }
}

#[test]
fn water_is_conserved() {
    let mut engine = engine_from(basin());
    let mut expected = 0.0;
    let mut emitted = 0.0;

    for t in 0..12 {
        let flux = flux_at(t);
        for outlet in engine.registry() {
            for (k, cell) in outlet.cells().iter().enumerate() {
                let weight: f64 = outlet.coefficients().column(k).sum();
                expected += flux.get(cell.y, cell.x).unwrap() * weight;
            }
        }
        emitted += engine.advance(&flux).unwrap().iter().sum::<f64>();

        let in_transit = engine.registry().total_in_transit();
        assert_relative_eq!(emitted + in_transit, expected, max_relative = 1e-12);
    }
}

#[test]
fn unit_impulse_emits_coefficient_sum() {
    let coefficients = array![[0.1], [0.25], [0.3], [0.35]];
    let total: f64 = coefficients.sum();
    let mut engine = engine_from(vec![uh((0, 0), &[(0, 0)], coefficients)]);

    let mut emitted = engine.advance(&Grid::filled(1, 1, 1.0)).unwrap()[0];
    for _ in 1..4 {
        emitted += engine.advance(&Grid::filled(1, 1, 0.0)).unwrap()[0];
    }
    assert_relative_eq!(emitted, total, max_relative = 1e-12);
    assert!(engine.registry().iter().all(|o| o.ring().is_drained()));
}

#[test]
fn rings_drain_after_longest_lag() {
    let mut engine = engine_from(basin());
    for t in 0..6 {
        engine.advance(&flux_at(t)).unwrap();
    }
    assert!(engine.registry().total_in_transit() > 0.0);

    let zero = Grid::filled(3, 3, 0.0);
    let longest = engine.registry().iter().map(|o| o.lags()).max().unwrap();
    for _ in 0..longest {
        engine.advance(&zero).unwrap();
    }
    assert!(engine.registry().iter().all(|o| o.ring().is_drained()));
    assert!(engine.advance(&zero).unwrap().iter().all(|&v| v == 0.0));
}

#[test]
fn outlets_do_not_depend_on_registration_order() {
    let mut forward = engine_from(basin());
    let mut reversed = engine_from(basin().into_iter().rev().collect());

    for t in 0..10 {
        let flux = flux_at(t);
        let a = forward.advance(&flux).unwrap();
        let b = reversed.advance(&flux).unwrap();
        for (i, key) in forward.registry().keys().enumerate() {
            let j = reversed.registry().position(&key).unwrap();
            assert_abs_diff_eq!(a[i], b[j], epsilon = 1e-12);
        }
    }
}

#[test]
fn restart_continues_exactly() {
    let mut continuous = engine_from(basin());
    let mut first_half = engine_from(basin());

    let mut reference = Vec::new();
    for t in 0..8 {
        reference.push(continuous.step(&flux_at(t), t as f64, false).unwrap().emitted);
    }

    let mut snapshot = None;
    for t in 0..4 {
        snapshot = first_half.step(&flux_at(t), t as f64, t == 3).unwrap().state;
    }
    let snapshot = snapshot.unwrap();
    assert_eq!(snapshot.time(), 3.0);

    // round trip through JSON as a restart would
    let json = serde_json::to_string(&snapshot).unwrap();
    let restored: Snapshot = serde_json::from_str(&json).unwrap();

    let mut second_half = engine_from(basin());
    second_half.restore(&restored).unwrap();
    for t in 4..8 {
        let out = second_half.step(&flux_at(t), t as f64, false).unwrap();
        for (a, b) in out.emitted.iter().zip(&reference[t]) {
            assert_relative_eq!(*a, *b, max_relative = 1e-12);
        }
    }
}

#[test]
fn restore_reports_missing_outlet() {
    let mut small = engine_from(basin().into_iter().take(2).collect());
    small.advance(&flux_at(0)).unwrap();
    let snapshot = small.capture();

    let mut full = engine_from(basin());
    let err = full.restore(&snapshot).unwrap_err();
    assert!(matches!(err, uhroute_core::Error::MissingState { y: 1, x: 0 }));
}

#[test]
fn parallel_matches_sequential() {
    let mut seq = engine_from(basin());
    let mut par = engine_from(basin())
        .with_mode(ProcessingMode::Parallel)
        .unwrap();
    for t in 0..10 {
        assert_eq!(seq.advance(&flux_at(t)).unwrap(), par.advance(&flux_at(t)).unwrap());
    }
}

#[test]
fn combined_flux_feeds_the_engine() {
    let meta = FluxMetadata::new("hourly", "averaged", "mm");
    let runoff = Grid::filled(1, 1, 3600.0 * 1000.0 * 2.0);
    let baseflow = Grid::filled(1, 1, 3600.0 * 1000.0);
    let flux = combine(&runoff, &baseflow, &meta).unwrap();
    assert_relative_eq!(flux.get(0, 0).unwrap(), 3.0);

    let mut engine = engine_from(vec![uh((0, 0), &[(0, 0)], array![[1.0], [1.0]])]);
    assert_relative_eq!(engine.advance(&flux).unwrap()[0], 3.0);
    assert_relative_eq!(engine.advance(&Grid::filled(1, 1, 0.0)).unwrap()[0], 3.0);
}

#[test]
fn area_units_convert_to_square_meters() {
    let (value, warning) = area_to_square_meters(2.0, "km2");
    assert_relative_eq!(value, 2.0e6);
    assert!(warning.is_none());

    let (value, _) = area_to_square_meters(1.0, "acres");
    assert_relative_eq!(value, 4046.856);

    let (value, warning) = area_to_square_meters(5.0, "furlongs");
    assert_relative_eq!(value, 5.0);
    assert!(warning.is_some());
}
