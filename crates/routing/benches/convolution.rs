//! Benchmarks for the per-timestep convolution step

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use uhroute_core::Grid;
use uhroute_routing::{CellIndex, ConvolutionEngine, ProcessingMode, UnitHydrograph, UnitHydrographRegistry};

const GRID: usize = 256;
const LAGS: usize = 48;
const CELLS_PER_OUTLET: usize = 64;

/// One outlet per diagonal-ish cell, each draining a strip of cells upstream
fn create_registry(outlets: usize) -> UnitHydrographRegistry {
    let mut reg = UnitHydrographRegistry::new();
    for n in 0..outlets {
        let y = (n * 7) % GRID;
        let x = (n * 13 + n / GRID) % GRID;
        let cells = (0..CELLS_PER_OUTLET)
            .map(|k| CellIndex::new((y + k) % GRID, (x + k * 3) % GRID))
            .collect();
        // Triangular response peaking a few lags in
        let coefficients = Array2::from_shape_fn((LAGS, CELLS_PER_OUTLET), |(l, k)| {
            let peak = 4 + k % 8;
            let dist = (l as f64 - peak as f64).abs();
            (1.0 - dist / LAGS as f64).max(0.0) / LAGS as f64
        });
        let key = CellIndex::new(y, x);
        if reg.get(&key).is_some() {
            continue;
        }
        reg.register(
            UnitHydrograph {
                key,
                lat: y as f64,
                lon: x as f64,
                cells,
                coefficients,
                time_offsets: None,
            },
            None,
        )
        .unwrap();
    }
    reg
}

fn create_flux() -> Grid<f64> {
    let mut flux = Grid::new(GRID, GRID);
    for row in 0..GRID {
        for col in 0..GRID {
            let noise = ((row * 7 + col * 13) % 17) as f64 * 0.01;
            flux.set(row, col, 1.0 + noise).unwrap();
        }
    }
    flux
}

fn bench_step(c: &mut Criterion) {
    let flux = create_flux();
    for (name, mode) in [
        ("sequential", ProcessingMode::Sequential),
        ("parallel", ProcessingMode::Parallel),
    ] {
        let mut group = c.benchmark_group(format!("convolution/step/{}", name));
        for outlets in [100, 1000, 5000] {
            let mut engine = ConvolutionEngine::new(create_registry(outlets))
                .with_mode(mode)
                .unwrap();
            group.bench_with_input(BenchmarkId::from_parameter(outlets), &outlets, |b, _| {
                b.iter(|| engine.advance(black_box(&flux)).unwrap())
            });
        }
        group.finish();
    }
}

fn bench_capture(c: &mut Criterion) {
    let flux = create_flux();
    let mut group = c.benchmark_group("convolution/capture");
    for outlets in [1000, 5000] {
        let mut engine = ConvolutionEngine::new(create_registry(outlets));
        engine.advance(&flux).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(outlets), &outlets, |b, _| {
            b.iter(|| black_box(engine.capture()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_step, bench_capture);
criterion_main!(benches);
