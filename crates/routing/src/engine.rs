//! Convolution engine
//!
//! Advances every outlet of a registry by one timestep per flux grid.
//! Timesteps are strictly sequential; within a timestep outlets are
//! independent and may be processed in parallel. The end of the per-outlet
//! collect is the barrier between timesteps.

use crate::maybe_rayon::*;
use crate::registry::{Advance, Outlet, UnitHydrographRegistry};
use crate::snapshot::{Snapshot, SnapshotEntry};
use ndarray::ArrayView2;
use uhroute_core::{Error, Grid, Result};

/// How outlets are fanned out inside a timestep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing on the global rayon pool
    #[default]
    Parallel,
    /// Parallel on a dedicated pool with the given number of threads
    ParallelWith(usize),
}

impl ProcessingMode {
    /// `0` = all cores, `1` = sequential, `n` = dedicated pool of `n` threads
    pub fn from_threads(threads: usize) -> Self {
        match threads {
            0 => ProcessingMode::Parallel,
            1 => ProcessingMode::Sequential,
            n => ProcessingMode::ParallelWith(n),
        }
    }
}

/// Output of one engine timestep
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    /// Routed value per outlet, in registry order
    pub emitted: Vec<f64>,
    /// Post-rotation rings when state capture was requested
    pub state: Option<Snapshot>,
}

/// Owns the registry for the lifetime of a run and drives its rings
pub struct ConvolutionEngine {
    registry: UnitHydrographRegistry,
    mode: ProcessingMode,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
    steps: u64,
    last_time: Option<f64>,
    required_shape: (usize, usize),
}

impl std::fmt::Debug for ConvolutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvolutionEngine")
            .field("outlets", &self.registry.len())
            .field("mode", &self.mode)
            .field("steps", &self.steps)
            .field("last_time", &self.last_time)
            .finish()
    }
}

impl ConvolutionEngine {
    pub fn new(registry: UnitHydrographRegistry) -> Self {
        let required_shape = registry.required_shape();
        Self {
            registry,
            mode: ProcessingMode::Sequential,
            #[cfg(feature = "parallel")]
            pool: None,
            steps: 0,
            last_time: None,
            required_shape,
        }
    }

    /// Select the processing mode; builds a dedicated pool for `ParallelWith`.
    pub fn with_mode(mut self, mode: ProcessingMode) -> Result<Self> {
        #[cfg(feature = "parallel")]
        {
            self.pool = match mode {
                ProcessingMode::ParallelWith(threads) => Some(
                    rayon::ThreadPoolBuilder::new()
                        .num_threads(threads)
                        .build()
                        .map_err(|e| Error::Other(format!("Failed to build thread pool: {}", e)))?,
                ),
                _ => None,
            };
        }
        self.mode = mode;
        Ok(self)
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub fn registry(&self) -> &UnitHydrographRegistry {
        &self.registry
    }

    /// Number of timesteps processed so far
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Time of the last processed input, if any
    pub fn last_time(&self) -> Option<f64> {
        self.last_time
    }

    /// Restore ring state from a snapshot. Only allowed before the first timestep.
    ///
    /// The snapshot time becomes the last processed time, so a capture before
    /// the next step carries the same stamps as the snapshot.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<()> {
        if self.steps > 0 {
            return Err(Error::StateAfterStart);
        }
        snapshot.restore_into(&mut self.registry)?;
        self.last_time = Some(snapshot.time());
        tracing::info!(
            "restored state for {} outlets (snapshot time {})",
            self.registry.len(),
            snapshot.time()
        );
        Ok(())
    }

    /// Snapshot of the current rings, stamped with the last processed time
    pub fn capture(&self) -> Snapshot {
        Snapshot::capture(&self.registry, self.last_time.unwrap_or(0.0))
    }

    /// Check that every contributing cell lies inside `flux`.
    ///
    /// Done before any ring is touched, so a bad grid leaves all rings as
    /// they were.
    pub fn validate_flux(&self, flux: &Grid<f64>) -> Result<()> {
        let (rows, cols) = flux.shape();
        let (need_rows, need_cols) = self.required_shape;
        if rows < need_rows || cols < need_cols {
            return Err(Error::InvalidInput(format!(
                "flux grid of shape ({}, {}) does not cover contributing cells up to ({}, {})",
                rows,
                cols,
                need_rows.saturating_sub(1),
                need_cols.saturating_sub(1)
            )));
        }
        Ok(())
    }

    /// Route one timestep without a time stamp
    pub fn advance(&mut self, flux: &Grid<f64>) -> Result<Vec<f64>> {
        let time = self.last_time.map_or(self.steps as f64, |t| t + 1.0);
        Ok(self.step(flux, time, false)?.emitted)
    }

    /// Route one timestep of combined flux taken at `time`.
    ///
    /// With `capture_state` the returned [`StepOutput`] carries the
    /// post-rotation rings of every outlet.
    pub fn step(&mut self, flux: &Grid<f64>, time: f64, capture_state: bool) -> Result<StepOutput> {
        self.validate_flux(flux)?;

        let view = flux.view();
        let results = self.advance_all(&view, capture_state);

        self.steps += 1;
        self.last_time = Some(time);

        let mut emitted = Vec::with_capacity(results.len());
        let mut entries = Vec::new();
        for (outlet, result) in self.registry.iter().zip(results) {
            emitted.push(result.emitted);
            if let Some(ring) = result.state {
                entries.push(SnapshotEntry {
                    y: outlet.key().y,
                    x: outlet.key().x,
                    ring,
                    timestamp: time + outlet.base_offset(),
                });
            }
        }

        let state = capture_state.then(|| Snapshot::from_entries(time, entries));
        tracing::debug!("timestep {} (t = {}) routed {} outlets", self.steps, time, emitted.len());

        Ok(StepOutput { emitted, state })
    }

    fn advance_all(&mut self, flux: &ArrayView2<'_, f64>, want_state: bool) -> Vec<Advance> {
        let outlets = self.registry.outlets_mut();
        let run = |outlets: &mut [Outlet]| -> Vec<Advance> {
            outlets
                .par_iter_mut()
                .map(|o| o.advance(flux, want_state))
                .collect()
        };

        match self.mode {
            ProcessingMode::Sequential => outlets
                .iter_mut()
                .map(|o| o.advance(flux, want_state))
                .collect(),
            #[cfg(feature = "parallel")]
            ProcessingMode::ParallelWith(_) => match &self.pool {
                Some(pool) => pool.install(|| run(outlets)),
                None => run(outlets),
            },
            _ => run(outlets),
        }
    }
}
