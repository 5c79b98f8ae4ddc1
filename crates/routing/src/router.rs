//! Run driver
//!
//! [`Router::init`] performs every fallible setup step (areas, unit
//! hydrographs, initial state, output directory) before the first timestep.
//! [`Router::run`] then walks the flux records in order, one engine step per
//! record, writing streamflow and, at the requested labels, state files with
//! matching restart descriptors.

use crate::config::{ResolvedPaths, RunConfig};
use crate::engine::{ConvolutionEngine, ProcessingMode};
use crate::files::{
    timestep_label, FlatStreamflow, FluxRecord, GridDescriptor, GridStreamflow, StateFile,
    TimeAttributes, UnitHydrographFile,
};
use crate::flux::{FluxCombiner, FluxMetadata};
use crate::output::{Assembled, LayoutKind, OutputAssembler};
use crate::registry::{OutletMetadata, UnitHydrographRegistry};
use crate::scaling::OutputUnits;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use uhroute_core::io::{write_geotiff, write_json};
use uhroute_core::warning::emit_all;
use uhroute_core::{Grid, Result};

const STREAMFLOW_DESCRIPTION: &str = "Streamflow routed by unit-hydrograph convolution";
const STATE_DESCRIPTION: &str = "Routing ring state";

/// Read, scale and register every unit-hydrograph file, in file order
pub fn load_registry(
    uh_files: &[PathBuf],
    area: &Grid<f64>,
    units: OutputUnits,
) -> Result<UnitHydrographRegistry> {
    let mut registry = UnitHydrographRegistry::new();
    for path in uh_files {
        let uh = UnitHydrographFile::read(path)?.into_unit_hydrograph(area, units)?;
        registry.register(uh, None)?;
    }
    Ok(registry)
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub timesteps: usize,
    pub outlets: usize,
    pub output_files: usize,
    pub state_files: usize,
    pub restart_files: usize,
    pub cancelled: bool,
    /// Time of the last routed record
    pub last_time: Option<f64>,
    /// Most recent restart descriptor written
    pub last_restart: Option<PathBuf>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} timesteps, {} outlets, {} output files, {} state files, {} restart files",
            self.timesteps, self.outlets, self.output_files, self.state_files, self.restart_files
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

/// Owns everything a run needs once setup has succeeded
#[derive(Debug)]
pub struct Router {
    config: RunConfig,
    paths: ResolvedPaths,
    units: OutputUnits,
    engine: ConvolutionEngine,
    assembler: OutputAssembler,
    outlets: OutletMetadata,
    combiner: Option<(FluxMetadata, FluxCombiner)>,
}

impl Router {
    /// Build the router. Every failure here happens before any routing.
    pub fn init(config: RunConfig) -> Result<Self> {
        let paths = config.resolve_paths()?;
        let layout = config.layout();
        let units = config.units();

        let area = GridDescriptor::load_area(&paths.grid_file)?;
        tracing::info!(
            "loaded area grid {}x{} from {}",
            area.rows(),
            area.cols(),
            paths.grid_file.display()
        );

        let registry = load_registry(&paths.uh_files, &area, units)?;
        tracing::info!("registered {} outlets ({} output)", registry.len(), units);

        let assembler = match layout {
            LayoutKind::Grid => OutputAssembler::grid(&registry, area.shape(), *area.transform())?,
            LayoutKind::Flat => OutputAssembler::flat(&registry),
            LayoutKind::None => OutputAssembler::none(&registry),
        };
        let outlets = registry.metadata();

        let mode = ProcessingMode::from_threads(config.options.threads);
        let mut engine = ConvolutionEngine::new(registry).with_mode(mode)?;

        if let Some(state_path) = &paths.initial_state {
            let state = StateFile::read(state_path)?;
            engine.restore(&state.state)?;
            tracing::info!("initial state from {}", state_path.display());
        }

        std::fs::create_dir_all(&paths.out_path)?;

        Ok(Self {
            config,
            paths,
            units,
            engine,
            assembler,
            outlets,
            combiner: None,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn engine(&self) -> &ConvolutionEngine {
        &self.engine
    }

    pub fn registry(&self) -> &UnitHydrographRegistry {
        self.engine.registry()
    }

    pub fn flux_files(&self) -> &[PathBuf] {
        &self.paths.flux_files
    }

    pub fn out_path(&self) -> &Path {
        &self.paths.out_path
    }

    /// Route every flux record. `cancel` is checked between timesteps.
    pub fn run(&mut self, cancel: &AtomicBool) -> Result<RunSummary> {
        self.run_with_progress(cancel, |_, _| {})
    }

    /// Like [`Router::run`], calling `progress(done, total)` after each timestep
    pub fn run_with_progress<F>(&mut self, cancel: &AtomicBool, mut progress: F) -> Result<RunSummary>
    where
        F: FnMut(usize, usize),
    {
        let files = self.paths.flux_files.clone();
        let total = files.len();
        let mut summary = RunSummary {
            outlets: self.engine.registry().len(),
            ..Default::default()
        };

        tracing::info!("routing {} timesteps", total);

        for (i, path) in files.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                tracing::warn!("run cancelled after {} of {} timesteps", i, total);
                summary.cancelled = true;
                break;
            }

            let record = FluxRecord::read(path)?;
            let label = timestep_label(path);
            let flux = self.combine(&record, path)?;
            let capture = self.config.captures_state(&label);

            let out = self.engine.step(&flux, record.time, capture)?;
            summary.timesteps += 1;
            summary.last_time = Some(record.time);

            summary.output_files += self.write_streamflow(&label, &record, &out.emitted)?;

            if let Some(state) = out.state {
                let state_path = self.paths.out_path.join(format!("state_{}.json", label));
                let state_file = StateFile {
                    description: STATE_DESCRIPTION.to_string(),
                    attributes: record.attributes.clone(),
                    units: self.units.label().to_string(),
                    state,
                };
                write_json(&state_file, &state_path)?;
                summary.state_files += 1;

                let restart_path = self.paths.out_path.join(format!("restart_{}.json", label));
                let mut restart = self.config.restart(&state_path, &files[i + 1..]);
                restart.outputs.layout = Some(self.assembler.kind());
                restart.outputs.units = Some(self.units);
                restart.write(&restart_path)?;
                summary.restart_files += 1;
                tracing::info!("saved state at {} to {}", label, state_path.display());
                summary.last_restart = Some(restart_path);
            }

            progress(i + 1, total);
        }

        tracing::info!("routing finished: {}", summary);
        Ok(summary)
    }

    /// Combine a record's grids, rebuilding the combiner only when its
    /// metadata changes
    fn combine(&mut self, record: &FluxRecord, path: &Path) -> Result<Grid<f64>> {
        if self
            .combiner
            .as_ref()
            .is_some_and(|(meta, _)| *meta != record.metadata)
        {
            self.combiner = None;
        }
        let (_, combiner) = self.combiner.get_or_insert_with(|| {
            let combiner = FluxCombiner::new(&record.metadata);
            emit_all(combiner.warnings());
            tracing::debug!("flux divisor {} for {:?}", combiner.divisor(), record.metadata);
            (record.metadata.clone(), combiner)
        });

        let (runoff, baseflow) = record.load_grids(path)?;
        combiner.combine(&runoff, &baseflow)
    }

    /// Write one timestep of streamflow; returns the number of files written
    fn write_streamflow(&self, label: &str, record: &FluxRecord, emitted: &[f64]) -> Result<usize> {
        if self.assembler.kind() == LayoutKind::None {
            return Ok(0);
        }
        let attributes: TimeAttributes = record.attributes.clone();
        let units = self.units.label().to_string();

        match self.assembler.assemble(emitted)? {
            Assembled::Flat(streamflow) => {
                let doc = FlatStreamflow {
                    description: STREAMFLOW_DESCRIPTION.to_string(),
                    time: record.time,
                    attributes,
                    units,
                    outlets: self.outlets.clone(),
                    streamflow,
                };
                write_json(&doc, self.paths.out_path.join(format!("{}.json", label)))?;
                Ok(1)
            }
            Assembled::Grid(grid) => {
                let tif = PathBuf::from(format!("{}.tif", label));
                write_geotiff(&grid, self.paths.out_path.join(&tif))?;
                let (latitudes, longitudes) = self.assembler.grid_axes();
                let sidecar = GridStreamflow {
                    description: STREAMFLOW_DESCRIPTION.to_string(),
                    time: record.time,
                    attributes,
                    units,
                    latitudes,
                    longitudes,
                    grid: tif,
                };
                write_json(&sidecar, self.paths.out_path.join(format!("{}.json", label)))?;
                Ok(2)
            }
        }
    }
}
