//! uhroute CLI - streamflow routing by unit-hydrograph convolution

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use uhroute_core::units::area_to_square_meters;
use uhroute_routing::files::GridDescriptor;
use uhroute_routing::router::load_registry;
use uhroute_routing::{Router, RunConfig, RunSummary};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "uhroute")]
#[command(author, version, about = "Streamflow routing by unit-hydrograph convolution", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route every flux record listed in a run configuration
    Run {
        /// Run configuration (JSON)
        config: PathBuf,
        /// Worker threads: 0 = all cores, 1 = sequential
        #[arg(short, long)]
        threads: Option<usize>,
    },
    /// Build the unit-hydrograph registry and describe it
    Info {
        /// Run configuration (JSON)
        config: PathBuf,
    },
    /// Convert an area value to square meters
    Area {
        /// Area value
        value: f64,
        /// Units: m2, km2, mi2, acres, rad2, ...
        units: String,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: a global tracing subscriber is already installed");
    }
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn timestep_bar(total: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} timesteps ({eta})")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

fn load_config(path: &Path) -> Result<RunConfig> {
    RunConfig::load(path).with_context(|| format!("Failed to load configuration {}", path.display()))
}

fn done(summary: &RunSummary, out_path: &Path, elapsed: std::time::Duration) {
    println!("Routed {} timesteps for {} outlets", summary.timesteps, summary.outlets);
    println!("  Output files: {} in {}", summary.output_files, out_path.display());
    if summary.state_files > 0 {
        println!("  State files: {}", summary.state_files);
    }
    if let Some(restart) = &summary.last_restart {
        println!("  Last restart descriptor: {}", restart.display());
    }
    if summary.cancelled {
        println!("  Run was cancelled before the last timestep");
    }
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Commands ───────────────────────────────────────────────────────────

fn run(mut config: RunConfig, threads: Option<usize>) -> Result<()> {
    if let Some(threads) = threads {
        config.options.threads = threads;
    }

    let start = Instant::now();
    let pb = spinner("Loading unit hydrographs...")?;
    let mut router = Router::init(config).context("Failed to initialise routing")?;
    pb.finish_and_clear();
    info!(
        "{} outlets, {} flux records, engine {:?}",
        router.registry().len(),
        router.flux_files().len(),
        router.engine().mode()
    );

    let bar = timestep_bar(router.flux_files().len())?;
    let cancel = AtomicBool::new(false);
    let summary = router
        .run_with_progress(&cancel, |n, _| bar.set_position(n as u64))
        .context("Routing failed")?;
    bar.finish_and_clear();

    done(&summary, router.out_path(), start.elapsed());
    Ok(())
}

fn describe(config: &RunConfig) -> Result<()> {
    let paths = config.resolve_paths()?;
    let area = GridDescriptor::load_area(&paths.grid_file).context("Failed to read area grid")?;
    let registry = load_registry(&paths.uh_files, &area, config.units())
        .context("Failed to build unit-hydrograph registry")?;

    let lags: Vec<usize> = registry.iter().map(|o| o.lags()).collect();
    let cells: Vec<usize> = registry.iter().map(|o| o.cells().len()).collect();
    let mass: f64 = registry.iter().map(|o| o.coefficients().sum()).sum();
    let (rows, cols) = registry.required_shape();

    println!("Outlets: {}", registry.len());
    println!("Area grid: {} x {}", area.cols(), area.rows());
    println!("Flux records: {}", paths.flux_files.len());
    if !registry.is_empty() {
        println!(
            "Lags: min {} / max {}",
            lags.iter().min().copied().unwrap_or(0),
            lags.iter().max().copied().unwrap_or(0)
        );
        println!(
            "Contributing cells: min {} / max {} / total {}",
            cells.iter().min().copied().unwrap_or(0),
            cells.iter().max().copied().unwrap_or(0),
            cells.iter().sum::<usize>()
        );
    }
    println!("Flux grid must cover: {} x {}", cols, rows);
    println!("Total coefficient mass: {:.6e} ({})", mass, config.units());
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, threads } => {
            let config = load_config(&config)?;
            setup_logging(cli.verbose || config.options.verbose);
            run(config, threads)?;
        }

        Commands::Info { config } => {
            let config = load_config(&config)?;
            setup_logging(cli.verbose || config.options.verbose);
            describe(&config)?;
        }

        Commands::Area { value, units } => {
            setup_logging(cli.verbose);
            let (m2, warning) = area_to_square_meters(value, &units);
            if let Some(w) = warning {
                w.emit();
            }
            println!("{} {} = {} m2", value, units, m2);
        }
    }

    Ok(())
}
