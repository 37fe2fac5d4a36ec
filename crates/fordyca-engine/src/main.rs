//! Headless driver for the FORDYCA foraging simulation.
//!
//! Loads configuration, assembles the arena and the swarm, runs the tick
//! loop until the tick limit or Ctrl-C, and writes a JSON run summary.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `fordyca-config.yaml` (or `$FORDYCA_CONFIG`)
//! 3. Assemble arena, oracle, and robots
//! 4. Install the Ctrl-C handler
//! 5. Run the simulation loop
//! 6. Log the result and write the run summary
//!
//! Set `FORDYCA_LOG_FORMAT=json` for JSON log lines.

mod error;
mod reporter;
mod summary;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fordyca_core::runner::{self, RunControl};
use fordyca_core::{SimulationConfig, SwarmMetrics, build_simulation};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::reporter::MetricsReporter;
use crate::summary::RunSummary;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "fordyca-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, assembly, the run itself, or writing
/// the summary fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Initialize structured logging.
    init_tracing();
    info!("fordyca-engine starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        seed = config.simulation.seed,
        robots = config.simulation.n_robots,
        controller = %config.controller.kind,
        max_ticks = config.simulation.max_ticks,
        "Configuration loaded"
    );

    // 3. Assemble the simulation.
    let mut state = build_simulation(&config)?;

    // 4. Stop cleanly on Ctrl-C.
    let control = Arc::new(RunControl::new(&config.simulation));
    {
        let control = Arc::clone(&control);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl-C received, stopping after the current tick");
                    control.request_stop();
                }
                Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
            }
        });
    }

    // 5. Run the simulation.
    let mut reporter = MetricsReporter::new(config.simulation.stats_interval);
    let result = runner::run_simulation(&mut state, &control, &mut reporter).await?;

    // 6. Log results and write the summary.
    runner::log_simulation_end(&result);
    let metrics = SwarmMetrics::collect(state.tick, &state.robots, &state.arena, &state.task_stats);
    info!(
        nest_deliveries = metrics.nest_deliveries,
        reported_deliveries = reporter.nest_drops(),
        last_report_tick = reporter.latest().map(|m| m.tick),
        free_blocks = metrics.free_blocks,
        caches = metrics.caches,
        "Final swarm metrics"
    );

    let summary = RunSummary::new(&config, &result, metrics);
    let summary_path = Path::new(&config.simulation.summary_path);
    summary.write_to(summary_path)?;
    info!(
        run_id = %summary.run_id,
        path = %summary_path.display(),
        "Run summary written"
    );

    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        "fordyca-engine shutdown complete"
    );
    Ok(())
}

/// Install the global subscriber, honouring `RUST_LOG` (default `info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("FORDYCA_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Load the simulation configuration.
///
/// Reads `$FORDYCA_CONFIG` if set, otherwise `fordyca-config.yaml` in the
/// working directory. A missing default file falls back to defaults; a
/// missing explicit file is an error.
fn load_config() -> Result<SimulationConfig, EngineError> {
    if let Some(path) = std::env::var_os("FORDYCA_CONFIG").map(PathBuf::from) {
        return Ok(SimulationConfig::from_file(&path)?);
    }
    let config_path = Path::new(DEFAULT_CONFIG_PATH);
    if config_path.exists() {
        Ok(SimulationConfig::from_file(config_path)?)
    } else {
        info!("Config file not found, using defaults");
        Ok(SimulationConfig::default())
    }
}
