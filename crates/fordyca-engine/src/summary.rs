//! JSON run summary written when the engine shuts down.

use std::path::Path;

use chrono::{DateTime, Utc};
use fordyca_controller::ControllerKind;
use fordyca_core::runner::{SimulationEndReason, SimulationResult};
use fordyca_core::{SimulationConfig, SwarmMetrics};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Everything worth keeping about one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique, time-ordered run identifier.
    pub run_id: Uuid,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end.
    pub ended_at: DateTime<Utc>,
    /// Why the run stopped.
    pub end_reason: SimulationEndReason,
    /// Ticks executed.
    pub total_ticks: u64,
    /// Master seed.
    pub seed: u64,
    /// Controller every robot ran.
    pub controller: ControllerKind,
    /// Swarm size.
    pub n_robots: usize,
    /// Metrics at the final tick.
    pub metrics: SwarmMetrics,
}

impl RunSummary {
    /// Assemble a summary for a finished run.
    pub fn new(config: &SimulationConfig, result: &SimulationResult, metrics: SwarmMetrics) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            started_at: result.started_at,
            ended_at: result.ended_at,
            end_reason: result.end_reason,
            total_ticks: result.total_ticks,
            seed: config.simulation.seed,
            controller: config.controller.kind,
            n_robots: config.simulation.n_robots,
            metrics,
        }
    }

    /// Write the summary as pretty-printed JSON, replacing any existing file.
    pub fn write_to(&self, path: &Path) -> Result<(), EngineError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn result() -> SimulationResult {
        let now = Utc::now();
        SimulationResult {
            end_reason: SimulationEndReason::StopRequested,
            final_summary: None,
            total_ticks: 12,
            started_at: now,
            ended_at: now,
        }
    }

    #[test]
    fn summary_round_trips_through_file() {
        let config = SimulationConfig::default();
        let summary = RunSummary::new(&config, &result(), SwarmMetrics::default());
        let path = std::env::temp_dir().join(format!("fordyca-summary-{}.json", summary.run_id));

        summary.write_to(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let back: RunSummary = serde_json::from_str(&text).unwrap();
        assert_eq!(back, summary);
        assert!(text.contains("\"end_reason\": \"stop_requested\""));
        assert!(text.contains("\"controller\": \"mapped\""));
    }

    #[test]
    fn run_ids_are_unique() {
        let config = SimulationConfig::default();
        let a = RunSummary::new(&config, &result(), SwarmMetrics::default());
        let b = RunSummary::new(&config, &result(), SwarmMetrics::default());
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.run_id.get_version_num(), 7);
    }

    #[test]
    fn unwritable_path_is_an_io_error() {
        let config = SimulationConfig::default();
        let summary = RunSummary::new(&config, &result(), SwarmMetrics::default());
        let err = summary
            .write_to(Path::new("/nonexistent-dir/fordyca/summary.json"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }
}
