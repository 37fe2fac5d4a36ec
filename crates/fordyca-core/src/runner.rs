//! Simulation loop runner with stop control.
//!
//! [`run_simulation`] drives [`run_tick`] until the tick limit is reached
//! or a stop is requested through the shared [`RunControl`] (the engine
//! binary wires Ctrl-C to it). Ticks are paced by the configured interval.
//!
//! [`run_tick`]: crate::tick::run_tick

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::tick::{self, SimulationState, TickError, TickSummary};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick execution failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Reason why the simulation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationEndReason {
    /// Reached the configured `max_ticks` limit.
    MaxTicksReached,
    /// A stop was requested.
    StopRequested,
}

/// Shared run control, readable from the tick loop without locks.
#[derive(Debug)]
pub struct RunControl {
    stop_requested: AtomicBool,
    tick_interval_ms: AtomicU64,
    max_ticks: u64,
    started_at: DateTime<Utc>,
}

impl RunControl {
    /// Control state for a run bounded by `config`.
    pub fn new(config: &RunConfig) -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            tick_interval_ms: AtomicU64::new(config.tick_interval_ms),
            max_ticks: config.max_ticks,
            started_at: Utc::now(),
        }
    }

    /// Ask the loop to stop before its next tick.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Pause between ticks, in milliseconds.
    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms.load(Ordering::Acquire)
    }

    /// Change the pause between ticks.
    pub fn set_tick_interval_ms(&self, ms: u64) {
        self.tick_interval_ms.store(ms, Ordering::Release);
    }

    /// Tick limit (0 = unlimited).
    pub const fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    /// Whether `tick` is the last tick of the run.
    pub const fn tick_limit_reached(&self, tick: u64) -> bool {
        self.max_ticks > 0 && tick >= self.max_ticks
    }

    /// Wall-clock start of the run.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Result of the simulation run.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: SimulationEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed.
    pub total_ticks: u64,
    /// Wall-clock start of the run.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end of the run.
    pub ended_at: DateTime<Utc>,
}

/// Callback invoked after each tick completes.
pub trait TickCallback: Send {
    /// Called after a tick completes successfully.
    fn on_tick(&mut self, summary: &TickSummary, state: &SimulationState);
}

/// A no-op tick callback for testing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _state: &SimulationState) {}
}

/// Run the simulation loop until a termination condition is met.
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick execution fails.
pub async fn run_simulation(
    state: &mut SimulationState,
    control: &Arc<RunControl>,
    callback: &mut dyn TickCallback,
) -> Result<SimulationResult, RunnerError> {
    let mut last_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;
    let started_at = control.started_at();

    info!(
        max_ticks = control.max_ticks(),
        tick_interval_ms = control.tick_interval_ms(),
        robots = state.robots.len(),
        "Simulation starting"
    );

    let end_reason = loop {
        // --- Check stop request (before tick) ---
        if control.is_stop_requested() {
            info!(tick = state.tick, "Stop requested");
            break SimulationEndReason::StopRequested;
        }

        // --- Execute tick ---
        let summary = tick::run_tick(state)?;
        total_ticks = total_ticks.saturating_add(1);
        callback.on_tick(&summary, state);
        last_summary = Some(summary);

        // --- Check tick limit (after tick) ---
        if control.tick_limit_reached(summary.tick) {
            info!(
                tick = summary.tick,
                max_ticks = control.max_ticks(),
                "Tick limit reached"
            );
            break SimulationEndReason::MaxTicksReached;
        }

        // --- Pace ---
        let interval_ms = control.tick_interval_ms();
        if interval_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(interval_ms)).await;
        } else {
            tokio::task::yield_now().await;
        }
    };

    Ok(SimulationResult {
        end_reason,
        final_summary: last_summary,
        total_ticks,
        started_at,
        ended_at: Utc::now(),
    })
}

/// Log the simulation end sequence.
pub fn log_simulation_end(result: &SimulationResult) {
    let elapsed = result.ended_at.signed_duration_since(result.started_at);
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        elapsed_ms = elapsed.num_milliseconds(),
        "Simulation ended"
    );
    if result.final_summary.is_none() {
        warn!("Simulation ended with no ticks executed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::spawn::build_simulation;

    fn small_config(max_ticks: u64) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.simulation.n_robots = 2;
        config.simulation.max_ticks = max_ticks;
        config
    }

    struct Counting(u64);

    impl TickCallback for Counting {
        fn on_tick(&mut self, _summary: &TickSummary, _state: &SimulationState) {
            self.0 = self.0.saturating_add(1);
        }
    }

    #[tokio::test]
    async fn stops_at_tick_limit() {
        let config = small_config(5);
        let mut state = build_simulation(&config).unwrap();
        let control = Arc::new(RunControl::new(&config.simulation));
        let mut cb = Counting(0);
        let result = run_simulation(&mut state, &control, &mut cb).await.unwrap();
        assert_eq!(result.end_reason, SimulationEndReason::MaxTicksReached);
        assert_eq!(result.total_ticks, 5);
        assert_eq!(result.final_summary.unwrap().tick, 5);
        assert_eq!(cb.0, 5);
    }

    #[tokio::test]
    async fn stop_request_ends_before_next_tick() {
        let config = small_config(0);
        let mut state = build_simulation(&config).unwrap();
        let control = Arc::new(RunControl::new(&config.simulation));
        control.request_stop();
        let result = run_simulation(&mut state, &control, &mut NoOpCallback)
            .await
            .unwrap();
        assert_eq!(result.end_reason, SimulationEndReason::StopRequested);
        assert_eq!(result.total_ticks, 0);
        assert!(result.final_summary.is_none());
    }

    #[test]
    fn unlimited_run_never_hits_limit() {
        let control = RunControl::new(&small_config(0).simulation);
        assert!(!control.tick_limit_reached(u64::MAX));
        let control = RunControl::new(&small_config(3).simulation);
        assert!(!control.tick_limit_reached(2));
        assert!(control.tick_limit_reached(3));
    }
}
