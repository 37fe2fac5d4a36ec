//! Error types for the `fordyca-tasks` crate.

/// Errors raised by the task executive.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// A task name did not match any task in the graph.
    #[error("no such task: {0}")]
    NoSuchTask(String),

    /// Executive parameters are unusable.
    #[error("invalid task configuration: {reason}")]
    InvalidConfig {
        /// What is wrong.
        reason: String,
    },

    /// The estimate oracle could not answer.
    #[error("estimate oracle unavailable: {reason}")]
    OracleUnavailable {
        /// Why the oracle failed.
        reason: String,
    },
}
