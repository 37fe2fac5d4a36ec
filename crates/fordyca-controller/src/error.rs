//! Controller error types.

use fordyca_oracle::OracleError;
use fordyca_perception::PerceptionError;
use fordyca_tasks::TaskError;

use crate::config::ControllerKind;

/// Errors raised while building or stepping a controller.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// An oracle-backed controller was built without an oracle.
    #[error("controller {kind} requires an oracle, but none is attached")]
    MissingOracle {
        /// The controller variant that needed it.
        kind: ControllerKind,
    },

    /// Perception update or fusion failed.
    #[error("perception failed: {source}")]
    Perception {
        /// Underlying error.
        #[from]
        source: PerceptionError,
    },

    /// The task executive failed.
    #[error("task executive failed: {source}")]
    Task {
        /// Underlying error.
        #[from]
        source: TaskError,
    },

    /// An oracle query failed.
    #[error("oracle query failed: {source}")]
    Oracle {
        /// Underlying error.
        #[from]
        source: OracleError,
    },
}
