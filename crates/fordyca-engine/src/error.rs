//! Error types for the engine binary.

/// Top-level error for the engine binary.
///
/// Each variant wraps a subsystem error so `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: fordyca_core::ConfigError,
    },

    /// The arena or swarm could not be assembled.
    #[error("spawn error: {source}")]
    Spawn {
        /// The underlying spawn error.
        #[from]
        source: fordyca_core::SpawnError,
    },

    /// Simulation runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: fordyca_core::RunnerError,
    },

    /// The run summary could not be written.
    #[error("summary write error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The run summary could not be serialized.
    #[error("summary serialization error: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}
