//! Error types for the `fordyca-oracle` crate.

/// Errors raised by oracle queries.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The query key does not name any oracle table.
    #[error("unknown oracle query: {0}")]
    UnknownQuery(String),

    /// An estimate was requested for a task the oracle does not track.
    #[error("no such task: {0}")]
    NoSuchTask(String),

    /// The requested oracle table is switched off.
    #[error("oracle {what} are disabled")]
    Disabled {
        /// Which table.
        what: &'static str,
    },

    /// A thread panicked while holding an oracle lock.
    #[error("oracle {what} lock poisoned")]
    Poisoned {
        /// Which lock.
        what: &'static str,
    },
}
