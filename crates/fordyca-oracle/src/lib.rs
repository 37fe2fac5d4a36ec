//! The oracle: ground truth for upper-bound experiments.
//!
//! An [`OracleManager`] is owned by the simulation and shared with robots
//! through an `Arc`. Once per tick, before any robot steps, the simulation
//! calls [`OracleManager::update`] to publish a fresh snapshot of the
//! arena's free blocks and caches. Robots configured to use the oracle read
//! that snapshot in place of their own perceived map, and task executives
//! consult its swarm-wide task estimates in place of their local ones.
//!
//! Normal robots never touch the oracle.
//!
//! # Modules
//!
//! - [`manager`] -- [`OracleManager`], the string-keyed [`OracleQuery`]
//!   interface, and the [`EstimateOracle`](fordyca_tasks::EstimateOracle)
//!   implementation.
//! - [`error`] -- Error types for oracle queries.

pub mod error;
pub mod manager;

pub use error::OracleError;
pub use manager::{EntitySnapshot, OracleAnswer, OracleManager, OracleParams, OracleQuery};
