//! Umbra full node — wires the storage, chain, and mempool subsystems.
//!
//! The node is the top-level coordinator that:
//! - Opens the LMDB environment and seeds genesis state on first run
//! - Runs the chain engine that applies, removes, and rewinds blocks
//! - Runs the mempool worker that schedules candidate transactions
//! - Handles configuration, logging, and graceful shutdown

pub mod config;
pub mod error;
pub mod logging;
pub mod node;
pub mod shutdown;

pub use config::NodeConfig;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use node::UmbraNode;
pub use shutdown::ShutdownController;
