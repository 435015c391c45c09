// [apps/worker/src/lib.rs]
//! Shard-claiming worker process.

pub mod claim;
pub mod errors;
pub mod heartbeat;
pub mod kernel;
pub mod metrics;
pub mod state;
pub mod supervisor;

pub use errors::WorkerError;
pub use kernel::WorkerKernel;
pub use state::WorkerState;
