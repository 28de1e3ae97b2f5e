//! Composition root for the offline-first expense cache.
//!
//! Builds the process-wide service graph (database, writer, repositories,
//! services, sync scheduler) from a [`RuntimeConfig`], owns the connectivity
//! signal the scheduler gates on, and manages the background nudge task.

mod config;
mod connectivity;
mod context;

pub use config::RuntimeConfig;
pub use connectivity::ConnectivityMonitor;
pub use context::ServiceContext;
