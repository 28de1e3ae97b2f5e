//! Background synchronization: outbox worker, scheduler and retry policy.

mod retry;
mod sync_model;
mod sync_scheduler;
mod sync_worker;

pub use retry::*;
pub use sync_model::*;
pub use sync_scheduler::*;
pub use sync_worker::*;
