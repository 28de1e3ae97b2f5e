//! Domain layer of the offline-first expense cache.
//!
//! Callers read and write through the services in [`expenses`] and [`users`];
//! all reads are served from the local store and writes land there first as
//! `Pending` rows. The [`sync`] module drains those rows to the remote system
//! in the background through the [`gateway::RemoteGateway`] port. Storage and
//! transport implementations live in sibling crates and are injected at
//! construction time.

pub mod errors;
pub mod expenses;
pub mod gateway;
pub mod sync;
pub mod users;

pub use errors::{Error, Result};

#[cfg(test)]
pub(crate) mod testing;
