//! SQLite persistence for the expense cache.
//!
//! One database file holds the two cache tables. Reads go through an r2d2
//! connection pool; every mutation is funneled through a single writer thread
//! that wraps each job in an immediate transaction, so concurrent callers
//! never contend for SQLite's write lock. Repositories implement the storage
//! ports from `spendlog-core` and re-publish a watch snapshot after each
//! committed write.

pub mod db;
pub mod errors;
pub mod expenses;
pub mod schema;
pub mod users;
