//! HTTP/JSON implementation of the remote expense gateway.

mod client;

pub use client::ExpenseApiClient;
