//! QuoteSync core library.
//!
//! This crate provides the foundational components for local/remote quote
//! reconciliation: configuration, SQLite persistence, the reconciler itself,
//! the remote feed client, notifications, and the sync engine that ties them
//! together.

pub mod config;
pub mod engine;
pub mod errors;
pub mod models;
pub mod notify;
pub mod reconcile;
pub mod remote;
pub mod store;

// Re-exports for convenience.
pub use config::AppConfig;
pub use engine::SyncEngine;
pub use models::{QuoteRecord, RemoteQuote};
pub use reconcile::{reconcile, ReconcileOutcome};
pub use remote::RemoteClient;
pub use store::Store;
