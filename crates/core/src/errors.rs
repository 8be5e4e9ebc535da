//! Error types for the QuoteSync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Notification(#[from] NotificationError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Errors from the SQLite persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying rusqlite error.
    #[error("store error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// A migration failed.
    #[error("store migration failed (version {version}): {detail}")]
    MigrationFailed { version: u32, detail: String },

    /// A record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Generic I/O error (e.g. file permissions).
    #[error("store I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Remote feed errors
// ---------------------------------------------------------------------------

/// Errors from the remote quote feed client.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP-level transport error (network, TLS, timeout).
    #[error("remote HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The endpoint returned a non-success status code.
    #[error("remote feed error (HTTP {status}): {body}")]
    ApiError { status: u16, body: String },

    /// The response body could not be decoded as a quote list.
    #[error("remote response parse error: {0}")]
    ParseError(String),
}

// ---------------------------------------------------------------------------
// Sync engine errors
// ---------------------------------------------------------------------------

/// Errors from the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another sync cycle is already running.
    #[error("sync already in progress (started at {started_at})")]
    AlreadyRunning { started_at: String },

    /// The remote fetch failed; the whole cycle is skipped.
    #[error("remote fetch failed, cycle skipped: {0}")]
    Fetch(#[source] RemoteError),

    /// Persisting the merged set failed; in-memory state is retained.
    #[error("failed to persist merged quotes: {0}")]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Conflict errors
// ---------------------------------------------------------------------------

/// Errors from conflict inspection and the manual-override path.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// The requested conflict ID was not found.
    #[error("conflict not found: {0}")]
    NotFound(String),

    /// Attempted to override a conflict that was already overridden.
    #[error("conflict {0} is already overridden")]
    AlreadyOverridden(String),

    /// Pushing the local version outward failed.
    #[error("failed to push local version for conflict {id}: {source}")]
    PushFailed {
        id: String,
        #[source]
        source: RemoteError,
    },

    /// Store error while reading or updating conflict rows.
    #[error("conflict store error: {0}")]
    StoreError(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Notification errors
// ---------------------------------------------------------------------------

/// Errors from the notification subsystem.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Webhook delivery failed.
    #[error("webhook notification failed: {0}")]
    WebhookError(String),

    /// HTTP error during notification delivery.
    #[error("notification HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}
