//! SQLite persistence layer for QuoteSync.
//!
//! Provides a [`Store`] handle with WAL-mode journaling, automatic schema
//! migrations, and query helpers for the quote set, conflict history, sync
//! log, and app state.

pub mod queries;
pub mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::StoreError;

/// Main store handle wrapping a SQLite connection.
///
/// The connection is opened in WAL mode and wrapped in a `Mutex` so that
/// `Store` is `Send + Sync`, enabling use inside `Arc`.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) a SQLite store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening store");

        let conn = Connection::open(path)?;

        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;

        debug!("store opened with WAL mode");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run all schema migrations to bring the store up to date.
    pub fn initialize(&self) -> Result<(), StoreError> {
        info!("initializing store schema");
        let conn = self.conn();
        schema::run_migrations(&conn)?;
        debug!("store schema is up to date");
        Ok(())
    }

    /// Obtain a lock on the underlying connection.
    ///
    /// Prefer the typed query methods on [`Store`] over raw SQL whenever
    /// possible. If the Mutex is poisoned (a previous holder panicked), the
    /// lock is recovered rather than propagating a panic.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("store mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
