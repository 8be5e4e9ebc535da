//! Typed query helpers for every table in the QuoteSync store.

use chrono::{DateTime, Utc};
use rusqlite::params;
use tracing::debug;

use super::Store;
use crate::errors::StoreError;
use crate::models::{Conflict, ConflictStatus, CycleStats, QuoteRecord};

// ---------------------------------------------------------------------------
// Row structs returned by queries
// ---------------------------------------------------------------------------

/// A row from the `conflicts` table.
#[derive(Debug, Clone)]
pub struct ConflictRow {
    pub id: String,
    pub quote_id: String,
    pub local_text: String,
    pub local_category: String,
    pub remote_id: String,
    pub remote_text: String,
    pub remote_category: String,
    pub status: ConflictStatus,
    pub detected_at: DateTime<Utc>,
    pub overridden_at: Option<DateTime<Utc>>,
}

/// A row from the `sync_log` table.
#[derive(Debug, Clone)]
pub struct SyncLogRow {
    pub id: i64,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub remote_items: i64,
    pub conflicts: i64,
    pub admitted: i64,
    pub attached: i64,
    pub skipped: i64,
    pub changed: bool,
    pub success: bool,
    pub details: Option<String>,
}

fn parse_ts(idx: usize, s: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

// ---------------------------------------------------------------------------
// Query implementations
// ---------------------------------------------------------------------------

impl Store {
    // -- quotes -------------------------------------------------------------

    /// Load the full quote set in stored order.
    pub fn load_quotes(&self) -> Result<Vec<QuoteRecord>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, remote_id, text, category, last_modified
             FROM quotes ORDER BY position",
        )?;
        let quotes = stmt
            .query_map([], |row| {
                Ok(QuoteRecord {
                    id: row.get(0)?,
                    remote_id: row.get(1)?,
                    text: row.get(2)?,
                    category: row.get(3)?,
                    last_modified: parse_ts(4, row.get(4)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = quotes.len(), "loaded quotes");
        Ok(quotes)
    }

    /// Replace the entire quote set inside one transaction.
    ///
    /// The set is small and owned whole by the session, so replace-all is
    /// simpler and safer than diffing rows against the merged state.
    pub fn save_quotes(&self, quotes: &[QuoteRecord]) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM quotes", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO quotes (id, remote_id, text, category, last_modified, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (position, q) in quotes.iter().enumerate() {
                stmt.execute(params![
                    q.id,
                    q.remote_id,
                    q.text,
                    q.category,
                    q.last_modified.to_rfc3339(),
                    position as i64,
                ])?;
            }
        }
        tx.commit()?;
        debug!(count = quotes.len(), "saved quote set");
        Ok(())
    }

    /// Append a single record to the stored set (CLI add path).
    pub fn insert_quote(&self, quote: &QuoteRecord) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO quotes (id, remote_id, text, category, last_modified, position)
             VALUES (?1, ?2, ?3, ?4, ?5,
                     (SELECT COALESCE(MAX(position), -1) + 1 FROM quotes))",
            params![
                quote.id,
                quote.remote_id,
                quote.text,
                quote.category,
                quote.last_modified.to_rfc3339(),
            ],
        )?;
        debug!(id = %quote.id, "inserted quote");
        Ok(())
    }

    /// Delete a record by local id (user-driven; reconciliation never
    /// deletes).
    pub fn delete_quote(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn();
        let affected = conn.execute("DELETE FROM quotes WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StoreError::NotFound {
                entity: "quote".into(),
                id: id.to_string(),
            });
        }
        debug!(id, "deleted quote");
        Ok(())
    }

    /// Distinct categories with their record counts.
    pub fn list_categories(&self) -> Result<Vec<(String, i64)>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT category, COUNT(*) FROM quotes GROUP BY category ORDER BY category",
        )?;
        let categories = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// Number of stored quotes.
    pub fn count_quotes(&self) -> Result<i64, StoreError> {
        let conn = self.conn();
        let count = conn.query_row("SELECT COUNT(*) FROM quotes", [], |row| row.get(0))?;
        Ok(count)
    }

    // -- conflicts ----------------------------------------------------------

    /// Persist a detected conflict (pre-image + winning remote item).
    pub fn insert_conflict(&self, conflict: &Conflict) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO conflicts
               (id, quote_id, local_text, local_category,
                remote_id, remote_text, remote_category, status, detected_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'detected', ?8)",
            params![
                conflict.id,
                conflict.local.id,
                conflict.local.text,
                conflict.local.category,
                conflict.remote.remote_id,
                conflict.remote.text,
                conflict.remote.category,
                conflict.detected_at.to_rfc3339(),
            ],
        )?;
        debug!(id = %conflict.id, quote_id = %conflict.local.id, "inserted conflict");
        Ok(())
    }

    /// Fetch a single conflict by id.
    pub fn get_conflict(&self, id: &str) -> Result<Option<ConflictRow>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, quote_id, local_text, local_category,
                    remote_id, remote_text, remote_category,
                    status, detected_at, overridden_at
             FROM conflicts WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], conflict_from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// List conflicts, optionally filtered by status, newest first.
    pub fn list_conflicts(
        &self,
        status: Option<ConflictStatus>,
        limit: u32,
    ) -> Result<Vec<ConflictRow>, StoreError> {
        let conn = self.conn();
        let rows = match status {
            Some(status) => {
                let mut stmt = conn.prepare(
                    "SELECT id, quote_id, local_text, local_category,
                            remote_id, remote_text, remote_category,
                            status, detected_at, overridden_at
                     FROM conflicts WHERE status = ?1
                     ORDER BY detected_at DESC LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(params![status.to_string(), limit], conflict_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, quote_id, local_text, local_category,
                            remote_id, remote_text, remote_category,
                            status, detected_at, overridden_at
                     FROM conflicts ORDER BY detected_at DESC LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map(params![limit], conflict_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(rows)
    }

    /// Mark a conflict as overridden (local version re-sent outward).
    pub fn mark_conflict_overridden(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn();
        let affected = conn.execute(
            "UPDATE conflicts SET status = 'overridden', overridden_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound {
                entity: "conflict".into(),
                id: id.to_string(),
            });
        }
        debug!(id, "conflict marked overridden");
        Ok(())
    }

    /// Total conflicts ever recorded.
    pub fn count_all_conflicts(&self) -> Result<i64, StoreError> {
        let conn = self.conn();
        let count = conn.query_row("SELECT COUNT(*) FROM conflicts", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Conflicts still in `detected` state.
    pub fn count_active_conflicts(&self) -> Result<i64, StoreError> {
        let conn = self.conn();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM conflicts WHERE status = 'detected'",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // -- sync log -----------------------------------------------------------

    /// Record the outcome of one sync cycle.
    pub fn insert_sync_log(
        &self,
        stats: &CycleStats,
        success: bool,
        details: Option<&str>,
    ) -> Result<i64, StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sync_log
               (started_at, completed_at, remote_items, conflicts, admitted,
                attached, skipped, changed, success, details)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                stats
                    .started_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| Utc::now().to_rfc3339()),
                stats.completed_at.map(|t| t.to_rfc3339()),
                stats.remote_items as i64,
                stats.conflicts as i64,
                stats.admitted as i64,
                stats.attached as i64,
                stats.skipped_malformed as i64,
                stats.changed,
                success,
                details,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Return the most recent sync-log rows, newest first.
    pub fn list_sync_log(&self, limit: u32) -> Result<Vec<SyncLogRow>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, started_at, completed_at, remote_items, conflicts,
                    admitted, attached, skipped, changed, success, details
             FROM sync_log ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(SyncLogRow {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    completed_at: row.get(2)?,
                    remote_items: row.get(3)?,
                    conflicts: row.get(4)?,
                    admitted: row.get(5)?,
                    attached: row.get(6)?,
                    skipped: row.get(7)?,
                    changed: row.get(8)?,
                    success: row.get(9)?,
                    details: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Total sync cycles recorded.
    pub fn count_sync_cycles(&self) -> Result<i64, StoreError> {
        let conn = self.conn();
        let count = conn.query_row("SELECT COUNT(*) FROM sync_log", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Failed sync cycles recorded.
    pub fn count_sync_errors(&self) -> Result<i64, StoreError> {
        let conn = self.conn();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM sync_log WHERE success = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // -- app state ----------------------------------------------------------

    /// Upsert a key/value state entry.
    pub fn set_state(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO app_state (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Read a state value by key.
    pub fn get_state(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT value FROM app_state WHERE key = ?1")?;
        let mut rows = stmt.query_map(params![key], |row| row.get(0))?;
        match rows.next() {
            Some(Ok(value)) => Ok(Some(value)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }
}

fn conflict_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConflictRow> {
    let status: String = row.get(7)?;
    let overridden_at: Option<String> = row.get(9)?;
    Ok(ConflictRow {
        id: row.get(0)?,
        quote_id: row.get(1)?,
        local_text: row.get(2)?,
        local_category: row.get(3)?,
        remote_id: row.get(4)?,
        remote_text: row.get(5)?,
        remote_category: row.get(6)?,
        status: ConflictStatus::from_str_val(&status),
        detected_at: parse_ts(8, row.get(8)?)?,
        overridden_at: overridden_at.map(|s| parse_ts(9, s)).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RemoteQuote;

    fn store() -> Store {
        let store = Store::in_memory().unwrap();
        store.initialize().unwrap();
        store
    }

    fn record(text: &str, category: &str) -> QuoteRecord {
        QuoteRecord::new(text, category)
    }

    #[test]
    fn test_quote_round_trip_preserves_order() {
        let store = store();
        let quotes = vec![
            record("Third first", "a"),
            record("Alpha second", "b"),
            record("Mid last", "a"),
        ];
        store.save_quotes(&quotes).unwrap();

        let loaded = store.load_quotes().unwrap();
        let texts: Vec<&str> = loaded.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, vec!["Third first", "Alpha second", "Mid last"]);
        assert_eq!(loaded[0].id, quotes[0].id);
    }

    #[test]
    fn test_save_is_replace_all() {
        let store = store();
        store.save_quotes(&[record("One", "x"), record("Two", "x")]).unwrap();
        store.save_quotes(&[record("Only", "y")]).unwrap();

        let loaded = store.load_quotes().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].text, "Only");
    }

    #[test]
    fn test_insert_quote_appends() {
        let store = store();
        store.save_quotes(&[record("First", "x")]).unwrap();
        store.insert_quote(&record("Second", "x")).unwrap();

        let loaded = store.load_quotes().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].text, "Second");
    }

    #[test]
    fn test_delete_quote() {
        let store = store();
        let q = record("Doomed", "x");
        store.insert_quote(&q).unwrap();
        store.delete_quote(&q.id).unwrap();
        assert_eq!(store.count_quotes().unwrap(), 0);

        let result = store.delete_quote("nonexistent");
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_categories() {
        let store = store();
        store
            .save_quotes(&[record("A", "x"), record("B", "x"), record("C", "y")])
            .unwrap();
        let cats = store.list_categories().unwrap();
        assert_eq!(cats, vec![("x".to_string(), 2), ("y".to_string(), 1)]);
    }

    #[test]
    fn test_conflict_lifecycle() {
        let store = store();
        let local = record("Local version", "x");
        let remote = RemoteQuote {
            remote_id: "7".into(),
            text: "Remote version".into(),
            category: "x".into(),
        };
        let conflict = Conflict::new(local.clone(), remote);
        store.insert_conflict(&conflict).unwrap();

        let row = store.get_conflict(&conflict.id).unwrap().unwrap();
        assert_eq!(row.status, ConflictStatus::Detected);
        assert_eq!(row.local_text, "Local version");
        assert_eq!(row.quote_id, local.id);
        assert_eq!(store.count_active_conflicts().unwrap(), 1);

        store.mark_conflict_overridden(&conflict.id).unwrap();
        let row = store.get_conflict(&conflict.id).unwrap().unwrap();
        assert_eq!(row.status, ConflictStatus::Overridden);
        assert!(row.overridden_at.is_some());
        assert_eq!(store.count_active_conflicts().unwrap(), 0);
        assert_eq!(store.count_all_conflicts().unwrap(), 1);
    }

    #[test]
    fn test_list_conflicts_filter() {
        let store = store();
        for i in 0..3 {
            let conflict = Conflict::new(
                record(&format!("local {i}"), "x"),
                RemoteQuote {
                    remote_id: i.to_string(),
                    text: format!("remote {i}"),
                    category: "x".into(),
                },
            );
            store.insert_conflict(&conflict).unwrap();
            if i == 0 {
                store.mark_conflict_overridden(&conflict.id).unwrap();
            }
        }

        assert_eq!(store.list_conflicts(None, 10).unwrap().len(), 3);
        assert_eq!(
            store
                .list_conflicts(Some(ConflictStatus::Detected), 10)
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            store
                .list_conflicts(Some(ConflictStatus::Overridden), 10)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_sync_log_counts() {
        let store = store();
        let stats = CycleStats {
            remote_items: 5,
            conflicts: 1,
            changed: true,
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            ..Default::default()
        };
        store.insert_sync_log(&stats, true, None).unwrap();
        store
            .insert_sync_log(&CycleStats::default(), false, Some("fetch failed"))
            .unwrap();

        assert_eq!(store.count_sync_cycles().unwrap(), 2);
        assert_eq!(store.count_sync_errors().unwrap(), 1);

        let rows = store.list_sync_log(10).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].success);
        assert_eq!(rows[0].details.as_deref(), Some("fetch failed"));
    }

    #[test]
    fn test_app_state_upsert() {
        let store = store();
        assert_eq!(store.get_state("last_sync_at").unwrap(), None);
        store.set_state("last_sync_at", "t1").unwrap();
        store.set_state("last_sync_at", "t2").unwrap();
        assert_eq!(store.get_state("last_sync_at").unwrap().as_deref(), Some("t2"));
    }
}
