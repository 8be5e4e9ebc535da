//! Domain model types used throughout QuoteSync.
//!
//! These types bridge the reconciler, the store, the sync engine, and the
//! CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Quote records
// ---------------------------------------------------------------------------

/// A locally owned quote record.
///
/// `id` is unique within the local set at all times; `remote_id`, when
/// present, is unique among records that carry one. `text` is never empty
/// after normalization; callers guarantee this for records admitted to the
/// set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    /// Opaque local identifier (UUID v4).
    pub id: String,
    /// Opaque remote identifier, attached once the record is known upstream.
    pub remote_id: Option<String>,
    pub text: String,
    pub category: String,
    pub last_modified: DateTime<Utc>,
}

impl QuoteRecord {
    /// Create a new locally authored record (no `remote_id` yet).
    pub fn new(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            remote_id: None,
            text: text.into(),
            category: category.into(),
            last_modified: Utc::now(),
        }
    }
}

/// A quote item as served by the remote feed.
///
/// Deserialized leniently: missing fields default to empty strings so a
/// malformed item can be skipped individually instead of failing the whole
/// batch. The feed is untrusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteQuote {
    #[serde(default)]
    pub remote_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub category: String,
}

impl RemoteQuote {
    /// A well-formed item carries both an identifier and non-empty text.
    pub fn is_well_formed(&self) -> bool {
        !self.remote_id.is_empty() && !self.text.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Conflicts
// ---------------------------------------------------------------------------

/// A detected divergence between a local record and its remote counterpart.
///
/// The merge has already been applied in favour of the remote by the time the
/// caller sees this; `local` is the pre-image captured for reporting and for
/// the manual-override path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    /// Unique conflict ID.
    pub id: String,
    /// Snapshot of the local record before the remote overwrote it.
    pub local: QuoteRecord,
    /// The remote item that won.
    pub remote: RemoteQuote,
    pub detected_at: DateTime<Utc>,
}

impl Conflict {
    /// Capture a conflict pre-image with a fresh UUID.
    pub fn new(local: QuoteRecord, remote: RemoteQuote) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            local,
            remote,
            detected_at: Utc::now(),
        }
    }
}

/// Lifecycle status of a stored conflict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    /// Recorded by a sync cycle; remote version applied.
    Detected,
    /// The local version was manually re-sent outward.
    Overridden,
}

impl ConflictStatus {
    /// Parse a status string as stored in the database.
    pub fn from_str_val(s: &str) -> Self {
        match s {
            "overridden" => Self::Overridden,
            _ => Self::Detected,
        }
    }
}

impl std::fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Detected => write!(f, "detected"),
            Self::Overridden => write!(f, "overridden"),
        }
    }
}

// ---------------------------------------------------------------------------
// Cycle statistics & status
// ---------------------------------------------------------------------------

/// Statistics from a single sync cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleStats {
    pub remote_items: usize,
    pub conflicts: usize,
    pub admitted: usize,
    pub attached: usize,
    pub skipped_malformed: usize,
    pub changed: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// High-level engine status summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    pub quote_count: usize,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub total_cycles: i64,
    pub total_conflicts: i64,
    pub active_conflicts: i64,
    pub total_errors: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_has_unique_id_and_no_remote_id() {
        let a = QuoteRecord::new("To be", "drama");
        let b = QuoteRecord::new("To be", "drama");
        assert_ne!(a.id, b.id);
        assert!(a.remote_id.is_none());
    }

    #[test]
    fn test_remote_quote_well_formed() {
        let ok = RemoteQuote {
            remote_id: "7".into(),
            text: "Carpe diem".into(),
            category: "latin".into(),
        };
        assert!(ok.is_well_formed());

        let no_text = RemoteQuote {
            remote_id: "7".into(),
            text: String::new(),
            category: "latin".into(),
        };
        assert!(!no_text.is_well_formed());

        let no_id = RemoteQuote {
            remote_id: String::new(),
            text: "Carpe diem".into(),
            category: "latin".into(),
        };
        assert!(!no_id.is_well_formed());
    }

    #[test]
    fn test_remote_quote_lenient_deserialization() {
        // A feed item missing fields still deserializes; it is just not
        // well-formed.
        let item: RemoteQuote = serde_json::from_str(r#"{"remote_id": "3"}"#).unwrap();
        assert_eq!(item.remote_id, "3");
        assert!(item.text.is_empty());
        assert!(!item.is_well_formed());
    }

    #[test]
    fn test_conflict_status_round_trip() {
        assert_eq!(ConflictStatus::Detected.to_string(), "detected");
        assert_eq!(ConflictStatus::Overridden.to_string(), "overridden");
        assert_eq!(
            ConflictStatus::from_str_val("overridden"),
            ConflictStatus::Overridden
        );
        assert_eq!(
            ConflictStatus::from_str_val("anything-else"),
            ConflictStatus::Detected
        );
    }
}
