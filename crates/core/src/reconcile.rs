//! Local/remote record reconciliation.
//!
//! Given the session-owned local record set and a freshly fetched remote
//! batch, the reconciler decides per remote item whether to overwrite a
//! diverged local record (server wins), attach a `remote_id` to an existing
//! text match, or admit a brand-new record. It is a pure function over the
//! two sequences: no I/O, and malformed remote items are skipped rather than
//! failing the batch.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info};

use crate::models::{Conflict, QuoteRecord, RemoteQuote};

/// Result of one reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Divergences detected this pass. The remote version has already been
    /// applied; each entry carries the local pre-image for reporting and for
    /// the manual-override path.
    pub conflicts: Vec<Conflict>,
    /// Whether the local set was mutated and needs persisting.
    pub changed: bool,
    /// Remote-only items admitted as new records.
    pub admitted: usize,
    /// Existing records that gained a `remote_id` via text match.
    pub attached: usize,
    /// Malformed remote items skipped.
    pub skipped: usize,
}

/// Pure divergence check between a local record and its remote counterpart.
///
/// Divergence in either field counts: a category-only mismatch on a
/// `remote_id` match is a conflict, same as a text mismatch.
pub fn diverges(local: &QuoteRecord, remote: &RemoteQuote) -> bool {
    local.text != remote.text || local.category != remote.category
}

/// Reconcile the local record set against one remote batch.
///
/// `local` is mutated in place; new admissions are appended in remote input
/// order, original local order is preserved. The caller is responsible for
/// persisting the set afterward when `changed` is true.
///
/// Lookup indices are rebuilt per call, as the set can be externally mutated
/// between cycles, so they are never cached. Both use first-match-wins on the
/// id-unique input, and the text index only covers records without a
/// `remote_id`, so reconciliation can never produce two records with the same
/// `remote_id`.
pub fn reconcile(local: &mut Vec<QuoteRecord>, remote: &[RemoteQuote]) -> ReconcileOutcome {
    info!(
        local_count = local.len(),
        remote_count = remote.len(),
        "reconciling local set against remote batch"
    );

    let now = Utc::now();
    let mut outcome = ReconcileOutcome::default();

    // Transient indices: record position by remote_id, and by exact text for
    // records that do not yet carry a remote_id.
    let mut by_remote_id: HashMap<String, usize> = HashMap::new();
    let mut by_text: HashMap<String, usize> = HashMap::new();
    for (idx, record) in local.iter().enumerate() {
        if let Some(ref rid) = record.remote_id {
            by_remote_id.entry(rid.clone()).or_insert(idx);
        } else {
            by_text.entry(record.text.clone()).or_insert(idx);
        }
    }

    for item in remote {
        if !item.is_well_formed() {
            debug!(remote_id = %item.remote_id, "skipping malformed remote item");
            outcome.skipped += 1;
            continue;
        }

        if let Some(&idx) = by_remote_id.get(&item.remote_id) {
            // Known upstream record: server wins on any divergence.
            let record = &mut local[idx];
            if diverges(record, item) {
                debug!(
                    id = %record.id,
                    remote_id = %item.remote_id,
                    "conflict: remote overwrites local"
                );
                outcome.conflicts.push(Conflict::new(record.clone(), item.clone()));
                record.text = item.text.clone();
                record.category = item.category.clone();
                record.last_modified = now;
                outcome.changed = true;
            }
        } else if let Some(&idx) = by_text.get(&item.text) {
            // Same text authored locally before the remote assigned it an
            // id: attach the remote_id. Not a conflict, and category is not
            // reconciled on this branch.
            let record = &mut local[idx];
            debug!(id = %record.id, remote_id = %item.remote_id, "attaching remote_id");
            record.remote_id = Some(item.remote_id.clone());
            record.last_modified = now;
            outcome.attached += 1;
            outcome.changed = true;

            // The record now carries a remote_id; keep the indices in step
            // so later items in this batch classify against it correctly.
            by_text.remove(&item.text);
            by_remote_id.entry(item.remote_id.clone()).or_insert(idx);
        } else {
            // Remote-only discovery: admit with a fresh local id.
            let record = QuoteRecord {
                id: uuid::Uuid::new_v4().to_string(),
                remote_id: Some(item.remote_id.clone()),
                text: item.text.clone(),
                category: item.category.clone(),
                last_modified: now,
            };
            debug!(id = %record.id, remote_id = %item.remote_id, "admitting remote quote");
            by_remote_id
                .entry(item.remote_id.clone())
                .or_insert(local.len());
            local.push(record);
            outcome.admitted += 1;
            outcome.changed = true;
        }
    }

    info!(
        conflicts = outcome.conflicts.len(),
        admitted = outcome.admitted,
        attached = outcome.attached,
        skipped = outcome.skipped,
        changed = outcome.changed,
        "reconciliation complete"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, remote_id: Option<&str>, text: &str, category: &str) -> QuoteRecord {
        QuoteRecord {
            id: id.to_string(),
            remote_id: remote_id.map(str::to_string),
            text: text.to_string(),
            category: category.to_string(),
            last_modified: Utc::now(),
        }
    }

    fn item(remote_id: &str, text: &str, category: &str) -> RemoteQuote {
        RemoteQuote {
            remote_id: remote_id.to_string(),
            text: text.to_string(),
            category: category.to_string(),
        }
    }

    #[test]
    fn test_empty_remote_is_noop() {
        let mut local = vec![record("a", None, "Hello", "X")];
        let before = local.clone();
        let outcome = reconcile(&mut local, &[]);
        assert!(!outcome.changed);
        assert!(outcome.conflicts.is_empty());
        assert_eq!(local, before);
    }

    #[test]
    fn test_server_wins_on_text_divergence() {
        let mut local = vec![record("a", Some("1"), "Old", "X")];
        let remote = vec![item("1", "New", "X")];
        let outcome = reconcile(&mut local, &remote);

        assert!(outcome.changed);
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].local.text, "Old");
        assert_eq!(outcome.conflicts[0].remote.text, "New");
        assert_eq!(local[0].text, "New");
        assert_eq!(local[0].id, "a");
    }

    #[test]
    fn test_category_only_divergence_is_a_conflict() {
        let mut local = vec![record("a", Some("1"), "Same", "X")];
        let remote = vec![item("1", "Same", "Y")];
        let outcome = reconcile(&mut local, &remote);

        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(local[0].category, "Y");
    }

    #[test]
    fn test_identical_content_is_noop() {
        let mut local = vec![record("a", Some("1"), "Same", "X")];
        let remote = vec![item("1", "Same", "X")];
        let outcome = reconcile(&mut local, &remote);

        assert!(!outcome.changed);
        assert!(outcome.conflicts.is_empty());
    }

    #[test]
    fn test_remote_only_item_is_admitted() {
        let mut local = vec![record("a", None, "Hello", "X")];
        let remote = vec![item("9", "Brand new", "Z")];
        let outcome = reconcile(&mut local, &remote);

        assert!(outcome.changed);
        assert_eq!(outcome.admitted, 1);
        assert_eq!(local.len(), 2);
        let admitted = &local[1];
        assert_eq!(admitted.remote_id.as_deref(), Some("9"));
        assert_eq!(admitted.text, "Brand new");
        assert_eq!(admitted.category, "Z");
        assert_ne!(admitted.id, "a");
    }

    #[test]
    fn test_text_match_attaches_remote_id_without_conflict() {
        // Category mismatch is irrelevant on this branch: the lookup was by
        // text, so category is not reconciled.
        let mut local = vec![record("a", None, "Hello", "X")];
        let remote = vec![item("1", "Hello", "Y")];
        let outcome = reconcile(&mut local, &remote);

        assert!(outcome.changed);
        assert_eq!(outcome.attached, 1);
        assert!(outcome.conflicts.is_empty());
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].remote_id.as_deref(), Some("1"));
        assert_eq!(local[0].category, "X");
    }

    #[test]
    fn test_text_match_with_existing_remote_id_admits_new_record() {
        // The text index only covers records without a remote_id; a record
        // already bound upstream must not be rebound to a second remote_id.
        let mut local = vec![record("a", Some("1"), "Hello", "X")];
        let remote = vec![item("2", "Hello", "X")];
        let outcome = reconcile(&mut local, &remote);

        assert_eq!(outcome.admitted, 1);
        assert_eq!(local.len(), 2);
        assert_eq!(local[0].remote_id.as_deref(), Some("1"));
        assert_eq!(local[1].remote_id.as_deref(), Some("2"));
    }

    #[test]
    fn test_malformed_items_skipped_mid_batch() {
        let mut local = Vec::new();
        let remote = vec![
            item("1", "First", "X"),
            item("2", "", "X"),   // no text
            item("", "Third", "X"), // no remote_id
            item("4", "Fourth", "X"),
        ];
        let outcome = reconcile(&mut local, &remote);

        assert_eq!(outcome.skipped, 2);
        assert_eq!(outcome.admitted, 2);
        assert_eq!(local.len(), 2);
        assert_eq!(local[0].text, "First");
        assert_eq!(local[1].text, "Fourth");
    }

    #[test]
    fn test_order_preserved_admissions_appended() {
        let mut local = vec![
            record("a", Some("1"), "One", "X"),
            record("b", None, "Two", "X"),
        ];
        let remote = vec![item("3", "Three", "X"), item("4", "Four", "X")];
        reconcile(&mut local, &remote);

        let texts: Vec<&str> = local.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["One", "Two", "Three", "Four"]);
    }

    #[test]
    fn test_duplicate_remote_id_within_batch_admits_once() {
        let mut local = Vec::new();
        let remote = vec![item("1", "Alpha", "X"), item("1", "Beta", "X")];
        let outcome = reconcile(&mut local, &remote);

        // The second item matches the record admitted by the first and is
        // classified as a conflict, not a second admission.
        assert_eq!(outcome.admitted, 1);
        assert_eq!(local.len(), 1);
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(local[0].text, "Beta");
    }

    #[test]
    fn test_idempotence() {
        let mut local = vec![
            record("a", Some("1"), "Old", "X"),
            record("b", None, "Hello", "X"),
        ];
        let remote = vec![
            item("1", "New", "X"),
            item("2", "Hello", "X"),
            item("3", "Fresh", "Z"),
        ];

        let first = reconcile(&mut local, &remote);
        assert!(first.changed);

        let second = reconcile(&mut local, &remote);
        assert!(!second.changed);
        assert!(second.conflicts.is_empty());
        assert_eq!(second.admitted, 0);
        assert_eq!(second.attached, 0);
    }

    #[test]
    fn test_attach_with_category_mismatch_converges_on_next_pass() {
        // Attach leaves the local category alone, so a mismatched category
        // surfaces as an ordinary conflict on the following pass, once the
        // record is bound by remote_id. The third pass is a no-op.
        let mut local = vec![record("a", None, "Hello", "X")];
        let remote = vec![item("1", "Hello", "Y")];

        let first = reconcile(&mut local, &remote);
        assert_eq!(first.attached, 1);
        assert!(first.conflicts.is_empty());
        assert_eq!(local[0].category, "X");

        let second = reconcile(&mut local, &remote);
        assert_eq!(second.conflicts.len(), 1);
        assert_eq!(local[0].category, "Y");

        let third = reconcile(&mut local, &remote);
        assert!(!third.changed);
        assert!(third.conflicts.is_empty());
    }

    #[test]
    fn test_every_well_formed_item_classified_exactly_once() {
        let mut local = vec![
            record("a", Some("1"), "Diverged", "X"),
            record("b", None, "Matched", "X"),
        ];
        let remote = vec![
            item("1", "Winner", "X"),
            item("2", "Matched", "X"),
            item("3", "Novel", "X"),
        ];
        let outcome = reconcile(&mut local, &remote);

        assert_eq!(
            outcome.conflicts.len() + outcome.attached + outcome.admitted,
            remote.len()
        );
        // No deletions, ever.
        assert_eq!(local.len(), 3);
    }
}
