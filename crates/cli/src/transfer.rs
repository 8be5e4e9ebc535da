//! JSON export / import of the local quote set.

use std::path::Path;

use anyhow::{Context, Result};

use quotesync_core::models::QuoteRecord;
use quotesync_core::store::Store;

use crate::quotes;
use crate::style;

/// `quotesync export`: write the full quote set to a JSON file.
pub fn export(store: &Store, output: &Path) -> Result<()> {
    let quotes = store.load_quotes()?;
    let file = std::fs::File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    serde_json::to_writer_pretty(file, &quotes).context("failed to serialize quotes")?;
    println!(
        "{}",
        style::success(&format!(
            "exported {} quotes to {}",
            quotes.len(),
            output.display()
        ))
    );
    Ok(())
}

/// `quotesync import`: load quotes from a JSON file.
///
/// With `--merge`, imported quotes join the existing set, skipping any whose
/// text is already present (exact match, like the reconciler's text index).
/// Without it, the imported set replaces the stored one.
pub fn import(store: &Store, input: &Path, merge: bool) -> Result<()> {
    let contents = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let imported: Vec<QuoteRecord> =
        serde_json::from_str(&contents).context("input is not a valid quote export")?;
    let imported = normalized(imported)?;

    let (kept, skipped) = if merge {
        merge_into(store, imported)?
    } else {
        let count = imported.len();
        store.save_quotes(&imported)?;
        (count, 0)
    };

    let mut message = format!("imported {kept} quotes from {}", input.display());
    if skipped > 0 {
        message.push_str(&format!(" ({skipped} duplicates skipped)"));
    }
    println!("{}", style::success(&message));
    Ok(())
}

/// Import files may be hand-edited; every record passes through the same
/// trim/reject-empty normalization as `add` before anything is persisted.
fn normalized(records: Vec<QuoteRecord>) -> Result<Vec<QuoteRecord>> {
    records
        .into_iter()
        .enumerate()
        .map(|(idx, mut record)| {
            let (text, category) = quotes::normalize(&record.text, &record.category)
                .with_context(|| format!("record {idx} in the import file"))?;
            record.text = text;
            record.category = category;
            Ok(record)
        })
        .collect()
}

fn merge_into(store: &Store, imported: Vec<QuoteRecord>) -> Result<(usize, usize)> {
    let mut quotes = store.load_quotes()?;
    let mut kept = 0;
    let mut skipped = 0;

    for mut quote in imported {
        if quotes.iter().any(|q| q.text == quote.text) {
            skipped += 1;
            continue;
        }
        // Imported ids may collide with existing records (e.g. importing an
        // edited copy of an earlier export); keep local id uniqueness.
        if quotes.iter().any(|q| q.id == quote.id) {
            quote.id = uuid::Uuid::new_v4().to_string();
        }
        quotes.push(quote);
        kept += 1;
    }

    store.save_quotes(&quotes)?;
    Ok((kept, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(texts: &[&str]) -> Store {
        let store = Store::in_memory().unwrap();
        store.initialize().unwrap();
        let quotes: Vec<QuoteRecord> =
            texts.iter().map(|t| QuoteRecord::new(*t, "x")).collect();
        store.save_quotes(&quotes).unwrap();
        store
    }

    #[test]
    fn test_export_import_replace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quotes.json");

        let store = store_with(&["One", "Two"]);
        export(&store, &path).unwrap();

        let other = store_with(&["Stale"]);
        import(&other, &path, false).unwrap();

        let loaded = other.load_quotes().unwrap();
        let texts: Vec<&str> = loaded.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, vec!["One", "Two"]);
    }

    #[test]
    fn test_import_merge_skips_duplicate_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quotes.json");

        let store = store_with(&["Shared", "Fresh"]);
        export(&store, &path).unwrap();

        let other = store_with(&["Shared"]);
        import(&other, &path, true).unwrap();

        let loaded = other.load_quotes().unwrap();
        assert_eq!(loaded.len(), 2);
        let texts: Vec<&str> = loaded.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, vec!["Shared", "Fresh"]);
    }

    #[test]
    fn test_import_rejects_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edited.json");

        let mut q = QuoteRecord::new("placeholder", "x");
        q.text = "   ".into();
        std::fs::write(&path, serde_json::to_string(&vec![q]).unwrap()).unwrap();

        let store = store_with(&[]);
        assert!(import(&store, &path, false).is_err());
        assert!(import(&store, &path, true).is_err());
        assert!(store.load_quotes().unwrap().is_empty());
    }

    #[test]
    fn test_import_trims_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("padded.json");

        let q = QuoteRecord::new("  Padded  ", "  cat  ");
        std::fs::write(&path, serde_json::to_string(&vec![q]).unwrap()).unwrap();

        let store = store_with(&[]);
        import(&store, &path, false).unwrap();

        let loaded = store.load_quotes().unwrap();
        assert_eq!(loaded[0].text, "Padded");
        assert_eq!(loaded[0].category, "cat");
    }

    #[test]
    fn test_import_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();

        let store = store_with(&[]);
        assert!(import(&store, &path, false).is_err());
    }
}
