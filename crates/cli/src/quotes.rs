//! Local quote management subcommands: add, list, remove, categories.

use anyhow::{bail, Result};
use comfy_table::{presets::UTF8_FULL, Table};

use quotesync_core::models::QuoteRecord;
use quotesync_core::store::Store;

use crate::style;

/// Normalize user input the same way records admitted to the set are
/// normalized: trimmed, and text must not end up empty.
pub fn normalize(text: &str, category: &str) -> Result<(String, String)> {
    let text = text.trim().to_string();
    if text.is_empty() {
        bail!("quote text must not be empty");
    }
    let category = category.trim().to_string();
    Ok((text, category))
}

/// `quotesync add`: insert a locally authored quote.
pub fn add(store: &Store, text: &str, category: &str) -> Result<()> {
    let (text, category) = normalize(text, category)?;
    let quote = QuoteRecord::new(text, category);
    store.insert_quote(&quote)?;
    println!("{}", style::success(&format!("added quote {}", quote.id)));
    Ok(())
}

/// `quotesync list`: print the quote set, optionally filtered by category.
pub fn list(store: &Store, category: Option<&str>) -> Result<()> {
    let quotes = store.load_quotes()?;
    let filtered: Vec<&QuoteRecord> = quotes
        .iter()
        .filter(|q| category.map_or(true, |c| q.category == c))
        .collect();

    if filtered.is_empty() {
        println!("{}", style::dim("no quotes"));
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Remote", "Category", "Text", "Modified"]);
    for q in filtered {
        table.add_row(vec![
            short_id(&q.id),
            q.remote_id.clone().unwrap_or_else(|| "-".into()),
            q.category.clone(),
            q.text.clone(),
            q.last_modified.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// `quotesync remove`: user-driven deletion of a local record.
///
/// Accepts a full id or a unique prefix (the `list` table shows the short
/// form).
pub fn remove(store: &Store, id: &str) -> Result<()> {
    let resolved = resolve_id(store, id)?;
    store.delete_quote(&resolved)?;
    println!("{}", style::success(&format!("removed quote {resolved}")));
    Ok(())
}

/// Resolve a possibly shortened id to the single record it addresses.
pub fn resolve_id(store: &Store, prefix: &str) -> Result<String> {
    let quotes = store.load_quotes()?;
    let matches: Vec<&QuoteRecord> = quotes.iter().filter(|q| q.id.starts_with(prefix)).collect();
    match matches.as_slice() {
        [] => bail!("no quote matches id '{prefix}'"),
        [one] => Ok(one.id.clone()),
        _ => bail!("id '{prefix}' is ambiguous ({} matches)", matches.len()),
    }
}

/// `quotesync categories`: distinct categories with counts.
pub fn categories(store: &Store) -> Result<()> {
    let cats = store.list_categories()?;
    if cats.is_empty() {
        println!("{}", style::dim("no quotes"));
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Category", "Quotes"]);
    for (name, count) in cats {
        table.add_row(vec![name, count.to_string()]);
    }
    println!("{table}");
    Ok(())
}

/// First segment of a UUID, enough to address records interactively.
pub fn short_id(id: &str) -> String {
    id.split('-').next().unwrap_or(id).to_string()
}
