//! Conflict inspection and the manual-override subcommands.

use anyhow::{bail, Result};
use comfy_table::{presets::UTF8_FULL, Table};

use quotesync_core::engine::SyncEngine;
use quotesync_core::models::ConflictStatus;
use quotesync_core::store::queries::ConflictRow;
use quotesync_core::store::Store;

use crate::quotes::short_id;
use crate::style;

fn parse_status(s: &str) -> Result<ConflictStatus> {
    match s {
        "detected" => Ok(ConflictStatus::Detected),
        "overridden" => Ok(ConflictStatus::Overridden),
        other => bail!("unknown conflict status '{other}' (expected: detected, overridden)"),
    }
}

/// `quotesync conflicts list`: table of recorded conflicts, newest first.
pub fn list(store: &Store, status: Option<&str>, limit: u32) -> Result<()> {
    let status = status.map(parse_status).transpose()?;
    let conflicts = store.list_conflicts(status, limit)?;

    if conflicts.is_empty() {
        println!("{}", style::dim("no conflicts"));
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Status", "Local text", "Remote text", "Detected"]);
    for c in &conflicts {
        table.add_row(vec![
            short_id(&c.id),
            c.status.to_string(),
            truncate(&c.local_text, 40),
            truncate(&c.remote_text, 40),
            c.detected_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// `quotesync conflicts show`: full detail of one conflict.
pub fn show(store: &Store, id: &str) -> Result<()> {
    let conflict = resolve(store, id)?;

    println!("{}", style::header(&format!("Conflict {}", conflict.id)));
    println!("  status       : {}", conflict.status);
    println!("  quote id     : {}", conflict.quote_id);
    println!("  remote id    : {}", conflict.remote_id);
    println!("  detected at  : {}", conflict.detected_at.to_rfc3339());
    if let Some(at) = conflict.overridden_at {
        println!("  overridden at: {}", at.to_rfc3339());
    }
    println!();
    println!("{}", style::header("Local (pre-image, overwritten):"));
    println!("  [{}] {}", conflict.local_category, conflict.local_text);
    println!("{}", style::header("Remote (applied):"));
    println!("  [{}] {}", conflict.remote_category, conflict.remote_text);
    Ok(())
}

/// `quotesync conflicts override`: re-send the local version outward.
pub async fn override_conflict(engine: &SyncEngine, id: &str) -> Result<()> {
    let conflict = resolve(engine.store(), id)?;
    engine.override_conflict(&conflict.id).await?;
    println!(
        "{}",
        style::success(&format!(
            "local version re-sent to remote for conflict {}",
            short_id(&conflict.id)
        ))
    );
    println!(
        "{}",
        style::dim("the merged set keeps the remote version until the feed reflects the override")
    );
    Ok(())
}

/// Resolve a possibly shortened conflict id.
fn resolve(store: &Store, prefix: &str) -> Result<ConflictRow> {
    let all = store.list_conflicts(None, u32::MAX)?;
    let matches: Vec<&ConflictRow> = all.iter().filter(|c| c.id.starts_with(prefix)).collect();
    match matches.as_slice() {
        [] => bail!("no conflict matches id '{prefix}'"),
        [one] => Ok((*one).clone()),
        _ => bail!("id '{prefix}' is ambiguous ({} matches)", matches.len()),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
