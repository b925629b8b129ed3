//! Tombstone listing.

use super::{display_id, open_store, CliError};
use crate::Format;
use erpsync_core::{MapperStore, Tombstone, TombstoneFilter};
use std::fmt::Write;
use std::path::Path;

/// Builds the store filter from command-line options.
pub fn filter(model: Option<String>, dirty: bool, search: Option<String>) -> TombstoneFilter {
    let mut filter = TombstoneFilter::all();
    if let Some(model) = model {
        filter = filter.model(model);
    }
    if dirty {
        filter = filter.dirty(true);
    }
    if let Some(search) = search {
        filter = filter.search(search);
    }
    filter
}

/// Runs the tombstones command.
pub fn run(path: &Path, filter: &TombstoneFilter, format: Format) -> Result<(), CliError> {
    let store = open_store(path)?;
    let tombstones = store.tombstones(filter)?;
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&tombstones)?),
        Format::Text => print!("{}", render(&tombstones)),
    }
    Ok(())
}

/// Formats tombstones as aligned rows.
pub fn render(tombstones: &[Tombstone]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>6}  {:<16} {:>8}  {:<20} {:>8}  {:<8} {:>6}",
        "id", "kind", "local", "model", "remote", "pending", "parent"
    );
    for t in tombstones {
        let _ = writeln!(
            out,
            "{:>6}  {:<16} {:>8}  {:<20} {:>8}  {:<8} {:>6}",
            t.id.to_string(),
            t.local_kind,
            t.local_id,
            t.remote_model,
            display_id(t.remote_id),
            if t.dirty { "yes" } else { "no" },
            display_id(t.parent),
        );
    }
    let _ = writeln!(out, "{} tombstone(s)", tombstones.len());
    out
}
