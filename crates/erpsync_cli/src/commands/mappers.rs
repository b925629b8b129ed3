//! Mapper listing.

use super::{display_id, open_store, CliError};
use crate::Format;
use erpsync_core::{Mapper, MapperFilter, MapperStore};
use std::fmt::Write;
use std::path::Path;

/// Builds the store filter from command-line options.
pub fn filter(
    kind: Option<String>,
    model: Option<String>,
    dirty: bool,
    search: Option<String>,
) -> MapperFilter {
    let mut filter = MapperFilter::all();
    if let Some(kind) = kind {
        filter = filter.kind(kind);
    }
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

/// Runs the mappers command.
pub fn run(path: &Path, filter: &MapperFilter, format: Format) -> Result<(), CliError> {
    let store = open_store(path)?;
    let mappers = store.mappers(filter)?;
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&mappers)?),
        Format::Text => print!("{}", render(&mappers)),
    }
    Ok(())
}

/// Formats mappers as aligned rows.
pub fn render(mappers: &[Mapper]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>6}  {:<16} {:>8}  {:<20} {:>8}  {:<16} {:>6}  modified",
        "id", "kind", "local", "model", "remote", "state", "parent"
    );
    for m in mappers {
        let _ = writeln!(
            out,
            "{:>6}  {:<16} {:>8}  {:<20} {:>8}  {:<16} {:>6}  {}",
            m.id.to_string(),
            m.local_kind,
            m.local_id,
            m.remote_model,
            display_id(m.remote_id),
            m.state().label(),
            display_id(m.parent),
            m.modified_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    let _ = writeln!(out, "{} mapper(s)", mappers.len());
    out
}
