//! Journal statistics.

use super::{open_store, CliError};
use crate::Format;
use erpsync_core::{MapperFilter, MapperState, MapperStore, TombstoneFilter};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Row counts of a mapper store.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// All mappers.
    pub mappers: usize,
    /// Mappers whose remote object was never created.
    pub dirty_uncreated: usize,
    /// Mappers whose remote object is out of date.
    pub dirty_existing: usize,
    /// Mappers in sync.
    pub clean: usize,
    /// All tombstones.
    pub tombstones: usize,
    /// Tombstones whose remote deletion is pending.
    pub pending_deletions: usize,
    /// Mapper count per remote model.
    pub by_model: BTreeMap<String, usize>,
}

/// Counts the rows of a store.
pub fn collect<S: MapperStore + ?Sized>(store: &S) -> Result<StoreStats, CliError> {
    let mut stats = StoreStats::default();
    for mapper in store.mappers(&MapperFilter::all())? {
        stats.mappers += 1;
        match mapper.state() {
            MapperState::DirtyUncreated => stats.dirty_uncreated += 1,
            MapperState::DirtyExisting => stats.dirty_existing += 1,
            MapperState::Clean => stats.clean += 1,
        }
        *stats.by_model.entry(mapper.remote_model).or_insert(0) += 1;
    }
    for tombstone in store.tombstones(&TombstoneFilter::all())? {
        stats.tombstones += 1;
        if tombstone.dirty {
            stats.pending_deletions += 1;
        }
    }
    Ok(stats)
}

/// Runs the stats command.
pub fn run(path: &Path, format: Format) -> Result<(), CliError> {
    let store = open_store(path)?;
    let stats = collect(&store)?;
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        Format::Text => print_text(path, &stats, store.journal_size()?),
    }
    Ok(())
}

fn print_text(path: &Path, stats: &StoreStats, journal_size: u64) {
    println!("erpsync Journal");
    println!("===============");
    println!();
    println!("Path: {}", path.display());
    println!("Size: {journal_size} bytes");
    println!();
    println!("Mappers:          {}", stats.mappers);
    println!("  clean:          {}", stats.clean);
    println!("  dirty-existing: {}", stats.dirty_existing);
    println!("  dirty-uncreated:{:>2}", stats.dirty_uncreated);
    println!();
    println!("Tombstones:       {}", stats.tombstones);
    println!("  pending:        {}", stats.pending_deletions);

    if !stats.by_model.is_empty() {
        println!();
        println!("Models:");
        for (model, count) in &stats.by_model {
            println!("  {model:<24} {count}");
        }
    }
}
