//! Table model shared by the store implementations.
//!
//! Every mutation is split in two steps: `plan_*` validates against the
//! current tables and returns the journal entries describing the change,
//! then `apply` folds those entries in. The memory store applies them
//! directly; the journal store persists them first.

use super::journal::JournalEntry;
use super::{MapperFilter, TombstoneFilter};
use crate::error::{StoreError, StoreResult};
use crate::mapper::{Mapper, MapperKey, NewMapper, NewTombstone, Tombstone};
use crate::types::{MapperId, ObjectId, Timestamp, TombstoneId};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
pub(crate) struct Tables {
    mappers: BTreeMap<MapperId, Mapper>,
    keys: HashMap<MapperKey, MapperId>,
    tombstones: BTreeMap<TombstoneId, Tombstone>,
    next_mapper: u64,
    next_tombstone: u64,
}

impl Tables {
    pub(crate) fn new() -> Self {
        Self {
            next_mapper: 1,
            next_tombstone: 1,
            ..Self::default()
        }
    }

    pub(crate) fn get(&self, id: MapperId) -> Option<Mapper> {
        self.mappers.get(&id).cloned()
    }

    pub(crate) fn find(&self, key: &MapperKey) -> Option<Mapper> {
        self.keys.get(key).and_then(|id| self.get(*id))
    }

    pub(crate) fn lookup(&self, kind: &str, local_id: ObjectId, model: &str) -> Option<Mapper> {
        let top = MapperKey::new(kind, local_id, model, None);
        if let Some(found) = self.find(&top) {
            return Some(found);
        }
        self.mappers
            .values()
            .find(|m| m.local_kind == kind && m.local_id == local_id && m.remote_model == model)
            .cloned()
    }

    pub(crate) fn children(&self, id: MapperId) -> Vec<Mapper> {
        self.mappers
            .values()
            .filter(|m| m.parent == Some(id))
            .cloned()
            .collect()
    }

    pub(crate) fn mappers(&self, filter: &MapperFilter) -> Vec<Mapper> {
        self.mappers
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect()
    }

    pub(crate) fn get_tombstone(&self, id: TombstoneId) -> Option<Tombstone> {
        self.tombstones.get(&id).cloned()
    }

    pub(crate) fn tombstone_children(&self, id: TombstoneId) -> Vec<Tombstone> {
        self.tombstones
            .values()
            .filter(|t| t.parent == Some(id))
            .cloned()
            .collect()
    }

    pub(crate) fn tombstones(&self, filter: &TombstoneFilter) -> Vec<Tombstone> {
        self.tombstones
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect()
    }

    pub(crate) fn mapper_count(&self) -> usize {
        self.mappers.len()
    }

    pub(crate) fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }

    pub(crate) fn plan_insert(&self, new: NewMapper) -> StoreResult<(Mapper, Vec<JournalEntry>)> {
        if let Some(existing) = self.keys.get(&new.key) {
            return Err(duplicate(&new.key, *existing));
        }
        if let Some(parent) = new.key.parent {
            if !self.mappers.contains_key(&parent) {
                return Err(StoreError::MissingParent(parent));
            }
        }
        let mapper = new.into_mapper(MapperId(self.next_mapper));
        Ok((mapper.clone(), vec![JournalEntry::PutMapper(mapper)]))
    }

    pub(crate) fn plan_update(&self, mapper: &Mapper) -> StoreResult<Vec<JournalEntry>> {
        let current = self
            .mappers
            .get(&mapper.id)
            .ok_or(StoreError::MapperNotFound(mapper.id))?;
        let key = mapper.key();
        if key != current.key() {
            if let Some(existing) = self.keys.get(&key) {
                return Err(duplicate(&key, *existing));
            }
            if let Some(parent) = key.parent {
                if parent == mapper.id || !self.mappers.contains_key(&parent) {
                    return Err(StoreError::MissingParent(parent));
                }
            }
        }
        Ok(vec![JournalEntry::PutMapper(mapper.clone())])
    }

    /// Removed rows come back parent first; entries are ordered deepest
    /// first so a torn journal tail never leaves an orphan behind.
    pub(crate) fn plan_remove(
        &self,
        id: MapperId,
    ) -> StoreResult<(Vec<Mapper>, Vec<JournalEntry>)> {
        let root = self.get(id).ok_or(StoreError::MapperNotFound(id))?;
        let mut removed = vec![root];
        let mut i = 0;
        while i < removed.len() {
            let children = self.children(removed[i].id);
            removed.extend(children);
            i += 1;
        }
        let entries = removed
            .iter()
            .rev()
            .map(|m| JournalEntry::RemoveMapper(m.id))
            .collect();
        Ok((removed, entries))
    }

    pub(crate) fn plan_insert_tombstone(
        &self,
        new: NewTombstone,
    ) -> StoreResult<(Tombstone, Vec<JournalEntry>)> {
        if let Some(parent) = new.parent {
            if !self.tombstones.contains_key(&parent) {
                return Err(StoreError::TombstoneNotFound(parent));
            }
        }
        let tombstone = new.into_tombstone(TombstoneId(self.next_tombstone));
        Ok((
            tombstone.clone(),
            vec![JournalEntry::PutTombstone(tombstone)],
        ))
    }

    pub(crate) fn plan_set_tombstone_dirty(
        &self,
        id: TombstoneId,
        dirty: bool,
        at: Timestamp,
    ) -> StoreResult<(Tombstone, Vec<JournalEntry>)> {
        let mut tombstone = self
            .get_tombstone(id)
            .ok_or(StoreError::TombstoneNotFound(id))?;
        tombstone.dirty = dirty;
        tombstone.modified_at = at;
        Ok((
            tombstone.clone(),
            vec![JournalEntry::PutTombstone(tombstone)],
        ))
    }

    pub(crate) fn apply(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::PutMapper(mapper) => {
                if let Some(previous) = self.mappers.get(&mapper.id) {
                    self.keys.remove(&previous.key());
                }
                self.next_mapper = self.next_mapper.max(mapper.id.0 + 1);
                self.keys.insert(mapper.key(), mapper.id);
                self.mappers.insert(mapper.id, mapper);
            }
            JournalEntry::RemoveMapper(id) => {
                if let Some(previous) = self.mappers.remove(&id) {
                    self.keys.remove(&previous.key());
                }
            }
            JournalEntry::PutTombstone(tombstone) => {
                self.next_tombstone = self.next_tombstone.max(tombstone.id.0 + 1);
                self.tombstones.insert(tombstone.id, tombstone);
            }
            JournalEntry::Sequence {
                next_mapper,
                next_tombstone,
            } => {
                self.next_mapper = self.next_mapper.max(next_mapper);
                self.next_tombstone = self.next_tombstone.max(next_tombstone);
            }
        }
    }

    pub(crate) fn apply_all(&mut self, entries: Vec<JournalEntry>) {
        for entry in entries {
            self.apply(entry);
        }
    }

    /// Entries that rebuild the current tables from scratch.
    pub(crate) fn snapshot(&self) -> Vec<JournalEntry> {
        let mut entries = Vec::with_capacity(self.mappers.len() + self.tombstones.len() + 1);
        entries.push(JournalEntry::Sequence {
            next_mapper: self.next_mapper,
            next_tombstone: self.next_tombstone,
        });
        // Parents always carry smaller ids than their children.
        entries.extend(self.mappers.values().cloned().map(JournalEntry::PutMapper));
        entries.extend(
            self.tombstones
                .values()
                .cloned()
                .map(JournalEntry::PutTombstone),
        );
        entries
    }
}

fn duplicate(key: &MapperKey, existing: MapperId) -> StoreError {
    StoreError::DuplicateMapper {
        kind: key.local_kind.clone(),
        local_id: key.local_id,
        model: key.remote_model.clone(),
        existing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn insert(tables: &mut Tables, kind: &str, model: &str, parent: Option<MapperId>) -> Mapper {
        let new = NewMapper::dirty(MapperKey::new(kind, 1, model, parent), at(1));
        let (mapper, entries) = tables.plan_insert(new).unwrap();
        tables.apply_all(entries);
        mapper
    }

    #[test]
    fn ids_are_assigned_in_order() {
        let mut tables = Tables::new();
        let a = insert(&mut tables, "Product", "product.template", None);
        let b = insert(&mut tables, "Product", "product.product", Some(a.id));
        assert_eq!(a.id, MapperId(1));
        assert_eq!(b.id, MapperId(2));
        assert_eq!(tables.children(a.id), vec![b]);
    }

    #[test]
    fn remove_plans_deepest_first() {
        let mut tables = Tables::new();
        let a = insert(&mut tables, "Product", "product.template", None);
        let b = insert(&mut tables, "Product", "product.product", Some(a.id));
        let c = insert(&mut tables, "Product", "product.supplierinfo", Some(b.id));

        let (removed, entries) = tables.plan_remove(a.id).unwrap();
        let removed: Vec<_> = removed.iter().map(|m| m.id).collect();
        assert_eq!(removed, vec![a.id, b.id, c.id]);
        assert_eq!(
            entries,
            vec![
                JournalEntry::RemoveMapper(c.id),
                JournalEntry::RemoveMapper(b.id),
                JournalEntry::RemoveMapper(a.id),
            ]
        );
        tables.apply_all(entries);
        assert_eq!(tables.mapper_count(), 0);
        assert!(tables.find(&a.key()).is_none());
    }

    #[test]
    fn update_rekeys_the_row() {
        let mut tables = Tables::new();
        let mut a = insert(&mut tables, "Country", "res.country", None);
        let old_key = a.key();
        a.remote_model = "res.country.state".into();
        let entries = tables.plan_update(&a).unwrap();
        tables.apply_all(entries);
        assert!(tables.find(&old_key).is_none());
        assert_eq!(tables.find(&a.key()).unwrap().id, a.id);
    }

    #[test]
    fn lookup_prefers_top_level_rows() {
        let mut tables = Tables::new();
        let parent = insert(&mut tables, "Order", "sale.order", None);
        let nested = insert(&mut tables, "Country", "res.country", Some(parent.id));
        assert_eq!(
            tables.lookup("Country", 1, "res.country").unwrap().id,
            nested.id
        );
        let top = insert(&mut tables, "Country", "res.country", None);
        assert_eq!(tables.lookup("Country", 1, "res.country").unwrap().id, top.id);
    }

    #[test]
    fn sequence_survives_snapshot() {
        let mut tables = Tables::new();
        let a = insert(&mut tables, "Country", "res.country", None);
        let (_, entries) = tables.plan_remove(a.id).unwrap();
        tables.apply_all(entries);

        let mut rebuilt = Tables::new();
        rebuilt.apply_all(tables.snapshot());
        let b = insert(&mut rebuilt, "Country", "res.country", None);
        assert_eq!(b.id, MapperId(2));
    }
}
