//! In-memory mapper store.

use super::tables::Tables;
use super::{MapperFilter, MapperStore, TombstoneFilter};
use crate::error::StoreResult;
use crate::mapper::{Mapper, MapperKey, NewMapper, NewTombstone, Tombstone};
use crate::types::{MapperId, ObjectId, Timestamp, TombstoneId};
use parking_lot::RwLock;

/// A mapper store that keeps its tables in memory.
///
/// Contents are lost when the store is dropped.
#[derive(Debug)]
pub struct MemoryMapperStore {
    tables: RwLock<Tables>,
}

impl MemoryMapperStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::new()),
        }
    }

    /// Number of mapper rows.
    pub fn mapper_count(&self) -> usize {
        self.tables.read().mapper_count()
    }

    /// Number of tombstone rows.
    pub fn tombstone_count(&self) -> usize {
        self.tables.read().tombstone_count()
    }
}

impl Default for MemoryMapperStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MapperStore for MemoryMapperStore {
    fn get(&self, id: MapperId) -> StoreResult<Option<Mapper>> {
        Ok(self.tables.read().get(id))
    }

    fn find(&self, key: &MapperKey) -> StoreResult<Option<Mapper>> {
        Ok(self.tables.read().find(key))
    }

    fn lookup(&self, kind: &str, local_id: ObjectId, model: &str) -> StoreResult<Option<Mapper>> {
        Ok(self.tables.read().lookup(kind, local_id, model))
    }

    fn insert(&self, new: NewMapper) -> StoreResult<Mapper> {
        let mut tables = self.tables.write();
        let (mapper, entries) = tables.plan_insert(new)?;
        tables.apply_all(entries);
        Ok(mapper)
    }

    fn update(&self, mapper: &Mapper) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let entries = tables.plan_update(mapper)?;
        tables.apply_all(entries);
        Ok(())
    }

    fn remove(&self, id: MapperId) -> StoreResult<Vec<Mapper>> {
        let mut tables = self.tables.write();
        let (removed, entries) = tables.plan_remove(id)?;
        tables.apply_all(entries);
        Ok(removed)
    }

    fn children(&self, id: MapperId) -> StoreResult<Vec<Mapper>> {
        Ok(self.tables.read().children(id))
    }

    fn mappers(&self, filter: &MapperFilter) -> StoreResult<Vec<Mapper>> {
        Ok(self.tables.read().mappers(filter))
    }

    fn insert_tombstone(&self, new: NewTombstone) -> StoreResult<Tombstone> {
        let mut tables = self.tables.write();
        let (tombstone, entries) = tables.plan_insert_tombstone(new)?;
        tables.apply_all(entries);
        Ok(tombstone)
    }

    fn get_tombstone(&self, id: TombstoneId) -> StoreResult<Option<Tombstone>> {
        Ok(self.tables.read().get_tombstone(id))
    }

    fn set_tombstone_dirty(
        &self,
        id: TombstoneId,
        dirty: bool,
        at: Timestamp,
    ) -> StoreResult<Tombstone> {
        let mut tables = self.tables.write();
        let (tombstone, entries) = tables.plan_set_tombstone_dirty(id, dirty, at)?;
        tables.apply_all(entries);
        Ok(tombstone)
    }

    fn tombstone_children(&self, id: TombstoneId) -> StoreResult<Vec<Tombstone>> {
        Ok(self.tables.read().tombstone_children(id))
    }

    fn tombstones(&self, filter: &TombstoneFilter) -> StoreResult<Vec<Tombstone>> {
        Ok(self.tables.read().tombstones(filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use chrono::{TimeZone, Utc};

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn key(kind: &str, id: ObjectId, model: &str, parent: Option<MapperId>) -> MapperKey {
        MapperKey::new(kind, id, model, parent)
    }

    #[test]
    fn insert_and_find() {
        let store = MemoryMapperStore::new();
        let m = store
            .insert(NewMapper::dirty(key("Category", 1, "product.category", None), at(1)))
            .unwrap();
        assert_eq!(store.get(m.id).unwrap(), Some(m.clone()));
        assert_eq!(store.find(&m.key()).unwrap(), Some(m.clone()));
        assert_eq!(
            store.lookup("Category", 1, "product.category").unwrap(),
            Some(m)
        );
        assert_eq!(store.mapper_count(), 1);
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let store = MemoryMapperStore::new();
        let k = key("Category", 1, "product.category", None);
        let first = store.insert(NewMapper::dirty(k.clone(), at(1))).unwrap();
        let err = store.insert(NewMapper::dirty(k, at(2))).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DuplicateMapper { existing, .. } if existing == first.id
        ));
    }

    #[test]
    fn missing_parent_is_rejected() {
        let store = MemoryMapperStore::new();
        let err = store
            .insert(NewMapper::dirty(
                key("Product", 1, "product.product", Some(MapperId(9))),
                at(1),
            ))
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingParent(MapperId(9))));
    }

    #[test]
    fn remove_cascades_to_children() {
        let store = MemoryMapperStore::new();
        let parent = store
            .insert(NewMapper::dirty(key("Product", 1, "product.template", None), at(1)))
            .unwrap();
        let child = store
            .insert(NewMapper::dirty(
                key("Product", 1, "product.product", Some(parent.id)),
                at(1),
            ))
            .unwrap();

        let removed = store.remove(parent.id).unwrap();
        assert_eq!(removed, vec![parent.clone(), child.clone()]);
        assert!(store.get(child.id).unwrap().is_none());
        assert!(matches!(
            store.remove(parent.id),
            Err(StoreError::MapperNotFound(_))
        ));
    }

    #[test]
    fn update_of_unknown_row_fails() {
        let store = MemoryMapperStore::new();
        let m = NewMapper::dirty(key("Country", 1, "res.country", None), at(1))
            .into_mapper(MapperId(5));
        assert!(matches!(
            store.update(&m),
            Err(StoreError::MapperNotFound(MapperId(5)))
        ));
    }

    #[test]
    fn tombstones_track_dirty_flag() {
        let store = MemoryMapperStore::new();
        let m = store
            .insert(
                NewMapper::dirty(key("Category", 1, "product.category", None), at(1))
                    .with_remote_id(10),
            )
            .unwrap();
        let t = store
            .insert_tombstone(NewTombstone::from_mapper(&m, None, at(5)))
            .unwrap();
        assert!(t.dirty);

        let t = store.set_tombstone_dirty(t.id, false, at(6)).unwrap();
        assert!(!t.dirty);
        assert_eq!(t.modified_at, at(6));
        assert_eq!(
            store.tombstones(&TombstoneFilter::all().dirty(false)).unwrap(),
            vec![t.clone()]
        );

        let child = store
            .insert_tombstone(NewTombstone::from_mapper(&m, Some(t.id), at(5)))
            .unwrap();
        assert_eq!(store.tombstone_children(t.id).unwrap(), vec![child]);
        assert_eq!(store.tombstone_count(), 2);
    }
}
