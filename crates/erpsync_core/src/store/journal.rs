//! Journal-backed mapper store.
//!
//! Every mutation is encoded as one or more CBOR [`JournalEntry`] values,
//! each wrapped in a checksummed frame and appended to a
//! [`JournalBackend`]. Opening the store replays the journal from the
//! start.
//!
//! # Recovery
//!
//! - A frame cut short at the tail (crash during append) is dropped and
//!   the journal truncated to the last complete frame
//! - A checksum mismatch anywhere else fails the open
//! - [`JournalMapperStore::compact`] rewrites the journal as a snapshot of
//!   the live rows

use super::tables::Tables;
use super::{MapperFilter, MapperStore, TombstoneFilter};
use crate::error::StoreResult;
use crate::mapper::{Mapper, MapperKey, NewMapper, NewTombstone, Tombstone};
use crate::types::{MapperId, ObjectId, Timestamp, TombstoneId};
use erpsync_codec::{from_cbor, to_cbor};
use erpsync_storage::{encode_frame, FrameReader, JournalBackend};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One persisted table mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalEntry {
    /// Insert or replace a mapper row.
    PutMapper(Mapper),
    /// Delete a mapper row.
    RemoveMapper(MapperId),
    /// Insert or replace a tombstone row.
    PutTombstone(Tombstone),
    /// Id counters, written at the head of a compacted journal.
    Sequence {
        /// Next mapper id.
        next_mapper: u64,
        /// Next tombstone id.
        next_tombstone: u64,
    },
}

struct Inner<B> {
    backend: B,
    tables: Tables,
}

/// A mapper store persisted to an append-only journal.
pub struct JournalMapperStore<B: JournalBackend> {
    inner: RwLock<Inner<B>>,
}

impl<B: JournalBackend> std::fmt::Debug for JournalMapperStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalMapperStore").finish_non_exhaustive()
    }
}

impl<B: JournalBackend> JournalMapperStore<B> {
    /// Opens a store over `backend`, replaying existing entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal is corrupted or an entry cannot be
    /// decoded.
    pub fn open(mut backend: B) -> StoreResult<Self> {
        let data = backend.read_all()?;
        let mut tables = Tables::new();
        let mut reader = FrameReader::new(&data);
        let mut replayed = 0usize;

        for frame in reader.by_ref() {
            let entry: JournalEntry = from_cbor(&frame?)?;
            tables.apply(entry);
            replayed += 1;
        }

        let valid = reader.position();
        if valid < data.len() as u64 {
            warn!(
                valid_bytes = valid,
                total_bytes = data.len(),
                "dropping torn journal tail"
            );
            backend.rewrite(&data[..valid as usize])?;
        }

        debug!(
            entries = replayed,
            mappers = tables.mapper_count(),
            tombstones = tables.tombstone_count(),
            "mapper journal replayed"
        );

        Ok(Self {
            inner: RwLock::new(Inner { backend, tables }),
        })
    }

    /// Rewrites the journal to contain only the live rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be encoded or written.
    pub fn compact(&self) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let bytes = encode_entries(&inner.tables.snapshot())?;
        let before = inner.backend.size()?;
        inner.backend.rewrite(&bytes)?;
        debug!(before, after = bytes.len(), "mapper journal compacted");
        Ok(())
    }

    /// Size of the journal in bytes.
    pub fn journal_size(&self) -> StoreResult<u64> {
        Ok(self.inner.read().backend.size()?)
    }

    /// Number of mapper rows.
    pub fn mapper_count(&self) -> usize {
        self.inner.read().tables.mapper_count()
    }

    /// Number of tombstone rows.
    pub fn tombstone_count(&self) -> usize {
        self.inner.read().tables.tombstone_count()
    }

    /// Consumes the store and returns its backend.
    pub fn into_backend(self) -> B {
        self.inner.into_inner().backend
    }
}

impl<B: JournalBackend> Inner<B> {
    fn commit(&mut self, entries: Vec<JournalEntry>) -> StoreResult<()> {
        let bytes = encode_entries(&entries)?;
        self.backend.append(&bytes)?;
        self.backend.sync()?;
        self.tables.apply_all(entries);
        Ok(())
    }
}

fn encode_entries(entries: &[JournalEntry]) -> StoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    for entry in entries {
        bytes.extend_from_slice(&encode_frame(&to_cbor(entry)?)?);
    }
    Ok(bytes)
}

impl<B: JournalBackend> MapperStore for JournalMapperStore<B> {
    fn get(&self, id: MapperId) -> StoreResult<Option<Mapper>> {
        Ok(self.inner.read().tables.get(id))
    }

    fn find(&self, key: &MapperKey) -> StoreResult<Option<Mapper>> {
        Ok(self.inner.read().tables.find(key))
    }

    fn lookup(&self, kind: &str, local_id: ObjectId, model: &str) -> StoreResult<Option<Mapper>> {
        Ok(self.inner.read().tables.lookup(kind, local_id, model))
    }

    fn insert(&self, new: NewMapper) -> StoreResult<Mapper> {
        let mut inner = self.inner.write();
        let (mapper, entries) = inner.tables.plan_insert(new)?;
        inner.commit(entries)?;
        Ok(mapper)
    }

    fn update(&self, mapper: &Mapper) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let entries = inner.tables.plan_update(mapper)?;
        inner.commit(entries)
    }

    fn remove(&self, id: MapperId) -> StoreResult<Vec<Mapper>> {
        let mut inner = self.inner.write();
        let (removed, entries) = inner.tables.plan_remove(id)?;
        inner.commit(entries)?;
        Ok(removed)
    }

    fn children(&self, id: MapperId) -> StoreResult<Vec<Mapper>> {
        Ok(self.inner.read().tables.children(id))
    }

    fn mappers(&self, filter: &MapperFilter) -> StoreResult<Vec<Mapper>> {
        Ok(self.inner.read().tables.mappers(filter))
    }

    fn insert_tombstone(&self, new: NewTombstone) -> StoreResult<Tombstone> {
        let mut inner = self.inner.write();
        let (tombstone, entries) = inner.tables.plan_insert_tombstone(new)?;
        inner.commit(entries)?;
        Ok(tombstone)
    }

    fn get_tombstone(&self, id: TombstoneId) -> StoreResult<Option<Tombstone>> {
        Ok(self.inner.read().tables.get_tombstone(id))
    }

    fn set_tombstone_dirty(
        &self,
        id: TombstoneId,
        dirty: bool,
        at: Timestamp,
    ) -> StoreResult<Tombstone> {
        let mut inner = self.inner.write();
        let (tombstone, entries) = inner.tables.plan_set_tombstone_dirty(id, dirty, at)?;
        inner.commit(entries)?;
        Ok(tombstone)
    }

    fn tombstone_children(&self, id: TombstoneId) -> StoreResult<Vec<Tombstone>> {
        Ok(self.inner.read().tables.tombstone_children(id))
    }

    fn tombstones(&self, filter: &TombstoneFilter) -> StoreResult<Vec<Tombstone>> {
        Ok(self.inner.read().tables.tombstones(filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use chrono::{TimeZone, Utc};
    use erpsync_storage::{MemoryJournal, StorageError};

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn populate(store: &JournalMapperStore<MemoryJournal>) -> (Mapper, Mapper) {
        let parent = store
            .insert(NewMapper::dirty(
                MapperKey::new("Product", 3, "product.template", None),
                at(1),
            ))
            .unwrap();
        let mut child = store
            .insert(NewMapper::dirty(
                MapperKey::new("Product", 3, "product.product", Some(parent.id)),
                at(2),
            ))
            .unwrap();
        child.bind_remote(40, at(3));
        child.mark_clean(at(3));
        store.update(&child).unwrap();
        (parent, child)
    }

    #[test]
    fn replay_restores_rows() {
        let store = JournalMapperStore::open(MemoryJournal::new()).unwrap();
        let (parent, child) = populate(&store);
        let data = store.into_backend().data();

        let reopened = JournalMapperStore::open(MemoryJournal::with_data(data)).unwrap();
        assert_eq!(reopened.get(parent.id).unwrap(), Some(parent));
        assert_eq!(reopened.get(child.id).unwrap(), Some(child));
        assert_eq!(reopened.mapper_count(), 2);
    }

    #[test]
    fn removal_and_tombstones_survive_replay() {
        let store = JournalMapperStore::open(MemoryJournal::new()).unwrap();
        let (parent, _) = populate(&store);
        let removed = store.remove(parent.id).unwrap();
        let t = store
            .insert_tombstone(NewTombstone::from_mapper(&removed[0], None, at(9)))
            .unwrap();
        store.set_tombstone_dirty(t.id, false, at(10)).unwrap();
        let data = store.into_backend().data();

        let reopened = JournalMapperStore::open(MemoryJournal::with_data(data)).unwrap();
        assert_eq!(reopened.mapper_count(), 0);
        let t = reopened.get_tombstone(t.id).unwrap().unwrap();
        assert!(!t.dirty);
        assert_eq!(t.modified_at, at(10));
    }

    #[test]
    fn torn_tail_is_dropped() {
        let store = JournalMapperStore::open(MemoryJournal::new()).unwrap();
        populate(&store);
        let mut data = store.into_backend().data();
        data.truncate(data.len() - 3);

        let reopened = JournalMapperStore::open(MemoryJournal::with_data(data)).unwrap();
        // The last update was torn; the child is back to its inserted state.
        let child = reopened
            .find(&MapperKey::new("Product", 3, "product.product", Some(MapperId(1))))
            .unwrap()
            .unwrap();
        assert!(child.dirty);
        assert_eq!(child.remote_id, None);

        // New writes land after the truncated tail and replay cleanly.
        reopened.update(&child).unwrap();
        let data = reopened.into_backend().data();
        assert!(JournalMapperStore::open(MemoryJournal::with_data(data)).is_ok());
    }

    #[test]
    fn corrupted_frame_fails_open() {
        let store = JournalMapperStore::open(MemoryJournal::new()).unwrap();
        populate(&store);
        let mut data = store.into_backend().data();
        data[12] ^= 0xFF;

        let err = JournalMapperStore::open(MemoryJournal::with_data(data))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            StoreError::Storage(StorageError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn compact_keeps_rows_and_id_sequence() {
        let store = JournalMapperStore::open(MemoryJournal::new()).unwrap();
        let (parent, _) = populate(&store);
        store.remove(parent.id).unwrap();
        let before = store.journal_size().unwrap();
        store.compact().unwrap();
        assert!(store.journal_size().unwrap() < before);

        let data = store.into_backend().data();
        let reopened = JournalMapperStore::open(MemoryJournal::with_data(data)).unwrap();
        let next = reopened
            .insert(NewMapper::dirty(
                MapperKey::new("Country", 1, "res.country", None),
                at(20),
            ))
            .unwrap();
        assert_eq!(next.id, MapperId(3));
    }
}
