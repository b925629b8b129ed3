//! Mapper and tombstone persistence.
//!
//! [`MapperStore`] is the seam between the engine and its bookkeeping.
//! Two implementations share one in-memory table model:
//!
//! - [`MemoryMapperStore`] keeps rows in memory only.
//! - [`JournalMapperStore`] appends every mutation to a framed journal and
//!   rebuilds its tables on open.

mod journal;
mod memory;
mod tables;

pub use journal::{JournalEntry, JournalMapperStore};
pub use memory::MemoryMapperStore;

use crate::error::StoreResult;
use crate::mapper::{Mapper, MapperKey, NewMapper, NewTombstone, Tombstone};
use crate::types::{MapperId, ObjectId, Timestamp, TombstoneId};

/// Row filter for [`MapperStore::mappers`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapperFilter {
    /// Only rows of this local kind.
    pub kind: Option<String>,
    /// Only rows bound to this local id.
    pub local_id: Option<ObjectId>,
    /// Only rows of this remote model.
    pub model: Option<String>,
    /// Only dirty (`Some(true)`) or clean (`Some(false)`) rows.
    pub dirty: Option<bool>,
    /// Only rows without a parent.
    pub top_level_only: bool,
    /// Case-insensitive substring of kind, model or ids.
    pub search: Option<String>,
}

impl MapperFilter {
    /// Matches every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts to a local kind.
    #[must_use]
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Restricts to a local object.
    #[must_use]
    pub fn object(mut self, kind: impl Into<String>, local_id: ObjectId) -> Self {
        self.kind = Some(kind.into());
        self.local_id = Some(local_id);
        self
    }

    /// Restricts to a remote model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Restricts by dirty flag.
    #[must_use]
    pub fn dirty(mut self, dirty: bool) -> Self {
        self.dirty = Some(dirty);
        self
    }

    /// Restricts to rows without a parent.
    #[must_use]
    pub fn top_level(mut self) -> Self {
        self.top_level_only = true;
        self
    }

    /// Restricts by free-text search.
    #[must_use]
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Returns true if `mapper` passes the filter.
    pub fn matches(&self, mapper: &Mapper) -> bool {
        self.kind.as_ref().map_or(true, |k| *k == mapper.local_kind)
            && self.local_id.map_or(true, |id| id == mapper.local_id)
            && self.model.as_ref().map_or(true, |m| *m == mapper.remote_model)
            && self.dirty.map_or(true, |d| d == mapper.dirty)
            && (!self.top_level_only || mapper.parent.is_none())
            && self.search.as_ref().map_or(true, |s| {
                search_matches(
                    s,
                    &mapper.local_kind,
                    &mapper.remote_model,
                    mapper.local_id,
                    mapper.remote_id,
                )
            })
    }
}

/// Row filter for [`MapperStore::tombstones`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TombstoneFilter {
    /// Only rows of this local kind.
    pub kind: Option<String>,
    /// Only rows of this remote model.
    pub model: Option<String>,
    /// Only dirty (`Some(true)`) or clean (`Some(false)`) rows.
    pub dirty: Option<bool>,
    /// Only rows without a parent.
    pub top_level_only: bool,
    /// Case-insensitive substring of kind, model or ids.
    pub search: Option<String>,
}

impl TombstoneFilter {
    /// Matches every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts to a local kind.
    #[must_use]
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Restricts to a remote model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Restricts by dirty flag.
    #[must_use]
    pub fn dirty(mut self, dirty: bool) -> Self {
        self.dirty = Some(dirty);
        self
    }

    /// Restricts to rows without a parent.
    #[must_use]
    pub fn top_level(mut self) -> Self {
        self.top_level_only = true;
        self
    }

    /// Restricts by free-text search.
    #[must_use]
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Returns true if `tombstone` passes the filter.
    pub fn matches(&self, tombstone: &Tombstone) -> bool {
        self.kind.as_ref().map_or(true, |k| *k == tombstone.local_kind)
            && self.model.as_ref().map_or(true, |m| *m == tombstone.remote_model)
            && self.dirty.map_or(true, |d| d == tombstone.dirty)
            && (!self.top_level_only || tombstone.parent.is_none())
            && self.search.as_ref().map_or(true, |s| {
                search_matches(
                    s,
                    &tombstone.local_kind,
                    &tombstone.remote_model,
                    tombstone.local_id,
                    tombstone.remote_id,
                )
            })
    }
}

fn search_matches(
    needle: &str,
    kind: &str,
    model: &str,
    local_id: ObjectId,
    remote_id: Option<i64>,
) -> bool {
    let needle = needle.to_lowercase();
    kind.to_lowercase().contains(&needle)
        || model.to_lowercase().contains(&needle)
        || local_id.to_string() == needle
        || remote_id.is_some_and(|id| id.to_string() == needle)
}

/// Persistent mapper and tombstone tables.
///
/// Implementations are shared between threads; every method is atomic
/// with respect to the others.
pub trait MapperStore: Send + Sync {
    /// Returns a mapper by id.
    fn get(&self, id: MapperId) -> StoreResult<Option<Mapper>>;

    /// Returns the mapper holding a key.
    fn find(&self, key: &MapperKey) -> StoreResult<Option<Mapper>>;

    /// Returns a mapper for a local object and remote model under any
    /// parent, preferring the top-level row.
    fn lookup(&self, kind: &str, local_id: ObjectId, model: &str) -> StoreResult<Option<Mapper>>;

    /// Inserts a mapper.
    ///
    /// # Errors
    ///
    /// Fails with `DuplicateMapper` if the key is taken and `MissingParent`
    /// if the parent does not exist.
    fn insert(&self, new: NewMapper) -> StoreResult<Mapper>;

    /// Replaces an existing mapper row.
    fn update(&self, mapper: &Mapper) -> StoreResult<()>;

    /// Removes a mapper and its descendants, returning the removed rows
    /// parent first.
    fn remove(&self, id: MapperId) -> StoreResult<Vec<Mapper>>;

    /// Returns the direct children of a mapper.
    fn children(&self, id: MapperId) -> StoreResult<Vec<Mapper>>;

    /// Returns the mappers passing a filter, ordered by id.
    fn mappers(&self, filter: &MapperFilter) -> StoreResult<Vec<Mapper>>;

    /// Inserts a tombstone.
    fn insert_tombstone(&self, new: NewTombstone) -> StoreResult<Tombstone>;

    /// Returns a tombstone by id.
    fn get_tombstone(&self, id: TombstoneId) -> StoreResult<Option<Tombstone>>;

    /// Sets a tombstone's dirty flag and modification time.
    fn set_tombstone_dirty(
        &self,
        id: TombstoneId,
        dirty: bool,
        at: Timestamp,
    ) -> StoreResult<Tombstone>;

    /// Returns the direct children of a tombstone.
    fn tombstone_children(&self, id: TombstoneId) -> StoreResult<Vec<Tombstone>>;

    /// Returns the tombstones passing a filter, ordered by id.
    fn tombstones(&self, filter: &TombstoneFilter) -> StoreResult<Vec<Tombstone>>;
}
