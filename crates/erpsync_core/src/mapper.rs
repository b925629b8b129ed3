//! Mapper and tombstone rows.

use crate::types::{LocalKey, MapperId, ObjectId, RemoteId, Timestamp, TombstoneId};
use serde::{Deserialize, Serialize};

/// Derived synchronization state of a mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapperState {
    /// The remote object has never been created.
    DirtyUncreated,
    /// The remote object exists but is out of date.
    DirtyExisting,
    /// The remote object matches the last successful sync.
    Clean,
}

impl MapperState {
    /// Returns a short label for display.
    pub fn label(self) -> &'static str {
        match self {
            MapperState::DirtyUncreated => "dirty-uncreated",
            MapperState::DirtyExisting => "dirty-existing",
            MapperState::Clean => "clean",
        }
    }
}

/// Uniqueness key of a mapper row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MapperKey {
    /// Local entity kind.
    pub local_kind: String,
    /// Local object id.
    pub local_id: ObjectId,
    /// Remote model name.
    pub remote_model: String,
    /// Parent mapper, `None` for top-level rows.
    pub parent: Option<MapperId>,
}

impl MapperKey {
    /// Creates a key.
    pub fn new(
        local_kind: impl Into<String>,
        local_id: ObjectId,
        remote_model: impl Into<String>,
        parent: Option<MapperId>,
    ) -> Self {
        Self {
            local_kind: local_kind.into(),
            local_id,
            remote_model: remote_model.into(),
            parent,
        }
    }
}

/// Binds one local object to one remote object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapper {
    /// Store-assigned id.
    pub id: MapperId,
    /// Local entity kind.
    pub local_kind: String,
    /// Local object id.
    pub local_id: ObjectId,
    /// Remote model name.
    pub remote_model: String,
    /// Remote object id, `None` until created.
    pub remote_id: Option<RemoteId>,
    /// Whether the remote object is out of date.
    pub dirty: bool,
    /// When the row was created.
    pub created_at: Timestamp,
    /// When the row was last touched by a sync attempt.
    pub modified_at: Timestamp,
    /// Parent mapper for nested models.
    pub parent: Option<MapperId>,
}

impl Mapper {
    /// Returns the derived state.
    ///
    /// A row that is clean without a remote id is reported as
    /// [`MapperState::DirtyUncreated`]: there is nothing to update remotely.
    pub fn state(&self) -> MapperState {
        match (self.remote_id, self.dirty) {
            (None, _) => MapperState::DirtyUncreated,
            (Some(_), true) => MapperState::DirtyExisting,
            (Some(_), false) => MapperState::Clean,
        }
    }

    /// Returns the uniqueness key.
    pub fn key(&self) -> MapperKey {
        MapperKey::new(
            self.local_kind.clone(),
            self.local_id,
            self.remote_model.clone(),
            self.parent,
        )
    }

    /// Returns the local object this row is bound to.
    pub fn local(&self) -> LocalKey {
        LocalKey::new(self.local_kind.clone(), self.local_id)
    }

    /// Returns true if the row has no parent.
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    /// Marks the row clean.
    pub fn mark_clean(&mut self, at: Timestamp) {
        self.dirty = false;
        self.modified_at = at;
    }

    /// Marks the row dirty.
    pub fn mark_dirty(&mut self, at: Timestamp) {
        self.dirty = true;
        self.modified_at = at;
    }

    /// Records the id assigned by a remote create.
    pub fn bind_remote(&mut self, remote_id: RemoteId, at: Timestamp) {
        self.remote_id = Some(remote_id);
        self.modified_at = at;
    }
}

/// Input for inserting a new mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMapper {
    /// Uniqueness key.
    pub key: MapperKey,
    /// Initial remote id.
    pub remote_id: Option<RemoteId>,
    /// Initial dirty flag.
    pub dirty: bool,
    /// Creation timestamp (also the first modification timestamp).
    pub created_at: Timestamp,
}

impl NewMapper {
    /// A dirty row that has not been created remotely.
    pub fn dirty(key: MapperKey, at: Timestamp) -> Self {
        Self {
            key,
            remote_id: None,
            dirty: true,
            created_at: at,
        }
    }

    /// Sets the initial remote id.
    #[must_use]
    pub fn with_remote_id(mut self, remote_id: RemoteId) -> Self {
        self.remote_id = Some(remote_id);
        self
    }

    /// Sets the initial dirty flag.
    #[must_use]
    pub fn with_dirty(mut self, dirty: bool) -> Self {
        self.dirty = dirty;
        self
    }

    pub(crate) fn into_mapper(self, id: MapperId) -> Mapper {
        Mapper {
            id,
            local_kind: self.key.local_kind,
            local_id: self.key.local_id,
            remote_model: self.key.remote_model,
            remote_id: self.remote_id,
            dirty: self.dirty,
            created_at: self.created_at,
            modified_at: self.created_at,
            parent: self.key.parent,
        }
    }
}

/// A removed mapper retained until its remote deletion is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    /// Store-assigned id.
    pub id: TombstoneId,
    /// Id of the mapper this row was copied from.
    pub mapper_id: MapperId,
    /// Local entity kind.
    pub local_kind: String,
    /// Local object id.
    pub local_id: ObjectId,
    /// Remote model name.
    pub remote_model: String,
    /// Remote object id, if it was ever created.
    pub remote_id: Option<RemoteId>,
    /// Whether the remote deletion is still pending.
    pub dirty: bool,
    /// Creation timestamp of the original mapper.
    pub created_at: Timestamp,
    /// When the deletion was last attempted.
    pub modified_at: Timestamp,
    /// Parent tombstone for nested models.
    pub parent: Option<TombstoneId>,
}

impl Tombstone {
    /// Returns the local object this row was bound to.
    pub fn local(&self) -> LocalKey {
        LocalKey::new(self.local_kind.clone(), self.local_id)
    }

    /// Returns true if the row has no parent.
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }
}

/// Input for inserting a tombstone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTombstone {
    /// Id of the removed mapper.
    pub mapper_id: MapperId,
    /// Local entity kind.
    pub local_kind: String,
    /// Local object id.
    pub local_id: ObjectId,
    /// Remote model name.
    pub remote_model: String,
    /// Remote object id.
    pub remote_id: Option<RemoteId>,
    /// Initial dirty flag.
    pub dirty: bool,
    /// Creation timestamp of the original mapper.
    pub created_at: Timestamp,
    /// Deletion timestamp.
    pub modified_at: Timestamp,
    /// Parent tombstone.
    pub parent: Option<TombstoneId>,
}

impl NewTombstone {
    /// Copies a mapper into a dirty tombstone.
    pub fn from_mapper(mapper: &Mapper, parent: Option<TombstoneId>, at: Timestamp) -> Self {
        Self {
            mapper_id: mapper.id,
            local_kind: mapper.local_kind.clone(),
            local_id: mapper.local_id,
            remote_model: mapper.remote_model.clone(),
            remote_id: mapper.remote_id,
            dirty: true,
            created_at: mapper.created_at,
            modified_at: at,
            parent,
        }
    }

    pub(crate) fn into_tombstone(self, id: TombstoneId) -> Tombstone {
        Tombstone {
            id,
            mapper_id: self.mapper_id,
            local_kind: self.local_kind,
            local_id: self.local_id,
            remote_model: self.remote_model,
            remote_id: self.remote_id,
            dirty: self.dirty,
            created_at: self.created_at,
            modified_at: self.modified_at,
            parent: self.parent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn mapper() -> Mapper {
        NewMapper::dirty(MapperKey::new("Category", 1, "product.category", None), at(10))
            .into_mapper(MapperId(1))
    }

    #[test]
    fn state_follows_remote_id_and_dirty_flag() {
        let mut m = mapper();
        assert_eq!(m.state(), MapperState::DirtyUncreated);

        m.bind_remote(42, at(11));
        assert_eq!(m.state(), MapperState::DirtyExisting);

        m.mark_clean(at(12));
        assert_eq!(m.state(), MapperState::Clean);
        assert_eq!(m.modified_at, at(12));
        assert_eq!(m.created_at, at(10));

        m.mark_dirty(at(13));
        assert_eq!(m.state(), MapperState::DirtyExisting);
    }

    #[test]
    fn clean_without_remote_id_is_not_clean() {
        let mut m = mapper();
        m.mark_clean(at(11));
        assert_eq!(m.state(), MapperState::DirtyUncreated);
    }

    #[test]
    fn tombstone_copies_mapper() {
        let mut m = mapper();
        m.bind_remote(42, at(11));
        let t = NewTombstone::from_mapper(&m, Some(TombstoneId(3)), at(20))
            .into_tombstone(TombstoneId(4));
        assert_eq!(t.mapper_id, m.id);
        assert_eq!(t.remote_id, Some(42));
        assert_eq!(t.created_at, at(10));
        assert_eq!(t.modified_at, at(20));
        assert!(t.dirty);
        assert!(!t.is_top_level());
        assert_eq!(t.local(), m.local());
    }
}
