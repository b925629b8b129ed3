//! Shared setup for engine integration tests.

#![allow(dead_code)]

use erpsync_codec::Payload;
use erpsync_core::{
    Mapper, MapperFilter, MapperKey, MapperStore, MappingConfig, MemoryMapperStore, MemorySource,
    Record, Tombstone, TombstoneFilter,
};
use erpsync_engine::{SyncEngine, SyncReport, SyncSettings};
use erpsync_rpc::MemoryErp;
use erpsync_testkit::{shop_erp, shop_mapping, ManualClock};
use std::sync::Arc;

pub type Engine = SyncEngine<MemoryErp, MemoryMapperStore>;

/// Settings used by most tests: live, auto-sync, accounting ids set.
pub fn shop_settings() -> SyncSettings {
    SyncSettings::new("shop")
        .with_login("admin", "admin")
        .with_accounting(12, 7, 1, 1)
}

/// An engine wired to in-memory collaborators.
pub struct Harness {
    pub engine: Arc<Engine>,
    pub erp: Arc<MemoryErp>,
    pub store: Arc<MemoryMapperStore>,
    pub source: Arc<MemorySource>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(shop_settings())
    }

    pub fn with_settings(settings: SyncSettings) -> Self {
        Self::with_mapping(settings, shop_mapping())
    }

    pub fn with_mapping(settings: SyncSettings, mapping: MappingConfig) -> Self {
        let erp = Arc::new(shop_erp());
        let store = Arc::new(MemoryMapperStore::new());
        let source = Arc::new(MemorySource::new());
        let clock = Arc::new(ManualClock::new());
        let engine = SyncEngine::new(
            settings,
            Arc::new(mapping),
            erp.clone(),
            store.clone(),
            source.clone(),
        )
        .unwrap()
        .with_clock(clock.clone());

        Self {
            engine: Arc::new(engine),
            erp,
            store,
            source,
            clock,
        }
    }

    /// Stores the record locally and fires the save hook.
    pub fn save(&self, record: &Record) -> SyncReport {
        self.source.put(record.clone());
        self.engine.on_save(record).unwrap()
    }

    /// Removes the record locally and fires the delete hook.
    pub fn delete(&self, record: &Record) -> SyncReport {
        self.source.remove(&record.kind, record.id);
        self.engine.on_delete(record).unwrap()
    }

    /// The top-level mapper of an object.
    pub fn mapper(&self, kind: &str, id: u64, model: &str) -> Mapper {
        self.find(kind, id, model)
            .unwrap_or_else(|| panic!("no {model} mapper for {kind}#{id}"))
    }

    pub fn find(&self, kind: &str, id: u64, model: &str) -> Option<Mapper> {
        self.store
            .find(&MapperKey::new(kind, id, model, None))
            .unwrap()
    }

    pub fn children(&self, mapper: &Mapper) -> Vec<Mapper> {
        self.store.children(mapper.id).unwrap()
    }

    /// The remote object a mapper points at.
    pub fn remote(&self, mapper: &Mapper) -> Payload {
        let id = mapper.remote_id.expect("mapper has a remote id");
        self.erp
            .object(&mapper.remote_model, id)
            .expect("remote object exists")
    }

    pub fn dirty_mappers(&self) -> Vec<Mapper> {
        self.store.mappers(&MapperFilter::all().dirty(true)).unwrap()
    }

    pub fn tombstones(&self) -> Vec<Tombstone> {
        self.store.tombstones(&TombstoneFilter::all()).unwrap()
    }
}
