//! The reconciliation engine.

use crate::backlog::{merge_backlog, BacklogItem};
use crate::error::{EngineError, EngineResult, Failure};
use crate::locks::ObjectLocks;
use crate::settings::SyncSettings;
use crate::stats::{SyncReport, SyncStats};
use erpsync_core::{
    Action, Clock, FieldResolver, LocalKey, LocalSource, Mapper, MapperFilter, MapperId,
    MapperKey, MapperStore, MappingConfig, ModelNode, NewMapper, NewTombstone, ObjectId, Record,
    SystemClock, Timestamp, Tombstone, TombstoneFilter, TombstoneId,
};
use erpsync_rpc::{RemoteClient, RemoteResult};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, info, info_span};

/// Mirrors local objects into the ERP.
///
/// Every local object is bound to its remote counterparts through
/// [`Mapper`] rows. A save finds or creates the rows, pushes the payload
/// and marks them clean; a failure leaves them dirty for
/// [`sync_now`](Self::sync_now). A delete turns the rows into
/// [`Tombstone`]s and removes the remote objects children first.
///
/// Mapping and remote failures never abort a call: they are logged and
/// counted in the returned [`SyncReport`]. Only store failures surface as
/// errors.
pub struct SyncEngine<R: RemoteClient + ?Sized, S: MapperStore + ?Sized> {
    pub(crate) settings: SyncSettings,
    pub(crate) mapping: Arc<MappingConfig>,
    pub(crate) remote: Arc<R>,
    pub(crate) store: Arc<S>,
    pub(crate) local: Arc<dyn LocalSource>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) locks: ObjectLocks,
    pub(crate) stats: RwLock<SyncStats>,
}

impl<R: RemoteClient + ?Sized, S: MapperStore + ?Sized> SyncEngine<R, S> {
    /// Creates an engine.
    ///
    /// # Errors
    ///
    /// Fails if the settings or the mapping table are invalid.
    pub fn new(
        settings: SyncSettings,
        mapping: Arc<MappingConfig>,
        remote: Arc<R>,
        store: Arc<S>,
        local: Arc<dyn LocalSource>,
    ) -> EngineResult<Self> {
        settings.validate()?;
        mapping.validate()?;
        Ok(Self {
            settings,
            mapping,
            remote,
            store,
            local,
            clock: Arc::new(SystemClock),
            locks: ObjectLocks::new(),
            stats: RwLock::new(SyncStats::default()),
        })
    }

    /// Replaces the clock used for row timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the settings.
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Returns the mapping table.
    pub fn mapping(&self) -> &MappingConfig {
        &self.mapping
    }

    /// Returns the mapper store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the remote client.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Returns a snapshot of the statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Handles a saved local object.
    ///
    /// In immediate mode the object is pushed now; otherwise its top-level
    /// mappers are marked dirty for the backlog.
    pub fn on_save(&self, record: &Record) -> EngineResult<SyncReport> {
        let _guard = self.locks.lock(record.key());
        let mut report = SyncReport::default();
        if self.settings.immediate() {
            self.save_locked(record, &mut report)?;
        } else {
            self.defer_locked(record, &mut report)?;
        }
        Ok(report)
    }

    /// Pushes a local object now, whatever the mode.
    pub fn sync_record(&self, record: &Record) -> EngineResult<SyncReport> {
        let _guard = self.locks.lock(record.key());
        let mut report = SyncReport::default();
        self.save_locked(record, &mut report)?;
        Ok(report)
    }

    /// Handles a deleted local object.
    ///
    /// Every mapper bound to the object becomes a tombstone. In immediate
    /// mode the remote objects are deleted now, children first.
    pub fn on_delete(&self, record: &Record) -> EngineResult<SyncReport> {
        let _guard = self.locks.lock(record.key());
        let mut report = SyncReport::default();
        let immediate = self.settings.immediate();
        for node in self.mapping.models(&record.kind) {
            self.delete_node(&record.kind, record.id, node, None, None, immediate, &mut report)?;
        }
        Ok(report)
    }

    /// Replays one mapper now.
    ///
    /// The local object is reloaded through the [`LocalSource`]; a clean
    /// mapper is pushed again as an update.
    pub fn sync_mapper(&self, id: MapperId) -> EngineResult<SyncReport> {
        let mapper = self.store.get(id)?.ok_or(EngineError::UnknownMapper(id))?;
        let mut report = SyncReport::default();
        if self.is_payment(&mapper) {
            debug!(mapper = %id, "payments are posted with their order");
            report.skipped += 1;
            return Ok(report);
        }
        let _guard = self.locks.lock(mapper.local());
        self.replay_mapper(mapper, &mut report)?;
        Ok(report)
    }

    /// Replays one tombstone now, dirty children first.
    pub fn sync_tombstone(&self, id: TombstoneId) -> EngineResult<SyncReport> {
        let tombstone = self
            .store
            .get_tombstone(id)?
            .ok_or(EngineError::UnknownTombstone(id))?;
        let mut report = SyncReport::default();
        let _guard = self.locks.lock(tombstone.local());
        self.replay_tombstone(tombstone, &mut report)?;
        Ok(report)
    }

    /// Replays the whole backlog.
    ///
    /// Gathers top-level dirty mappers and dirty tombstones whose parent is
    /// clean or gone, replays them in [`merge_backlog`] order, then runs
    /// pending order confirmations. Voucher rows are left to their order.
    /// A failure never stops the run.
    pub fn sync_now(&self) -> EngineResult<SyncReport> {
        let span = info_span!("backlog");
        let _enter = span.enter();

        let (orders, mappers): (Vec<Mapper>, Vec<Mapper>) = self
            .store
            .mappers(&MapperFilter::all().dirty(true).top_level())?
            .into_iter()
            .filter(|m| !self.is_payment(m))
            .partition(|m| self.is_order(m));
        let tombstones = self.pending_tombstones()?;

        let items = merge_backlog(tombstones, mappers);
        info!(items = items.len(), orders = orders.len(), "replaying backlog");

        let mut report = SyncReport::default();
        self.replay_items(items, orders, false, &mut report)?;

        {
            let mut stats = self.stats.write();
            stats.backlog_runs += 1;
            stats.last_backlog_run = Some(self.now());
        }
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "backlog finished"
        );
        Ok(report)
    }

    /// Replays an operator-chosen set of mappers and tombstones in backlog
    /// order.
    ///
    /// # Errors
    ///
    /// Fails before doing any work if an id is unknown.
    pub fn sync_selected(
        &self,
        mapper_ids: &[MapperId],
        tombstone_ids: &[TombstoneId],
    ) -> EngineResult<SyncReport> {
        let mut mappers = Vec::with_capacity(mapper_ids.len());
        for &id in mapper_ids {
            mappers.push(self.store.get(id)?.ok_or(EngineError::UnknownMapper(id))?);
        }
        let mut tombstones = Vec::with_capacity(tombstone_ids.len());
        for &id in tombstone_ids {
            tombstones.push(
                self.store
                    .get_tombstone(id)?
                    .ok_or(EngineError::UnknownTombstone(id))?,
            );
        }

        let mut report = SyncReport::default();
        let (payments, mappers): (Vec<Mapper>, Vec<Mapper>) =
            mappers.into_iter().partition(|m| self.is_payment(m));
        report.skipped += payments.len();
        let (orders, mappers): (Vec<Mapper>, Vec<Mapper>) =
            mappers.into_iter().partition(|m| self.is_order(m));
        let items = merge_backlog(tombstones, mappers);
        debug!(items = items.len(), orders = orders.len(), "syncing selection");

        self.replay_items(items, orders, true, &mut report)?;
        Ok(report)
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Issues one remote call and counts it.
    pub(crate) fn call<T>(&self, f: impl FnOnce(&R) -> RemoteResult<T>) -> RemoteResult<T> {
        self.stats.write().remote_calls += 1;
        f(self.remote.as_ref())
    }

    pub(crate) fn record_success(&self, report: &mut SyncReport) {
        self.stats.write().syncs_succeeded += 1;
        report.succeeded += 1;
    }

    pub(crate) fn record_failure(
        &self,
        object: &LocalKey,
        model: &str,
        failure: &Failure,
        report: &mut SyncReport,
    ) {
        error!(object = %object, model, cause = %failure, "sync failed");
        let line = format!("{object} -> {model}: {failure}");
        {
            let mut stats = self.stats.write();
            stats.syncs_failed += 1;
            stats.last_error = Some(line.clone());
        }
        report.failed += 1;
        report.errors.push(line);
    }

    pub(crate) fn find_or_create(&self, key: MapperKey) -> EngineResult<Mapper> {
        match self.store.find(&key)? {
            Some(mapper) => Ok(mapper),
            None => {
                let mapper = self.store.insert(NewMapper::dirty(key, self.now()))?;
                debug!(mapper = %mapper.id, model = %mapper.remote_model, "mapper created");
                Ok(mapper)
            }
        }
    }

    pub(crate) fn is_order(&self, mapper: &Mapper) -> bool {
        let policy = &self.settings.orders;
        mapper.local_kind == policy.order_kind && mapper.remote_model == policy.order_model
    }

    /// Voucher rows have no local object; the order workflow owns them.
    pub(crate) fn is_payment(&self, mapper: &Mapper) -> bool {
        self.settings
            .orders
            .is_payment(&mapper.local_kind, &mapper.remote_model)
    }

    pub(crate) fn save_locked(&self, record: &Record, report: &mut SyncReport) -> EngineResult<()> {
        let nodes = self.mapping.models(&record.kind);
        if nodes.is_empty() {
            debug!(kind = %record.kind, "kind is not mapped");
        }
        for node in nodes {
            self.sync_root(record, node, report)?;
        }
        Ok(())
    }

    fn defer_locked(&self, record: &Record, report: &mut SyncReport) -> EngineResult<()> {
        for node in self.mapping.models(&record.kind) {
            let mut mapper =
                self.find_or_create(MapperKey::new(&record.kind, record.id, &node.model, None))?;
            if !mapper.dirty {
                mapper.mark_dirty(self.now());
                self.store.update(&mapper)?;
            }
            debug!(mapper = %mapper.id, model = %node.model, "sync deferred");
            report.deferred += 1;
        }
        Ok(())
    }

    /// Syncs a top-level node and its subtree.
    ///
    /// A failure below the top-level mapper marks it dirty too, since the
    /// backlog only gathers top-level rows.
    fn sync_root(
        &self,
        record: &Record,
        node: &ModelNode,
        report: &mut SyncReport,
    ) -> EngineResult<bool> {
        let ok = self.sync_node(record, node, None, report)?;
        if !ok {
            let key = MapperKey::new(&record.kind, record.id, &node.model, None);
            if let Some(mut root) = self.store.find(&key)? {
                if !root.dirty {
                    root.mark_dirty(self.now());
                    self.store.update(&root)?;
                    debug!(mapper = %root.id, "marked dirty after a nested failure");
                }
            }
        }
        Ok(ok)
    }

    fn sync_node(
        &self,
        record: &Record,
        node: &ModelNode,
        parent: Option<MapperId>,
        report: &mut SyncReport,
    ) -> EngineResult<bool> {
        let mut mapper =
            self.find_or_create(MapperKey::new(&record.kind, record.id, &node.model, parent))?;

        match self.push(record, node, &mut mapper) {
            Ok(()) => {
                mapper.mark_clean(self.now());
                self.store.update(&mapper)?;
                self.record_success(report);
                debug!(mapper = %mapper.id, model = %node.model, "mapper clean");

                let mut ok = true;
                for child in &node.children {
                    ok &= self.sync_node(record, child, Some(mapper.id), report)?;
                }
                Ok(ok)
            }
            Err(failure) => {
                mapper.mark_dirty(self.now());
                self.store.update(&mapper)?;
                self.record_failure(&record.key(), &node.model, &failure, report);
                Ok(false)
            }
        }
    }

    /// Creates or updates the remote object of one mapper.
    fn push(&self, record: &Record, node: &ModelNode, mapper: &mut Mapper) -> Result<(), Failure> {
        let resolver = FieldResolver::new(&*self.store);
        let model = node.model.as_str();

        let existing = match mapper.remote_id {
            Some(id) => self.call(|r| r.exists(model, id))?.then_some(id),
            None => None,
        };

        match existing {
            Some(id) => {
                let payload = resolver.resolve_payload(record, node, Action::Update)?;
                debug!(model, id, ?payload, "update payload");
                self.call(|r| r.update(model, id, &payload))?;
                info!(model, id, "remote object updated");
            }
            None => {
                let payload = resolver.resolve_payload(record, node, Action::Create)?;
                debug!(model, ?payload, "create payload");
                let id = self.call(|r| r.create(model, &payload))?;
                mapper.bind_remote(id, self.now());
                info!(model, id, "remote object created");
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn delete_node(
        &self,
        kind: &str,
        local_id: ObjectId,
        node: &ModelNode,
        parent: Option<MapperId>,
        parent_tombstone: Option<TombstoneId>,
        immediate: bool,
        report: &mut SyncReport,
    ) -> EngineResult<bool> {
        let key = MapperKey::new(kind, local_id, &node.model, parent);
        let Some(mapper) = self.store.find(&key)? else {
            return Ok(true);
        };

        let tombstone = self.store.insert_tombstone(NewTombstone::from_mapper(
            &mapper,
            parent_tombstone,
            self.now(),
        ))?;
        self.stats.write().tombstones_written += 1;
        debug!(tombstone = %tombstone.id, model = %node.model, "mapper tombstoned");

        let mut ok = true;
        for child in &node.children {
            ok &= self.delete_node(
                kind,
                local_id,
                child,
                Some(mapper.id),
                Some(tombstone.id),
                immediate,
                report,
            )?;
        }

        if immediate {
            ok &= self.settle_tombstone(&tombstone, node.auto_delete, report)?;
        } else {
            report.deferred += 1;
        }

        self.store.remove(mapper.id)?;
        Ok(ok)
    }

    /// Attempts the remote deletion of a tombstone and records the outcome.
    fn settle_tombstone(
        &self,
        tombstone: &Tombstone,
        auto_delete: bool,
        report: &mut SyncReport,
    ) -> EngineResult<bool> {
        match self.delete_remote(tombstone, auto_delete) {
            Ok(()) => {
                self.store
                    .set_tombstone_dirty(tombstone.id, false, self.now())?;
                self.record_success(report);
                Ok(true)
            }
            Err(failure) => {
                self.store
                    .set_tombstone_dirty(tombstone.id, true, self.now())?;
                self.record_failure(
                    &tombstone.local(),
                    &tombstone.remote_model,
                    &failure,
                    report,
                );
                Ok(false)
            }
        }
    }

    fn delete_remote(&self, tombstone: &Tombstone, auto_delete: bool) -> Result<(), Failure> {
        let model = tombstone.remote_model.as_str();
        let Some(id) = tombstone.remote_id else {
            debug!(tombstone = %tombstone.id, "never created remotely");
            return Ok(());
        };
        if auto_delete {
            debug!(model, id, "removed along with its parent");
            return Ok(());
        }
        if self.call(|r| r.exists(model, id))? {
            self.call(|r| r.delete(model, id))?;
            info!(model, id, "remote object deleted");
        } else {
            debug!(model, id, "remote object already gone");
        }
        Ok(())
    }

    fn pending_tombstones(&self) -> EngineResult<Vec<Tombstone>> {
        let mut pending = Vec::new();
        for tombstone in self.store.tombstones(&TombstoneFilter::all().dirty(true))? {
            let parent_settled = match tombstone.parent {
                None => true,
                Some(parent) => self
                    .store
                    .get_tombstone(parent)?
                    .map_or(true, |p| !p.dirty),
            };
            if parent_settled {
                pending.push(tombstone);
            }
        }
        Ok(pending)
    }

    fn replay_items(
        &self,
        items: Vec<BacklogItem>,
        orders: Vec<Mapper>,
        force: bool,
        report: &mut SyncReport,
    ) -> EngineResult<()> {
        for item in items {
            match item {
                BacklogItem::Delete(tombstone) => {
                    let _guard = self.locks.lock(tombstone.local());
                    match self.store.get_tombstone(tombstone.id)? {
                        Some(current) if force || current.dirty => {
                            self.replay_tombstone(current, report)?;
                        }
                        _ => report.skipped += 1,
                    }
                }
                BacklogItem::Create(mapper) | BacklogItem::Update(mapper) => {
                    let _guard = self.locks.lock(mapper.local());
                    match self.store.get(mapper.id)? {
                        Some(current) if force || current.dirty => {
                            self.replay_mapper(current, report)?;
                        }
                        _ => report.skipped += 1,
                    }
                }
            }
        }

        for order in orders {
            self.replay_order(order, force, report)?;
        }
        Ok(())
    }

    /// Replays a mapper against the current local object.
    pub(crate) fn replay_mapper(
        &self,
        mapper: Mapper,
        report: &mut SyncReport,
    ) -> EngineResult<bool> {
        let Some(record) = self.local.load(&mapper.local_kind, mapper.local_id) else {
            let failure = Failure::local(format!(
                "local object {} no longer exists",
                mapper.local()
            ));
            return self.fail_mapper(mapper, &failure, report);
        };
        let Some(node) = self.mapper_node(&mapper)? else {
            let failure = Failure::local(format!(
                "{} is no longer mapped to {}",
                mapper.local_kind, mapper.remote_model
            ));
            return self.fail_mapper(mapper, &failure, report);
        };

        if mapper.is_top_level() {
            self.sync_root(&record, node, report)
        } else {
            self.sync_node(&record, node, mapper.parent, report)
        }
    }

    pub(crate) fn fail_mapper(
        &self,
        mut mapper: Mapper,
        failure: &Failure,
        report: &mut SyncReport,
    ) -> EngineResult<bool> {
        mapper.mark_dirty(self.now());
        self.store.update(&mapper)?;
        self.record_failure(&mapper.local(), &mapper.remote_model, failure, report);
        Ok(false)
    }

    fn replay_tombstone(
        &self,
        tombstone: Tombstone,
        report: &mut SyncReport,
    ) -> EngineResult<bool> {
        let mut ok = true;
        for child in self.store.tombstone_children(tombstone.id)? {
            if child.dirty {
                ok &= self.replay_tombstone(child, report)?;
            }
        }

        if !tombstone.dirty {
            report.skipped += 1;
            return Ok(ok);
        }

        let auto_delete = self
            .tombstone_node(&tombstone)?
            .is_some_and(|node| node.auto_delete);
        ok &= self.settle_tombstone(&tombstone, auto_delete, report)?;
        Ok(ok)
    }

    /// Finds the configuration node a mapper was created from.
    fn mapper_node(&self, mapper: &Mapper) -> EngineResult<Option<&ModelNode>> {
        let mut models = vec![mapper.remote_model.clone()];
        let mut parent = mapper.parent;
        while let Some(id) = parent {
            let Some(row) = self.store.get(id)? else {
                return Ok(None);
            };
            models.push(row.remote_model);
            parent = row.parent;
        }
        models.reverse();
        let models: Vec<&str> = models.iter().map(String::as_str).collect();
        Ok(self.mapping.node_at(&mapper.local_kind, &models))
    }

    fn tombstone_node(&self, tombstone: &Tombstone) -> EngineResult<Option<&ModelNode>> {
        let mut models = vec![tombstone.remote_model.clone()];
        let mut parent = tombstone.parent;
        while let Some(id) = parent {
            let Some(row) = self.store.get_tombstone(id)? else {
                return Ok(None);
            };
            models.push(row.remote_model);
            parent = row.parent;
        }
        models.reverse();
        let models: Vec<&str> = models.iter().map(String::as_str).collect();
        Ok(self.mapping.node_at(&tombstone.local_kind, &models))
    }
}

impl<R: RemoteClient + ?Sized, S: MapperStore + ?Sized> std::fmt::Debug for SyncEngine<R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("settings", &self.settings)
            .field("stats", &*self.stats.read())
            .finish_non_exhaustive()
    }
}
