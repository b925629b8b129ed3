//! Change events applied through the background worker.

mod common;

use common::Harness;
use erpsync_core::MapperState;
use erpsync_engine::{ChangeEvent, ChangeListener, EngineError, SyncWorker};
use erpsync_rpc::RemoteOp;
use erpsync_testkit::{category, subcategory};

#[test]
fn events_are_applied_in_order() {
    let h = Harness::new();
    let worker = SyncWorker::spawn(h.engine.clone());
    let queue = worker.queue();

    let tools = category(1, "Tools");
    let hammers = subcategory(2, "Hammers", &tools);
    h.source.put(tools.clone());
    h.source.put(hammers.clone());
    queue.send(ChangeEvent::Saved(tools.clone())).unwrap();
    queue.send(ChangeEvent::Saved(hammers.clone())).unwrap();
    queue.flush().unwrap();

    let parent = h.mapper("Category", 1, "product.category");
    let child = h.mapper("Category", 2, "product.category");
    assert_eq!(child.state(), MapperState::Clean);
    assert_eq!(
        h.remote(&child)["parent_id"],
        erpsync_codec::Value::Int(parent.remote_id.unwrap())
    );

    h.source.remove(&hammers.kind, hammers.id);
    queue.notify(ChangeEvent::Deleted(hammers)).unwrap();

    let summary = worker.shutdown().unwrap();
    assert_eq!(summary.events, 3);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.report.succeeded, 3);
    assert_eq!(h.erp.count("product.category"), 1);
}

#[test]
fn failures_are_counted_in_the_summary() {
    let h = Harness::new();
    h.erp.fail_on(RemoteOp::Create, "product.category");
    let worker = SyncWorker::spawn(h.engine.clone());

    let tools = category(1, "Tools");
    h.source.put(tools.clone());
    worker.queue().send(ChangeEvent::Saved(tools)).unwrap();

    let summary = worker.shutdown().unwrap();
    assert_eq!(summary.events, 1);
    assert_eq!(summary.report.failed, 1);
    assert!(!summary.report.is_success());
    assert_eq!(h.dirty_mappers().len(), 1);
}

#[test]
fn queue_rejects_events_after_shutdown() {
    let h = Harness::new();
    let worker = SyncWorker::spawn(h.engine.clone());
    let queue = worker.queue();
    worker.shutdown().unwrap();

    let err = queue.send(ChangeEvent::Saved(category(1, "Tools"))).unwrap_err();
    assert!(matches!(err, EngineError::WorkerStopped));
    assert!(matches!(queue.flush(), Err(EngineError::WorkerStopped)));
}

#[test]
fn engine_is_a_change_listener() {
    let h = Harness::new();
    let listener: &dyn ChangeListener = h.engine.as_ref();
    let tools = category(1, "Tools");
    h.source.put(tools.clone());

    listener.notify(ChangeEvent::Saved(tools)).unwrap();

    assert_eq!(
        h.mapper("Category", 1, "product.category").state(),
        MapperState::Clean
    );
}
