//! Delete hook and tombstone replay.

mod common;

use common::{shop_settings, Harness};
use erpsync_core::{FieldRule, KindMapping, MapperStore, MappingConfig, ModelNode, Record};
use erpsync_engine::SyncMode;
use erpsync_rpc::RemoteOp;
use erpsync_testkit::{category, path, product};

fn warehouse_mapping() -> MappingConfig {
    MappingConfig::new().with_kind(
        "Warehouse",
        KindMapping::new().model(
            ModelNode::new("stock.warehouse")
                .field("name", FieldRule::direct(path("name")))
                .child(
                    ModelNode::new("stock.location")
                        .field("name", FieldRule::direct(path("name"))),
                )
                .child(
                    ModelNode::new("stock.route").field("name", FieldRule::direct(path("name"))),
                ),
        ),
    )
}

#[test]
fn children_are_deleted_before_parent() {
    let h = Harness::with_mapping(shop_settings(), warehouse_mapping());
    let depot = Record::new("Warehouse", 1).with("name", "Depot");
    assert!(h.save(&depot).is_success());
    h.erp.clear_calls();

    let report = h.delete(&depot);

    assert!(report.is_success());
    let deletes: Vec<String> = h
        .erp
        .calls_of(RemoteOp::Delete)
        .into_iter()
        .map(|call| call.model)
        .collect();
    assert_eq!(deletes, ["stock.location", "stock.route", "stock.warehouse"]);

    let tombstones = h.tombstones();
    assert_eq!(tombstones.len(), 3);
    assert!(tombstones.iter().all(|t| !t.dirty));
    let root = tombstones
        .iter()
        .find(|t| t.remote_model == "stock.warehouse")
        .unwrap();
    assert!(root.is_top_level());
    assert!(tombstones
        .iter()
        .filter(|t| t.id != root.id)
        .all(|t| t.parent == Some(root.id)));
    assert_eq!(h.store.mapper_count(), 0);
}

#[test]
fn auto_delete_child_is_tombstoned_without_a_call() {
    let h = Harness::new();
    let hammer = product(10, "Hammer", 9.5, &[]);
    h.save(&hammer);
    h.erp.clear_calls();

    let report = h.delete(&hammer);

    assert!(report.is_success());
    let deletes = h.erp.calls_of(RemoteOp::Delete);
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].model, "product.template");
    assert!(h
        .erp
        .calls()
        .iter()
        .all(|call| call.model != "product.product"));

    let tombstones = h.tombstones();
    assert_eq!(tombstones.len(), 2);
    let template = tombstones
        .iter()
        .find(|t| t.remote_model == "product.template")
        .unwrap();
    let variant = tombstones
        .iter()
        .find(|t| t.remote_model == "product.product")
        .unwrap();
    assert!(!variant.dirty);
    assert!(variant.remote_id.is_some());
    assert_eq!(variant.parent, Some(template.id));
}

#[test]
fn vanished_remote_object_is_tombstoned_clean() {
    let h = Harness::new();
    let tools = category(1, "Tools");
    h.save(&tools);
    let mapper = h.mapper("Category", 1, "product.category");
    h.erp.purge("product.category", mapper.remote_id.unwrap());
    h.erp.clear_calls();

    let report = h.delete(&tools);

    assert!(report.is_success());
    assert!(h.erp.calls_of(RemoteOp::Delete).is_empty());
    assert!(!h.tombstones()[0].dirty);
}

#[test]
fn never_created_object_is_tombstoned_clean() {
    let h = Harness::new();
    h.erp.fail_on(RemoteOp::Create, "product.category");
    let tools = category(1, "Tools");
    h.save(&tools);
    h.erp.clear_failures();
    h.erp.clear_calls();

    let report = h.delete(&tools);

    assert!(report.is_success());
    assert!(h.erp.calls().is_empty());
    let tombstones = h.tombstones();
    assert_eq!(tombstones[0].remote_id, None);
    assert!(!tombstones[0].dirty);
}

#[test]
fn failed_delete_is_retried_by_backlog() {
    let h = Harness::new();
    let tools = category(1, "Tools");
    h.save(&tools);
    h.erp.fail_on(RemoteOp::Delete, "product.category");

    let report = h.delete(&tools);

    assert_eq!(report.failed, 1);
    assert!(h.tombstones()[0].dirty);
    assert!(h.find("Category", 1, "product.category").is_none());
    assert_eq!(h.erp.count("product.category"), 1);

    h.erp.clear_failures();
    let report = h.engine.sync_now().unwrap();

    assert!(report.is_success());
    assert!(!h.tombstones()[0].dirty);
    assert_eq!(h.erp.count("product.category"), 0);
}

#[test]
fn deferred_delete_replays_children_first() {
    let h = Harness::with_settings(shop_settings().with_mode(SyncMode::Deferred));
    let hammer = product(10, "Hammer", 9.5, &[]);
    h.save(&hammer);
    h.engine.sync_now().unwrap();
    h.erp.clear_calls();

    let report = h.delete(&hammer);

    assert_eq!(report.deferred, 2);
    assert!(h.erp.calls().is_empty());
    assert!(h.tombstones().iter().all(|t| t.dirty));

    let report = h.engine.sync_now().unwrap();

    assert!(report.is_success());
    assert_eq!(report.succeeded, 2);
    assert!(h.tombstones().iter().all(|t| !t.dirty));
    let deletes = h.erp.calls_of(RemoteOp::Delete);
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].model, "product.template");
}

#[test]
fn sync_tombstone_replays_one_row() {
    let h = Harness::new();
    let tools = category(1, "Tools");
    h.save(&tools);
    h.erp.fail_times(RemoteOp::Delete, "product.category", 1);
    h.delete(&tools);
    let tombstone = h.tombstones().remove(0);
    assert!(tombstone.dirty);

    let report = h.engine.sync_tombstone(tombstone.id).unwrap();

    assert!(report.is_success());
    assert!(!h.store.get_tombstone(tombstone.id).unwrap().unwrap().dirty);

    let report = h.engine.sync_tombstone(tombstone.id).unwrap();
    assert_eq!(report.skipped, 1);
}
