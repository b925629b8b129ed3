//! # erpsync Engine
//!
//! Mapping and reconciliation engine mirroring local objects into an
//! OpenERP/Odoo server.
//!
//! This crate provides:
//! - [`SyncEngine`]: save, delete and order hooks, single-row replay and
//!   the backlog processor
//! - [`merge_backlog`]: the replay ordering of pending deletions, creations
//!   and updates
//! - [`SyncSettings`]: connection parameters and sync mode
//! - [`SyncWorker`]: applies [`ChangeEvent`]s on a background thread
//!
//! ## Lifecycle of a mapper
//!
//! absent → dirty (uncreated) → dirty (existing) → clean → tombstoned
//!
//! A save pushes the object and marks its mappers clean, then repeats for
//! nested models. Any mapping or remote failure leaves the mapper dirty
//! and the backlog replays it later. A delete turns the mappers into
//! tombstones and removes the remote objects children first.
//!
//! ## Key Invariants
//!
//! - Children are only synced after their parent succeeded
//! - A failure anywhere below a top-level mapper leaves that mapper dirty
//! - Backlog ties go delete, then create, then update
//! - Store failures abort the call; nothing else does

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backlog;
mod engine;
mod error;
mod events;
mod locks;
mod orders;
mod settings;
mod stats;

pub use backlog::{merge_backlog, BacklogItem};
pub use engine::SyncEngine;
pub use error::{EngineError, EngineResult, SettingsError, SettingsResult};
pub use events::{ChangeEvent, ChangeListener, EventQueue, SyncWorker, WorkerSummary};
pub use locks::{ObjectGuard, ObjectLocks};
pub use settings::{OrderPolicy, SyncMode, SyncSettings};
pub use stats::{SyncReport, SyncStats};
