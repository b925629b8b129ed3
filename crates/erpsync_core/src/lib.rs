//! # erpsync Core
//!
//! The data model behind erpsync's reconciliation engine.
//!
//! This crate provides:
//! - [`Mapper`] and [`Tombstone`] rows binding local objects to ERP objects
//! - [`MapperStore`] with in-memory and journal-backed implementations
//! - [`Record`] snapshots of local objects and the [`AttrPath`] evaluator
//! - [`MappingConfig`], the static local-kind → remote-model table
//! - [`FieldResolver`], which turns a snapshot into a remote payload
//!
//! ## Key Invariants
//!
//! - A mapper's remote id is `None` iff the remote object was never created
//! - At most one mapper exists per (local kind, local id, remote model, parent)
//! - Removing a mapper removes its descendants
//! - Tombstones are append-only apart from their dirty flag

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod error;
mod local;
mod mapper;
pub mod mapping;
mod resolve;
pub mod store;
mod types;

pub use clock::{Clock, SystemClock};
pub use error::{MappingError, MappingResult, StoreError, StoreResult};
pub use local::{AttrPath, LocalSource, LocalValue, MemorySource, PathError, Record};
pub use mapper::{Mapper, MapperKey, MapperState, NewMapper, NewTombstone, Tombstone};
pub use mapping::{
    Action, ActionSet, FieldRule, FieldSource, KindMapping, MappingConfig, ModelNode,
    DEFAULT_LOOKUP_KEY,
};
pub use resolve::FieldResolver;
pub use store::{
    JournalEntry, JournalMapperStore, MapperFilter, MapperStore, MemoryMapperStore,
    TombstoneFilter,
};
pub use types::{LocalKey, MapperId, ObjectId, RemoteId, Timestamp, TombstoneId};
