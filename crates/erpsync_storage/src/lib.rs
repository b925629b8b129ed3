//! # erpsync Storage
//!
//! Journal backends for persisting erpsync mapper state.
//!
//! Backends are **opaque byte journals**: they append bytes, hand the whole
//! journal back for replay, and can be rewritten wholesale during
//! compaction. They know nothing about mappers or tombstones. Record framing
//! (magic, version, length, checksum) lives in [`frame`] so both backends
//! share one on-disk format.
//!
//! ## Available Backends
//!
//! - [`MemoryJournal`] - For tests and ephemeral engines
//! - [`FileJournal`] - For persistent storage, guarded by an exclusive lock
//!
//! ## Example
//!
//! ```rust
//! use erpsync_storage::{encode_frame, FrameReader, JournalBackend, MemoryJournal};
//!
//! let mut journal = MemoryJournal::new();
//! journal.append(&encode_frame(b"mapper row").unwrap()).unwrap();
//!
//! let bytes = journal.read_all().unwrap();
//! let frames: Vec<_> = FrameReader::new(&bytes).collect::<Result<_, _>>().unwrap();
//! assert_eq!(frames, vec![b"mapper row".to_vec()]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
pub mod frame;
mod memory;

pub use backend::JournalBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileJournal;
pub use frame::{encode_frame, FrameReader, FRAME_MAGIC, FRAME_VERSION};
pub use memory::MemoryJournal;
