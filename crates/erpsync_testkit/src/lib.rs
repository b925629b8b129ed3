//! # erpsync Testkit
//!
//! Test utilities for erpsync.
//!
//! This crate provides:
//! - A sample shop mapping, record builders and a preconfigured in-memory ERP
//! - [`ManualClock`] for deterministic row timestamps
//! - Temporary journal files
//! - Property-based generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use erpsync_testkit::prelude::*;
//!
//! let mapping = shop_mapping();
//! let tools = category(1, "Tools");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod fixtures;
pub mod generators;
pub mod shop;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::shop::*;
}

pub use clock::*;
pub use fixtures::*;
pub use generators::*;
pub use shop::*;
