//! # erpsync Codec
//!
//! Value types exchanged with the ERP and the record codec used by the
//! mapper journal.
//!
//! - [`Value`] is a remote field value as the ERP's RPC layer understands
//!   it. It has no `None`: absent or empty data is sent as `false`, and
//!   many-to-many fields take a "set links" directive ([`Value::LinkSet`]).
//! - [`Payload`] is the field map sent with a create or update call.
//! - [`to_cbor`] / [`from_cbor`] encode any serde type for the journal.
//!
//! ## Usage
//!
//! ```
//! use erpsync_codec::Value;
//!
//! assert_eq!(Value::from("").normalize(), Value::Bool(false));
//! assert_eq!(
//!     Value::List(vec![Value::Int(3), Value::Int(4)]).normalize(),
//!     Value::LinkSet(vec![Value::Int(3), Value::Int(4)]),
//! );
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod error;
mod value;

pub use cbor::{from_cbor, to_cbor};
pub use error::{CodecError, CodecResult};
pub use value::{Payload, Value, LINK_SET_COMMAND};
