//! # erpsync RPC
//!
//! The remote side of erpsync: a [`RemoteClient`] trait covering the object
//! operations and workflows the engine drives, plus two implementations.
//!
//! - [`RpcClient`] speaks JSON-RPC to an OpenERP/Odoo server through any
//!   [`HttpClient`]
//! - [`MemoryErp`] keeps objects in memory, logs calls and injects failures
//!
//! No operation here touches local state; failures are reported as
//! [`RemoteError`] and it is up to the caller to mark mappers dirty.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod error;
mod jsonrpc;
mod memory;

pub use client::{PaymentVoucher, RemoteClient};
pub use error::{RemoteCause, RemoteError, RemoteResult};
pub use jsonrpc::{
    prepare_credit_lines, HttpClient, RpcClient, RpcCredentials, INVOICE_CONFIRM_MODEL,
};
pub use memory::{MemoryErp, RemoteCall, RemoteOp, INVOICE_MODEL};
