//! Remote object client abstraction.

use crate::error::RemoteResult;
use erpsync_codec::Payload;
use erpsync_core::RemoteId;
use serde::{Deserialize, Serialize};

/// A customer payment to be posted against an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentVoucher {
    /// Remote partner paying.
    pub partner_id: RemoteId,
    /// Receivable account.
    pub account_id: RemoteId,
    /// Payment journal.
    pub journal_id: RemoteId,
    /// Accounting period.
    pub period_id: i64,
    /// Amount paid.
    pub amount: f64,
    /// Company.
    pub company_id: RemoteId,
    /// Currency.
    pub currency_id: RemoteId,
}

/// Operations the engine performs against the ERP.
///
/// Every call either succeeds or fails with a
/// [`RemoteError`](crate::RemoteError). Implementations never touch local
/// state.
pub trait RemoteClient: Send + Sync {
    /// Returns true if the object exists.
    fn exists(&self, model: &str, id: RemoteId) -> RemoteResult<bool>;

    /// Creates an object and returns its id.
    fn create(&self, model: &str, payload: &Payload) -> RemoteResult<RemoteId>;

    /// Writes fields of an existing object.
    fn update(&self, model: &str, id: RemoteId, payload: &Payload) -> RemoteResult<()>;

    /// Deletes an object.
    fn delete(&self, model: &str, id: RemoteId) -> RemoteResult<()>;

    /// Reads fields of an object.
    fn read(&self, model: &str, id: RemoteId, fields: &[&str]) -> RemoteResult<Payload>;

    /// Runs the order confirmation workflow on a sale order.
    fn confirm_order(&self, model: &str, id: RemoteId) -> RemoteResult<()>;

    /// Runs the invoice validation workflow.
    fn validate_invoice(&self, invoice_id: RemoteId) -> RemoteResult<()>;

    /// Creates and posts a payment voucher, returning its id.
    fn add_payment(&self, voucher_model: &str, voucher: &PaymentVoucher) -> RemoteResult<RemoteId>;
}
