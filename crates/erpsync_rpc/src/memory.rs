//! In-memory ERP for tests and dry runs.

use crate::client::{PaymentVoucher, RemoteClient};
use crate::error::{RemoteCause, RemoteError, RemoteResult};
use erpsync_codec::{Payload, Value};
use erpsync_core::RemoteId;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Model holding invoices created by order confirmation.
pub const INVOICE_MODEL: &str = "account.invoice";

/// The remote operations [`MemoryErp`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    /// [`RemoteClient::exists`].
    Exists,
    /// [`RemoteClient::create`].
    Create,
    /// [`RemoteClient::update`].
    Update,
    /// [`RemoteClient::delete`].
    Delete,
    /// [`RemoteClient::read`].
    Read,
    /// [`RemoteClient::confirm_order`].
    ConfirmOrder,
    /// [`RemoteClient::validate_invoice`].
    ValidateInvoice,
    /// [`RemoteClient::add_payment`].
    AddPayment,
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteOp::Exists => "exists",
            RemoteOp::Create => "create",
            RemoteOp::Update => "update",
            RemoteOp::Delete => "delete",
            RemoteOp::Read => "read",
            RemoteOp::ConfirmOrder => "confirm_order",
            RemoteOp::ValidateInvoice => "validate_invoice",
            RemoteOp::AddPayment => "add_payment",
        };
        f.write_str(name)
    }
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    /// Operation.
    pub op: RemoteOp,
    /// Model the call targeted.
    pub model: String,
    /// Object id, if the call named one (for creates: the assigned id).
    pub id: Option<RemoteId>,
}

impl RemoteCall {
    fn new(op: RemoteOp, model: &str, id: Option<RemoteId>) -> Self {
        Self {
            op,
            model: model.to_string(),
            id,
        }
    }
}

#[derive(Debug, Clone)]
struct FailureRule {
    op: RemoteOp,
    model: Option<String>,
    id: Option<RemoteId>,
    remaining: Option<usize>,
}

impl FailureRule {
    fn matches(&self, op: RemoteOp, model: &str, id: Option<RemoteId>) -> bool {
        self.op == op
            && self.model.as_deref().map_or(true, |m| m == model)
            && self.id.map_or(true, |i| Some(i) == id)
            && self.remaining != Some(0)
    }
}

#[derive(Debug, Default)]
struct Tables {
    objects: BTreeMap<String, BTreeMap<RemoteId, Payload>>,
    defaults: HashMap<String, Payload>,
    next_id: RemoteId,
}

impl Tables {
    fn insert(&mut self, model: &str, payload: &Payload) -> RemoteId {
        self.next_id += 1;
        let id = self.next_id;
        let mut row = self.defaults.get(model).cloned().unwrap_or_default();
        row.extend(payload.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.objects.entry(model.to_string()).or_default().insert(id, row);
        id
    }

    fn row_mut(&mut self, model: &str, id: RemoteId) -> RemoteResult<&mut Payload> {
        self.objects
            .get_mut(model)
            .and_then(|rows| rows.get_mut(&id))
            .ok_or_else(|| RemoteError::not_found(model, id))
    }
}

/// An ERP double keeping objects in memory.
///
/// Beyond plain object storage it emulates the workflows the engine
/// drives: confirming an order creates a draft invoice and appends it to
/// the order's `invoice_ids`, validating an invoice opens it, and posting
/// a payment stores a voucher in `posted` state. Every call is logged and
/// failures can be injected per operation, model and id.
#[derive(Debug, Default)]
pub struct MemoryErp {
    tables: RwLock<Tables>,
    calls: Mutex<Vec<RemoteCall>>,
    failures: Mutex<Vec<FailureRule>>,
}

impl MemoryErp {
    /// Creates an empty ERP.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets field values every new object of `model` starts with.
    #[must_use]
    pub fn with_defaults(self, model: impl Into<String>, defaults: Payload) -> Self {
        self.tables.write().defaults.insert(model.into(), defaults);
        self
    }

    /// Makes every `op` on `model` fail until cleared.
    pub fn fail_on(&self, op: RemoteOp, model: impl Into<String>) {
        self.push_failure(op, Some(model.into()), None, None);
    }

    /// Makes `op` on one object fail until cleared.
    pub fn fail_on_id(&self, op: RemoteOp, model: impl Into<String>, id: RemoteId) {
        self.push_failure(op, Some(model.into()), Some(id), None);
    }

    /// Makes the next `times` calls of `op` on `model` fail.
    pub fn fail_times(&self, op: RemoteOp, model: impl Into<String>, times: usize) {
        self.push_failure(op, Some(model.into()), None, Some(times));
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    fn push_failure(
        &self,
        op: RemoteOp,
        model: Option<String>,
        id: Option<RemoteId>,
        remaining: Option<usize>,
    ) {
        self.failures.lock().push(FailureRule {
            op,
            model,
            id,
            remaining,
        });
    }

    /// Inserts an object directly, bypassing the call log.
    pub fn seed(&self, model: &str, payload: Payload) -> RemoteId {
        self.tables.write().insert(model, &payload)
    }

    /// Removes an object directly, as if deleted by someone else.
    pub fn purge(&self, model: &str, id: RemoteId) -> Option<Payload> {
        self.tables
            .write()
            .objects
            .get_mut(model)
            .and_then(|rows| rows.remove(&id))
    }

    /// Sets one field of an object directly.
    pub fn set_field(&self, model: &str, id: RemoteId, field: &str, value: Value) -> bool {
        match self.tables.write().row_mut(model, id) {
            Ok(row) => {
                row.insert(field.to_string(), value);
                true
            }
            Err(_) => false,
        }
    }

    /// Returns an object's fields.
    pub fn object(&self, model: &str, id: RemoteId) -> Option<Payload> {
        self.tables
            .read()
            .objects
            .get(model)
            .and_then(|rows| rows.get(&id))
            .cloned()
    }

    /// Returns all objects of a model ordered by id.
    pub fn objects(&self, model: &str) -> Vec<(RemoteId, Payload)> {
        self.tables
            .read()
            .objects
            .get(model)
            .map(|rows| rows.iter().map(|(id, row)| (*id, row.clone())).collect())
            .unwrap_or_default()
    }

    /// Number of objects of a model.
    pub fn count(&self, model: &str) -> usize {
        self.tables
            .read()
            .objects
            .get(model)
            .map_or(0, BTreeMap::len)
    }

    /// Returns the call log.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    /// Returns the logged calls of one operation.
    pub fn calls_of(&self, op: RemoteOp) -> Vec<RemoteCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }

    /// Returns the logged mutations (create, update, delete) in order.
    pub fn mutations(&self) -> Vec<RemoteCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c.op, RemoteOp::Create | RemoteOp::Update | RemoteOp::Delete))
            .cloned()
            .collect()
    }

    /// Empties the call log.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Logs a call and applies injected failures.
    fn enter(&self, op: RemoteOp, model: &str, id: Option<RemoteId>) -> RemoteResult<()> {
        self.calls.lock().push(RemoteCall::new(op, model, id));
        let mut failures = self.failures.lock();
        if let Some(rule) = failures.iter_mut().find(|r| r.matches(op, model, id)) {
            if let Some(remaining) = rule.remaining.as_mut() {
                *remaining -= 1;
            }
            return Err(RemoteError::new(
                model,
                id,
                RemoteCause::Fault(format!("injected {op} failure")),
            ));
        }
        Ok(())
    }
}

impl RemoteClient for MemoryErp {
    fn exists(&self, model: &str, id: RemoteId) -> RemoteResult<bool> {
        self.enter(RemoteOp::Exists, model, Some(id))?;
        Ok(self.object(model, id).is_some())
    }

    fn create(&self, model: &str, payload: &Payload) -> RemoteResult<RemoteId> {
        self.enter(RemoteOp::Create, model, None)?;
        let id = self.tables.write().insert(model, payload);
        if let Some(call) = self.calls.lock().last_mut() {
            call.id = Some(id);
        }
        Ok(id)
    }

    fn update(&self, model: &str, id: RemoteId, payload: &Payload) -> RemoteResult<()> {
        self.enter(RemoteOp::Update, model, Some(id))?;
        let mut tables = self.tables.write();
        let row = tables.row_mut(model, id)?;
        row.extend(payload.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    fn delete(&self, model: &str, id: RemoteId) -> RemoteResult<()> {
        self.enter(RemoteOp::Delete, model, Some(id))?;
        self.purge(model, id)
            .map(|_| ())
            .ok_or_else(|| RemoteError::not_found(model, id))
    }

    fn read(&self, model: &str, id: RemoteId, fields: &[&str]) -> RemoteResult<Payload> {
        self.enter(RemoteOp::Read, model, Some(id))?;
        let row = self
            .object(model, id)
            .ok_or_else(|| RemoteError::not_found(model, id))?;
        let mut result = Payload::new();
        result.insert("id".into(), Value::Int(id));
        for field in fields {
            let value = row.get(*field).cloned().unwrap_or(Value::Bool(false));
            result.insert((*field).to_string(), value);
        }
        Ok(result)
    }

    fn confirm_order(&self, model: &str, id: RemoteId) -> RemoteResult<()> {
        self.enter(RemoteOp::ConfirmOrder, model, Some(id))?;
        let mut tables = self.tables.write();
        tables.row_mut(model, id)?;

        let mut invoice = Payload::new();
        invoice.insert("origin".into(), Value::Int(id));
        invoice.insert("state".into(), Value::from("draft"));
        let invoice_id = tables.insert(INVOICE_MODEL, &invoice);

        let order = tables.row_mut(model, id)?;
        order.insert("state".into(), Value::from("manual"));
        let mut invoices = match order.get("invoice_ids") {
            Some(Value::List(ids)) => ids.clone(),
            _ => Vec::new(),
        };
        invoices.push(Value::Int(invoice_id));
        order.insert("invoice_ids".into(), Value::List(invoices));
        Ok(())
    }

    fn validate_invoice(&self, invoice_id: RemoteId) -> RemoteResult<()> {
        self.enter(RemoteOp::ValidateInvoice, INVOICE_MODEL, Some(invoice_id))?;
        let mut tables = self.tables.write();
        let invoice = tables.row_mut(INVOICE_MODEL, invoice_id)?;
        invoice.insert("state".into(), Value::from("open"));
        Ok(())
    }

    fn add_payment(&self, voucher_model: &str, voucher: &PaymentVoucher) -> RemoteResult<RemoteId> {
        self.enter(RemoteOp::AddPayment, voucher_model, None)?;
        let mut row = Payload::new();
        row.insert("partner_id".into(), Value::Int(voucher.partner_id));
        row.insert("account_id".into(), Value::Int(voucher.account_id));
        row.insert("journal_id".into(), Value::Int(voucher.journal_id));
        row.insert("period_id".into(), Value::Int(voucher.period_id));
        row.insert("amount".into(), Value::Float(voucher.amount));
        row.insert("company_id".into(), Value::Int(voucher.company_id));
        row.insert("currency_id".into(), Value::Int(voucher.currency_id));
        row.insert("type".into(), Value::from("receipt"));
        row.insert("state".into(), Value::from("posted"));
        let id = self.tables.write().insert(voucher_model, &row);
        if let Some(call) = self.calls.lock().last_mut() {
            call.id = Some(id);
        }
        Ok(id)
    }
}
