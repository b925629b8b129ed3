//! Order confirmation workflow.
//!
//! After an order has been pushed, the ERP order is confirmed, the invoice
//! it generates is validated and every completed payment is posted as a
//! voucher against the billing partner. Any failing step leaves the order
//! mapper dirty and stops the workflow for that order. The backlog resumes
//! a confirmed order at its invoice while any payment is unposted.

use crate::engine::SyncEngine;
use crate::error::{EngineError, EngineResult, Failure};
use crate::stats::SyncReport;
use chrono::Datelike;
use erpsync_codec::Value;
use erpsync_core::{
    LocalValue, Mapper, MapperKey, MapperState, MapperStore, MappingError, NewMapper, Record,
    RemoteId,
};
use erpsync_rpc::{PaymentVoucher, RemoteClient, RemoteError};
use tracing::{debug, info};

/// Where the order workflow starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Confirm the order, then settle it.
    Confirm,
    /// The order is confirmed; validate its invoice and post payments.
    Settle,
}

impl<R: RemoteClient + ?Sized, S: MapperStore + ?Sized> SyncEngine<R, S> {
    /// Handles a successfully placed order.
    ///
    /// Outside immediate mode the order mapper is only marked dirty; the
    /// backlog confirms it later while the remote order is unconfirmed.
    pub fn on_order_success(&self, order: &Record) -> EngineResult<SyncReport> {
        let _guard = self.locks.lock(order.key());
        let mut report = SyncReport::default();

        if !self.settings.confirm_orders {
            debug!(order = %order.key(), "order confirmation disabled");
            report.skipped += 1;
            return Ok(report);
        }

        if !self.settings.immediate() {
            let key = self.order_key(order);
            let mut mapper = self.find_or_create(key)?;
            mapper.mark_dirty(self.now());
            self.store.update(&mapper)?;
            report.deferred += 1;
            return Ok(report);
        }

        self.confirm_locked(order, &mut report)?;
        Ok(report)
    }

    /// Replays a dirty order mapper, then confirms the order if the ERP
    /// still reports it unconfirmed, or settles it if payments are unposted.
    pub(crate) fn replay_order(
        &self,
        mapper: Mapper,
        force: bool,
        report: &mut SyncReport,
    ) -> EngineResult<()> {
        let _guard = self.locks.lock(mapper.local());
        let Some(current) = self.store.get(mapper.id)? else {
            report.skipped += 1;
            return Ok(());
        };
        if !force && !current.dirty {
            report.skipped += 1;
            return Ok(());
        }

        if !self.replay_mapper(current, report)? || !self.settings.confirm_orders {
            return Ok(());
        }

        let Some(current) = self.store.get(mapper.id)? else {
            return Ok(());
        };
        let Some(order) = self.local.load(&current.local_kind, current.local_id) else {
            return Ok(());
        };
        let stage = match self.awaits_confirmation(&current) {
            Ok(true) => Stage::Confirm,
            Ok(false) => match self.is_unsettled(&order, &current) {
                Ok(true) => Stage::Settle,
                Ok(false) => {
                    debug!(order = %current.local(), "order already settled");
                    return Ok(());
                }
                Err(failure) => return self.fail_order(current, failure, report),
            },
            Err(failure) => return self.fail_order(current, failure, report),
        };
        self.run_workflow(&order, stage, report)?;
        Ok(())
    }

    fn fail_order(
        &self,
        mapper: Mapper,
        failure: Failure,
        report: &mut SyncReport,
    ) -> EngineResult<()> {
        match failure {
            Failure::Store(e) => Err(EngineError::Store(e)),
            failure => self.fail_mapper(mapper, &failure, report).map(|_| ()),
        }
    }

    fn order_key(&self, order: &Record) -> MapperKey {
        MapperKey::new(&order.kind, order.id, &self.settings.orders.order_model, None)
    }

    fn awaits_confirmation(&self, mapper: &Mapper) -> Result<bool, Failure> {
        let policy = &self.settings.orders;
        let Some(id) = mapper.remote_id else {
            return Ok(false);
        };
        let model = mapper.remote_model.as_str();
        let field = policy.state_field.as_str();
        let row = self.call(|r| r.read(model, id, &[field]))?;
        Ok(row
            .get(field)
            .and_then(Value::as_text)
            .is_some_and(|state| policy.is_unconfirmed(state)))
    }

    fn confirm_locked(&self, order: &Record, report: &mut SyncReport) -> EngineResult<bool> {
        self.run_workflow(order, Stage::Confirm, report)
    }

    fn run_workflow(
        &self,
        order: &Record,
        stage: Stage,
        report: &mut SyncReport,
    ) -> EngineResult<bool> {
        let key = self.order_key(order);
        let Some(mut mapper) = self.store.find(&key)? else {
            let mapper = self.store.insert(NewMapper::dirty(key, self.now()))?;
            let failure = Failure::local("no mapper found for order");
            self.record_failure(&order.key(), &mapper.remote_model, &failure, report);
            return Ok(false);
        };

        let outcome = match stage {
            Stage::Confirm => self.confirm_order(order, &mut mapper, report),
            Stage::Settle => self.settle_order(order, &mut mapper, report),
        };
        match outcome {
            Ok(()) => {
                if stage == Stage::Confirm {
                    self.stats.write().orders_confirmed += 1;
                }
                self.record_success(report);
                Ok(true)
            }
            Err(Failure::Store(e)) => Err(EngineError::Store(e)),
            Err(failure) => {
                self.fail_mapper(mapper, &failure, report)?;
                Ok(false)
            }
        }
    }

    fn confirm_order(
        &self,
        order: &Record,
        mapper: &mut Mapper,
        report: &mut SyncReport,
    ) -> Result<(), Failure> {
        let model = mapper.remote_model.clone();
        let Some(order_id) = mapper.remote_id else {
            return Err(Failure::local("order was never created remotely"));
        };

        self.call(|r| r.confirm_order(&model, order_id))?;
        info!(model = %model, id = order_id, "order confirmed");
        self.settle_order(order, mapper, report)
    }

    /// Validates the latest invoice of a confirmed order if it is still a
    /// draft, then posts the payments that have no clean voucher yet.
    fn settle_order(
        &self,
        order: &Record,
        mapper: &mut Mapper,
        report: &mut SyncReport,
    ) -> Result<(), Failure> {
        let model = mapper.remote_model.clone();
        let Some(order_id) = mapper.remote_id else {
            return Err(Failure::local("order was never created remotely"));
        };

        let invoice_id = self.latest_invoice(&model, order_id)?.ok_or_else(|| {
            RemoteError::unexpected(&model, Some(order_id), "order has no invoice")
        })?;
        mapper.mark_clean(self.now());
        self.store.update(mapper)?;

        if self.invoice_is_draft(invoice_id)? {
            self.call(|r| r.validate_invoice(invoice_id))?;
            info!(invoice_id, "invoice validated");
        } else {
            debug!(invoice_id, "invoice already validated");
        }

        let partner_id = self.billing_partner(order)?;
        for payment in self.completed_payments(order)? {
            self.post_payment(&payment, partner_id, report)?;
        }
        Ok(())
    }

    /// A confirmed order is unsettled while a payment lacks a clean voucher
    /// or its latest invoice is still a draft.
    fn is_unsettled(&self, order: &Record, mapper: &Mapper) -> Result<bool, Failure> {
        for payment in self.completed_payments(order)? {
            let posted = self
                .store
                .find(&self.payment_key(&payment))?
                .is_some_and(|m| m.state() == MapperState::Clean);
            if !posted {
                return Ok(true);
            }
        }
        let Some(order_id) = mapper.remote_id else {
            return Ok(false);
        };
        match self.latest_invoice(&mapper.remote_model, order_id)? {
            Some(invoice_id) => self.invoice_is_draft(invoice_id),
            None => Ok(false),
        }
    }

    fn latest_invoice(
        &self,
        model: &str,
        order_id: RemoteId,
    ) -> Result<Option<RemoteId>, Failure> {
        let field = self.settings.orders.invoice_field.as_str();
        let row = self.call(|r| r.read(model, order_id, &[field]))?;
        Ok(row
            .get(field)
            .and_then(Value::as_list)
            .and_then(<[Value]>::last)
            .and_then(Value::as_i64))
    }

    fn invoice_is_draft(&self, invoice_id: RemoteId) -> Result<bool, Failure> {
        let policy = &self.settings.orders;
        let field = policy.state_field.as_str();
        let row = self.call(|r| r.read(&policy.invoice_model, invoice_id, &[field]))?;
        Ok(row
            .get(field)
            .and_then(Value::as_text)
            .is_some_and(|state| policy.is_unconfirmed(state)))
    }

    fn payment_key(&self, payment: &Record) -> MapperKey {
        let policy = &self.settings.orders;
        MapperKey::new(&policy.payment_kind, payment.id, &policy.voucher_model, None)
    }

    fn billing_partner(&self, order: &Record) -> Result<RemoteId, Failure> {
        let policy = &self.settings.orders;
        let path = policy
            .partner_path()
            .map_err(|e| Failure::local(e.to_string()))?;
        let address = order
            .resolve(&path)
            .map_err(|e| MappingError::field(&policy.partner_path, e))?;
        let Some(local_id) = address.as_object_id() else {
            return Err(Failure::local("order has no billing address"));
        };

        self.store
            .lookup(&policy.partner_kind, local_id, &policy.partner_model)?
            .and_then(|m| m.remote_id)
            .ok_or_else(|| {
                Failure::local(format!(
                    "no {} mapper found for {}#{}",
                    policy.partner_model, policy.partner_kind, local_id
                ))
            })
    }

    fn completed_payments(&self, order: &Record) -> Result<Vec<Record>, Failure> {
        let policy = &self.settings.orders;
        let path = policy
            .payments_path()
            .map_err(|e| Failure::local(e.to_string()))?;
        let value = order
            .resolve(&path)
            .map_err(|e| MappingError::field(&policy.payments_path, e))?;

        match value {
            LocalValue::Null => Ok(Vec::new()),
            LocalValue::List(items) => items
                .into_iter()
                .map(|item| match item {
                    LocalValue::Record(payment) => Ok(*payment),
                    _ => Err(Failure::from(MappingError::field(
                        &policy.payments_path,
                        "payments must be related objects",
                    ))),
                })
                .collect(),
            _ => Err(Failure::from(MappingError::field(
                &policy.payments_path,
                "expected a list of payments",
            ))),
        }
    }

    fn post_payment(
        &self,
        payment: &Record,
        partner_id: RemoteId,
        report: &mut SyncReport,
    ) -> Result<(), Failure> {
        let policy = &self.settings.orders;
        let key = self.payment_key(payment);
        let existing = self.store.find(&key)?;
        if existing
            .as_ref()
            .is_some_and(|m| m.state() == MapperState::Clean)
        {
            debug!(payment = payment.id, "payment already posted");
            report.skipped += 1;
            return Ok(());
        }

        let amount = match payment.get("amount") {
            Some(LocalValue::Float(amount)) => amount,
            Some(LocalValue::Int(amount)) => amount as f64,
            Some(LocalValue::Text(text)) => text
                .trim()
                .parse()
                .map_err(|_| MappingError::field("amount", format!("'{text}' is not a number")))?,
            _ => return Err(MappingError::field("amount", "payment has no amount").into()),
        };

        let now = self.now();
        let voucher = PaymentVoucher {
            partner_id,
            account_id: self.settings.account_id,
            journal_id: self.settings.journal_id,
            period_id: i64::from(now.month()),
            amount,
            company_id: self.settings.company_id,
            currency_id: self.settings.currency_id,
        };

        let mut mapper = match existing {
            Some(mapper) => mapper,
            None => self.store.insert(NewMapper::dirty(key, now))?,
        };
        let voucher_id = self.call(|r| r.add_payment(&policy.voucher_model, &voucher))?;

        mapper.bind_remote(voucher_id, now);
        mapper.mark_clean(now);
        self.store.update(&mapper)?;
        self.stats.write().payments_posted += 1;
        info!(payment = payment.id, voucher_id, amount, "payment posted");
        Ok(())
    }
}
