//! Connection and behaviour settings for the engine.

use crate::error::{SettingsError, SettingsResult};
use erpsync_core::{AttrPath, RemoteId};
use erpsync_rpc::RpcCredentials;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// When remote calls happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Changes are pushed as they happen (subject to `auto_sync`).
    #[default]
    Live,
    /// Changes only mark mappers dirty; the backlog pushes them.
    Deferred,
}

/// Settings for one engine instance.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// ERP host name.
    pub host: String,
    /// ERP port.
    pub port: u16,
    /// ERP database name.
    pub database: String,
    /// ERP login.
    pub user: String,
    /// ERP password.
    pub password: String,
    /// Receivable account used for payment vouchers.
    pub account_id: RemoteId,
    /// Journal used for payment vouchers.
    pub journal_id: RemoteId,
    /// Company used for payment vouchers.
    pub company_id: RemoteId,
    /// Currency used for payment vouchers.
    pub currency_id: RemoteId,
    /// Live or deferred operation.
    pub mode: SyncMode,
    /// Push on save/delete while live.
    pub auto_sync: bool,
    /// Run the order confirmation workflow.
    pub confirm_orders: bool,
    /// Where the order workflow finds its data.
    pub orders: OrderPolicy,
}

impl SyncSettings {
    /// Creates settings for a database with defaults for everything else.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    /// Parses settings from JSON and validates them.
    pub fn from_json_str(json: &str) -> SettingsResult<Self> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| SettingsError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads, parses and validates a JSON settings file.
    pub fn from_file(path: &Path) -> SettingsResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Sets host and port.
    pub fn with_server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Sets the login.
    pub fn with_login(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Sets the accounting ids used for payment vouchers.
    pub fn with_accounting(
        mut self,
        account_id: RemoteId,
        journal_id: RemoteId,
        company_id: RemoteId,
        currency_id: RemoteId,
    ) -> Self {
        self.account_id = account_id;
        self.journal_id = journal_id;
        self.company_id = company_id;
        self.currency_id = currency_id;
        self
    }

    /// Sets the sync mode.
    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enables or disables pushing on save.
    pub fn with_auto_sync(mut self, auto_sync: bool) -> Self {
        self.auto_sync = auto_sync;
        self
    }

    /// Enables or disables the order workflow.
    pub fn with_confirm_orders(mut self, confirm_orders: bool) -> Self {
        self.confirm_orders = confirm_orders;
        self
    }

    /// Replaces the order policy.
    pub fn with_orders(mut self, orders: OrderPolicy) -> Self {
        self.orders = orders;
        self
    }

    /// Returns true if saves and deletes are pushed right away.
    pub fn immediate(&self) -> bool {
        self.mode == SyncMode::Live && self.auto_sync
    }

    /// JSON-RPC endpoint URL.
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}/jsonrpc", self.host, self.port)
    }

    /// Credentials for [`RpcClient`](erpsync_rpc::RpcClient).
    pub fn credentials(&self) -> RpcCredentials {
        RpcCredentials {
            url: self.endpoint(),
            database: self.database.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }

    /// Checks that the settings are usable.
    pub fn validate(&self) -> SettingsResult<()> {
        if self.host.trim().is_empty() {
            return Err(SettingsError::invalid("host", "must not be empty"));
        }
        if self.port == 0 {
            return Err(SettingsError::invalid("port", "must not be 0"));
        }
        if self.database.trim().is_empty() {
            return Err(SettingsError::invalid("database", "must not be empty"));
        }
        self.orders.validate()
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8069,
            database: String::new(),
            user: "admin".to_string(),
            password: String::new(),
            account_id: 0,
            journal_id: 0,
            company_id: 1,
            currency_id: 1,
            mode: SyncMode::Live,
            auto_sync: true,
            confirm_orders: true,
            orders: OrderPolicy::default(),
        }
    }
}

impl fmt::Debug for SyncSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("account_id", &self.account_id)
            .field("journal_id", &self.journal_id)
            .field("company_id", &self.company_id)
            .field("currency_id", &self.currency_id)
            .field("mode", &self.mode)
            .field("auto_sync", &self.auto_sync)
            .field("confirm_orders", &self.confirm_orders)
            .field("orders", &self.orders)
            .finish()
    }
}

/// Kinds, models and attribute paths used by the order workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderPolicy {
    /// Local kind of orders.
    pub order_kind: String,
    /// Remote model of orders.
    pub order_model: String,
    /// Path from an order to its billing address.
    pub partner_path: String,
    /// Local kind of billing addresses.
    pub partner_kind: String,
    /// Remote model of billing addresses.
    pub partner_model: String,
    /// Path from an order to its completed payments.
    pub payments_path: String,
    /// Local kind used for payment mappers.
    pub payment_kind: String,
    /// Remote model of payment vouchers.
    pub voucher_model: String,
    /// Order field listing generated invoices.
    pub invoice_field: String,
    /// Remote model of invoices.
    pub invoice_model: String,
    /// Field holding the workflow state of orders and invoices.
    pub state_field: String,
    /// States in which an order still needs confirming, or an invoice
    /// validating.
    pub unconfirmed_states: Vec<String>,
}

impl OrderPolicy {
    /// Returns true for unconfirmed orders and unvalidated invoices.
    pub fn is_unconfirmed(&self, state: &str) -> bool {
        self.unconfirmed_states.iter().any(|s| s == state)
    }

    /// Returns true for the rows the workflow keeps for posted payments.
    pub fn is_payment(&self, kind: &str, model: &str) -> bool {
        kind == self.payment_kind && model == self.voucher_model
    }

    pub(crate) fn partner_path(&self) -> SettingsResult<AttrPath> {
        AttrPath::parse(&self.partner_path)
            .map_err(|e| SettingsError::invalid("orders.partner_path", e.to_string()))
    }

    pub(crate) fn payments_path(&self) -> SettingsResult<AttrPath> {
        AttrPath::parse(&self.payments_path)
            .map_err(|e| SettingsError::invalid("orders.payments_path", e.to_string()))
    }

    fn validate(&self) -> SettingsResult<()> {
        self.partner_path()?;
        self.payments_path()?;
        if self.order_kind.is_empty() || self.order_model.is_empty() {
            return Err(SettingsError::invalid(
                "orders.order_kind",
                "order kind and model must be set",
            ));
        }
        Ok(())
    }
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self {
            order_kind: "Order".to_string(),
            order_model: "sale.order".to_string(),
            partner_path: "contact.billing_address".to_string(),
            partner_kind: "AddressBook".to_string(),
            partner_model: "res.partner".to_string(),
            payments_path: "payments".to_string(),
            payment_kind: "OrderPayment".to_string(),
            voucher_model: "account.voucher".to_string(),
            invoice_field: "invoice_ids".to_string(),
            invoice_model: "account.invoice".to_string(),
            state_field: "state".to_string(),
            unconfirmed_states: vec!["draft".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = SyncSettings::new("shop");
        assert_eq!(settings.host, "localhost");
        assert_eq!(settings.port, 8069);
        assert_eq!(settings.company_id, 1);
        assert!(settings.immediate());
        assert!(settings.confirm_orders);
        assert_eq!(settings.endpoint(), "http://localhost:8069/jsonrpc");
        settings.validate().unwrap();
    }

    #[test]
    fn immediate_needs_live_and_auto_sync() {
        let settings = SyncSettings::new("shop").with_mode(SyncMode::Deferred);
        assert!(!settings.immediate());

        let settings = SyncSettings::new("shop").with_auto_sync(false);
        assert!(!settings.immediate());
    }

    #[test]
    fn from_json() {
        let settings = SyncSettings::from_json_str(
            r#"{
                "host": "erp.internal",
                "port": 8070,
                "database": "shop",
                "user": "sync",
                "password": "hunter2",
                "account_id": 12,
                "journal_id": 7,
                "mode": "deferred",
                "orders": {"unconfirmed_states": ["draft", "sent"]}
            }"#,
        )
        .unwrap();

        assert_eq!(settings.endpoint(), "http://erp.internal:8070/jsonrpc");
        assert_eq!(settings.mode, SyncMode::Deferred);
        assert_eq!(settings.account_id, 12);
        assert!(settings.orders.is_unconfirmed("sent"));
        assert!(!settings.orders.is_unconfirmed("manual"));
        assert_eq!(settings.orders.order_model, "sale.order");

        let credentials = settings.credentials();
        assert_eq!(credentials.database, "shop");
        assert_eq!(credentials.user, "sync");
    }

    #[test]
    fn validation() {
        assert!(matches!(
            SyncSettings::default().validate(),
            Err(SettingsError::Invalid { field: "database", .. })
        ));
        assert!(matches!(
            SyncSettings::new("shop").with_server("erp", 0).validate(),
            Err(SettingsError::Invalid { field: "port", .. })
        ));

        let mut orders = OrderPolicy::default();
        orders.partner_path = "contact..billing".to_string();
        assert!(matches!(
            SyncSettings::new("shop").with_orders(orders).validate(),
            Err(SettingsError::Invalid { field: "orders.partner_path", .. })
        ));

        assert!(matches!(
            SyncSettings::from_json_str("{not json"),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn debug_hides_password() {
        let settings = SyncSettings::new("shop").with_login("sync", "hunter2");
        let debug = format!("{settings:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"database": "shop"}"#).unwrap();
        assert_eq!(SyncSettings::from_file(&path).unwrap().database, "shop");

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            SyncSettings::from_file(&missing),
            Err(SettingsError::Io { .. })
        ));
    }
}
