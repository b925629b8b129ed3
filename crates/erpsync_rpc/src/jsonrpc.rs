//! JSON-RPC client for OpenERP/Odoo servers.
//!
//! Requests go to the server's `/jsonrpc` endpoint:
//!
//! ```text
//! {"jsonrpc": "2.0", "method": "call", "id": 7,
//!  "params": {"service": "object", "method": "execute_kw",
//!             "args": [db, uid, password, model, method, args, kwargs]}}
//! ```
//!
//! The HTTP layer is abstracted via [`HttpClient`] so any HTTP library can
//! carry the requests.

use crate::client::{PaymentVoucher, RemoteClient};
use crate::error::{RemoteCause, RemoteError, RemoteResult};
use erpsync_codec::Payload;
use erpsync_core::RemoteId;
use parking_lot::Mutex;
use serde_json::{json, Map, Value as Json};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Model running the invoice validation wizard.
pub const INVOICE_CONFIRM_MODEL: &str = "account.invoice.confirm";

/// Line fields the ERP rejects when a voucher is written back.
const READ_ONLY_LINE_FIELDS: [&str; 2] = ["date_original", "date_due"];

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
pub trait HttpClient: Send + Sync {
    /// Sends a POST request with a JSON body and returns the response body.
    fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// Connection parameters of an ERP database.
#[derive(Clone)]
pub struct RpcCredentials {
    /// JSON-RPC endpoint URL.
    pub url: String,
    /// Database name.
    pub database: String,
    /// Login.
    pub user: String,
    /// Password.
    pub password: String,
}

impl fmt::Debug for RpcCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcCredentials")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A [`RemoteClient`] speaking JSON-RPC to an ERP server.
pub struct RpcClient<H: HttpClient> {
    credentials: RpcCredentials,
    http: H,
    uid: Mutex<Option<i64>>,
    next_request: AtomicU64,
}

impl<H: HttpClient> RpcClient<H> {
    /// Creates a client. No request is sent until the first call.
    pub fn new(credentials: RpcCredentials, http: H) -> Self {
        Self {
            credentials,
            http,
            uid: Mutex::new(None),
            next_request: AtomicU64::new(1),
        }
    }

    /// Returns the connection parameters.
    pub fn credentials(&self) -> &RpcCredentials {
        &self.credentials
    }

    /// Returns true if the HTTP layer reports itself healthy.
    pub fn is_healthy(&self) -> bool {
        self.http.is_healthy()
    }

    /// Logs in if needed and returns the user id.
    pub fn login(&self) -> Result<i64, RemoteCause> {
        let mut uid = self.uid.lock();
        if let Some(uid) = *uid {
            return Ok(uid);
        }
        let c = &self.credentials;
        let args = vec![json!(c.database), json!(c.user), json!(c.password)];
        let result = self.call("common", "login", args)?;
        match result.as_i64() {
            Some(id) if id > 0 => {
                debug!(uid = id, database = %c.database, "logged in");
                *uid = Some(id);
                Ok(id)
            }
            _ => Err(RemoteCause::Authentication(format!(
                "login refused for user '{}'",
                c.user
            ))),
        }
    }

    fn call(&self, service: &str, method: &str, args: Vec<Json>) -> Result<Json, RemoteCause> {
        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "id": id,
            "params": {"service": service, "method": method, "args": args},
        });
        let body = serde_json::to_vec(&request)
            .map_err(|e| {
                RemoteCause::UnexpectedResponse(format!("failed to encode request: {e}"))
            })?;

        let response = self
            .http
            .post(&self.credentials.url, body)
            .map_err(RemoteCause::Transport)?;

        let mut response: Json = serde_json::from_slice(&response)
            .map_err(|e| RemoteCause::UnexpectedResponse(format!("invalid JSON: {e}")))?;

        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            return Err(RemoteCause::Fault(fault_message(error)));
        }
        response
            .get_mut("result")
            .map(Json::take)
            .ok_or_else(|| RemoteCause::UnexpectedResponse("response has no result".into()))
    }

    fn execute(
        &self,
        model: &str,
        id: Option<RemoteId>,
        method: &str,
        args: Vec<Json>,
        kwargs: Option<Map<String, Json>>,
    ) -> RemoteResult<Json> {
        let wrap = |cause| RemoteError::new(model, id, cause);
        let uid = self.login().map_err(wrap)?;
        let c = &self.credentials;
        let mut params = vec![
            json!(c.database),
            json!(uid),
            json!(c.password),
            json!(model),
            json!(method),
            Json::Array(args),
        ];
        if let Some(kwargs) = kwargs {
            params.push(Json::Object(kwargs));
        }
        self.call("object", "execute_kw", params).map_err(wrap)
    }
}

fn fault_message(error: &Json) -> String {
    error
        .pointer("/data/message")
        .or_else(|| error.get("message"))
        .and_then(Json::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

fn to_json(model: &str, id: Option<RemoteId>, payload: &Payload) -> RemoteResult<Json> {
    serde_json::to_value(payload)
        .map_err(|e| RemoteError::unexpected(model, id, format!("payload not encodable: {e}")))
}

fn remote_id(model: &str, id: Option<RemoteId>, value: &Json) -> RemoteResult<RemoteId> {
    value
        .as_i64()
        .ok_or_else(|| RemoteError::unexpected(model, id, format!("expected an id, got {value}")))
}

/// Prepares the credit lines proposed by `onchange_partner_id` for posting.
///
/// Read-only fields are stripped. The first line whose unreconciled amount
/// equals the payment receives it; without a match the first (oldest)
/// line does. With no proposed line at all a single line on `account_id`
/// is made up.
pub fn prepare_credit_lines(lines: Vec<Json>, account_id: RemoteId, amount: f64) -> Vec<Json> {
    if lines.is_empty() {
        warn!("no open credit lines proposed for partner");
        return vec![json!({"type": "cr", "account_id": account_id, "amount": amount})];
    }

    let mut lines = lines;
    let mut matched = None;
    for (i, line) in lines.iter_mut().enumerate() {
        if let Some(fields) = line.as_object_mut() {
            for field in READ_ONLY_LINE_FIELDS {
                fields.remove(field);
            }
        }
        let unreconciled = line.get("amount_unreconciled").and_then(Json::as_f64);
        if matched.is_none() && unreconciled.is_some_and(|u| (u - amount).abs() < 0.005) {
            matched = Some(i);
        }
    }

    let target = matched.unwrap_or(0);
    if let Some(fields) = lines[target].as_object_mut() {
        fields.insert("amount".into(), json!(amount));
    }
    lines
}

impl<H: HttpClient> RemoteClient for RpcClient<H> {
    fn exists(&self, model: &str, id: RemoteId) -> RemoteResult<bool> {
        let count = self.execute(
            model,
            Some(id),
            "search_count",
            vec![json!([["id", "=", id]])],
            None,
        )?;
        Ok(count.as_u64().unwrap_or(0) > 0)
    }

    fn create(&self, model: &str, payload: &Payload) -> RemoteResult<RemoteId> {
        info!(model, "creating remote object");
        debug!(model, ?payload, "create payload");
        let values = to_json(model, None, payload)?;
        let result = self.execute(model, None, "create", vec![values], None)?;
        remote_id(model, None, &result)
    }

    fn update(&self, model: &str, id: RemoteId, payload: &Payload) -> RemoteResult<()> {
        info!(model, id, "updating remote object");
        debug!(model, id, ?payload, "update payload");
        let values = to_json(model, Some(id), payload)?;
        self.execute(model, Some(id), "write", vec![json!([id]), values], None)?;
        Ok(())
    }

    fn delete(&self, model: &str, id: RemoteId) -> RemoteResult<()> {
        info!(model, id, "deleting remote object");
        self.execute(model, Some(id), "unlink", vec![json!([id])], None)?;
        Ok(())
    }

    fn read(&self, model: &str, id: RemoteId, fields: &[&str]) -> RemoteResult<Payload> {
        let result = self.execute(model, Some(id), "read", vec![json!([id]), json!(fields)], None)?;
        let mut rows: Vec<Payload> = serde_json::from_value(result)
            .map_err(|e| {
                RemoteError::unexpected(model, Some(id), format!("unreadable rows: {e}"))
            })?;
        if rows.is_empty() {
            return Err(RemoteError::not_found(model, id));
        }
        Ok(rows.swap_remove(0))
    }

    fn confirm_order(&self, model: &str, id: RemoteId) -> RemoteResult<()> {
        info!(model, id, "confirming order");
        self.execute(model, Some(id), "action_button_confirm", vec![json!([id])], None)?;
        Ok(())
    }

    fn validate_invoice(&self, invoice_id: RemoteId) -> RemoteResult<()> {
        info!(invoice_id, "validating invoice");
        self.execute(
            INVOICE_CONFIRM_MODEL,
            Some(invoice_id),
            "invoice_confirm",
            vec![json!([]), json!({"active_ids": [invoice_id]})],
            None,
        )?;
        Ok(())
    }

    fn add_payment(&self, voucher_model: &str, voucher: &PaymentVoucher) -> RemoteResult<RemoteId> {
        info!(
            partner_id = voucher.partner_id,
            amount = voucher.amount,
            "adding payment"
        );

        let mut kwargs = Map::new();
        kwargs.insert("ttype".into(), json!("receipt"));
        kwargs.insert("date".into(), json!(false));
        let proposal = self.execute(
            voucher_model,
            None,
            "onchange_partner_id",
            vec![
                json!([]),
                json!(voucher.partner_id),
                json!(voucher.journal_id),
                json!(0.0),
                json!(voucher.currency_id),
            ],
            Some(kwargs),
        )?;

        let proposed = match proposal.pointer("/value/line_cr_ids") {
            Some(Json::Array(lines)) => lines.clone(),
            Some(Json::Bool(false)) | Some(Json::Null) | None => Vec::new(),
            Some(other) => {
                return Err(RemoteError::unexpected(
                    voucher_model,
                    None,
                    format!("line_cr_ids is not a list: {other}"),
                ))
            }
        };
        let lines: Vec<Json> = prepare_credit_lines(proposed, voucher.account_id, voucher.amount)
            .into_iter()
            .map(|line| json!([0, 0, line]))
            .collect();

        let values = json!({
            "account_id": voucher.account_id,
            "amount": voucher.amount,
            "company_id": voucher.company_id,
            "journal_id": voucher.journal_id,
            "partner_id": voucher.partner_id,
            "period_id": voucher.period_id,
            "type": "receipt",
            "line_cr_ids": lines,
        });
        let created = self.execute(voucher_model, None, "create", vec![values], None)?;
        let id = remote_id(voucher_model, None, &created)?;

        info!(voucher_model, id, "posting payment voucher");
        self.execute(voucher_model, Some(id), "button_proforma_voucher", vec![json!([id])], None)?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erpsync_codec::Value;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Replays canned responses and records requests.
    #[derive(Default)]
    struct ScriptedHttp {
        responses: Mutex<VecDeque<Result<Json, String>>>,
        requests: Arc<Mutex<Vec<Json>>>,
    }

    impl ScriptedHttp {
        fn reply(self, result: Json) -> Self {
            self.responses
                .lock()
                .push_back(Ok(json!({"jsonrpc": "2.0", "id": 1, "result": result})));
            self
        }

        fn fault(self, message: &str) -> Self {
            self.responses.lock().push_back(Ok(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {
                    "code": 200,
                    "message": "Odoo Server Error",
                    "data": {"message": message},
                },
            })));
            self
        }

        fn fail(self, message: &str) -> Self {
            self.responses.lock().push_back(Err(message.to_string()));
            self
        }
    }

    impl HttpClient for ScriptedHttp {
        fn post(&self, _url: &str, body: Vec<u8>) -> Result<Vec<u8>, String> {
            self.requests.lock().push(serde_json::from_slice(&body).unwrap());
            let next = self.responses.lock().pop_front().expect("unexpected request");
            next.map(|json| serde_json::to_vec(&json).unwrap())
        }

        fn is_healthy(&self) -> bool {
            true
        }
    }

    fn client(http: ScriptedHttp) -> (RpcClient<ScriptedHttp>, Arc<Mutex<Vec<Json>>>) {
        let requests = Arc::clone(&http.requests);
        let credentials = RpcCredentials {
            url: "http://localhost:8069/jsonrpc".into(),
            database: "shop".into(),
            user: "admin".into(),
            password: "secret".into(),
        };
        (RpcClient::new(credentials, http), requests)
    }

    fn args(request: &Json) -> &Vec<Json> {
        request["params"]["args"].as_array().unwrap()
    }

    #[test]
    fn login_once_then_execute_kw() {
        let (client, requests) = client(
            ScriptedHttp::default()
                .reply(json!(2))
                .reply(json!(41))
                .reply(json!(true)),
        );
        let mut payload = Payload::new();
        payload.insert("name".into(), Value::from("Tools"));

        assert_eq!(client.create("product.category", &payload).unwrap(), 41);
        client.update("product.category", 41, &payload).unwrap();

        let requests = requests.lock();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0]["params"]["service"], "common");
        assert_eq!(args(&requests[0])[0], "shop");

        let create = args(&requests[1]);
        assert_eq!(requests[1]["params"]["method"], "execute_kw");
        assert_eq!(create[1], 2);
        assert_eq!(create[3], "product.category");
        assert_eq!(create[4], "create");
        assert_eq!(create[5], json!([{"name": "Tools"}]));

        let write = args(&requests[2]);
        assert_eq!(write[4], "write");
        assert_eq!(write[5], json!([[41], {"name": "Tools"}]));
    }

    #[test]
    fn refused_login_is_an_authentication_error() {
        let (client, _) = client(ScriptedHttp::default().reply(json!(false)));
        let err = client.exists("res.partner", 3).unwrap_err();
        assert!(matches!(err.cause, RemoteCause::Authentication(_)));
        assert_eq!(err.model, "res.partner");
    }

    #[test]
    fn server_fault_carries_message() {
        let (client, _) = client(
            ScriptedHttp::default()
                .reply(json!(2))
                .fault("Record does not exist"),
        );
        let err = client.delete("res.partner", 3).unwrap_err();
        assert_eq!(err.cause, RemoteCause::Fault("Record does not exist".into()));
        assert_eq!(err.id, Some(3));
    }

    #[test]
    fn transport_failure_is_retryable() {
        let (client, _) = client(ScriptedHttp::default().fail("connection refused"));
        let err = client.exists("res.partner", 3).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn exists_uses_search_count() {
        let (client, requests) = client(ScriptedHttp::default().reply(json!(2)).reply(json!(0)));
        assert!(!client.exists("res.partner", 3).unwrap());
        let requests = requests.lock();
        assert_eq!(args(&requests[1])[4], "search_count");
        assert_eq!(args(&requests[1])[5], json!([[["id", "=", 3]]]));
    }

    #[test]
    fn link_sets_are_sent_as_commands() {
        let (client, requests) = client(ScriptedHttp::default().reply(json!(2)).reply(json!(true)));
        let mut payload = Payload::new();
        payload.insert(
            "categ_ids".into(),
            Value::List(vec![Value::Int(4), Value::Int(5)]).normalize(),
        );
        client.update("product.template", 9, &payload).unwrap();
        let requests = requests.lock();
        assert_eq!(args(&requests[1])[5][1], json!({"categ_ids": [[6, 0, [4, 5]]]}));
    }

    #[test]
    fn read_returns_first_row() {
        let (client, _) = client(
            ScriptedHttp::default()
                .reply(json!(2))
                .reply(json!([{"id": 7, "invoice_ids": [30, 31], "state": "manual"}])),
        );
        let row = client.read("sale.order", 7, &["invoice_ids", "state"]).unwrap();
        assert_eq!(row["state"], Value::from("manual"));
        assert_eq!(
            row["invoice_ids"],
            Value::List(vec![Value::Int(30), Value::Int(31)])
        );
    }

    #[test]
    fn read_of_missing_row_is_not_found() {
        let (client, _) = client(ScriptedHttp::default().reply(json!(2)).reply(json!([])));
        let err = client.read("sale.order", 7, &["state"]).unwrap_err();
        assert_eq!(err.cause, RemoteCause::NotFound);
    }

    #[test]
    fn credit_lines_match_amount_or_take_oldest() {
        let lines = vec![
            json!({
                "move_line_id": 1,
                "amount_unreconciled": 10.0,
                "date_original": "x",
                "date_due": "y",
                "amount": 0.0,
            }),
            json!({
                "move_line_id": 2,
                "amount_unreconciled": 25.5,
                "date_original": "x",
                "date_due": "y",
                "amount": 0.0,
            }),
        ];
        let prepared = prepare_credit_lines(lines.clone(), 100, 25.5);
        assert_eq!(prepared[1]["amount"], json!(25.5));
        assert_eq!(prepared[0]["amount"], json!(0.0));
        assert!(prepared
            .iter()
            .all(|l| l.get("date_due").is_none() && l.get("date_original").is_none()));

        let prepared = prepare_credit_lines(lines, 100, 99.0);
        assert_eq!(prepared[0]["amount"], json!(99.0));

        let prepared = prepare_credit_lines(Vec::new(), 100, 12.0);
        assert_eq!(prepared, vec![json!({"type": "cr", "account_id": 100, "amount": 12.0})]);
    }

    #[test]
    fn add_payment_creates_and_posts_voucher() {
        let (client, requests) = client(
            ScriptedHttp::default()
                .reply(json!(2))
                .reply(json!({"value": {"line_cr_ids": [{
                    "amount_unreconciled": 50.0,
                    "date_due": "2024-01-01",
                    "date_original": "2024-01-01",
                }]}}))
                .reply(json!(88))
                .reply(json!(true)),
        );
        let voucher = PaymentVoucher {
            partner_id: 5,
            account_id: 100,
            journal_id: 7,
            period_id: 3,
            amount: 50.0,
            company_id: 1,
            currency_id: 1,
        };
        assert_eq!(client.add_payment("account.voucher", &voucher).unwrap(), 88);

        let requests = requests.lock();
        assert_eq!(args(&requests[1])[4], "onchange_partner_id");
        assert_eq!(args(&requests[1])[6], json!({"ttype": "receipt", "date": false}));
        let values = &args(&requests[2])[5][0];
        assert_eq!(values["type"], "receipt");
        assert_eq!(values["period_id"], 3);
        assert_eq!(
            values["line_cr_ids"],
            json!([[0, 0, {"amount_unreconciled": 50.0, "amount": 50.0}]])
        );
        assert_eq!(args(&requests[3])[4], "button_proforma_voucher");
        assert_eq!(args(&requests[3])[5], json!([[88]]));
    }

    #[test]
    fn validate_invoice_uses_wizard_model() {
        let (client, requests) = client(ScriptedHttp::default().reply(json!(2)).reply(json!({})));
        client.validate_invoice(30).unwrap();
        let requests = requests.lock();
        assert_eq!(args(&requests[1])[3], INVOICE_CONFIRM_MODEL);
        assert_eq!(args(&requests[1])[5], json!([[], {"active_ids": [30]}]));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let (client, _) = client(ScriptedHttp::default());
        let debug = format!("{:?}", client.credentials());
        assert!(!debug.contains("secret"));
    }
}
