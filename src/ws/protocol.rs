//! JSON-RPC 2.0 request/notification envelopes for Solana's
//! `accountSubscribe`/`logsSubscribe` family, per §6's wire-level
//! encoding.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    AccountUpdates,
    ProgramLogs,
}

impl SubscriptionKind {
    pub fn method(&self) -> &'static str {
        match self {
            SubscriptionKind::AccountUpdates => "accountSubscribe",
            SubscriptionKind::ProgramLogs => "logsSubscribe",
        }
    }

    pub fn unsubscribe_method(&self) -> &'static str {
        match self {
            SubscriptionKind::AccountUpdates => "accountUnsubscribe",
            SubscriptionKind::ProgramLogs => "logsUnsubscribe",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubscribeRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: serde_json::Value,
}

impl SubscribeRequest {
    pub fn account_updates(id: u64, address: &str) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: SubscriptionKind::AccountUpdates.method(),
            params: serde_json::json!([
                address,
                { "encoding": "base64", "commitment": "processed" }
            ]),
        }
    }

    pub fn program_logs(id: u64, program_id: &str) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: SubscriptionKind::ProgramLogs.method(),
            params: serde_json::json!([
                { "mentions": [program_id] },
                { "commitment": "processed" }
            ]),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UnsubscribeRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: [u64; 1],
}

impl UnsubscribeRequest {
    pub fn new(id: u64, kind: SubscriptionKind, remote_subscription_id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: kind.unsubscribe_method(),
            params: [remote_subscription_id],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: Option<u64>,
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AccountNotificationEnvelope {
    pub params: SubscriptionParams<AccountNotificationValue>,
}

#[derive(Debug, Deserialize)]
pub struct LogsNotificationEnvelope {
    pub params: SubscriptionParams<LogsNotificationValue>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionParams<T> {
    pub subscription: u64,
    pub result: NotificationResult<T>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationResult<T> {
    pub context: NotificationContext,
    pub value: T,
}

#[derive(Debug, Deserialize)]
pub struct NotificationContext {
    pub slot: u64,
}

#[derive(Debug, Deserialize)]
pub struct AccountNotificationValue {
    pub data: Vec<String>,
    #[allow(dead_code)]
    pub owner: String,
    #[allow(dead_code)]
    pub lamports: u64,
}

#[derive(Debug, Deserialize)]
pub struct LogsNotificationValue {
    pub signature: String,
    pub err: Option<serde_json::Value>,
    pub logs: Vec<String>,
}
