//! One logical WebSocket connection to an RPC provider: owns its read
//! and write loop tasks, its subscription map, and its reconnect state.
//! Parsers never see a raw socket — only the `RawEvent`s this module
//! emits.

use super::protocol::{
    AccountNotificationEnvelope, LogsNotificationEnvelope, SubscribeRequest, SubscriptionKind as WireKind,
};
use super::raw_event::RawEvent;
use crate::config::WsConfig;
use crate::model::{EndpointState, PoolAddress, SubscriptionKind};
use base64::prelude::*;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("connect error: {0}")]
    Connect(#[from] Box<tokio_tungstenite::tungstenite::Error>),
    #[error("connect timed out")]
    ConnectTimeout,
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which shape an inbound text frame turned out to be, classified
/// without touching I/O so the logic is independently testable.
#[derive(Debug, PartialEq)]
pub enum ClassifiedMessage {
    AccountUpdate { subscription: u64, slot: u64, data: Vec<u8> },
    ProgramLog { subscription: u64, slot: u64, signature: String, logs: Vec<String> },
    SubscribeAck { request_id: u64, remote_subscription_id: u64 },
    Other,
}

/// Pure classification of one inbound text frame. Never panics on
/// malformed input — unknown shapes fall through to `Other`.
pub fn classify_message(text: &str) -> ClassifiedMessage {
    if let Ok(envelope) = serde_json::from_str::<AccountNotificationEnvelope>(text) {
        let raw = envelope
            .params
            .result
            .value
            .data
            .first()
            .map(|s| s.as_str())
            .unwrap_or("");
        if let Ok(data) = BASE64_STANDARD.decode(raw) {
            return ClassifiedMessage::AccountUpdate {
                subscription: envelope.params.subscription,
                slot: envelope.params.result.context.slot,
                data,
            };
        }
        return ClassifiedMessage::Other;
    }

    if let Ok(envelope) = serde_json::from_str::<LogsNotificationEnvelope>(text) {
        return ClassifiedMessage::ProgramLog {
            subscription: envelope.params.subscription,
            slot: envelope.params.result.context.slot,
            signature: envelope.params.result.value.signature.clone(),
            logs: envelope.params.result.value.logs.clone(),
        };
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        if let (Some(id), Some(result)) = (value.get("id"), value.get("result")) {
            if let (Some(id), Some(remote_id)) = (id.as_u64(), result.as_u64()) {
                return ClassifiedMessage::SubscribeAck {
                    request_id: id,
                    remote_subscription_id: remote_id,
                };
            }
        }
    }

    ClassifiedMessage::Other
}

struct LocalSubscription {
    pool: PoolAddress,
    kind: SubscriptionKind,
}

/// One endpoint's full lifecycle: subscribe, read loop, heartbeat,
/// translate wire messages into `RawEvent`s on `out`.
pub struct EndpointConnection {
    pub url: Url,
    pub state: EndpointState,
    remote_to_local: HashMap<u64, LocalSubscription>,
    pending_by_request_id: HashMap<u64, LocalSubscription>,
    last_pong_wall: Option<Instant>,
    pub consecutive_failures: u32,
    next_request_id: u64,
}

impl EndpointConnection {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            state: EndpointState::Closed,
            remote_to_local: HashMap::new(),
            pending_by_request_id: HashMap::new(),
            last_pong_wall: None,
            consecutive_failures: 0,
            next_request_id: 1,
        }
    }

    fn allocate_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    pub fn queue_subscription(&mut self, pool: PoolAddress, kind: SubscriptionKind) -> u64 {
        let id = self.allocate_request_id();
        self.pending_by_request_id.insert(id, LocalSubscription { pool, kind });
        id
    }

    fn to_wire_kind(kind: SubscriptionKind) -> WireKind {
        match kind {
            SubscriptionKind::AccountUpdates => WireKind::AccountUpdates,
            SubscriptionKind::ProgramLogs => WireKind::ProgramLogs,
        }
    }

    /// Connect, subscribe to everything queued, and drive the read loop
    /// until the socket closes or `cancel` fires. Connect errors are
    /// returned to the caller (the Multiplexer), which decides whether
    /// to retry this endpoint or fail over — this method never retries
    /// internally.
    pub async fn run(
        &mut self,
        ws_config: &WsConfig,
        address_for: impl Fn(PoolAddress, SubscriptionKind) -> String,
        out: mpsc::Sender<RawEvent>,
        mut cancel: tokio::sync::watch::Receiver<bool>,
    ) -> Result<(), EndpointError> {
        self.state = EndpointState::Connecting;

        let (ws_stream, _) = timeout(ws_config.ping_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| EndpointError::ConnectTimeout)?
            .map_err(|e| EndpointError::Connect(Box::new(e)))?;

        self.state = EndpointState::Open;
        self.last_pong_wall = Some(Instant::now());
        let (mut write, mut read) = ws_stream.split();

        for (request_id, local) in self.pending_by_request_id.iter() {
            let address = address_for(local.pool, local.kind);
            let wire_kind = Self::to_wire_kind(local.kind);
            let request = match wire_kind {
                WireKind::AccountUpdates => SubscribeRequest::account_updates(*request_id, &address),
                WireKind::ProgramLogs => SubscribeRequest::program_logs(*request_id, &address),
            };
            let text = serde_json::to_string(&request)?;
            write
                .send(Message::Text(text))
                .await
                .map_err(|e| EndpointError::Connect(Box::new(e)))?;
        }

        let mut ping_interval = tokio::time::interval(ws_config.ping_interval);

        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if write.send(Message::Ping(Vec::new())).await.is_err() {
                        self.state = EndpointState::Degraded;
                        break;
                    }
                    if let Some(last) = self.last_pong_wall {
                        if last.elapsed() > ws_config.ping_timeout {
                            self.state = EndpointState::Degraded;
                            break;
                        }
                    }
                }
                message = read.next() => {
                    let Some(message) = message else { break; };
                    match message.map_err(|e| EndpointError::Connect(Box::new(e)))? {
                        Message::Text(text) => self.handle_text(&text, &out).await,
                        Message::Pong(_) => { self.last_pong_wall = Some(Instant::now()); }
                        Message::Ping(payload) => {
                            let _ = write.send(Message::Pong(payload)).await;
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
            }
        }

        self.state = EndpointState::Closed;
        Ok(())
    }

    async fn handle_text(&mut self, text: &str, out: &mpsc::Sender<RawEvent>) {
        match classify_message(text) {
            ClassifiedMessage::SubscribeAck { request_id, remote_subscription_id } => {
                if let Some(local) = self.pending_by_request_id.remove(&request_id) {
                    self.remote_to_local.insert(remote_subscription_id, local);
                }
                self.consecutive_failures = 0;
            }
            ClassifiedMessage::AccountUpdate { subscription, slot, data } => {
                if let Some(local) = self.remote_to_local.get(&subscription) {
                    let _ = out
                        .send(RawEvent::AccountUpdate { pool: local.pool, slot, data })
                        .await;
                }
            }
            ClassifiedMessage::ProgramLog { subscription, slot, signature, logs } => {
                if let Some(local) = self.remote_to_local.get(&subscription) {
                    let _ = out
                        .send(RawEvent::ProgramLogs { pool: local.pool, slot, signature, logs })
                        .await;
                }
            }
            ClassifiedMessage::Other => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_account_update() {
        let text = r#"{
            "jsonrpc": "2.0",
            "method": "accountNotification",
            "params": {
                "subscription": 5,
                "result": {
                    "context": { "slot": 1000 },
                    "value": { "data": ["AQIDBA==", "base64"], "owner": "p", "lamports": 1 }
                }
            }
        }"#;
        match classify_message(text) {
            ClassifiedMessage::AccountUpdate { subscription, slot, data } => {
                assert_eq!(subscription, 5);
                assert_eq!(slot, 1000);
                assert_eq!(data, vec![1, 2, 3, 4]);
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn classifies_subscribe_ack() {
        let text = r#"{"jsonrpc":"2.0","id":3,"result":42}"#;
        assert_eq!(
            classify_message(text),
            ClassifiedMessage::SubscribeAck { request_id: 3, remote_subscription_id: 42 }
        );
    }

    #[test]
    fn classifies_garbage_as_other() {
        assert_eq!(classify_message("not json at all"), ClassifiedMessage::Other);
    }

    #[test]
    fn queueing_subscriptions_allocates_distinct_ids() {
        let mut endpoint = EndpointConnection::new("wss://example.com".parse().unwrap());
        let id1 = endpoint.queue_subscription(PoolAddress([1; 32]), SubscriptionKind::AccountUpdates);
        let id2 = endpoint.queue_subscription(PoolAddress([2; 32]), SubscriptionKind::ProgramLogs);
        assert_ne!(id1, id2);
    }
}
