//! WebSocket subscription to the orchestrator contract's response logs.

use alloy_primitives::Address;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

use shared::{
    domain::ResponseEvent,
    protocol::{LogEntry, LogFilter, RpcRequest, SubscriptionNotification},
};

use crate::{abi, rpc::TransportError};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A live `eth_subscribe("logs")` feed of decoded `ResponseReceived`
/// events for one contract. Dropping the feed (or calling [`shutdown`])
/// tears the stream down; both are idempotent.
///
/// [`shutdown`]: ResponseLogFeed::shutdown
pub struct ResponseLogFeed {
    events: broadcast::Sender<ResponseEvent>,
    reader_task: JoinHandle<()>,
}

impl ResponseLogFeed {
    pub async fn connect(ws_url: Url, contract: Address) -> Result<Self, TransportError> {
        let (ws_stream, _) = connect_async(ws_url.as_str())
            .await
            .map_err(|err| TransportError::Ws(format!("connect {ws_url}: {err}")))?;
        let (mut writer, mut reader) = ws_stream.split();

        let filter = LogFilter {
            address: contract,
            topics: vec![*abi::RESPONSE_RECEIVED_TOPIC],
        };
        let subscribe = RpcRequest::new("eth_subscribe", json!(["logs", filter]), 1);
        let frame = serde_json::to_string(&subscribe)
            .map_err(|err| TransportError::Decode(format!("eth_subscribe request: {err}")))?;
        writer
            .send(Message::Text(frame))
            .await
            .map_err(|err| TransportError::Ws(format!("eth_subscribe send: {err}")))?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let sender = events.clone();
        let reader_task = tokio::spawn(async move {
            // keep the write half alive for the lifetime of the subscription
            let _writer = writer;
            while let Some(message) = reader.next().await {
                match message {
                    Ok(Message::Text(text)) => handle_frame(&sender, &text, contract),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %err, "response log stream failed");
                        break;
                    }
                }
            }
            debug!("response log stream ended");
        });

        Ok(Self { events, reader_task })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResponseEvent> {
        self.events.subscribe()
    }

    pub fn shutdown(&self) {
        self.reader_task.abort();
    }
}

impl Drop for ResponseLogFeed {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

fn handle_frame(sender: &broadcast::Sender<ResponseEvent>, text: &str, contract: Address) {
    let notification = match serde_json::from_str::<SubscriptionNotification>(text) {
        Ok(notification) if notification.method == "eth_subscription" => notification,
        // the subscription-id ack and anything else the node pushes
        _ => {
            debug!("ignoring non-subscription frame");
            return;
        }
    };
    let log = match serde_json::from_value::<LogEntry>(notification.params.result) {
        Ok(log) => log,
        Err(err) => {
            warn!(error = %err, "undecodable log notification");
            return;
        }
    };
    if log.address != contract {
        return;
    }
    if let Some(event) = abi::decode_response_log(&log) {
        debug!(request_id = %event.request_id, "response event received");
        let _ = sender.send(event);
    }
}

#[cfg(test)]
#[path = "tests/logs_tests.rs"]
mod tests;
