use super::*;

use std::time::Duration;

use alloy_primitives::{Bytes, B256, U256};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;

use shared::domain::RequestId;

fn encoded_bytes_data(payload: &[u8]) -> Bytes {
    let mut data = Vec::new();
    data.extend_from_slice(&U256::from(0x20u64).to_be_bytes::<32>());
    data.extend_from_slice(&U256::from(payload.len()).to_be_bytes::<32>());
    let mut padded = payload.to_vec();
    padded.resize(payload.len().div_ceil(32) * 32, 0);
    data.extend_from_slice(&padded);
    Bytes::from(data)
}

fn log_json(contract: Address, request_id: B256, payload: &[u8]) -> serde_json::Value {
    json!({
        "address": contract,
        "topics": [*abi::RESPONSE_RECEIVED_TOPIC, request_id],
        "data": encoded_bytes_data(payload),
        "blockNumber": "0x3e8",
        "transactionHash": B256::repeat_byte(0x99),
    })
}

#[tokio::test]
async fn delivers_decoded_response_events() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let contract = Address::repeat_byte(0x42);

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = accept_async(stream).await.expect("handshake");

        let subscribe = ws.next().await.expect("frame").expect("message");
        let subscribe: serde_json::Value =
            serde_json::from_str(subscribe.to_text().expect("text")).expect("json");
        assert_eq!(subscribe["method"], "eth_subscribe");
        assert_eq!(subscribe["params"][0], "logs");

        let ack = json!({ "jsonrpc": "2.0", "id": 1, "result": "0xsub1" });
        ws.send(Message::Text(ack.to_string())).await.expect("ack");

        // a log from an unrelated contract must be filtered out
        let unrelated = json!({
            "jsonrpc": "2.0",
            "method": "eth_subscription",
            "params": {
                "subscription": "0xsub1",
                "result": log_json(Address::repeat_byte(0x01), B256::repeat_byte(1), b"ignored"),
            }
        });
        ws.send(Message::Text(unrelated.to_string()))
            .await
            .expect("unrelated push");

        let wanted = json!({
            "jsonrpc": "2.0",
            "method": "eth_subscription",
            "params": {
                "subscription": "0xsub1",
                "result": log_json(contract, B256::repeat_byte(7), b"all clear"),
            }
        });
        ws.send(Message::Text(wanted.to_string()))
            .await
            .expect("push");

        // keep the connection open long enough for the client to read
        tokio::time::sleep(Duration::from_millis(250)).await;
    });

    let ws_url = Url::parse(&format!("ws://{addr}/")).expect("url");
    let feed = ResponseLogFeed::connect(ws_url, contract).await.expect("connect");
    let mut events = feed.subscribe();

    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timely")
        .expect("event");
    assert_eq!(event.request_id, RequestId(B256::repeat_byte(7)));
    assert_eq!(event.payload.as_ref(), b"all clear");
    assert_eq!(event.block_number, Some(1000));

    feed.shutdown();
    feed.shutdown();
}
