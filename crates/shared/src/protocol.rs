//! Wire structures for the JSON-RPC boundary with the node and wallet.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: Value,
    pub id: u64,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
            id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// `eth_subscription` push frame.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionNotification {
    pub method: String,
    pub params: SubscriptionParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionParams {
    pub subscription: String,
    pub result: Value,
}

/// Write call handed to the wallet for signing and broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCall {
    pub from: Address,
    pub to: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default, with = "quantity_opt")]
    pub block_number: Option<u64>,
    #[serde(default, with = "quantity_opt")]
    pub status: Option<u64>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status != Some(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default, with = "quantity_opt", skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    #[serde(default)]
    pub removed: bool,
}

/// `eth_subscribe("logs", ..)` filter.
#[derive(Debug, Clone, Serialize)]
pub struct LogFilter {
    pub address: Address,
    pub topics: Vec<B256>,
}

/// Parses a 0x-prefixed hex quantity.
pub fn parse_quantity(raw: &str) -> Option<u64> {
    let digits = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))?;
    u64::from_str_radix(digits, 16).ok()
}

/// Serde adapter for optional hex quantities (`"0x3e8"` ⇄ `1000`).
pub mod quantity_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_str(&format!("{value:#x}")),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => super::parse_quantity(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid hex quantity {raw:?}"))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(parse_quantity("0x3e8"), Some(1000));
        assert_eq!(parse_quantity("0x0"), Some(0));
        assert_eq!(parse_quantity("0X1A"), Some(26));
        assert_eq!(parse_quantity("3e8"), None);
        assert_eq!(parse_quantity("0x"), None);
        assert_eq!(parse_quantity("0xzz"), None);
    }

    #[test]
    fn deserializes_receipt_with_hex_fields() {
        let raw = r#"{
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "blockNumber": "0x3e8",
            "status": "0x1",
            "logs": []
        }"#;
        let receipt: TransactionReceipt = serde_json::from_str(raw).expect("receipt");
        assert_eq!(receipt.block_number, Some(1000));
        assert!(receipt.succeeded());
    }

    #[test]
    fn deserializes_reverted_receipt() {
        let raw = r#"{
            "transactionHash": "0x2222222222222222222222222222222222222222222222222222222222222222",
            "status": "0x0"
        }"#;
        let receipt: TransactionReceipt = serde_json::from_str(raw).expect("receipt");
        assert!(!receipt.succeeded());
        assert_eq!(receipt.block_number, None);
    }

    #[test]
    fn transaction_call_serializes_camel_case_hex() {
        let call = TransactionCall {
            from: Address::repeat_byte(0x11),
            to: Address::repeat_byte(0x22),
            value: None,
            data: Bytes::from(vec![0xab, 0xcd]),
        };
        let json = serde_json::to_value(&call).expect("serialize");
        assert_eq!(
            json["from"].as_str().expect("from"),
            "0x1111111111111111111111111111111111111111"
        );
        assert_eq!(json["data"].as_str().expect("data"), "0xabcd");
        assert!(json.get("value").is_none());
    }
}
