use std::fmt;

use alloy_primitives::{Address, Bytes, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shown in place of a response payload that is not valid UTF-8.
pub const INVALID_RESPONSE_TEXT: &str = "Invalid response format received";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl ChainId {
    /// Wallet-facing hex form, e.g. `0xa869`.
    pub fn as_hex(&self) -> String {
        format!("{:#x}", self.0)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub B256);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_slice()))
    }
}

/// Opaque 32-byte identifier the contract attaches to every response event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub B256);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_slice()))
    }
}

/// Full lower-case hex form of an account address.
pub fn lower_hex_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

/// Abbreviated form for display, `0x1234...abcd`.
pub fn short_address(address: &Address) -> String {
    let full = lower_hex_address(address);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// An authenticated, network-scoped wallet identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletSession {
    pub address: Address,
    pub chain_id: ChainId,
    pub connected: bool,
}

impl WalletSession {
    pub fn is_on(&self, chain_id: ChainId) -> bool {
        self.connected && self.chain_id == chain_id
    }

    pub fn display_address(&self) -> String {
        lower_hex_address(&self.address)
    }
}

/// One user-initiated question. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    pub args: Vec<String>,
    pub submitted_at: DateTime<Utc>,
}

impl QuestionRequest {
    pub fn new(question: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            question: question.into(),
            args,
            submitted_at: Utc::now(),
        }
    }

    pub fn has_question_text(&self) -> bool {
        !self.question.trim().is_empty()
    }
}

/// The on-chain transaction backing a question, from wallet approval until
/// it is confirmed or abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub hash: TxHash,
    pub confirmations: u64,
    pub block_number: Option<u64>,
}

impl PendingTransaction {
    pub fn new(hash: TxHash) -> Self {
        Self {
            hash,
            confirmations: 0,
            block_number: None,
        }
    }

    pub fn confirmed(hash: TxHash, block_number: Option<u64>) -> Self {
        Self {
            hash,
            confirmations: 1,
            block_number,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmations > 0
    }
}

/// A decoded `ResponseReceived` contract event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEvent {
    pub request_id: RequestId,
    pub payload: Bytes,
    pub block_number: Option<u64>,
    pub tx_hash: Option<TxHash>,
}

/// The analysis answer derived from a response event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResponse {
    pub request_id: RequestId,
    pub raw: Bytes,
    pub text: String,
    pub decode_failed: bool,
}

impl AnalysisResponse {
    /// Strict UTF-8 decode; an unintelligible payload yields the sentinel
    /// text instead of an error, the transaction itself already succeeded.
    pub fn from_event(event: &ResponseEvent) -> Self {
        let (text, decode_failed) = match std::str::from_utf8(&event.payload) {
            Ok(text) => (text.to_string(), false),
            Err(_) => (INVALID_RESPONSE_TEXT.to_string(), true),
        };
        Self {
            request_id: event.request_id,
            raw: event.payload.clone(),
            text,
            decode_failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_address_keeps_prefix_and_suffix() {
        let address = Address::repeat_byte(0xab);
        assert_eq!(short_address(&address), "0xabab...abab");
    }

    #[test]
    fn chain_ids_render_for_wallets_as_hex() {
        assert_eq!(ChainId(43113).as_hex(), "0xa869");
    }

    #[test]
    fn a_session_is_only_valid_on_its_own_chain() {
        let session = WalletSession {
            address: Address::repeat_byte(1),
            chain_id: ChainId(43113),
            connected: true,
        };
        assert!(session.is_on(ChainId(43113)));
        assert!(!session.is_on(ChainId(1)));
        let disconnected = WalletSession {
            connected: false,
            ..session
        };
        assert!(!disconnected.is_on(ChainId(43113)));
    }

    #[test]
    fn non_utf8_payload_falls_back_to_sentinel() {
        let event = ResponseEvent {
            request_id: RequestId(B256::repeat_byte(1)),
            payload: Bytes::from(vec![0xff, 0xfe, 0xfd]),
            block_number: None,
            tx_hash: None,
        };
        let response = AnalysisResponse::from_event(&event);
        assert!(response.decode_failed);
        assert_eq!(response.text, INVALID_RESPONSE_TEXT);
    }

    #[test]
    fn utf8_payload_decodes_verbatim() {
        let event = ResponseEvent {
            request_id: RequestId(B256::ZERO),
            payload: Bytes::from(Vec::from("Yes, 62% probability".as_bytes())),
            block_number: Some(1000),
            tx_hash: None,
        };
        let response = AnalysisResponse::from_event(&event);
        assert!(!response.decode_failed);
        assert_eq!(response.text, "Yes, 62% probability");
    }
}
