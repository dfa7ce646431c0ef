//! Minimal JSON-RPC client for the handful of `eth_*` methods this client
//! needs.

use std::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::{Address, B256};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;

use shared::{
    domain::{ChainId, TxHash},
    protocol::{parse_quantity, RpcRequest, RpcResponse, TransactionCall, TransactionReceipt},
};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http transport failure: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("websocket transport failure: {0}")]
    Ws(String),
    #[error("malformed rpc payload: {0}")]
    Decode(String),
}

pub struct JsonRpcClient {
    http: reqwest::Client,
    url: Url,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(method, params, id);
        let response: RpcResponse = self
            .http
            .post(self.url.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if let Some(error) = response.error {
            return Err(TransportError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        serde_json::from_value(response.result)
            .map_err(|err| TransportError::Decode(format!("{method}: {err}")))
    }

    pub async fn chain_id(&self) -> Result<ChainId, TransportError> {
        let raw: String = self.call("eth_chainId", json!([])).await?;
        parse_quantity(&raw)
            .map(ChainId)
            .ok_or_else(|| TransportError::Decode(format!("eth_chainId: bad quantity {raw:?}")))
    }

    pub async fn block_number(&self) -> Result<u64, TransportError> {
        let raw: String = self.call("eth_blockNumber", json!([])).await?;
        parse_quantity(&raw)
            .ok_or_else(|| TransportError::Decode(format!("eth_blockNumber: bad quantity {raw:?}")))
    }

    /// Accounts the node manages itself; empty on public endpoints.
    pub async fn accounts(&self) -> Result<Vec<Address>, TransportError> {
        self.call("eth_accounts", json!([])).await
    }

    pub async fn send_transaction(
        &self,
        call: &TransactionCall,
    ) -> Result<TxHash, TransportError> {
        let hash: B256 = self.call("eth_sendTransaction", json!([call])).await?;
        Ok(TxHash(hash))
    }

    /// `None` until the transaction has been mined.
    pub async fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, TransportError> {
        self.call("eth_getTransactionReceipt", json!([hash.0])).await
    }
}

#[cfg(test)]
#[path = "tests/rpc_tests.rs"]
mod tests;
