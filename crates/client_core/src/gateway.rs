use std::{sync::Arc, time::Duration};

use alloy_primitives::Address;
use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};
use url::Url;

use evm_integration::{abi, JsonRpcClient, ResponseLogFeed};
use shared::{
    domain::{PendingTransaction, QuestionRequest, ResponseEvent, TxHash},
    error::OrchestratorError,
    protocol::TransactionCall,
};
use wallet_integration::{WalletProvider, WalletProviderError, USER_REJECTED_CODE};

use crate::config::OrchestratorConfig;

/// Cap on the encoded calldata for one submission.
pub const MAX_CALLDATA_BYTES: usize = 64 * 1024;

/// Code wallets report for malformed transaction parameters.
const INVALID_PARAMS_CODE: i64 = -32602;

/// Typed view of the two contract operations the client needs: the
/// question write and the response event stream.
#[async_trait]
pub trait ContractGateway: Send + Sync {
    /// Encodes and sends the question write. The returned transaction is
    /// unconfirmed; the side effect is irreversible once it confirms.
    async fn submit_question(
        &self,
        from: Address,
        request: &QuestionRequest,
    ) -> Result<PendingTransaction, OrchestratorError>;

    /// Suspends until the transaction is mined, bounded by the configured
    /// confirmation timeout.
    async fn await_confirmation(&self, hash: TxHash)
        -> Result<PendingTransaction, OrchestratorError>;

    /// Decoded response events in log-delivery order. Dropping the receiver
    /// unsubscribes; doing so repeatedly is fine.
    async fn subscribe_responses(
        &self,
    ) -> Result<broadcast::Receiver<ResponseEvent>, OrchestratorError>;
}

/// Stand-in used when no chain backend is wired up.
pub struct MissingContractGateway;

#[async_trait]
impl ContractGateway for MissingContractGateway {
    async fn submit_question(
        &self,
        _from: Address,
        _request: &QuestionRequest,
    ) -> Result<PendingTransaction, OrchestratorError> {
        Err(OrchestratorError::Unknown(
            "contract gateway is unavailable".to_string(),
        ))
    }

    async fn await_confirmation(
        &self,
        _hash: TxHash,
    ) -> Result<PendingTransaction, OrchestratorError> {
        Err(OrchestratorError::Unknown(
            "contract gateway is unavailable".to_string(),
        ))
    }

    async fn subscribe_responses(
        &self,
    ) -> Result<broadcast::Receiver<ResponseEvent>, OrchestratorError> {
        Err(OrchestratorError::Unknown(
            "contract gateway is unavailable".to_string(),
        ))
    }
}

/// Production gateway: writes go through the wallet, reads and the event
/// stream go through the node RPC endpoints.
pub struct EvmContractGateway {
    rpc: Arc<JsonRpcClient>,
    wallet: Arc<dyn WalletProvider>,
    contract: Address,
    ws_url: Url,
    confirmation_timeout: Duration,
    receipt_poll_interval: Duration,
    feed: Mutex<Option<ResponseLogFeed>>,
}

impl EvmContractGateway {
    pub fn new(
        config: &OrchestratorConfig,
        rpc: Arc<JsonRpcClient>,
        wallet: Arc<dyn WalletProvider>,
    ) -> Self {
        Self {
            rpc,
            wallet,
            contract: config.contract_address,
            ws_url: config.rpc_ws_url.clone(),
            confirmation_timeout: config.confirmation_timeout,
            receipt_poll_interval: config.receipt_poll_interval,
            feed: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ContractGateway for EvmContractGateway {
    async fn submit_question(
        &self,
        from: Address,
        request: &QuestionRequest,
    ) -> Result<PendingTransaction, OrchestratorError> {
        if !request.has_question_text() {
            return Err(OrchestratorError::InvalidParameters(
                "question text is empty".to_string(),
            ));
        }
        let data = abi::encode_ask_question(request.question.trim(), &request.args);
        if data.len() > MAX_CALLDATA_BYTES {
            return Err(OrchestratorError::InvalidParameters(format!(
                "encoded payload is {} bytes, the cap is {MAX_CALLDATA_BYTES}",
                data.len()
            )));
        }

        let call = TransactionCall {
            from,
            to: self.contract,
            value: None,
            data,
        };
        let hash = self
            .wallet
            .send_transaction(call)
            .await
            .map_err(map_submission_error)?;
        info!(tx = %hash, "question submitted");
        Ok(PendingTransaction::new(hash))
    }

    async fn await_confirmation(
        &self,
        hash: TxHash,
    ) -> Result<PendingTransaction, OrchestratorError> {
        let deadline = tokio::time::Instant::now() + self.confirmation_timeout;
        loop {
            match self.rpc.transaction_receipt(hash).await {
                Ok(Some(receipt)) => {
                    if !receipt.succeeded() {
                        return Err(OrchestratorError::TransactionReverted { hash });
                    }
                    info!(tx = %hash, block = ?receipt.block_number, "transaction confirmed");
                    return Ok(PendingTransaction::confirmed(hash, receipt.block_number));
                }
                Ok(None) => {}
                // transient transport trouble; keep polling until the deadline
                Err(err) => warn!(tx = %hash, error = %err, "receipt poll failed"),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(OrchestratorError::ConfirmationTimeout {
                    hash,
                    waited_secs: self.confirmation_timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.receipt_poll_interval).await;
        }
    }

    async fn subscribe_responses(
        &self,
    ) -> Result<broadcast::Receiver<ResponseEvent>, OrchestratorError> {
        let mut guard = self.feed.lock().await;
        if let Some(feed) = guard.as_ref() {
            return Ok(feed.subscribe());
        }
        let feed = ResponseLogFeed::connect(self.ws_url.clone(), self.contract)
            .await
            .map_err(|err| OrchestratorError::Network(format!("response subscription: {err}")))?;
        let receiver = feed.subscribe();
        *guard = Some(feed);
        Ok(receiver)
    }
}

fn map_submission_error(err: WalletProviderError) -> OrchestratorError {
    match err {
        WalletProviderError::Unavailable => OrchestratorError::WalletUnavailable,
        WalletProviderError::Rpc { code, message } => {
            if code == USER_REJECTED_CODE {
                OrchestratorError::SubmissionRejected
            } else if code == INVALID_PARAMS_CODE {
                OrchestratorError::InvalidParameters(message)
            } else if message.to_ascii_lowercase().contains("insufficient funds") {
                OrchestratorError::InsufficientFunds
            } else {
                OrchestratorError::Unknown(format!("rpc error {code}: {message}"))
            }
        }
        WalletProviderError::Transport(message) => OrchestratorError::Network(message),
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
