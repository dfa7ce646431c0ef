//! Wallet provider backed by a node's own unlocked accounts, the setup dev
//! nodes (anvil, hardhat) expose. The node signs, so there is no approval
//! prompt and no change notifications.

use std::sync::Arc;

use alloy_primitives::Address;
use async_trait::async_trait;
use tokio::sync::broadcast;

use shared::{
    domain::{ChainId, TxHash},
    protocol::TransactionCall,
};
use wallet_integration::{
    WalletChange, WalletProvider, WalletProviderError, UNRECOGNIZED_CHAIN_CODE,
};

use crate::rpc::{JsonRpcClient, TransportError};

pub struct NodeWalletProvider {
    rpc: Arc<JsonRpcClient>,
    changes: broadcast::Sender<WalletChange>,
}

impl NodeWalletProvider {
    pub fn new(rpc: Arc<JsonRpcClient>) -> Self {
        let (changes, _) = broadcast::channel(8);
        Self { rpc, changes }
    }
}

fn map_transport(err: TransportError) -> WalletProviderError {
    match err {
        TransportError::Rpc { code, message } => WalletProviderError::Rpc { code, message },
        other => WalletProviderError::Transport(other.to_string()),
    }
}

#[async_trait]
impl WalletProvider for NodeWalletProvider {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletProviderError> {
        self.rpc.accounts().await.map_err(map_transport)
    }

    async fn chain_id(&self) -> Result<ChainId, WalletProviderError> {
        self.rpc.chain_id().await.map_err(map_transport)
    }

    async fn switch_chain(&self, chain_id: ChainId) -> Result<(), WalletProviderError> {
        // a node cannot switch chains; succeed only when it is already there
        let actual = self.rpc.chain_id().await.map_err(map_transport)?;
        if actual == chain_id {
            Ok(())
        } else {
            Err(WalletProviderError::Rpc {
                code: UNRECOGNIZED_CHAIN_CODE,
                message: format!("node is on chain {actual}, not {chain_id}"),
            })
        }
    }

    async fn send_transaction(
        &self,
        call: TransactionCall,
    ) -> Result<TxHash, WalletProviderError> {
        self.rpc.send_transaction(&call).await.map_err(map_transport)
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<WalletChange> {
        self.changes.subscribe()
    }
}
