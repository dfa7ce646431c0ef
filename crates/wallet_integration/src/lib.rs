use alloy_primitives::Address;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use shared::{
    domain::{ChainId, TxHash},
    protocol::TransactionCall,
};

/// EIP-1193 code for an explicit user decline.
pub const USER_REJECTED_CODE: i64 = 4001;
/// EIP-1193 code for a chain the wallet does not know about.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

/// Externally-observed wallet state changes. Any of these invalidates a
/// cached session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletChange {
    AccountsChanged(Vec<Address>),
    ChainChanged(ChainId),
    Disconnected,
}

#[derive(Debug, Clone, Error)]
pub enum WalletProviderError {
    #[error("no wallet provider is available")]
    Unavailable,
    #[error("wallet rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("wallet transport failure: {0}")]
    Transport(String),
}

impl WalletProviderError {
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::Rpc { code, .. } if *code == USER_REJECTED_CODE)
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        matches!(self, Self::Rpc { code, .. } if *code == UNRECOGNIZED_CHAIN_CODE)
    }
}

/// The seam to the user's wallet. Signing prompts are user-paced and may
/// suspend indefinitely.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Prompts for account access; the first entry is the active account.
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletProviderError>;

    /// The wallet's currently active chain.
    async fn chain_id(&self) -> Result<ChainId, WalletProviderError>;

    /// Asks the wallet to switch its active chain.
    async fn switch_chain(&self, chain_id: ChainId) -> Result<(), WalletProviderError>;

    /// Signs and broadcasts; resolves once the wallet hands back a hash.
    async fn send_transaction(&self, call: TransactionCall) -> Result<TxHash, WalletProviderError>;

    fn subscribe_changes(&self) -> broadcast::Receiver<WalletChange>;
}

/// Stand-in used when no wallet backend is wired up.
pub struct MissingWalletProvider;

#[async_trait]
impl WalletProvider for MissingWalletProvider {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletProviderError> {
        Err(WalletProviderError::Unavailable)
    }

    async fn chain_id(&self) -> Result<ChainId, WalletProviderError> {
        Err(WalletProviderError::Unavailable)
    }

    async fn switch_chain(&self, _chain_id: ChainId) -> Result<(), WalletProviderError> {
        Err(WalletProviderError::Unavailable)
    }

    async fn send_transaction(
        &self,
        _call: TransactionCall,
    ) -> Result<TxHash, WalletProviderError> {
        Err(WalletProviderError::Unavailable)
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<WalletChange> {
        // closed immediately, there is nothing to observe
        let (_sender, receiver) = broadcast::channel(1);
        receiver
    }
}
