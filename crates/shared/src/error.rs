use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ChainId, TxHash};

/// Failure categories surfaced to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    WalletUnavailable,
    UserRejected,
    UnsupportedNetwork,
    InsufficientFunds,
    InvalidParameters,
    ConfirmationTimeout,
    TransactionReverted,
    ResponseDecodeFailure,
    AmbiguousCorrelation,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestratorError {
    #[error("no wallet provider is available")]
    WalletUnavailable,
    #[error("wallet connection was rejected by the user")]
    ConnectionRejected,
    #[error("transaction signing was rejected by the user")]
    SubmissionRejected,
    #[error("wallet is not on chain {required}")]
    UnsupportedNetwork {
        required: ChainId,
        actual: Option<ChainId>,
    },
    #[error("insufficient funds to cover gas")]
    InsufficientFunds,
    #[error("invalid transaction parameters: {0}")]
    InvalidParameters(String),
    #[error("transaction {hash} was not confirmed within {waited_secs}s")]
    ConfirmationTimeout { hash: TxHash, waited_secs: u64 },
    #[error("transaction {hash} reverted on-chain")]
    TransactionReverted { hash: TxHash },
    #[error("response payload was not valid UTF-8")]
    ResponseDecodeFailure,
    #[error("a different request is already awaiting its response")]
    AmbiguousCorrelation,
    #[error("network failure: {0}")]
    Network(String),
    #[error("{0}")]
    Unknown(String),
}

impl OrchestratorError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::WalletUnavailable => FailureKind::WalletUnavailable,
            Self::ConnectionRejected | Self::SubmissionRejected => FailureKind::UserRejected,
            Self::UnsupportedNetwork { .. } => FailureKind::UnsupportedNetwork,
            Self::InsufficientFunds => FailureKind::InsufficientFunds,
            Self::InvalidParameters(_) => FailureKind::InvalidParameters,
            Self::ConfirmationTimeout { .. } => FailureKind::ConfirmationTimeout,
            Self::TransactionReverted { .. } => FailureKind::TransactionReverted,
            Self::ResponseDecodeFailure => FailureKind::ResponseDecodeFailure,
            Self::AmbiguousCorrelation => FailureKind::AmbiguousCorrelation,
            Self::Network(_) | Self::Unknown(_) => FailureKind::Unknown,
        }
    }

    /// Message shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::WalletUnavailable => {
                "MetaMask is not installed. Please install MetaMask to continue.".to_string()
            }
            Self::ConnectionRejected => "Please connect your wallet to continue".to_string(),
            Self::SubmissionRejected => "Transaction was rejected by user".to_string(),
            Self::UnsupportedNetwork { .. } => {
                "Please add Avalanche Fuji network to MetaMask".to_string()
            }
            Self::InsufficientFunds => "Insufficient AVAX for gas fees".to_string(),
            Self::InvalidParameters(_) => "Invalid transaction parameters".to_string(),
            Self::ConfirmationTimeout { .. } => {
                "Transaction was not confirmed in time. It may still be mined; check the explorer before retrying.".to_string()
            }
            Self::TransactionReverted { .. } => {
                "Transaction failed on-chain. Please try again.".to_string()
            }
            Self::ResponseDecodeFailure => crate::domain::INVALID_RESPONSE_TEXT.to_string(),
            Self::AmbiguousCorrelation => {
                "Another request is still awaiting its response. Reset and try again.".to_string()
            }
            Self::Network(_) => {
                "Network error. Please check your connection and try again.".to_string()
            }
            Self::Unknown(_) => "Transaction failed. Please try again.".to_string(),
        }
    }

    /// Corrective hint, where one is known.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::WalletUnavailable => Some("install a wallet"),
            Self::UnsupportedNetwork { .. } => Some("switch network"),
            Self::InsufficientFunds => Some("add funds"),
            _ => None,
        }
    }

    pub fn to_user_facing(&self) -> UserFacingFailure {
        UserFacingFailure {
            kind: self.kind(),
            message: self.user_message(),
            hint: self.hint().map(str::to_string),
        }
    }
}

/// What the presentation layer receives when the orchestration fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFacingFailure {
    pub kind: FailureKind,
    pub message: String,
    pub hint: Option<String>,
}
