use std::sync::Arc;

use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};

use shared::{
    domain::{ChainId, WalletSession},
    error::OrchestratorError,
};
use wallet_integration::{
    WalletChange, WalletProvider, WalletProviderError, UNRECOGNIZED_CHAIN_CODE, USER_REJECTED_CODE,
};

/// Owns the wallet session and keeps it honest: the cached session is
/// invalidated whenever the wallet reports an account or chain change, and
/// every submission re-checks the active chain. The contract address only
/// means anything on the required network.
pub struct WalletSessionManager {
    provider: Arc<dyn WalletProvider>,
    required_chain: ChainId,
    session: Arc<Mutex<Option<WalletSession>>>,
    watch_task: JoinHandle<()>,
}

impl WalletSessionManager {
    pub fn new(provider: Arc<dyn WalletProvider>, required_chain: ChainId) -> Self {
        let session = Arc::new(Mutex::new(None));
        let watch_task = spawn_change_watcher(provider.subscribe_changes(), Arc::clone(&session));
        Self {
            provider,
            required_chain,
            session,
            watch_task,
        }
    }

    pub fn required_chain(&self) -> ChainId {
        self.required_chain
    }

    /// Switches the wallet to the required chain, then requests account
    /// access. Both steps are user-paced and may suspend indefinitely.
    pub async fn connect(&self) -> Result<WalletSession, OrchestratorError> {
        self.provider
            .switch_chain(self.required_chain)
            .await
            .map_err(|err| self.map_provider_error(err))?;
        let accounts = self
            .provider
            .request_accounts()
            .await
            .map_err(|err| self.map_provider_error(err))?;
        let address = accounts
            .first()
            .copied()
            .ok_or_else(|| OrchestratorError::Unknown("wallet returned no accounts".to_string()))?;
        let chain_id = self
            .provider
            .chain_id()
            .await
            .map_err(|err| self.map_provider_error(err))?;
        if chain_id != self.required_chain {
            return Err(OrchestratorError::UnsupportedNetwork {
                required: self.required_chain,
                actual: Some(chain_id),
            });
        }

        let session = WalletSession {
            address,
            chain_id,
            connected: true,
        };
        *self.session.lock().await = Some(session);
        info!(address = %session.display_address(), chain = %chain_id, "wallet session established");
        Ok(session)
    }

    /// Last known session, without prompting the user.
    pub async fn current_session(&self) -> Option<WalletSession> {
        *self.session.lock().await
    }

    /// The session a submission may use, re-validated against the wallet's
    /// active chain. A wrong-chain session is invalidated and refused.
    pub async fn session_for_submission(
        &self,
    ) -> Result<Option<WalletSession>, OrchestratorError> {
        let Some(session) = self.current_session().await else {
            return Ok(None);
        };
        let active = self
            .provider
            .chain_id()
            .await
            .map_err(|err| self.map_provider_error(err))?;
        if active != self.required_chain {
            warn!(chain = %active, required = %self.required_chain, "session is off the required chain");
            *self.session.lock().await = None;
            return Err(OrchestratorError::UnsupportedNetwork {
                required: self.required_chain,
                actual: Some(active),
            });
        }
        Ok(Some(session))
    }

    pub async fn disconnect(&self) {
        *self.session.lock().await = None;
    }

    fn map_provider_error(&self, err: WalletProviderError) -> OrchestratorError {
        match err {
            WalletProviderError::Unavailable => OrchestratorError::WalletUnavailable,
            WalletProviderError::Rpc { code, message } => {
                if code == USER_REJECTED_CODE {
                    OrchestratorError::ConnectionRejected
                } else if code == UNRECOGNIZED_CHAIN_CODE {
                    OrchestratorError::UnsupportedNetwork {
                        required: self.required_chain,
                        actual: None,
                    }
                } else {
                    OrchestratorError::Unknown(format!("rpc error {code}: {message}"))
                }
            }
            WalletProviderError::Transport(message) => OrchestratorError::Network(message),
        }
    }
}

impl Drop for WalletSessionManager {
    fn drop(&mut self) {
        self.watch_task.abort();
    }
}

fn spawn_change_watcher(
    mut changes: broadcast::Receiver<WalletChange>,
    session: Arc<Mutex<Option<WalletSession>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => {
                    info!(?change, "wallet change reported, invalidating session");
                    *session.lock().await = None;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed wallet change notifications, invalidating session");
                    *session.lock().await = None;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
