//! Orchestration layer for the prediction market client: one deterministic
//! state machine over three independently-failing subsystems (the wallet,
//! transaction finality, the analysis delivered through the contract's
//! event log).

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use shared::{
    domain::{
        AnalysisResponse, ChainId, PendingTransaction, QuestionRequest, ResponseEvent, TxHash,
        WalletSession,
    },
    error::{OrchestratorError, UserFacingFailure},
};

pub mod config;
pub mod correlator;
pub mod gateway;
pub mod wallet_session;

pub use config::{load_settings, load_settings_from, OrchestratorConfig, Settings};
pub use correlator::ResponseCorrelator;
pub use gateway::{ContractGateway, EvmContractGateway, MissingContractGateway, MAX_CALLDATA_BYTES};
pub use wallet_session::WalletSessionManager;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestrationStage {
    Idle,
    Submitting,
    AwaitingConfirmation,
    Analyzing,
    Completed,
    Error,
}

impl OrchestrationStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Submitting => "Waiting for wallet signature",
            Self::AwaitingConfirmation => "Waiting for confirmation",
            Self::Analyzing => "Analyzing",
            Self::Completed => "Completed",
            Self::Error => "Error",
        }
    }

    /// Terminal stages persist until an explicit [`Orchestrator::reset`].
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    pub fn accepts_submission(&self) -> bool {
        matches!(self, Self::Idle | Self::Completed | Self::Error)
    }
}

/// Hash plus explorer link for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRef {
    pub hash: TxHash,
    pub explorer_url: String,
}

/// Full state snapshot handed to the presentation layer.
#[derive(Debug, Clone, Default)]
pub enum OrchestratorState {
    #[default]
    Idle,
    Submitting {
        request: QuestionRequest,
    },
    AwaitingConfirmation {
        request: QuestionRequest,
        pending: PendingTransaction,
    },
    Analyzing {
        request: QuestionRequest,
        pending: PendingTransaction,
    },
    Completed {
        request: QuestionRequest,
        pending: PendingTransaction,
        response: AnalysisResponse,
        transaction: TransactionRef,
    },
    Error {
        failure: UserFacingFailure,
    },
}

impl OrchestratorState {
    pub fn stage(&self) -> OrchestrationStage {
        match self {
            Self::Idle => OrchestrationStage::Idle,
            Self::Submitting { .. } => OrchestrationStage::Submitting,
            Self::AwaitingConfirmation { .. } => OrchestrationStage::AwaitingConfirmation,
            Self::Analyzing { .. } => OrchestrationStage::Analyzing,
            Self::Completed { .. } => OrchestrationStage::Completed,
            Self::Error { .. } => OrchestrationStage::Error,
        }
    }
}

#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    StageChanged(OrchestrationStage),
    /// The soft deadline passed without a response. Analysis may
    /// legitimately outlast a block; this is a progress notice, not an
    /// error.
    StillAnalyzing { waited: Duration },
    Completed {
        text: String,
        transaction: TransactionRef,
    },
    Failed(UserFacingFailure),
}

/// What became of a submission attempt. Everything except `Accepted` leaves
/// the state machine untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Accepted,
    /// Empty or whitespace-only question text.
    EmptyQuestion,
    /// No connected wallet session.
    NoSession,
    /// The wallet's active chain is not the required one. No signature was
    /// requested.
    WrongNetwork {
        required: ChainId,
        actual: Option<ChainId>,
    },
    /// A request is already in flight.
    Busy,
    /// The wallet session could not be re-validated.
    Refused(UserFacingFailure),
}

/// The one component the presentation layer talks to. Drives
/// `Idle`, `Submitting`, `AwaitingConfirmation`, `Analyzing`, `Completed`
/// in order, with `Error` reachable from every non-terminal stage and both
/// terminal stages holding until [`reset`].
///
/// [`reset`]: Orchestrator::reset
pub struct Orchestrator {
    config: OrchestratorConfig,
    sessions: Arc<WalletSessionManager>,
    gateway: Arc<dyn ContractGateway>,
    correlator: ResponseCorrelator,
    inner: Mutex<Inner>,
    events: broadcast::Sender<OrchestratorEvent>,
}

struct Inner {
    state: OrchestratorState,
    /// Bumped on every accepted submission and every reset. Asynchronous
    /// continuations re-check it before applying a transition, so nothing
    /// lands after the request it belonged to was superseded.
    epoch: u64,
    drive_task: Option<JoinHandle<()>>,
}

impl Orchestrator {
    /// Orchestrator with no wallet or chain backend wired up; connecting
    /// and submitting fail until real dependencies are provided.
    pub fn disconnected(config: OrchestratorConfig) -> Arc<Self> {
        let sessions = Arc::new(WalletSessionManager::new(
            Arc::new(wallet_integration::MissingWalletProvider),
            config.required_chain,
        ));
        Self::new(config, sessions, Arc::new(MissingContractGateway))
    }

    pub fn new(
        config: OrchestratorConfig,
        sessions: Arc<WalletSessionManager>,
        gateway: Arc<dyn ContractGateway>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            config,
            sessions,
            gateway,
            correlator: ResponseCorrelator::new(),
            inner: Mutex::new(Inner {
                state: OrchestratorState::Idle,
                epoch: 0,
                drive_task: None,
            }),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    pub async fn connect_wallet(&self) -> Result<WalletSession, OrchestratorError> {
        self.sessions.connect().await
    }

    pub async fn wallet_session(&self) -> Option<WalletSession> {
        self.sessions.current_session().await
    }

    pub async fn snapshot(&self) -> OrchestratorState {
        self.inner.lock().await.state.clone()
    }

    pub async fn stage(&self) -> OrchestrationStage {
        self.inner.lock().await.state.stage()
    }

    /// Starts a submission. Refused without side effects unless the
    /// question is non-empty, a valid session exists on the required chain,
    /// and no other request is active.
    pub async fn submit(self: &Arc<Self>, question: &str, args: Vec<String>) -> SubmitOutcome {
        let question = question.trim();
        if question.is_empty() {
            debug!("ignoring submission with empty question text");
            return SubmitOutcome::EmptyQuestion;
        }

        let session = match self.sessions.session_for_submission().await {
            Ok(Some(session)) => session,
            Ok(None) => {
                debug!("ignoring submission without a wallet session");
                return SubmitOutcome::NoSession;
            }
            Err(OrchestratorError::UnsupportedNetwork { required, actual }) => {
                warn!(%required, "refusing submission off the required network");
                return SubmitOutcome::WrongNetwork { required, actual };
            }
            Err(err) => {
                warn!(error = %err, "could not validate the wallet session");
                return SubmitOutcome::Refused(err.to_user_facing());
            }
        };

        let mut inner = self.inner.lock().await;
        if !inner.state.stage().accepts_submission() {
            warn!(
                stage = inner.state.stage().label(),
                "refusing submission while a request is active"
            );
            return SubmitOutcome::Busy;
        }

        // a finished request is being replaced; discard its artifacts now
        if let Some(task) = inner.drive_task.take() {
            task.abort();
        }
        self.correlator.clear();
        inner.epoch += 1;
        let epoch = inner.epoch;

        let request = QuestionRequest::new(question, args);
        info!(question, "submitting question");
        inner.state = OrchestratorState::Submitting {
            request: request.clone(),
        };
        let _ = self
            .events
            .send(OrchestratorEvent::StageChanged(OrchestrationStage::Submitting));

        let orchestrator = Arc::clone(self);
        inner.drive_task = Some(tokio::spawn(async move {
            orchestrator.drive(epoch, session, request).await;
        }));
        SubmitOutcome::Accepted
    }

    /// Returns to `Idle`, discarding the request, its transaction and any
    /// response. Clears the correlator synchronously so a late event for
    /// the discarded request can never complete it. A reset from `Idle` is
    /// a no-op.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(task) = inner.drive_task.take() {
            task.abort();
        }
        self.correlator.clear();
        inner.epoch += 1;
        if matches!(inner.state, OrchestratorState::Idle) {
            return;
        }
        info!("orchestration reset");
        inner.state = OrchestratorState::Idle;
        let _ = self
            .events
            .send(OrchestratorEvent::StageChanged(OrchestrationStage::Idle));
    }

    async fn drive(self: Arc<Self>, epoch: u64, session: WalletSession, request: QuestionRequest) {
        if let Err(error) = self.drive_inner(epoch, session, request).await {
            self.fail(epoch, error).await;
        }
    }

    async fn drive_inner(
        &self,
        epoch: u64,
        session: WalletSession,
        request: QuestionRequest,
    ) -> Result<(), OrchestratorError> {
        let pending = self
            .gateway
            .submit_question(session.address, &request)
            .await?;
        if !self
            .transition(
                epoch,
                OrchestratorState::AwaitingConfirmation {
                    request: request.clone(),
                    pending,
                },
            )
            .await
        {
            return Ok(());
        }

        let pending = self.gateway.await_confirmation(pending.hash).await?;

        // register interest before the event stream opens so nothing slips by
        self.correlator.track(&pending)?;
        let responses = self.gateway.subscribe_responses().await?;
        if !self
            .transition(
                epoch,
                OrchestratorState::Analyzing {
                    request: request.clone(),
                    pending,
                },
            )
            .await
        {
            return Ok(());
        }

        self.await_response(epoch, request, pending, responses).await
    }

    async fn await_response(
        &self,
        epoch: u64,
        request: QuestionRequest,
        pending: PendingTransaction,
        mut responses: broadcast::Receiver<ResponseEvent>,
    ) -> Result<(), OrchestratorError> {
        let started = tokio::time::Instant::now();
        loop {
            match tokio::time::timeout(self.config.analyzing_notice_interval, responses.recv())
                .await
            {
                Ok(Ok(event)) => {
                    let Some(response) = self.correlator.observe(&event) else {
                        continue;
                    };
                    if response.decode_failed {
                        warn!(tx = %pending.hash, "response payload was not valid UTF-8");
                    }
                    let transaction = TransactionRef {
                        hash: pending.hash,
                        explorer_url: self.config.explorer_tx_url(pending.hash),
                    };
                    let completed_event = OrchestratorEvent::Completed {
                        text: response.text.clone(),
                        transaction: transaction.clone(),
                    };
                    let state = OrchestratorState::Completed {
                        request,
                        pending,
                        response,
                        transaction,
                    };
                    self.transition_with(epoch, state, Some(completed_event)).await;
                    return Ok(());
                }
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    warn!(skipped, "response stream lagged");
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    return Err(OrchestratorError::Network(
                        "response event stream closed".to_string(),
                    ));
                }
                Err(_) => {
                    // analysis can outlast a block; notice only, keep waiting
                    let waited = started.elapsed();
                    info!(waited_secs = waited.as_secs(), "analysis still running");
                    let _ = self
                        .events
                        .send(OrchestratorEvent::StillAnalyzing { waited });
                }
            }
        }
    }

    async fn transition(&self, epoch: u64, state: OrchestratorState) -> bool {
        self.transition_with(epoch, state, None).await
    }

    async fn transition_with(
        &self,
        epoch: u64,
        state: OrchestratorState,
        extra: Option<OrchestratorEvent>,
    ) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch {
            debug!("dropping transition for a superseded request");
            return false;
        }
        let stage = state.stage();
        inner.state = state;
        let _ = self.events.send(OrchestratorEvent::StageChanged(stage));
        if let Some(event) = extra {
            let _ = self.events.send(event);
        }
        true
    }

    async fn fail(&self, epoch: u64, error: OrchestratorError) {
        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch {
            debug!(error = %error, "dropping failure for a superseded request");
            return;
        }
        self.correlator.clear();
        let failure = error.to_user_facing();
        warn!(kind = ?failure.kind, error = %error, "request failed");
        inner.state = OrchestratorState::Error {
            failure: failure.clone(),
        };
        let _ = self
            .events
            .send(OrchestratorEvent::StageChanged(OrchestrationStage::Error));
        let _ = self.events.send(OrchestratorEvent::Failed(failure));
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
