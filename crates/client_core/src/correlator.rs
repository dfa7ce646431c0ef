use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use shared::{
    domain::{AnalysisResponse, PendingTransaction, ResponseEvent, TxHash},
    error::OrchestratorError,
};

/// Matches response events back to the transaction that caused them.
///
/// The contract gives no way to derive an event's `requestId` from the
/// submitting transaction, so attribution rests on there being at most one
/// outstanding tracked transaction. Tracking a second, different one is
/// refused rather than guessed at.
#[derive(Default)]
pub struct ResponseCorrelator {
    tracked: Mutex<Option<TxHash>>,
}

impl ResponseCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in responses for this transaction. Re-tracking
    /// the same hash is idempotent.
    pub fn track(&self, pending: &PendingTransaction) -> Result<(), OrchestratorError> {
        let mut tracked = self.lock();
        match *tracked {
            Some(existing) if existing != pending.hash => {
                Err(OrchestratorError::AmbiguousCorrelation)
            }
            _ => {
                *tracked = Some(pending.hash);
                Ok(())
            }
        }
    }

    /// Attributes `event` to the tracked transaction and ends the tracking.
    /// Events arriving with nothing tracked are expected steady-state noise
    /// and are discarded.
    pub fn observe(&self, event: &ResponseEvent) -> Option<AnalysisResponse> {
        let mut tracked = self.lock();
        if tracked.is_none() {
            debug!(request_id = %event.request_id, "discarding response event, nothing tracked");
            return None;
        }
        *tracked = None;
        Some(AnalysisResponse::from_event(event))
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    pub fn is_tracking(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<TxHash>> {
        match self.tracked.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
