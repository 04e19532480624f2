use crate::models::{Choice, Decision};
use crate::services::store::{DecisionStore, StoreError};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while recording a decision
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid decision: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of writing a decision to the ledger
#[derive(Debug, Clone)]
pub struct RecordedDecision {
    pub decision: Decision,
    /// Analytics only: `false` when an earlier decision was overwritten
    pub was_new_decision: bool,
}

/// Durable record of every like and pass, last write wins per (from, to)
pub struct DecisionLedger {
    store: Arc<dyn DecisionStore>,
}

impl DecisionLedger {
    pub fn new(store: Arc<dyn DecisionStore>) -> Self {
        Self { store }
    }

    pub async fn record_decision(
        &self,
        from_id: &str,
        to_id: &str,
        choice: Choice,
    ) -> Result<RecordedDecision, LedgerError> {
        validate_pair(from_id, to_id)?;

        let outcome = self.store.upsert_decision(from_id, to_id, choice).await?;

        tracing::debug!(
            "Ledger: {} {} {} (new: {})",
            from_id,
            choice.as_str(),
            to_id,
            outcome.inserted
        );

        Ok(RecordedDecision {
            decision: outcome.decision,
            was_new_decision: outcome.inserted,
        })
    }
}

/// Reject self-decisions and blank ids before anything is written
pub fn validate_pair(from_id: &str, to_id: &str) -> Result<(), LedgerError> {
    if from_id.trim().is_empty() || to_id.trim().is_empty() {
        return Err(LedgerError::Invalid("user ids must not be empty".to_string()));
    }
    if from_id == to_id {
        return Err(LedgerError::Invalid(format!(
            "user {} cannot decide on themselves",
            from_id
        )));
    }
    Ok(())
}
