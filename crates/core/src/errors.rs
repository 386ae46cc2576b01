use thiserror::Error;

use crate::domain::quote::QuoteStatus;
use crate::workflow::machine::WorkflowAction;

/// Recoverable conditions surfaced synchronously to the caller. None of
/// these leave a quote in a partially-applied state: the owning transaction
/// rolls back before the error propagates.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("no transition from {from:?} via {action:?}")]
    InvalidTransition { from: QuoteStatus, action: WorkflowAction },
    #[error("quote status changed underneath the caller: expected {expected:?}, found {actual:?}")]
    Conflict { expected: QuoteStatus, actual: QuoteStatus },
    #[error("quote is locked for editing in status {0:?}")]
    LockedForEditing(QuoteStatus),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("conversion failed and was rolled back: {0}")]
    Conversion(String),
    #[error("quote already has a child version")]
    AlreadyHasChildVersion,
    #[error("quote not found: {0}")]
    QuoteNotFound(String),
}

impl EngineError {
    /// Conversion failures roll back completely and the idempotency check
    /// makes a re-invocation safe; everything else needs caller action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conversion(_))
    }
}
