//! Transactional application services. Each operation opens one transaction,
//! re-reads the quote inside it, asks the pure planner or validator for a
//! verdict, and either commits the full effect or rolls back.

use thiserror::Error;

use quoteflow_core::errors::EngineError;

use crate::repositories::RepositoryError;

mod conversion;
mod drafts;
mod ledger;
mod quotes;
mod versioning;
mod workflow;

pub use conversion::{ConversionOutcome, ConversionService};
pub use drafts::DraftService;
pub use ledger::{BulkSetItems, LedgerService};
pub use quotes::QuoteService;
pub use versioning::VersioningService;
pub use workflow::{TransitionRequest, WorkflowService};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored row could not be decoded: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ServiceError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(error) => Self::Database(error),
            RepositoryError::Decode(message) => Self::Decode(message),
        }
    }
}

impl ServiceError {
    pub fn engine(&self) -> Option<&EngineError> {
        match self {
            Self::Engine(error) => Some(error),
            _ => None,
        }
    }
}
