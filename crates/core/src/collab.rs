//! Narrow interfaces to the engine's external collaborators: the AI draft
//! generator, the document renderer, and the CRM customer directory.
//!
//! The first two are asynchronous job handoffs — the engine records a job
//! reference and a terminal outcome, and never holds a transaction open
//! while a collaborator works. The directory is a synchronous read used
//! during conversion.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::line_item::{LineItem, LineItemDraft};
use crate::domain::quote::{CustomerId, Quote};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DraftJobId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderJobId(pub String);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("collaborator rejected the request: {0}")]
    Rejected(String),
}

/// Context handed to the draft generator alongside the free-form prompt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DraftContext {
    pub customer_name: Option<String>,
    pub currency: Option<String>,
    pub notes: Vec<String>,
}

/// Either the generator answered inline or it queued a job the caller polls
/// for (or receives a callback about) later.
#[derive(Clone, Debug, PartialEq)]
pub enum DraftOutcome {
    Items(Vec<LineItemDraft>),
    Pending(DraftJobId),
}

#[async_trait]
pub trait DraftGenerator: Send + Sync {
    async fn generate_draft_items(
        &self,
        prompt: &str,
        context: &DraftContext,
    ) -> Result<DraftOutcome, CollaboratorError>;

    /// Compensating discard of an in-flight job. Never rewinds committed
    /// quote state.
    async fn cancel(&self, job: &DraftJobId) -> Result<(), CollaboratorError>;
}

/// Immutable view of a quote handed to the renderer at finalization time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub quote: Quote,
    pub items: Vec<LineItem>,
}

#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render_documents(
        &self,
        snapshot: &QuoteSnapshot,
    ) -> Result<RenderJobId, CollaboratorError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BillingDefaults {
    pub billing_address: Option<String>,
    pub shipping_address: Option<String>,
    pub payment_terms: Option<String>,
}

#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn billing_defaults(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<BillingDefaults>, CollaboratorError>;
}

/// Always-queues generator for tests and offline operation: every request
/// becomes a pending job that the test (or an operator) completes by hand.
#[derive(Default)]
pub struct QueuedDraftGenerator {
    jobs: Mutex<Vec<DraftJobId>>,
}

impl QueuedDraftGenerator {
    pub fn pending_jobs(&self) -> Vec<DraftJobId> {
        match self.jobs.lock() {
            Ok(jobs) => jobs.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl DraftGenerator for QueuedDraftGenerator {
    async fn generate_draft_items(
        &self,
        _prompt: &str,
        _context: &DraftContext,
    ) -> Result<DraftOutcome, CollaboratorError> {
        let job = DraftJobId(Uuid::new_v4().to_string());
        match self.jobs.lock() {
            Ok(mut jobs) => jobs.push(job.clone()),
            Err(poisoned) => poisoned.into_inner().push(job.clone()),
        }
        Ok(DraftOutcome::Pending(job))
    }

    async fn cancel(&self, job: &DraftJobId) -> Result<(), CollaboratorError> {
        match self.jobs.lock() {
            Ok(mut jobs) => jobs.retain(|pending| pending != job),
            Err(poisoned) => poisoned.into_inner().retain(|pending| pending != job),
        }
        Ok(())
    }
}

/// No-op renderer: hands back a job id and drops the snapshot. Used when
/// document generation is disabled.
#[derive(Default)]
pub struct NoopRenderer;

#[async_trait]
impl DocumentRenderer for NoopRenderer {
    async fn render_documents(
        &self,
        _snapshot: &QuoteSnapshot,
    ) -> Result<RenderJobId, CollaboratorError> {
        Ok(RenderJobId(Uuid::new_v4().to_string()))
    }
}

/// In-memory directory backed by a fixed map. The server swaps in an HTTP
/// client against the real CRM when one is configured.
#[derive(Default)]
pub struct StaticCustomerDirectory {
    defaults: HashMap<String, BillingDefaults>,
}

impl StaticCustomerDirectory {
    pub fn with_defaults(
        entries: impl IntoIterator<Item = (CustomerId, BillingDefaults)>,
    ) -> Self {
        Self {
            defaults: entries.into_iter().map(|(id, defaults)| (id.0, defaults)).collect(),
        }
    }
}

#[async_trait]
impl CustomerDirectory for StaticCustomerDirectory {
    async fn billing_defaults(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<BillingDefaults>, CollaboratorError> {
        Ok(self.defaults.get(&customer_id.0).cloned())
    }
}
