use std::sync::Arc;

use chrono::Utc;

use quoteflow_core::collab::{DraftContext, DraftGenerator, DraftJobId, DraftOutcome};
use quoteflow_core::domain::line_item::LineItemDraft;
use quoteflow_core::domain::quote::{DraftState, Quote, QuoteId};
use quoteflow_core::errors::EngineError;

use super::{BulkSetItems, LedgerService, ServiceError};
use crate::{repositories, DbPool};

/// AI-assisted ledger drafting. The generator is never called inside a
/// transaction: the engine records a pending marker, and the job finishes
/// through `complete_draft` / `fail_draft` callbacks.
#[derive(Clone)]
pub struct DraftService {
    pool: DbPool,
    generator: Arc<dyn DraftGenerator>,
    ledger: LedgerService,
}

impl DraftService {
    pub fn new(pool: DbPool, generator: Arc<dyn DraftGenerator>, ledger: LedgerService) -> Self {
        Self { pool, generator, ledger }
    }

    /// Ask the generator for items. An inline answer lands in the ledger
    /// immediately; a queued job leaves the quote in `pending`. A generator
    /// failure is recorded as a `failed` marker, not an error: the quote
    /// stays editable and the caller can retry or fall back to manual entry.
    pub async fn request_draft(
        &self,
        quote_id: &QuoteId,
        prompt: &str,
        context: &DraftContext,
    ) -> Result<Quote, ServiceError> {
        let quote = repositories::quote::fetch(&self.pool, quote_id)
            .await?
            .ok_or_else(|| EngineError::QuoteNotFound(quote_id.0.clone()))?;
        if !quote.status.is_editable() {
            return Err(EngineError::LockedForEditing(quote.status).into());
        }

        match self.generator.generate_draft_items(prompt, context).await {
            Ok(DraftOutcome::Items(items)) => {
                self.ledger
                    .bulk_set_items(BulkSetItems {
                        quote_id: quote_id.clone(),
                        items,
                        tax_rate: None,
                        discount_amount: None,
                    })
                    .await?;
                self.set_marker(quote_id, DraftState::Completed, None).await
            }
            Ok(DraftOutcome::Pending(job)) => {
                tracing::info!(
                    event_name = "draft.queued",
                    quote_id = %quote_id.0,
                    job_id = %job.0,
                );
                self.set_marker(quote_id, DraftState::Pending, Some(job.0)).await
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "draft.generator_failed",
                    quote_id = %quote_id.0,
                    error = %error,
                );
                self.set_marker(quote_id, DraftState::Failed, None).await
            }
        }
    }

    /// Callback for a queued job that produced items. The job id must match
    /// the stored marker; a stale callback from a cancelled job is rejected.
    pub async fn complete_draft(
        &self,
        quote_id: &QuoteId,
        job: &DraftJobId,
        items: Vec<LineItemDraft>,
    ) -> Result<Quote, ServiceError> {
        let quote = self.pending_quote(quote_id, job).await?;
        if !quote.status.is_editable() {
            return Err(EngineError::LockedForEditing(quote.status).into());
        }

        self.ledger
            .bulk_set_items(BulkSetItems {
                quote_id: quote_id.clone(),
                items,
                tax_rate: None,
                discount_amount: None,
            })
            .await?;
        self.set_marker(quote_id, DraftState::Completed, None).await
    }

    pub async fn fail_draft(
        &self,
        quote_id: &QuoteId,
        job: &DraftJobId,
        reason: &str,
    ) -> Result<Quote, ServiceError> {
        self.pending_quote(quote_id, job).await?;
        tracing::warn!(
            event_name = "draft.job_failed",
            quote_id = %quote_id.0,
            job_id = %job.0,
            reason,
        );
        self.set_marker(quote_id, DraftState::Failed, None).await
    }

    /// Discard an in-flight job. The cancel call to the generator is a
    /// compensating action: its failure is logged but does not keep the
    /// marker alive.
    pub async fn cancel_draft(&self, quote_id: &QuoteId) -> Result<Quote, ServiceError> {
        let quote = repositories::quote::fetch(&self.pool, quote_id)
            .await?
            .ok_or_else(|| EngineError::QuoteNotFound(quote_id.0.clone()))?;
        if quote.draft_state != DraftState::Pending {
            return Err(EngineError::Validation(
                "no pending draft job to cancel".to_string(),
            )
            .into());
        }

        if let Some(job_id) = &quote.draft_job_id {
            if let Err(error) = self.generator.cancel(&DraftJobId(job_id.clone())).await {
                tracing::warn!(
                    event_name = "draft.cancel_failed",
                    quote_id = %quote_id.0,
                    job_id = %job_id,
                    error = %error,
                );
            }
        }

        self.set_marker(quote_id, DraftState::None, None).await
    }

    async fn pending_quote(
        &self,
        quote_id: &QuoteId,
        job: &DraftJobId,
    ) -> Result<Quote, ServiceError> {
        let quote = repositories::quote::fetch(&self.pool, quote_id)
            .await?
            .ok_or_else(|| EngineError::QuoteNotFound(quote_id.0.clone()))?;
        if quote.draft_state != DraftState::Pending
            || quote.draft_job_id.as_deref() != Some(job.0.as_str())
        {
            return Err(EngineError::Validation(format!(
                "draft job `{}` is not pending for this quote",
                job.0,
            ))
            .into());
        }
        Ok(quote)
    }

    async fn set_marker(
        &self,
        quote_id: &QuoteId,
        state: DraftState,
        job_id: Option<String>,
    ) -> Result<Quote, ServiceError> {
        let mut quote = repositories::quote::fetch(&self.pool, quote_id)
            .await?
            .ok_or_else(|| EngineError::QuoteNotFound(quote_id.0.clone()))?;

        let expected = quote.status;
        quote.draft_state = state;
        quote.draft_job_id = job_id;
        quote.updated_at = Utc::now();
        if !repositories::quote::update_guarded(&self.pool, &quote, expected).await? {
            let actual = repositories::quote::fetch(&self.pool, quote_id)
                .await?
                .map(|current| current.status)
                .unwrap_or(expected);
            return Err(EngineError::Conflict { expected, actual }.into());
        }

        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use quoteflow_core::collab::{
        CollaboratorError, DraftContext, DraftGenerator, DraftJobId, DraftOutcome,
        QueuedDraftGenerator,
    };
    use quoteflow_core::domain::line_item::LineItemDraft;
    use quoteflow_core::domain::quote::{CustomerId, DraftState, Quote, QuoteStatus, TenantId};
    use quoteflow_core::errors::EngineError;
    use quoteflow_core::ledger::ItemBounds;
    use quoteflow_core::rust_decimal::Decimal;

    use super::DraftService;
    use crate::services::{LedgerService, QuoteService};
    use crate::{connect_with_settings, migrations, repositories};

    struct InlineGenerator;

    #[async_trait]
    impl DraftGenerator for InlineGenerator {
        async fn generate_draft_items(
            &self,
            _prompt: &str,
            _context: &DraftContext,
        ) -> Result<DraftOutcome, CollaboratorError> {
            Ok(DraftOutcome::Items(vec![LineItemDraft::simple(
                "suggested pump",
                Decimal::ONE,
                Decimal::from(200),
                Decimal::from(25),
            )]))
        }

        async fn cancel(&self, _job: &DraftJobId) -> Result<(), CollaboratorError> {
            Ok(())
        }
    }

    struct BrokenGenerator;

    #[async_trait]
    impl DraftGenerator for BrokenGenerator {
        async fn generate_draft_items(
            &self,
            _prompt: &str,
            _context: &DraftContext,
        ) -> Result<DraftOutcome, CollaboratorError> {
            Err(CollaboratorError::Unavailable("model offline".to_string()))
        }

        async fn cancel(&self, _job: &DraftJobId) -> Result<(), CollaboratorError> {
            Ok(())
        }
    }

    async fn setup(generator: Arc<dyn DraftGenerator>) -> (crate::DbPool, DraftService, Quote) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let quote = QuoteService::new(pool.clone())
            .create_quote(
                TenantId("t-1".to_string()),
                CustomerId("c-1".to_string()),
                None,
                false,
                "U-1",
            )
            .await
            .expect("create");
        let ledger = LedgerService::new(pool.clone(), ItemBounds::default());
        let service = DraftService::new(pool.clone(), generator, ledger);
        (pool, service, quote)
    }

    #[tokio::test]
    async fn inline_answer_fills_the_ledger_and_completes() {
        let (pool, service, quote) = setup(Arc::new(InlineGenerator)).await;

        let updated = service
            .request_draft(&quote.id, "a pump for a small workshop", &DraftContext::default())
            .await
            .expect("draft");

        assert_eq!(updated.draft_state, DraftState::Completed);
        assert!(updated.draft_job_id.is_none());
        let items =
            repositories::line_item::list_for_quote(&pool, &quote.id).await.expect("list");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "suggested pump");
    }

    #[tokio::test]
    async fn queued_job_round_trips_through_completion() {
        let generator = Arc::new(QueuedDraftGenerator::default());
        let (pool, service, quote) = setup(generator.clone()).await;

        let pending = service
            .request_draft(&quote.id, "three pumps", &DraftContext::default())
            .await
            .expect("queue");
        assert_eq!(pending.draft_state, DraftState::Pending);
        let job = DraftJobId(pending.draft_job_id.clone().expect("job id"));

        let completed = service
            .complete_draft(
                &quote.id,
                &job,
                vec![LineItemDraft::simple("pump", Decimal::from(3), Decimal::from(150), Decimal::from(20))],
            )
            .await
            .expect("complete");

        assert_eq!(completed.draft_state, DraftState::Completed);
        let items =
            repositories::line_item::list_for_quote(&pool, &quote.id).await.expect("list");
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn callback_with_wrong_job_id_is_rejected() {
        let generator = Arc::new(QueuedDraftGenerator::default());
        let (_pool, service, quote) = setup(generator).await;
        service
            .request_draft(&quote.id, "three pumps", &DraftContext::default())
            .await
            .expect("queue");

        let error = service
            .complete_draft(&quote.id, &DraftJobId("other-job".to_string()), Vec::new())
            .await
            .expect_err("wrong job");
        assert!(matches!(error.engine(), Some(EngineError::Validation(_))));
    }

    #[tokio::test]
    async fn generator_failure_marks_failed_without_erroring() {
        let (pool, service, quote) = setup(Arc::new(BrokenGenerator)).await;

        let updated = service
            .request_draft(&quote.id, "anything", &DraftContext::default())
            .await
            .expect("request survives");

        assert_eq!(updated.draft_state, DraftState::Failed);
        let items =
            repositories::line_item::list_for_quote(&pool, &quote.id).await.expect("list");
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn cancel_discards_the_job_and_resets_the_marker() {
        let generator = Arc::new(QueuedDraftGenerator::default());
        let (_pool, service, quote) = setup(generator.clone()).await;
        service
            .request_draft(&quote.id, "three pumps", &DraftContext::default())
            .await
            .expect("queue");
        assert_eq!(generator.pending_jobs().len(), 1);

        let reset = service.cancel_draft(&quote.id).await.expect("cancel");

        assert_eq!(reset.draft_state, DraftState::None);
        assert!(reset.draft_job_id.is_none());
        assert!(generator.pending_jobs().is_empty());

        let error = service.cancel_draft(&quote.id).await.expect_err("nothing pending");
        assert!(matches!(error.engine(), Some(EngineError::Validation(_))));
    }

    #[tokio::test]
    async fn locked_quote_rejects_draft_requests() {
        let (pool, service, mut quote) = setup(Arc::new(InlineGenerator)).await;
        quote.status = QuoteStatus::Sent;
        repositories::quote::update_guarded(&pool, &quote, QuoteStatus::Draft)
            .await
            .expect("mark sent");

        let error = service
            .request_draft(&quote.id, "anything", &DraftContext::default())
            .await
            .expect_err("locked");
        assert!(matches!(
            error.engine(),
            Some(EngineError::LockedForEditing(QuoteStatus::Sent))
        ));
    }
}
