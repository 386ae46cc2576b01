use chrono::Utc;

use quoteflow_core::domain::quote::{Quote, QuoteId, QuoteStatus};
use quoteflow_core::errors::EngineError;
use quoteflow_core::policy::ReviewPolicy;
use quoteflow_core::workflow::log::WorkflowLogEntry;
use quoteflow_core::workflow::machine::{
    plan_transition, GuardContext, LifecycleStamp, WorkflowAction,
};

use super::ServiceError;
use crate::{repositories, DbPool};

/// One workflow action against one quote. `expected_status` is the caller's
/// optimistic-concurrency token: when set, a quote that has moved on is a
/// conflict rather than a silent re-plan.
#[derive(Clone, Debug)]
pub struct TransitionRequest {
    pub quote_id: QuoteId,
    pub action: WorkflowAction,
    pub actor_id: String,
    pub actor_is_approver: bool,
    pub expected_status: Option<QuoteStatus>,
    pub comment: Option<String>,
    pub reason: Option<String>,
}

impl TransitionRequest {
    pub fn new(quote_id: QuoteId, action: WorkflowAction, actor_id: impl Into<String>) -> Self {
        Self {
            quote_id,
            action,
            actor_id: actor_id.into(),
            actor_is_approver: false,
            expected_status: None,
            comment: None,
            reason: None,
        }
    }
}

#[derive(Clone)]
pub struct WorkflowService {
    pool: DbPool,
    review_policy: ReviewPolicy,
}

impl WorkflowService {
    pub fn new(pool: DbPool, review_policy: ReviewPolicy) -> Self {
        Self { pool, review_policy }
    }

    /// Apply one plain lifecycle action: status flip, lifecycle stamp, and
    /// exactly one log entry, all in one transaction. Amend and conversion
    /// have their own services because they write more than the quote row.
    pub async fn transition(&self, request: TransitionRequest) -> Result<Quote, ServiceError> {
        match request.action {
            WorkflowAction::Amend => {
                return Err(EngineError::Validation(
                    "amend is a versioning operation, not a plain transition".to_string(),
                )
                .into());
            }
            WorkflowAction::ConvertToOrder => {
                return Err(EngineError::Validation(
                    "convert_to_order is a conversion operation, not a plain transition"
                        .to_string(),
                )
                .into());
            }
            _ => {}
        }

        let mut tx = self.pool.begin().await?;

        let mut quote = repositories::quote::fetch(&mut *tx, &request.quote_id)
            .await?
            .ok_or_else(|| EngineError::QuoteNotFound(request.quote_id.0.clone()))?;
        if let Some(expected) = request.expected_status {
            if quote.status != expected {
                return Err(EngineError::Conflict { expected, actual: quote.status }.into());
            }
        }

        let ctx = self.guard_context(&mut tx, &quote, &request).await?;
        let plan = plan_transition(quote.status, request.action, &ctx)?;

        let from = quote.status;
        let now = Utc::now();
        quote.status = plan.to;
        if let Some(approval_state) = plan.approval_state {
            quote.approval_state = approval_state;
        }
        match plan.stamp {
            Some(LifecycleStamp::Sent) => quote.sent_at = Some(now),
            Some(LifecycleStamp::Accepted) => quote.accepted_at = Some(now),
            Some(LifecycleStamp::Rejected) => quote.rejected_at = Some(now),
            Some(LifecycleStamp::Cancelled) => {
                quote.cancelled_at = Some(now);
                quote.cancel_reason = request.reason.clone();
            }
            None => {}
        }
        quote.updated_at = now;

        if !repositories::quote::update_guarded(&mut *tx, &quote, from).await? {
            let actual = repositories::quote::fetch(&mut *tx, &quote.id)
                .await?
                .map(|current| current.status)
                .unwrap_or(from);
            return Err(EngineError::Conflict { expected: from, actual }.into());
        }

        let mut entry = WorkflowLogEntry::record(
            quote.id.clone(),
            Some(from),
            plan.to,
            request.action,
            request.actor_id.clone(),
        );
        if let Some(comment) = &request.comment {
            entry = entry.with_comment(comment.clone());
        }
        if let Some(reason) = &request.reason {
            entry = entry.with_metadata("reason", reason.clone());
        }
        repositories::workflow_log::append(&mut *tx, &entry).await?;

        tx.commit().await?;

        tracing::info!(
            event_name = "workflow.transition_applied",
            quote_id = %quote.id.0,
            from = from.as_str(),
            to = plan.to.as_str(),
            action = request.action.as_str(),
            actor_id = %request.actor_id,
        );

        Ok(quote)
    }

    async fn guard_context(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        quote: &Quote,
        request: &TransitionRequest,
    ) -> Result<GuardContext, ServiceError> {
        let item_count = repositories::line_item::count_for_quote(&mut **tx, &quote.id).await?;

        // The review policy only gates the direct draft -> sent shortcut.
        let review_required =
            if quote.status == QuoteStatus::Draft && request.action == WorkflowAction::Send {
                let items = repositories::line_item::list_for_quote(&mut **tx, &quote.id).await?;
                self.review_policy.review_required(&items, quote.totals.total_amount)
            } else {
                false
            };

        Ok(GuardContext {
            item_count: item_count as usize,
            // Totals are recomputed on every ledger mutation, so a non-empty
            // ledger always has a fresh cache.
            totals_computed: item_count > 0,
            review_required,
            actor_is_approver: request.actor_is_approver,
            has_comment: request.comment.as_deref().is_some_and(|c| !c.trim().is_empty()),
            has_reason: request.reason.as_deref().is_some_and(|r| !r.trim().is_empty()),
            has_child_version: false,
        })
    }
}
