use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use quoteflow_core::domain::line_item::LineItemId;
use quoteflow_core::domain::quote::{Quote, QuoteId};
use quoteflow_core::errors::EngineError;
use quoteflow_core::workflow::log::WorkflowLogEntry;
use quoteflow_core::workflow::machine::{plan_transition, GuardContext, WorkflowAction};

use super::ServiceError;
use crate::{repositories, DbPool};

#[derive(Clone)]
pub struct VersioningService {
    pool: DbPool,
}

impl VersioningService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Amend a sent or accepted quote: mint the next version as an editable
    /// draft with a deep copy of the ledger and documents, and supersede the
    /// parent. One transaction covers both quotes, so a failure anywhere
    /// leaves the chain exactly as it was.
    pub async fn amend(&self, quote_id: &QuoteId, actor_id: &str) -> Result<Quote, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let mut parent = repositories::quote::fetch(&mut *tx, quote_id)
            .await?
            .ok_or_else(|| EngineError::QuoteNotFound(quote_id.0.clone()))?;
        let has_child =
            repositories::quote::fetch_child_id(&mut *tx, quote_id).await?.is_some();

        let ctx = GuardContext { has_child_version: has_child, ..GuardContext::default() };
        let plan = plan_transition(parent.status, WorkflowAction::Amend, &ctx)?;

        let child = parent.next_version();
        repositories::quote::insert(&mut *tx, &child).await?;

        // Deep-copy the ledger with fresh identities, keeping bundle edges
        // pointed at the copied parents.
        let items = repositories::line_item::list_for_quote(&mut *tx, quote_id).await?;
        let mut copied_ids: HashMap<&LineItemId, LineItemId> = HashMap::with_capacity(items.len());
        for item in &items {
            copied_ids.insert(&item.id, LineItemId(Uuid::new_v4().to_string()));
        }
        for item in &items {
            let mut copy = item.clone();
            copy.id = copied_ids[&item.id].clone();
            copy.quote_id = child.id.clone();
            copy.bundle_parent_id = item
                .bundle_parent_id
                .as_ref()
                .and_then(|parent_id| copied_ids.get(parent_id).cloned());
            repositories::line_item::insert(&mut *tx, &copy).await?;
        }

        for document in repositories::document::list_for_quote(&mut *tx, quote_id).await? {
            repositories::document::insert(&mut *tx, &document.cloned_for(child.id.clone()))
                .await?;
        }

        let from = parent.status;
        parent.status = plan.to;
        parent.updated_at = Utc::now();
        if !repositories::quote::update_guarded(&mut *tx, &parent, from).await? {
            let actual = repositories::quote::fetch(&mut *tx, quote_id)
                .await?
                .map(|current| current.status)
                .unwrap_or(from);
            return Err(EngineError::Conflict { expected: from, actual }.into());
        }

        let parent_entry = WorkflowLogEntry::record(
            parent.id.clone(),
            Some(from),
            plan.to,
            WorkflowAction::Amend,
            actor_id,
        )
        .with_metadata("superseded_by", child.id.0.clone());
        repositories::workflow_log::append(&mut *tx, &parent_entry).await?;

        let child_entry = WorkflowLogEntry::record(
            child.id.clone(),
            None,
            child.status,
            WorkflowAction::Amend,
            actor_id,
        )
        .with_metadata("amended_from", parent.id.0.clone());
        repositories::workflow_log::append(&mut *tx, &child_entry).await?;

        tx.commit().await?;

        tracing::info!(
            event_name = "versioning.amended",
            parent_quote_id = %parent.id.0,
            child_quote_id = %child.id.0,
            version_number = child.version_number,
        );

        Ok(child)
    }
}
