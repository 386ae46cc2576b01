use quoteflow_core::collab::QuoteSnapshot;
use quoteflow_core::domain::quote::{CustomerId, Quote, QuoteId, TenantId};
use quoteflow_core::errors::EngineError;
use quoteflow_core::workflow::log::WorkflowLogEntry;

use super::ServiceError;
use crate::{repositories, DbPool};

const DEFAULT_CURRENCY: &str = "USD";

#[derive(Clone)]
pub struct QuoteService {
    pool: DbPool,
}

impl QuoteService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Creation is not a workflow transition: the quote appears in `draft`
    /// with no log entry, and the log stays empty until the first action.
    pub async fn create_quote(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
        currency: Option<String>,
        manual_mode: bool,
        actor_id: &str,
    ) -> Result<Quote, ServiceError> {
        let currency = currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(EngineError::Validation(format!(
                "currency must be a 3-letter uppercase code, got `{currency}`"
            ))
            .into());
        }

        let quote = Quote::new_draft(tenant_id, customer_id, currency, manual_mode, actor_id);
        repositories::quote::insert(&self.pool, &quote).await?;

        tracing::info!(
            event_name = "quote.created",
            quote_id = %quote.id.0,
            tenant_id = %quote.tenant_id.0,
            manual_mode = quote.manual_mode,
        );

        Ok(quote)
    }

    pub async fn get(&self, id: &QuoteId) -> Result<QuoteSnapshot, ServiceError> {
        let quote = repositories::quote::fetch(&self.pool, id)
            .await?
            .ok_or_else(|| EngineError::QuoteNotFound(id.0.clone()))?;
        let items = repositories::line_item::list_for_quote(&self.pool, id).await?;

        Ok(QuoteSnapshot { quote, items })
    }

    pub async fn workflow_log(&self, id: &QuoteId) -> Result<Vec<WorkflowLogEntry>, ServiceError> {
        // 404 for unknown quotes rather than an empty log.
        repositories::quote::fetch(&self.pool, id)
            .await?
            .ok_or_else(|| EngineError::QuoteNotFound(id.0.clone()))?;

        Ok(repositories::workflow_log::list_for_quote(&self.pool, id).await?)
    }
}

#[cfg(test)]
mod tests {
    use quoteflow_core::domain::quote::{CustomerId, QuoteId, QuoteStatus, TenantId};
    use quoteflow_core::errors::EngineError;

    use super::QuoteService;
    use crate::{connect_with_settings, migrations};

    async fn service() -> QuoteService {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        QuoteService::new(pool)
    }

    fn tenant() -> TenantId {
        TenantId("t-1".to_string())
    }

    fn customer() -> CustomerId {
        CustomerId("c-1".to_string())
    }

    #[tokio::test]
    async fn created_quote_is_a_v1_draft_with_empty_log() {
        let service = service().await;
        let quote = service
            .create_quote(tenant(), customer(), None, true, "U-1")
            .await
            .expect("create");

        assert_eq!(quote.status, QuoteStatus::Draft);
        assert_eq!(quote.version_number, 1);
        assert_eq!(quote.currency, "USD");

        let snapshot = service.get(&quote.id).await.expect("get");
        assert!(snapshot.items.is_empty());
        assert!(service.workflow_log(&quote.id).await.expect("log").is_empty());
    }

    #[tokio::test]
    async fn invalid_currency_is_rejected() {
        let service = service().await;
        let error = service
            .create_quote(tenant(), customer(), Some("usd".to_string()), true, "U-1")
            .await
            .expect_err("lowercase currency");
        assert!(matches!(error.engine(), Some(EngineError::Validation(_))));
    }

    #[tokio::test]
    async fn unknown_quote_maps_to_not_found() {
        let service = service().await;
        let missing = QuoteId("missing".to_string());

        let error = service.get(&missing).await.expect_err("get missing");
        assert!(matches!(error.engine(), Some(EngineError::QuoteNotFound(_))));

        let error = service.workflow_log(&missing).await.expect_err("log missing");
        assert!(matches!(error.engine(), Some(EngineError::QuoteNotFound(_))));
    }
}
