use chrono::Utc;
use rust_decimal::Decimal;

use quoteflow_core::domain::line_item::LineItemDraft;
use quoteflow_core::domain::quote::QuoteId;
use quoteflow_core::errors::EngineError;
use quoteflow_core::ledger::{materialize_items, ItemBounds};
use quoteflow_core::pricing::{compute_totals, PricingBreakdown};

use super::ServiceError;
use crate::{repositories, DbPool};

/// Full replacement of a quote version's ledger in one shot. `tax_rate` and
/// `discount_amount` update the quote-level values when present; omitted
/// fields keep their stored values.
#[derive(Clone, Debug)]
pub struct BulkSetItems {
    pub quote_id: QuoteId,
    pub items: Vec<LineItemDraft>,
    pub tax_rate: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
}

#[derive(Clone)]
pub struct LedgerService {
    pool: DbPool,
    bounds: ItemBounds,
}

impl LedgerService {
    pub fn new(pool: DbPool, bounds: ItemBounds) -> Self {
        Self { pool, bounds }
    }

    /// Validate, replace, and reprice atomically. A single invalid item
    /// rejects the whole payload and leaves the stored ledger untouched.
    pub async fn bulk_set_items(
        &self,
        request: BulkSetItems,
    ) -> Result<PricingBreakdown, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let mut quote = repositories::quote::fetch(&mut *tx, &request.quote_id)
            .await?
            .ok_or_else(|| EngineError::QuoteNotFound(request.quote_id.0.clone()))?;
        if !quote.status.is_editable() {
            return Err(EngineError::LockedForEditing(quote.status).into());
        }

        let items = materialize_items(&request.quote_id, &request.items, &self.bounds)?;

        repositories::line_item::delete_for_quote(&mut *tx, &request.quote_id).await?;
        for item in &items {
            repositories::line_item::insert(&mut *tx, item).await?;
        }

        if let Some(tax_rate) = request.tax_rate {
            quote.tax_rate = tax_rate;
        }
        let discount =
            request.discount_amount.unwrap_or(quote.totals.discount_amount);
        let breakdown = compute_totals(&items, quote.tax_rate, discount);

        let expected = quote.status;
        quote.totals = breakdown.totals.clone();
        quote.updated_at = Utc::now();
        if !repositories::quote::update_guarded(&mut *tx, &quote, expected).await? {
            let actual = repositories::quote::fetch(&mut *tx, &quote.id)
                .await?
                .map(|current| current.status)
                .unwrap_or(expected);
            return Err(EngineError::Conflict { expected, actual }.into());
        }

        tx.commit().await?;

        tracing::info!(
            event_name = "ledger.items_replaced",
            quote_id = %quote.id.0,
            item_count = items.len(),
            total_amount = %breakdown.totals.total_amount,
        );

        Ok(breakdown)
    }
}

#[cfg(test)]
mod tests {
    use quoteflow_core::domain::line_item::LineItemDraft;
    use quoteflow_core::domain::quote::{CustomerId, Quote, QuoteStatus, TenantId};
    use quoteflow_core::errors::EngineError;
    use quoteflow_core::ledger::ItemBounds;
    use quoteflow_core::rust_decimal::Decimal;

    use super::{BulkSetItems, LedgerService};
    use crate::{connect_with_settings, migrations, repositories};

    async fn setup() -> (crate::DbPool, LedgerService, Quote) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let quote = Quote::new_draft(
            TenantId("t-1".to_string()),
            CustomerId("c-1".to_string()),
            "USD",
            true,
            "U-1",
        );
        repositories::quote::insert(&pool, &quote).await.expect("insert quote");
        let service = LedgerService::new(pool.clone(), ItemBounds::default());
        (pool, service, quote)
    }

    fn request(quote: &Quote, items: Vec<LineItemDraft>) -> BulkSetItems {
        BulkSetItems {
            quote_id: quote.id.clone(),
            items,
            tax_rate: None,
            discount_amount: None,
        }
    }

    #[tokio::test]
    async fn replacement_persists_items_and_caches_totals() {
        let (pool, service, quote) = setup().await;

        let breakdown = service
            .bulk_set_items(request(
                &quote,
                vec![LineItemDraft::simple(
                    "pump",
                    Decimal::from(2),
                    Decimal::from(10),
                    Decimal::from(20),
                )],
            ))
            .await
            .expect("replace");

        assert_eq!(breakdown.totals.subtotal, Decimal::new(2400, 2));

        let stored = repositories::quote::fetch(&pool, &quote.id)
            .await
            .expect("fetch")
            .expect("present");
        assert_eq!(stored.totals.total_amount, Decimal::new(2400, 2));
        let items = repositories::line_item::list_for_quote(&pool, &quote.id)
            .await
            .expect("list");
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn second_replacement_discards_the_first_ledger() {
        let (pool, service, quote) = setup().await;

        service
            .bulk_set_items(request(
                &quote,
                vec![
                    LineItemDraft::simple("a", Decimal::ONE, Decimal::from(10), Decimal::ZERO),
                    LineItemDraft::simple("b", Decimal::ONE, Decimal::from(20), Decimal::ZERO),
                ],
            ))
            .await
            .expect("first replace");
        service
            .bulk_set_items(request(
                &quote,
                vec![LineItemDraft::simple("c", Decimal::ONE, Decimal::from(5), Decimal::ZERO)],
            ))
            .await
            .expect("second replace");

        let items = repositories::line_item::list_for_quote(&pool, &quote.id)
            .await
            .expect("list");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "c");
        let stored = repositories::quote::fetch(&pool, &quote.id)
            .await
            .expect("fetch")
            .expect("present");
        assert_eq!(stored.totals.subtotal, Decimal::from(5));
    }

    #[tokio::test]
    async fn invalid_payload_leaves_stored_ledger_untouched() {
        let (pool, service, quote) = setup().await;
        service
            .bulk_set_items(request(
                &quote,
                vec![LineItemDraft::simple("keep", Decimal::ONE, Decimal::from(10), Decimal::ZERO)],
            ))
            .await
            .expect("seed ledger");

        let mut bad = LineItemDraft::simple("bad", Decimal::ZERO, Decimal::from(10), Decimal::ZERO);
        bad.quantity = Decimal::ZERO;
        let error = service
            .bulk_set_items(request(&quote, vec![bad]))
            .await
            .expect_err("invalid item");
        assert!(matches!(error.engine(), Some(EngineError::Validation(_))));

        let items = repositories::line_item::list_for_quote(&pool, &quote.id)
            .await
            .expect("list");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "keep");
    }

    #[tokio::test]
    async fn locked_statuses_reject_ledger_mutation() {
        let (pool, service, mut quote) = setup().await;
        quote.status = QuoteStatus::Sent;
        repositories::quote::update_guarded(&pool, &quote, QuoteStatus::Draft)
            .await
            .expect("mark sent");

        let error = service
            .bulk_set_items(request(
                &quote,
                vec![LineItemDraft::simple("x", Decimal::ONE, Decimal::ONE, Decimal::ZERO)],
            ))
            .await
            .expect_err("locked");
        assert!(matches!(
            error.engine(),
            Some(EngineError::LockedForEditing(QuoteStatus::Sent))
        ));
    }

    #[tokio::test]
    async fn tax_and_discount_overrides_apply_to_totals() {
        let (_pool, service, quote) = setup().await;

        let breakdown = service
            .bulk_set_items(BulkSetItems {
                quote_id: quote.id.clone(),
                items: vec![LineItemDraft::simple(
                    "taxed",
                    Decimal::ONE,
                    Decimal::from(100),
                    Decimal::ZERO,
                )],
                tax_rate: Some(Decimal::new(10, 2)),
                discount_amount: Some(Decimal::from(5)),
            })
            .await
            .expect("replace");

        assert_eq!(breakdown.totals.tax_amount, Decimal::from(10));
        assert_eq!(breakdown.totals.total_amount, Decimal::from(105));
    }
}
