use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use quoteflow_core::collab::{BillingDefaults, CustomerDirectory};
use quoteflow_core::domain::line_item::LineItem;
use quoteflow_core::domain::order::{
    CustomerOrder, CustomerOrderId, OrderStatus, PurchaseOrderId, PurchaseOrderStatus,
    SupplierPurchaseOrder,
};
use quoteflow_core::domain::quote::QuoteId;
use quoteflow_core::errors::EngineError;
use quoteflow_core::pricing::billable_items;
use quoteflow_core::workflow::log::WorkflowLogEntry;
use quoteflow_core::workflow::machine::{plan_transition, GuardContext, WorkflowAction};

use super::ServiceError;
use crate::repositories::RepositoryError;
use crate::{repositories, DbPool};

#[derive(Clone, Debug)]
pub struct ConversionOutcome {
    pub order: CustomerOrder,
    pub purchase_orders: Vec<SupplierPurchaseOrder>,
    /// `false` when the quote was already converted and the stored order was
    /// returned unchanged.
    pub created: bool,
}

#[derive(Clone)]
pub struct ConversionService {
    pool: DbPool,
    directory: Arc<dyn CustomerDirectory>,
}

impl ConversionService {
    pub fn new(pool: DbPool, directory: Arc<dyn CustomerDirectory>) -> Self {
        Self { pool, directory }
    }

    /// Convert an accepted quote into a customer order plus one purchase
    /// order per distinct supplier among the billable items. Idempotent: a
    /// repeat call returns the stored order. Mid-flight failures roll back
    /// and surface as a retryable error.
    pub async fn convert_to_order(
        &self,
        quote_id: &QuoteId,
        po_number: Option<String>,
        actor_id: &str,
    ) -> Result<ConversionOutcome, ServiceError> {
        if let Some(existing) = repositories::order::fetch_order_by_quote(&self.pool, quote_id)
            .await?
        {
            let purchase_orders =
                repositories::order::list_purchase_orders_for_order(&self.pool, &existing.id)
                    .await?;
            return Ok(ConversionOutcome { order: existing, purchase_orders, created: false });
        }

        let quote = repositories::quote::fetch(&self.pool, quote_id)
            .await?
            .ok_or_else(|| EngineError::QuoteNotFound(quote_id.0.clone()))?;

        // CRM lookup happens before the transaction opens; a slow or dead
        // directory must not hold a write lock.
        let defaults = self
            .directory
            .billing_defaults(&quote.customer_id)
            .await
            .map_err(|error| EngineError::Conversion(format!("customer lookup failed: {error}")))?
            .unwrap_or_default();

        let mut tx = self.pool.begin().await?;

        // Re-check under the transaction; another caller may have finished
        // converting while we were talking to the CRM.
        if let Some(existing) =
            repositories::order::fetch_order_by_quote(&mut *tx, quote_id).await?
        {
            let purchase_orders =
                repositories::order::list_purchase_orders_for_order(&mut *tx, &existing.id)
                    .await?;
            return Ok(ConversionOutcome { order: existing, purchase_orders, created: false });
        }

        let mut quote = repositories::quote::fetch(&mut *tx, quote_id)
            .await?
            .ok_or_else(|| EngineError::QuoteNotFound(quote_id.0.clone()))?;
        let plan = plan_transition(
            quote.status,
            WorkflowAction::ConvertToOrder,
            &GuardContext::default(),
        )?;

        let items = repositories::line_item::list_for_quote(&mut *tx, quote_id).await?;
        let (billable, _) = billable_items(&items);

        let order = build_order(&quote.id, quote.totals.total_amount, po_number, &defaults, &billable)
            .map_err(ServiceError::Engine)?;
        let purchase_orders = build_purchase_orders(&order.id, &billable);

        repositories::order::insert_order(&mut *tx, &order).await.map_err(as_conversion)?;
        for purchase_order in &purchase_orders {
            repositories::order::insert_purchase_order(&mut *tx, purchase_order)
                .await
                .map_err(as_conversion)?;
        }

        let from = quote.status;
        quote.status = plan.to;
        quote.updated_at = Utc::now();
        if !repositories::quote::update_guarded(&mut *tx, &quote, from).await? {
            let actual = repositories::quote::fetch(&mut *tx, quote_id)
                .await?
                .map(|current| current.status)
                .unwrap_or(from);
            return Err(EngineError::Conflict { expected: from, actual }.into());
        }

        let entry = WorkflowLogEntry::record(
            quote.id.clone(),
            Some(from),
            plan.to,
            WorkflowAction::ConvertToOrder,
            actor_id,
        )
        .with_metadata("order_id", order.id.0.clone());
        repositories::workflow_log::append(&mut *tx, &entry).await?;

        tx.commit().await?;

        tracing::info!(
            event_name = "conversion.completed",
            quote_id = %quote.id.0,
            order_id = %order.id.0,
            purchase_order_count = purchase_orders.len(),
        );

        Ok(ConversionOutcome { order, purchase_orders, created: true })
    }
}

fn build_order(
    quote_id: &QuoteId,
    total_amount: Decimal,
    po_number: Option<String>,
    defaults: &BillingDefaults,
    billable: &[&LineItem],
) -> Result<CustomerOrder, EngineError> {
    let items_snapshot = serde_json::to_string(billable)
        .map_err(|error| EngineError::Conversion(format!("snapshot serialization: {error}")))?;

    Ok(CustomerOrder {
        id: CustomerOrderId(Uuid::new_v4().to_string()),
        quote_id: quote_id.clone(),
        order_number: format!("SO-{}", &Uuid::new_v4().simple().to_string()[..8]),
        po_number,
        status: OrderStatus::Pending,
        billing_address: defaults.billing_address.clone(),
        shipping_address: defaults.shipping_address.clone(),
        payment_terms: defaults.payment_terms.clone(),
        total_amount,
        items_snapshot,
        created_at: Utc::now(),
    })
}

/// One purchase order per distinct supplier, summing margin-free cost over
/// that supplier's billable items. Internal items (no supplier) never create
/// procurement.
fn build_purchase_orders(
    order_id: &CustomerOrderId,
    billable: &[&LineItem],
) -> Vec<SupplierPurchaseOrder> {
    let mut costs_by_supplier: BTreeMap<String, Decimal> = BTreeMap::new();
    for item in billable {
        if let Some(supplier) = &item.supplier_id {
            *costs_by_supplier.entry(supplier.0.clone()).or_insert(Decimal::ZERO) +=
                item.cost_total();
        }
    }

    costs_by_supplier
        .into_iter()
        .map(|(supplier, total_cost)| SupplierPurchaseOrder {
            id: PurchaseOrderId(Uuid::new_v4().to_string()),
            customer_order_id: order_id.clone(),
            supplier_id: quoteflow_core::domain::line_item::SupplierId(supplier),
            status: PurchaseOrderStatus::Draft,
            expected_date: None,
            total_cost,
            created_at: Utc::now(),
        })
        .collect()
}

fn as_conversion(error: RepositoryError) -> ServiceError {
    ServiceError::Engine(EngineError::Conversion(error.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use quoteflow_core::collab::{
        BillingDefaults, CollaboratorError, CustomerDirectory, StaticCustomerDirectory,
    };
    use quoteflow_core::domain::line_item::{LineItemDraft, SupplierId};
    use quoteflow_core::domain::quote::{CustomerId, Quote, QuoteStatus, TenantId};
    use quoteflow_core::errors::EngineError;
    use quoteflow_core::ledger::ItemBounds;
    use quoteflow_core::policy::ReviewPolicy;
    use quoteflow_core::rust_decimal::Decimal;
    use quoteflow_core::workflow::machine::WorkflowAction;

    use super::ConversionService;
    use crate::services::{
        BulkSetItems, LedgerService, QuoteService, TransitionRequest, WorkflowService,
    };
    use crate::{connect_with_settings, migrations, repositories};

    struct Harness {
        pool: crate::DbPool,
        quotes: QuoteService,
        ledger: LedgerService,
        workflow: WorkflowService,
    }

    async fn harness() -> Harness {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        Harness {
            quotes: QuoteService::new(pool.clone()),
            ledger: LedgerService::new(pool.clone(), ItemBounds::default()),
            workflow: WorkflowService::new(pool.clone(), ReviewPolicy::default()),
            pool,
        }
    }

    fn directory() -> Arc<StaticCustomerDirectory> {
        Arc::new(StaticCustomerDirectory::with_defaults([(
            CustomerId("c-1".to_string()),
            BillingDefaults {
                billing_address: Some("12 Main St".to_string()),
                shipping_address: Some("40 Dock Rd".to_string()),
                payment_terms: Some("net30".to_string()),
            },
        )]))
    }

    fn supplier_item(description: &str, supplier: &str, quantity: i64, cost: i64) -> LineItemDraft {
        let mut item = LineItemDraft::simple(
            description,
            Decimal::from(quantity),
            Decimal::from(cost),
            Decimal::from(25),
        );
        item.supplier_id = Some(SupplierId(supplier.to_string()));
        item
    }

    async fn accepted_quote(harness: &Harness, items: Vec<LineItemDraft>) -> Quote {
        let quote = harness
            .quotes
            .create_quote(
                TenantId("t-1".to_string()),
                CustomerId("c-1".to_string()),
                None,
                true,
                "U-1",
            )
            .await
            .expect("create");
        harness
            .ledger
            .bulk_set_items(BulkSetItems {
                quote_id: quote.id.clone(),
                items,
                tax_rate: None,
                discount_amount: None,
            })
            .await
            .expect("items");
        harness
            .workflow
            .transition(TransitionRequest::new(quote.id.clone(), WorkflowAction::Send, "U-1"))
            .await
            .expect("send");
        harness
            .workflow
            .transition(TransitionRequest::new(quote.id.clone(), WorkflowAction::Accept, "U-1"))
            .await
            .expect("accept")
    }

    #[tokio::test]
    async fn conversion_creates_order_and_one_po_per_supplier() {
        let harness = harness().await;
        let quote = accepted_quote(
            &harness,
            vec![
                supplier_item("pipe", "sup-a", 10, 4),
                supplier_item("fittings", "sup-a", 2, 15),
                supplier_item("pump", "sup-b", 1, 300),
                LineItemDraft::simple("labor", Decimal::from(8), Decimal::from(60), Decimal::from(40)),
            ],
        )
        .await;
        let service = ConversionService::new(harness.pool.clone(), directory());

        let outcome = service
            .convert_to_order(&quote.id, Some("PO-55".to_string()), "U-1")
            .await
            .expect("convert");

        assert!(outcome.created);
        assert_eq!(outcome.order.po_number.as_deref(), Some("PO-55"));
        assert_eq!(outcome.order.billing_address.as_deref(), Some("12 Main St"));
        assert_eq!(outcome.order.payment_terms.as_deref(), Some("net30"));

        // Only the two real suppliers get purchase orders; internal labor
        // does not.
        assert_eq!(outcome.purchase_orders.len(), 2);
        assert_eq!(outcome.purchase_orders[0].supplier_id.0, "sup-a");
        assert_eq!(outcome.purchase_orders[0].total_cost, Decimal::from(70));
        assert_eq!(outcome.purchase_orders[1].supplier_id.0, "sup-b");
        assert_eq!(outcome.purchase_orders[1].total_cost, Decimal::from(300));

        let stored = repositories::quote::fetch(&harness.pool, &quote.id)
            .await
            .expect("fetch")
            .expect("present");
        assert_eq!(stored.status, QuoteStatus::Converted);
    }

    #[tokio::test]
    async fn po_totals_reconcile_with_billable_supplier_cost() {
        let harness = harness().await;
        let mut optional = supplier_item("spare kit", "sup-a", 1, 50);
        optional.is_optional = true;
        let quote = accepted_quote(
            &harness,
            vec![supplier_item("pipe", "sup-a", 10, 4), optional],
        )
        .await;
        let service = ConversionService::new(harness.pool.clone(), directory());

        let outcome = service.convert_to_order(&quote.id, None, "U-1").await.expect("convert");

        // The unselected optional is not billable, so its cost never reaches
        // procurement.
        assert_eq!(outcome.purchase_orders.len(), 1);
        assert_eq!(outcome.purchase_orders[0].total_cost, Decimal::from(40));
    }

    #[tokio::test]
    async fn repeat_conversion_returns_the_stored_order_unchanged() {
        let harness = harness().await;
        let quote =
            accepted_quote(&harness, vec![supplier_item("pump", "sup-b", 1, 300)]).await;
        let service = ConversionService::new(harness.pool.clone(), directory());

        let first = service.convert_to_order(&quote.id, None, "U-1").await.expect("first");
        let second = service.convert_to_order(&quote.id, None, "U-1").await.expect("second");

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(second.order.id, first.order.id);
        assert_eq!(second.order.order_number, first.order.order_number);
        assert_eq!(second.purchase_orders.len(), first.purchase_orders.len());

        // Exactly one conversion log entry despite two calls.
        let log = harness.quotes.workflow_log(&quote.id).await.expect("log");
        let conversions =
            log.iter().filter(|entry| entry.action == WorkflowAction::ConvertToOrder).count();
        assert_eq!(conversions, 1);
    }

    #[tokio::test]
    async fn unaccepted_quote_cannot_convert() {
        let harness = harness().await;
        let quote = harness
            .quotes
            .create_quote(
                TenantId("t-1".to_string()),
                CustomerId("c-1".to_string()),
                None,
                true,
                "U-1",
            )
            .await
            .expect("create");
        let service = ConversionService::new(harness.pool.clone(), directory());

        let error = service.convert_to_order(&quote.id, None, "U-1").await.expect_err("draft");
        assert!(matches!(error.engine(), Some(EngineError::InvalidTransition { .. })));
    }

    struct DeadDirectory;

    #[async_trait]
    impl CustomerDirectory for DeadDirectory {
        async fn billing_defaults(
            &self,
            _customer_id: &CustomerId,
        ) -> Result<Option<BillingDefaults>, CollaboratorError> {
            Err(CollaboratorError::Unavailable("crm timeout".to_string()))
        }
    }

    #[tokio::test]
    async fn crm_failure_is_retryable_and_leaves_the_quote_accepted() {
        let harness = harness().await;
        let quote =
            accepted_quote(&harness, vec![supplier_item("pump", "sup-b", 1, 300)]).await;
        let service = ConversionService::new(harness.pool.clone(), Arc::new(DeadDirectory));

        let error = service.convert_to_order(&quote.id, None, "U-1").await.expect_err("crm down");
        assert!(matches!(error.engine(), Some(EngineError::Conversion(_))));
        assert!(error.engine().expect("engine error").is_retryable());

        let stored = repositories::quote::fetch(&harness.pool, &quote.id)
            .await
            .expect("fetch")
            .expect("present");
        assert_eq!(stored.status, QuoteStatus::Accepted);
        assert!(
            repositories::order::fetch_order_by_quote(&harness.pool, &quote.id)
                .await
                .expect("lookup")
                .is_none()
        );

        // A later retry with a healthy directory succeeds.
        let healthy = ConversionService::new(harness.pool.clone(), directory());
        let outcome = healthy.convert_to_order(&quote.id, None, "U-1").await.expect("retry");
        assert!(outcome.created);
    }

    #[tokio::test]
    async fn unknown_customer_still_converts_without_billing_defaults() {
        let harness = harness().await;
        let quote =
            accepted_quote(&harness, vec![supplier_item("pump", "sup-b", 1, 300)]).await;
        let empty_directory = Arc::new(StaticCustomerDirectory::default());
        let service = ConversionService::new(harness.pool.clone(), empty_directory);

        let outcome = service.convert_to_order(&quote.id, None, "U-1").await.expect("convert");

        assert!(outcome.created);
        assert!(outcome.order.billing_address.is_none());
        assert!(outcome.order.payment_terms.is_none());
    }
}
