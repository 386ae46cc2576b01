//! Demo dataset for local development and the CLI `seed` command. Everything
//! goes through the regular services so the seeded rows obey the same
//! invariants as production writes.

use rust_decimal::Decimal;

use quoteflow_core::domain::line_item::{LineItemDraft, SupplierId};
use quoteflow_core::domain::quote::{CustomerId, QuoteId, TenantId};
use quoteflow_core::ledger::ItemBounds;

use crate::services::{BulkSetItems, LedgerService, QuoteService, ServiceError};
use crate::DbPool;

#[derive(Clone, Debug)]
pub struct SeedResult {
    pub quote_id: QuoteId,
    pub item_count: usize,
    pub total_amount: Decimal,
}

pub async fn seed_demo_dataset(pool: &DbPool) -> Result<SeedResult, ServiceError> {
    let quotes = QuoteService::new(pool.clone());
    let ledger = LedgerService::new(pool.clone(), ItemBounds::default());

    let quote = quotes
        .create_quote(
            TenantId("demo-tenant".to_string()),
            CustomerId("demo-customer".to_string()),
            None,
            true,
            "seed",
        )
        .await?;

    let mut panel = LineItemDraft::simple(
        "control panel",
        Decimal::ONE,
        Decimal::from(850),
        Decimal::from(30),
    );
    panel.supplier_id = Some(SupplierId("demo-supplier".to_string()));
    panel.ref_key = Some("panel".to_string());

    let mut breakers = LineItemDraft::simple(
        "breaker set",
        Decimal::from(6),
        Decimal::from(42),
        Decimal::from(30),
    );
    breakers.supplier_id = Some(SupplierId("demo-supplier".to_string()));
    breakers.bundle_parent_ref = Some("panel".to_string());

    let labor = LineItemDraft::simple(
        "installation labor",
        Decimal::from(12),
        Decimal::from(75),
        Decimal::from(45),
    );

    let mut extended_warranty = LineItemDraft::simple(
        "extended warranty",
        Decimal::ONE,
        Decimal::from(120),
        Decimal::from(60),
    );
    extended_warranty.is_optional = true;

    let items = vec![panel, breakers, labor, extended_warranty];
    let item_count = items.len();
    let breakdown = ledger
        .bulk_set_items(BulkSetItems {
            quote_id: quote.id.clone(),
            items,
            tax_rate: Some(Decimal::new(825, 4)),
            discount_amount: None,
        })
        .await?;

    Ok(SeedResult {
        quote_id: quote.id,
        item_count,
        total_amount: breakdown.totals.total_amount,
    })
}
