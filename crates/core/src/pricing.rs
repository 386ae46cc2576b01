//! Pure totals computation over a quote's line items.
//!
//! Selection rules, applied in order:
//! 1. Optional items count only when explicitly selected (`is_selected`).
//! 2. Within an `alternate_group`, the billable item is the one flagged
//!    `is_selected` when exactly one is; otherwise the lowest extended
//!    price wins, ties broken by lowest `display_order`.
//! 3. Bundle membership never changes billing: children price
//!    independently of their parent, the grouping is presentation only.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::line_item::{LineItem, LineItemId};
use crate::domain::quote::QuoteTotals;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    OptionalNotSelected,
    AlternateNotChosen,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedItem {
    pub id: LineItemId,
    pub extended_price: Decimal,
    pub tax_amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub totals: QuoteTotals,
    pub billable: Vec<PricedItem>,
    pub excluded: Vec<(LineItemId, ExclusionReason)>,
}

/// Partition the item set into billable items and excluded ones, applying
/// the optional and alternate-group rules. Input order is preserved for the
/// billable side.
pub fn billable_items(items: &[LineItem]) -> (Vec<&LineItem>, Vec<(LineItemId, ExclusionReason)>) {
    let mut excluded = Vec::new();

    let mut candidates: Vec<&LineItem> = Vec::with_capacity(items.len());
    for item in items {
        if item.is_optional && !item.is_selected {
            excluded.push((item.id.clone(), ExclusionReason::OptionalNotSelected));
        } else {
            candidates.push(item);
        }
    }

    // Resolve one winner per alternate group among the surviving candidates.
    let mut winners: BTreeMap<&str, &LineItem> = BTreeMap::new();
    for &item in &candidates {
        if let Some(group) = alternate_group_of(item) {
            winners
                .entry(group)
                .and_modify(|incumbent| {
                    if prefer(item, incumbent) {
                        *incumbent = item;
                    }
                })
                .or_insert(item);
        }
    }

    let mut billable = Vec::with_capacity(candidates.len());
    for item in candidates {
        match alternate_group_of(item) {
            Some(group) if !std::ptr::eq(winners[group], item) => {
                excluded.push((item.id.clone(), ExclusionReason::AlternateNotChosen));
            }
            _ => billable.push(item),
        }
    }

    (billable, excluded)
}

fn alternate_group_of(item: &LineItem) -> Option<&str> {
    if item.is_alternate {
        item.alternate_group.as_deref()
    } else {
        None
    }
}

fn prefer(challenger: &LineItem, incumbent: &LineItem) -> bool {
    match (challenger.is_selected, incumbent.is_selected) {
        (true, false) => true,
        (false, true) => false,
        _ => {
            let challenger_key = (challenger.extended_price(), challenger.display_order);
            let incumbent_key = (incumbent.extended_price(), incumbent.display_order);
            challenger_key < incumbent_key
        }
    }
}

pub fn compute_totals(
    items: &[LineItem],
    quote_tax_rate: Decimal,
    discount_amount: Decimal,
) -> PricingBreakdown {
    let (billable, excluded) = billable_items(items);

    let mut subtotal = Decimal::ZERO;
    let mut tax_total = Decimal::ZERO;
    let mut priced = Vec::with_capacity(billable.len());

    for item in billable {
        let extended_price = item.extended_price();
        let tax_amount = item.tax_amount(quote_tax_rate);
        subtotal += extended_price;
        tax_total += tax_amount;
        priced.push(PricedItem { id: item.id.clone(), extended_price, tax_amount });
    }

    PricingBreakdown {
        totals: QuoteTotals {
            subtotal,
            tax_amount: tax_total,
            discount_amount,
            total_amount: subtotal + tax_total - discount_amount,
        },
        billable: priced,
        excluded,
    }
}
