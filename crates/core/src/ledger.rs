//! Validation and materialization of bulk line-item payloads.
//!
//! The ledger is replaced wholesale: the caller submits every item for the
//! quote version in one payload and either all of them validate or none are
//! persisted. Bundle references are intra-payload (`ref_key` /
//! `bundle_parent_ref`) because the replacement mints fresh identities.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::line_item::{LineItem, LineItemDraft, LineItemId};
use crate::domain::quote::QuoteId;
use crate::errors::EngineError;

/// Configured bounds for per-item validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemBounds {
    pub margin_min_percent: Decimal,
    pub margin_max_percent: Decimal,
    pub tax_rate_max: Decimal,
}

impl Default for ItemBounds {
    fn default() -> Self {
        Self {
            margin_min_percent: Decimal::ZERO,
            margin_max_percent: Decimal::from(500),
            tax_rate_max: Decimal::ONE,
        }
    }
}

/// Validate the payload and mint persisted items for `quote_id`. Display
/// order follows payload order. Any violation rejects the whole payload
/// before a single row is written.
pub fn materialize_items(
    quote_id: &QuoteId,
    drafts: &[LineItemDraft],
    bounds: &ItemBounds,
) -> Result<Vec<LineItem>, EngineError> {
    let violations = validate(drafts, bounds);
    if !violations.is_empty() {
        return Err(EngineError::Validation(violations.join("; ")));
    }

    let mut ids_by_ref: HashMap<&str, LineItemId> = HashMap::new();
    let mut minted: Vec<LineItemId> = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let id = LineItemId(Uuid::new_v4().to_string());
        if let Some(ref_key) = draft.ref_key.as_deref() {
            ids_by_ref.insert(ref_key, id.clone());
        }
        minted.push(id);
    }

    let items = drafts
        .iter()
        .zip(minted)
        .enumerate()
        .map(|(index, (draft, id))| LineItem {
            id,
            quote_id: quote_id.clone(),
            item_type: draft.item_type,
            description: draft.description.clone(),
            unit_type: draft.unit_type.clone(),
            quantity: draft.quantity,
            unit_cost: draft.unit_cost,
            margin_percent: draft.margin_percent,
            tax_rate: draft.tax_rate,
            supplier_id: draft.supplier_id.clone(),
            section_name: draft.section_name.clone(),
            is_optional: draft.is_optional,
            is_selected: draft.is_selected,
            is_alternate: draft.is_alternate,
            alternate_group: draft.alternate_group.clone(),
            bundle_parent_id: draft
                .bundle_parent_ref
                .as_deref()
                .and_then(|parent_ref| ids_by_ref.get(parent_ref).cloned()),
            display_order: index as i64,
            metadata: draft.metadata.clone(),
        })
        .collect();

    Ok(items)
}

fn validate(drafts: &[LineItemDraft], bounds: &ItemBounds) -> Vec<String> {
    let mut violations = Vec::new();

    let mut ref_keys: HashSet<&str> = HashSet::new();
    let mut parent_refs: HashMap<&str, &LineItemDraft> = HashMap::new();
    for draft in drafts {
        if let Some(ref_key) = draft.ref_key.as_deref() {
            if !ref_keys.insert(ref_key) {
                violations.push(format!("duplicate ref_key `{ref_key}`"));
            }
            parent_refs.insert(ref_key, draft);
        }
    }

    for (index, draft) in drafts.iter().enumerate() {
        let label = if draft.description.is_empty() {
            format!("item #{index}")
        } else {
            format!("`{}`", draft.description)
        };

        if draft.quantity <= Decimal::ZERO {
            violations.push(format!("{label}: quantity must be greater than zero"));
        }
        if draft.unit_cost < Decimal::ZERO {
            violations.push(format!("{label}: unit cost cannot be negative"));
        }
        if draft.margin_percent < bounds.margin_min_percent
            || draft.margin_percent > bounds.margin_max_percent
        {
            violations.push(format!(
                "{label}: margin {}% outside configured bounds [{}%, {}%]",
                draft.margin_percent, bounds.margin_min_percent, bounds.margin_max_percent,
            ));
        }
        if let Some(tax_rate) = draft.tax_rate {
            if tax_rate < Decimal::ZERO || tax_rate > bounds.tax_rate_max {
                violations.push(format!("{label}: tax rate {tax_rate} outside [0, {}]",
                    bounds.tax_rate_max));
            }
        }
        if draft.is_alternate != draft.alternate_group.is_some() {
            violations.push(format!(
                "{label}: is_alternate and alternate_group must be set together"
            ));
        }

        if let Some(parent_ref) = draft.bundle_parent_ref.as_deref() {
            if draft.ref_key.as_deref() == Some(parent_ref) {
                violations.push(format!("{label}: bundle parent cannot reference itself"));
            } else {
                match parent_refs.get(parent_ref) {
                    None => violations.push(format!(
                        "{label}: bundle_parent_ref `{parent_ref}` does not match any item in the payload"
                    )),
                    // Depth > 1 is rejected outright, so no cycle detection
                    // is ever needed.
                    Some(parent) if parent.bundle_parent_ref.is_some() => {
                        violations.push(format!(
                            "{label}: bundle parent `{parent_ref}` is itself a bundle child (max depth is 1)"
                        ));
                    }
                    Some(_) => {}
                }
            }
        }
    }

    violations
}
