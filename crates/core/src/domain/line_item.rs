use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::quote::QuoteId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineItemId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SupplierId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Standard,
    Labor,
    Material,
    Service,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Labor => "labor",
            Self::Material => "material",
            Self::Service => "service",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "standard" => Some(Self::Standard),
            "labor" => Some(Self::Labor),
            "material" => Some(Self::Material),
            "service" => Some(Self::Service),
            _ => None,
        }
    }
}

/// A priced item belonging to exactly one quote version.
///
/// `supplier_id = None` means an own/internal product: it participates in
/// totals and the order snapshot but never produces a supplier purchase
/// order. `bundle_parent_id` is presentation grouping only and is at most
/// one level deep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub quote_id: QuoteId,
    pub item_type: ItemType,
    pub description: String,
    pub unit_type: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub margin_percent: Decimal,
    pub tax_rate: Option<Decimal>,
    pub supplier_id: Option<SupplierId>,
    pub section_name: Option<String>,
    pub is_optional: bool,
    pub is_selected: bool,
    pub is_alternate: bool,
    pub alternate_group: Option<String>,
    pub bundle_parent_id: Option<LineItemId>,
    pub display_order: i64,
    pub metadata: Value,
}

impl LineItem {
    /// `quantity × unit_cost × (1 + margin/100)`, rounded to cents.
    pub fn extended_price(&self) -> Decimal {
        let markup = Decimal::ONE + self.margin_percent / Decimal::ONE_HUNDRED;
        (self.quantity * self.unit_cost * markup).round_dp(2)
    }

    pub fn effective_tax_rate(&self, quote_rate: Decimal) -> Decimal {
        self.tax_rate.unwrap_or(quote_rate)
    }

    pub fn tax_amount(&self, quote_rate: Decimal) -> Decimal {
        (self.extended_price() * self.effective_tax_rate(quote_rate)).round_dp(2)
    }

    /// Raw procurement cost, margin excluded. Supplier purchase orders sum
    /// this over the supplier's items.
    pub fn cost_total(&self) -> Decimal {
        (self.quantity * self.unit_cost).round_dp(2)
    }
}

/// Caller-submitted item in a bulk-replace payload. Identities are assigned
/// by the ledger service; bundle references are resolved within the payload
/// via the optional `ref_key` / `bundle_parent_ref` pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItemDraft {
    pub item_type: ItemType,
    pub description: String,
    #[serde(default = "default_unit_type")]
    pub unit_type: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    #[serde(default)]
    pub margin_percent: Decimal,
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
    #[serde(default)]
    pub section_name: Option<String>,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(default)]
    pub is_selected: bool,
    #[serde(default)]
    pub is_alternate: bool,
    #[serde(default)]
    pub alternate_group: Option<String>,
    #[serde(default)]
    pub ref_key: Option<String>,
    #[serde(default)]
    pub bundle_parent_ref: Option<String>,
    #[serde(default = "default_metadata")]
    pub metadata: Value,
}

fn default_unit_type() -> String {
    "each".to_string()
}

fn default_metadata() -> Value {
    Value::Object(serde_json::Map::new())
}

impl LineItemDraft {
    pub fn simple(
        description: impl Into<String>,
        quantity: Decimal,
        unit_cost: Decimal,
        margin_percent: Decimal,
    ) -> Self {
        Self {
            item_type: ItemType::Standard,
            description: description.into(),
            unit_type: default_unit_type(),
            quantity,
            unit_cost,
            margin_percent,
            tax_rate: None,
            supplier_id: None,
            section_name: None,
            is_optional: false,
            is_selected: false,
            is_alternate: false,
            alternate_group: None,
            ref_key: None,
            bundle_parent_ref: None,
            metadata: default_metadata(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{ItemType, LineItem, LineItemDraft, LineItemId};
    use crate::domain::quote::QuoteId;

    fn item(quantity: i64, unit_cost: Decimal, margin: Decimal) -> LineItem {
        LineItem {
            id: LineItemId("li-1".to_string()),
            quote_id: QuoteId("q-1".to_string()),
            item_type: ItemType::Standard,
            description: "widget".to_string(),
            unit_type: "each".to_string(),
            quantity: Decimal::from(quantity),
            unit_cost,
            margin_percent: margin,
            tax_rate: None,
            supplier_id: None,
            section_name: None,
            is_optional: false,
            is_selected: false,
            is_alternate: false,
            alternate_group: None,
            bundle_parent_id: None,
            display_order: 0,
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn extended_price_applies_margin_markup() {
        let item = item(2, Decimal::from(10), Decimal::from(20));
        assert_eq!(item.extended_price(), Decimal::new(2400, 2));
    }

    #[test]
    fn item_tax_rate_falls_back_to_quote_rate() {
        let mut item = item(1, Decimal::from(100), Decimal::ZERO);
        let quote_rate = Decimal::new(10, 2);

        assert_eq!(item.tax_amount(quote_rate), Decimal::from(10));

        item.tax_rate = Some(Decimal::new(25, 2));
        assert_eq!(item.tax_amount(quote_rate), Decimal::from(25));
    }

    #[test]
    fn cost_total_excludes_margin() {
        let item = item(3, Decimal::new(1050, 2), Decimal::from(35));
        assert_eq!(item.cost_total(), Decimal::new(3150, 2));
    }

    #[test]
    fn draft_payload_defaults_deserialize() {
        let draft: LineItemDraft = serde_json::from_str(
            r#"{"item_type":"labor","description":"install","quantity":"4","unit_cost":"85"}"#,
        )
        .expect("minimal payload");

        assert_eq!(draft.unit_type, "each");
        assert!(!draft.is_optional);
        assert!(draft.bundle_parent_ref.is_none());
        assert_eq!(draft.margin_percent, Decimal::ZERO);
    }
}
