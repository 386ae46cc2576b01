use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::line_item::SupplierId;
use crate::domain::quote::QuoteId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerOrderId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PurchaseOrderId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Fulfilled,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Fulfilled => "fulfilled",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "fulfilled" => Some(Self::Fulfilled),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    Issued,
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Issued => "issued",
            Self::Received => "received",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(Self::Draft),
            "issued" => Some(Self::Issued),
            "received" => Some(Self::Received),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// The single sales order materialized from a converted quote. The item
/// snapshot is the billable item set serialized at conversion time, so the
/// order stays stable even after the quote chain moves on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerOrder {
    pub id: CustomerOrderId,
    pub quote_id: QuoteId,
    pub order_number: String,
    pub po_number: Option<String>,
    pub status: OrderStatus,
    pub billing_address: Option<String>,
    pub shipping_address: Option<String>,
    pub payment_terms: Option<String>,
    pub total_amount: Decimal,
    pub items_snapshot: String,
    pub created_at: DateTime<Utc>,
}

/// One procurement record per distinct supplier referenced by the converted
/// quote's billable items. `total_cost` is margin-free supplier cost.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupplierPurchaseOrder {
    pub id: PurchaseOrderId,
    pub customer_order_id: CustomerOrderId,
    pub supplier_id: SupplierId,
    pub status: PurchaseOrderStatus,
    pub expected_date: Option<NaiveDate>,
    pub total_cost: Decimal,
    pub created_at: DateTime<Utc>,
}
