use sqlx::sqlite::{SqliteExecutor, SqliteRow};
use sqlx::Row;

use quoteflow_core::domain::line_item::SupplierId;
use quoteflow_core::domain::order::{
    CustomerOrder, CustomerOrderId, OrderStatus, PurchaseOrderId, PurchaseOrderStatus,
    SupplierPurchaseOrder,
};
use quoteflow_core::domain::quote::QuoteId;

use super::{parse_decimal, parse_optional_date, parse_timestamp, RepositoryError};

pub async fn insert_order(
    executor: impl SqliteExecutor<'_>,
    order: &CustomerOrder,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO customer_order (
            id,
            quote_id,
            order_number,
            po_number,
            status,
            billing_address,
            shipping_address,
            payment_terms,
            total_amount,
            items_snapshot,
            created_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&order.id.0)
    .bind(&order.quote_id.0)
    .bind(&order.order_number)
    .bind(order.po_number.as_deref())
    .bind(order.status.as_str())
    .bind(order.billing_address.as_deref())
    .bind(order.shipping_address.as_deref())
    .bind(order.payment_terms.as_deref())
    .bind(order.total_amount.to_string())
    .bind(&order.items_snapshot)
    .bind(order.created_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn fetch_order_by_quote(
    executor: impl SqliteExecutor<'_>,
    quote_id: &QuoteId,
) -> Result<Option<CustomerOrder>, RepositoryError> {
    let row = sqlx::query(
        "SELECT
            id,
            quote_id,
            order_number,
            po_number,
            status,
            billing_address,
            shipping_address,
            payment_terms,
            total_amount,
            items_snapshot,
            created_at
         FROM customer_order
         WHERE quote_id = ?",
    )
    .bind(&quote_id.0)
    .fetch_optional(executor)
    .await?;

    row.map(order_from_row).transpose()
}

pub async fn insert_purchase_order(
    executor: impl SqliteExecutor<'_>,
    purchase_order: &SupplierPurchaseOrder,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO supplier_purchase_order (
            id,
            customer_order_id,
            supplier_id,
            status,
            expected_date,
            total_cost,
            created_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&purchase_order.id.0)
    .bind(&purchase_order.customer_order_id.0)
    .bind(&purchase_order.supplier_id.0)
    .bind(purchase_order.status.as_str())
    .bind(purchase_order.expected_date.map(|date| date.format("%Y-%m-%d").to_string()))
    .bind(purchase_order.total_cost.to_string())
    .bind(purchase_order.created_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn list_purchase_orders_for_order(
    executor: impl SqliteExecutor<'_>,
    order_id: &CustomerOrderId,
) -> Result<Vec<SupplierPurchaseOrder>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT
            id,
            customer_order_id,
            supplier_id,
            status,
            expected_date,
            total_cost,
            created_at
         FROM supplier_purchase_order
         WHERE customer_order_id = ?
         ORDER BY supplier_id ASC",
    )
    .bind(&order_id.0)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(purchase_order_from_row).collect()
}

fn order_from_row(row: SqliteRow) -> Result<CustomerOrder, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = OrderStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown order status `{status_raw}`")))?;

    Ok(CustomerOrder {
        id: CustomerOrderId(row.try_get("id")?),
        quote_id: QuoteId(row.try_get("quote_id")?),
        order_number: row.try_get("order_number")?,
        po_number: row.try_get("po_number")?,
        status,
        billing_address: row.try_get("billing_address")?,
        shipping_address: row.try_get("shipping_address")?,
        payment_terms: row.try_get("payment_terms")?,
        total_amount: parse_decimal("total_amount", row.try_get("total_amount")?)?,
        items_snapshot: row.try_get("items_snapshot")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn purchase_order_from_row(row: SqliteRow) -> Result<SupplierPurchaseOrder, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = PurchaseOrderStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown purchase order status `{status_raw}`"))
    })?;

    Ok(SupplierPurchaseOrder {
        id: PurchaseOrderId(row.try_get("id")?),
        customer_order_id: CustomerOrderId(row.try_get("customer_order_id")?),
        supplier_id: SupplierId(row.try_get("supplier_id")?),
        status,
        expected_date: parse_optional_date("expected_date", row.try_get("expected_date")?)?,
        total_cost: parse_decimal("total_cost", row.try_get("total_cost")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
