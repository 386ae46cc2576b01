use sqlx::sqlite::{SqliteExecutor, SqliteRow};
use sqlx::Row;

use quoteflow_core::domain::line_item::{ItemType, LineItem, LineItemId, SupplierId};
use quoteflow_core::domain::quote::QuoteId;

use super::{parse_decimal, parse_optional_decimal, RepositoryError};

pub async fn insert(
    executor: impl SqliteExecutor<'_>,
    item: &LineItem,
) -> Result<(), RepositoryError> {
    let metadata = serde_json::to_string(&item.metadata)
        .map_err(|error| RepositoryError::Decode(format!("unencodable item metadata: {error}")))?;

    sqlx::query(
        "INSERT INTO line_item (
            id,
            quote_id,
            item_type,
            description,
            unit_type,
            quantity,
            unit_cost,
            margin_percent,
            tax_rate,
            supplier_id,
            section_name,
            is_optional,
            is_selected,
            is_alternate,
            alternate_group,
            bundle_parent_id,
            display_order,
            metadata
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&item.id.0)
    .bind(&item.quote_id.0)
    .bind(item.item_type.as_str())
    .bind(&item.description)
    .bind(&item.unit_type)
    .bind(item.quantity.to_string())
    .bind(item.unit_cost.to_string())
    .bind(item.margin_percent.to_string())
    .bind(item.tax_rate.map(|rate| rate.to_string()))
    .bind(item.supplier_id.as_ref().map(|supplier| supplier.0.as_str()))
    .bind(item.section_name.as_deref())
    .bind(item.is_optional)
    .bind(item.is_selected)
    .bind(item.is_alternate)
    .bind(item.alternate_group.as_deref())
    .bind(item.bundle_parent_id.as_ref().map(|parent| parent.0.as_str()))
    .bind(item.display_order)
    .bind(metadata)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn list_for_quote(
    executor: impl SqliteExecutor<'_>,
    quote_id: &QuoteId,
) -> Result<Vec<LineItem>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT
            id,
            quote_id,
            item_type,
            description,
            unit_type,
            quantity,
            unit_cost,
            margin_percent,
            tax_rate,
            supplier_id,
            section_name,
            is_optional,
            is_selected,
            is_alternate,
            alternate_group,
            bundle_parent_id,
            display_order,
            metadata
         FROM line_item
         WHERE quote_id = ?
         ORDER BY display_order ASC, id ASC",
    )
    .bind(&quote_id.0)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(item_from_row).collect()
}

pub async fn count_for_quote(
    executor: impl SqliteExecutor<'_>,
    quote_id: &QuoteId,
) -> Result<u64, RepositoryError> {
    let count = sqlx::query("SELECT COUNT(*) AS count FROM line_item WHERE quote_id = ?")
        .bind(&quote_id.0)
        .fetch_one(executor)
        .await?
        .get::<i64, _>("count");

    Ok(count.max(0) as u64)
}

/// Bulk-replace is delete-then-insert. Bundle children cascade, so deleting
/// in any order is safe.
pub async fn delete_for_quote(
    executor: impl SqliteExecutor<'_>,
    quote_id: &QuoteId,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query("DELETE FROM line_item WHERE quote_id = ?")
        .bind(&quote_id.0)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

fn item_from_row(row: SqliteRow) -> Result<LineItem, RepositoryError> {
    let type_raw = row.try_get::<String, _>("item_type")?;
    let item_type = ItemType::parse(&type_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown item type `{type_raw}`")))?;

    let metadata_raw = row.try_get::<String, _>("metadata")?;
    let metadata = serde_json::from_str(&metadata_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid item metadata: {error}")))?;

    Ok(LineItem {
        id: LineItemId(row.try_get("id")?),
        quote_id: QuoteId(row.try_get("quote_id")?),
        item_type,
        description: row.try_get("description")?,
        unit_type: row.try_get("unit_type")?,
        quantity: parse_decimal("quantity", row.try_get("quantity")?)?,
        unit_cost: parse_decimal("unit_cost", row.try_get("unit_cost")?)?,
        margin_percent: parse_decimal("margin_percent", row.try_get("margin_percent")?)?,
        tax_rate: parse_optional_decimal("tax_rate", row.try_get("tax_rate")?)?,
        supplier_id: row.try_get::<Option<String>, _>("supplier_id")?.map(SupplierId),
        section_name: row.try_get("section_name")?,
        is_optional: row.try_get("is_optional")?,
        is_selected: row.try_get("is_selected")?,
        is_alternate: row.try_get("is_alternate")?,
        alternate_group: row.try_get("alternate_group")?,
        bundle_parent_id: row.try_get::<Option<String>, _>("bundle_parent_id")?.map(LineItemId),
        display_order: row.try_get("display_order")?,
        metadata,
    })
}
