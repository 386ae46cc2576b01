use sqlx::sqlite::{SqliteExecutor, SqliteRow};
use sqlx::Row;

use quoteflow_core::domain::quote::{
    ApprovalState, CustomerId, DraftState, Quote, QuoteId, QuoteStatus, QuoteTotals, TenantId,
    TierType,
};

use super::{
    parse_decimal, parse_optional_timestamp, parse_timestamp, parse_u32, RepositoryError,
};

const QUOTE_COLUMNS: &str = "id,
    tenant_id,
    customer_id,
    version_number,
    parent_quote_id,
    status,
    approval_state,
    manual_mode,
    tier_type,
    currency,
    tax_rate,
    subtotal,
    tax_amount,
    discount_amount,
    total_amount,
    draft_state,
    draft_job_id,
    sent_at,
    accepted_at,
    rejected_at,
    cancelled_at,
    cancel_reason,
    created_by,
    created_at,
    updated_at";

pub async fn insert(
    executor: impl SqliteExecutor<'_>,
    quote: &Quote,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO quote (
            id,
            tenant_id,
            customer_id,
            version_number,
            parent_quote_id,
            status,
            approval_state,
            manual_mode,
            tier_type,
            currency,
            tax_rate,
            subtotal,
            tax_amount,
            discount_amount,
            total_amount,
            draft_state,
            draft_job_id,
            sent_at,
            accepted_at,
            rejected_at,
            cancelled_at,
            cancel_reason,
            created_by,
            created_at,
            updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&quote.id.0)
    .bind(&quote.tenant_id.0)
    .bind(&quote.customer_id.0)
    .bind(i64::from(quote.version_number))
    .bind(quote.parent_quote_id.as_ref().map(|parent| parent.0.as_str()))
    .bind(quote.status.as_str())
    .bind(quote.approval_state.as_str())
    .bind(quote.manual_mode)
    .bind(quote.tier_type.as_str())
    .bind(&quote.currency)
    .bind(quote.tax_rate.to_string())
    .bind(quote.totals.subtotal.to_string())
    .bind(quote.totals.tax_amount.to_string())
    .bind(quote.totals.discount_amount.to_string())
    .bind(quote.totals.total_amount.to_string())
    .bind(quote.draft_state.as_str())
    .bind(quote.draft_job_id.as_deref())
    .bind(quote.sent_at.map(|value| value.to_rfc3339()))
    .bind(quote.accepted_at.map(|value| value.to_rfc3339()))
    .bind(quote.rejected_at.map(|value| value.to_rfc3339()))
    .bind(quote.cancelled_at.map(|value| value.to_rfc3339()))
    .bind(quote.cancel_reason.as_deref())
    .bind(&quote.created_by)
    .bind(quote.created_at.to_rfc3339())
    .bind(quote.updated_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn fetch(
    executor: impl SqliteExecutor<'_>,
    id: &QuoteId,
) -> Result<Option<Quote>, RepositoryError> {
    let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quote WHERE id = ?"))
        .bind(&id.0)
        .fetch_optional(executor)
        .await?;

    row.map(quote_from_row).transpose()
}

/// Id of the amendment created from this quote, if one exists. The schema
/// allows at most one.
pub async fn fetch_child_id(
    executor: impl SqliteExecutor<'_>,
    id: &QuoteId,
) -> Result<Option<QuoteId>, RepositoryError> {
    let row = sqlx::query("SELECT id FROM quote WHERE parent_quote_id = ?")
        .bind(&id.0)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(|row| QuoteId(row.get("id"))))
}

/// Persist the full quote state, guarded on the status the caller read.
/// Returns `false` when no row matched, meaning a concurrent writer moved
/// the quote first.
pub async fn update_guarded(
    executor: impl SqliteExecutor<'_>,
    quote: &Quote,
    expected_status: QuoteStatus,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE quote SET
            status = ?,
            approval_state = ?,
            tier_type = ?,
            tax_rate = ?,
            subtotal = ?,
            tax_amount = ?,
            discount_amount = ?,
            total_amount = ?,
            draft_state = ?,
            draft_job_id = ?,
            sent_at = ?,
            accepted_at = ?,
            rejected_at = ?,
            cancelled_at = ?,
            cancel_reason = ?,
            updated_at = ?
         WHERE id = ? AND status = ?",
    )
    .bind(quote.status.as_str())
    .bind(quote.approval_state.as_str())
    .bind(quote.tier_type.as_str())
    .bind(quote.tax_rate.to_string())
    .bind(quote.totals.subtotal.to_string())
    .bind(quote.totals.tax_amount.to_string())
    .bind(quote.totals.discount_amount.to_string())
    .bind(quote.totals.total_amount.to_string())
    .bind(quote.draft_state.as_str())
    .bind(quote.draft_job_id.as_deref())
    .bind(quote.sent_at.map(|value| value.to_rfc3339()))
    .bind(quote.accepted_at.map(|value| value.to_rfc3339()))
    .bind(quote.rejected_at.map(|value| value.to_rfc3339()))
    .bind(quote.cancelled_at.map(|value| value.to_rfc3339()))
    .bind(quote.cancel_reason.as_deref())
    .bind(quote.updated_at.to_rfc3339())
    .bind(&quote.id.0)
    .bind(expected_status.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

fn quote_from_row(row: SqliteRow) -> Result<Quote, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = QuoteStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown quote status `{status_raw}`")))?;

    let approval_raw = row.try_get::<String, _>("approval_state")?;
    let approval_state = ApprovalState::parse(&approval_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown approval state `{approval_raw}`"))
    })?;

    let tier_raw = row.try_get::<String, _>("tier_type")?;
    let tier_type = TierType::parse(&tier_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown tier type `{tier_raw}`")))?;

    let draft_raw = row.try_get::<String, _>("draft_state")?;
    let draft_state = DraftState::parse(&draft_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown draft state `{draft_raw}`")))?;

    Ok(Quote {
        id: QuoteId(row.try_get("id")?),
        tenant_id: TenantId(row.try_get("tenant_id")?),
        customer_id: CustomerId(row.try_get("customer_id")?),
        version_number: parse_u32("version_number", row.try_get("version_number")?)?,
        parent_quote_id: row.try_get::<Option<String>, _>("parent_quote_id")?.map(QuoteId),
        status,
        approval_state,
        manual_mode: row.try_get("manual_mode")?,
        tier_type,
        currency: row.try_get("currency")?,
        tax_rate: parse_decimal("tax_rate", row.try_get("tax_rate")?)?,
        totals: QuoteTotals {
            subtotal: parse_decimal("subtotal", row.try_get("subtotal")?)?,
            tax_amount: parse_decimal("tax_amount", row.try_get("tax_amount")?)?,
            discount_amount: parse_decimal("discount_amount", row.try_get("discount_amount")?)?,
            total_amount: parse_decimal("total_amount", row.try_get("total_amount")?)?,
        },
        draft_state,
        draft_job_id: row.try_get("draft_job_id")?,
        sent_at: parse_optional_timestamp("sent_at", row.try_get("sent_at")?)?,
        accepted_at: parse_optional_timestamp("accepted_at", row.try_get("accepted_at")?)?,
        rejected_at: parse_optional_timestamp("rejected_at", row.try_get("rejected_at")?)?,
        cancelled_at: parse_optional_timestamp("cancelled_at", row.try_get("cancelled_at")?)?,
        cancel_reason: row.try_get("cancel_reason")?,
        created_by: row.try_get("created_by")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
