use std::collections::BTreeMap;

use sqlx::sqlite::{SqliteExecutor, SqliteRow};
use sqlx::Row;

use quoteflow_core::domain::quote::{QuoteId, QuoteStatus};
use quoteflow_core::workflow::log::WorkflowLogEntry;
use quoteflow_core::workflow::machine::WorkflowAction;

use super::{parse_timestamp, RepositoryError};

/// Append-only: there is deliberately no update or delete for this table.
pub async fn append(
    executor: impl SqliteExecutor<'_>,
    entry: &WorkflowLogEntry,
) -> Result<(), RepositoryError> {
    let metadata = serde_json::to_string(&entry.metadata)
        .map_err(|error| RepositoryError::Decode(format!("unencodable log metadata: {error}")))?;

    sqlx::query(
        "INSERT INTO workflow_log (
            id,
            quote_id,
            from_status,
            to_status,
            action,
            comment,
            metadata,
            actor_id,
            created_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&entry.id)
    .bind(&entry.quote_id.0)
    .bind(entry.from_status.as_ref().map(QuoteStatus::as_str))
    .bind(entry.to_status.as_str())
    .bind(entry.action.as_str())
    .bind(entry.comment.as_deref())
    .bind(metadata)
    .bind(&entry.actor_id)
    .bind(entry.created_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn list_for_quote(
    executor: impl SqliteExecutor<'_>,
    quote_id: &QuoteId,
) -> Result<Vec<WorkflowLogEntry>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT
            id,
            quote_id,
            from_status,
            to_status,
            action,
            comment,
            metadata,
            actor_id,
            created_at
         FROM workflow_log
         WHERE quote_id = ?
         ORDER BY created_at ASC, id ASC",
    )
    .bind(&quote_id.0)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(entry_from_row).collect()
}

fn entry_from_row(row: SqliteRow) -> Result<WorkflowLogEntry, RepositoryError> {
    let from_status = row
        .try_get::<Option<String>, _>("from_status")?
        .map(|value| {
            QuoteStatus::parse(&value)
                .ok_or_else(|| RepositoryError::Decode(format!("unknown from_status `{value}`")))
        })
        .transpose()?;

    let to_raw = row.try_get::<String, _>("to_status")?;
    let to_status = QuoteStatus::parse(&to_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown to_status `{to_raw}`")))?;

    let action_raw = row.try_get::<String, _>("action")?;
    let action = WorkflowAction::parse(&action_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown workflow action `{action_raw}`")))?;

    let metadata_raw = row.try_get::<String, _>("metadata")?;
    let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid log metadata: {error}")))?;

    Ok(WorkflowLogEntry {
        id: row.try_get("id")?,
        quote_id: QuoteId(row.try_get("quote_id")?),
        from_status,
        to_status,
        action,
        comment: row.try_get("comment")?,
        metadata,
        actor_id: row.try_get("actor_id")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
