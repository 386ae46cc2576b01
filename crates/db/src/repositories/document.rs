use sqlx::sqlite::{SqliteExecutor, SqliteRow};
use sqlx::Row;

use quoteflow_core::domain::document::{QuoteDocument, QuoteDocumentId};
use quoteflow_core::domain::quote::QuoteId;

use super::{parse_timestamp, RepositoryError};

pub async fn insert(
    executor: impl SqliteExecutor<'_>,
    document: &QuoteDocument,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO quote_document (
            id,
            quote_id,
            kind,
            filename,
            content_ref,
            rendered_at
         ) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&document.id.0)
    .bind(&document.quote_id.0)
    .bind(&document.kind)
    .bind(&document.filename)
    .bind(&document.content_ref)
    .bind(document.rendered_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn list_for_quote(
    executor: impl SqliteExecutor<'_>,
    quote_id: &QuoteId,
) -> Result<Vec<QuoteDocument>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT
            id,
            quote_id,
            kind,
            filename,
            content_ref,
            rendered_at
         FROM quote_document
         WHERE quote_id = ?
         ORDER BY rendered_at ASC, id ASC",
    )
    .bind(&quote_id.0)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(document_from_row).collect()
}

fn document_from_row(row: SqliteRow) -> Result<QuoteDocument, RepositoryError> {
    Ok(QuoteDocument {
        id: QuoteDocumentId(row.try_get("id")?),
        quote_id: QuoteId(row.try_get("quote_id")?),
        kind: row.try_get("kind")?,
        filename: row.try_get("filename")?,
        content_ref: row.try_get("content_ref")?,
        rendered_at: parse_timestamp("rendered_at", row.try_get("rendered_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use quoteflow_core::domain::document::QuoteDocument;
    use quoteflow_core::domain::quote::{CustomerId, Quote, TenantId};

    use super::{insert, list_for_quote};
    use crate::{connect_with_settings, migrations, repositories};

    #[tokio::test]
    async fn documents_round_trip_and_clone_to_new_version() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let quote = Quote::new_draft(
            TenantId("t-1".to_string()),
            CustomerId("c-1".to_string()),
            "USD",
            true,
            "U-1",
        );
        repositories::quote::insert(&pool, &quote).await.expect("insert quote");

        let document =
            QuoteDocument::new(quote.id.clone(), "pdf", "quote-v1.pdf", "blob://quotes/v1");
        insert(&pool, &document).await.expect("insert document");

        let child = quote.next_version();
        repositories::quote::insert(&pool, &child).await.expect("insert child");
        insert(&pool, &document.cloned_for(child.id.clone())).await.expect("insert clone");

        let originals = list_for_quote(&pool, &quote.id).await.expect("list originals");
        let clones = list_for_quote(&pool, &child.id).await.expect("list clones");

        assert_eq!(originals.len(), 1);
        assert_eq!(clones.len(), 1);
        assert_ne!(originals[0].id, clones[0].id);
        assert_eq!(originals[0].content_ref, clones[0].content_ref);
    }
}
