use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::quote::QuoteId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteDocumentId(pub String);

/// Reference to a rendered artifact (PDF, Word, ...) produced by the external
/// document renderer. The engine only stores the pointer; rendering happens
/// out-of-band. `amend` deep-copies these alongside the line items.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteDocument {
    pub id: QuoteDocumentId,
    pub quote_id: QuoteId,
    pub kind: String,
    pub filename: String,
    pub content_ref: String,
    pub rendered_at: DateTime<Utc>,
}

impl QuoteDocument {
    pub fn new(
        quote_id: QuoteId,
        kind: impl Into<String>,
        filename: impl Into<String>,
        content_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: QuoteDocumentId(uuid::Uuid::new_v4().to_string()),
            quote_id,
            kind: kind.into(),
            filename: filename.into(),
            content_ref: content_ref.into(),
            rendered_at: Utc::now(),
        }
    }

    /// Same content, fresh identity, attached to another quote version.
    pub fn cloned_for(&self, quote_id: QuoteId) -> Self {
        Self {
            id: QuoteDocumentId(uuid::Uuid::new_v4().to_string()),
            quote_id,
            kind: self.kind.clone(),
            filename: self.filename.clone(),
            content_ref: self.content_ref.clone(),
            rendered_at: self.rendered_at,
        }
    }
}
