use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::quote::{QuoteId, QuoteStatus};
use crate::workflow::machine::WorkflowAction;

/// One immutable record per applied transition. Written exclusively by the
/// transactional services, in the same transaction as the status flip, and
/// never updated or deleted afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowLogEntry {
    pub id: String,
    pub quote_id: QuoteId,
    pub from_status: Option<QuoteStatus>,
    pub to_status: QuoteStatus,
    pub action: WorkflowAction,
    pub comment: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub actor_id: String,
    pub created_at: DateTime<Utc>,
}

impl WorkflowLogEntry {
    pub fn record(
        quote_id: QuoteId,
        from_status: Option<QuoteStatus>,
        to_status: QuoteStatus,
        action: WorkflowAction,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            quote_id,
            from_status,
            to_status,
            action,
            comment: None,
            metadata: BTreeMap::new(),
            actor_id: actor_id.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// How long a quote sat in one status, derived by scanning consecutive log
/// entries. The final (current) status has an open interval and is reported
/// up to `as_of`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusDwell {
    pub status: QuoteStatus,
    pub entered_at: DateTime<Utc>,
    pub duration: Duration,
    pub open: bool,
}

pub fn time_in_status(entries: &[WorkflowLogEntry], as_of: DateTime<Utc>) -> Vec<StatusDwell> {
    let mut dwells = Vec::new();
    for window in entries.windows(2) {
        dwells.push(StatusDwell {
            status: window[0].to_status,
            entered_at: window[0].created_at,
            duration: window[1].created_at - window[0].created_at,
            open: false,
        });
    }
    if let Some(last) = entries.last() {
        dwells.push(StatusDwell {
            status: last.to_status,
            entered_at: last.created_at,
            duration: as_of - last.created_at,
            open: true,
        });
    }
    dwells
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{time_in_status, WorkflowLogEntry};
    use crate::domain::quote::{QuoteId, QuoteStatus};
    use crate::workflow::machine::WorkflowAction;

    fn entry(
        minute: u32,
        from: Option<QuoteStatus>,
        to: QuoteStatus,
        action: WorkflowAction,
    ) -> WorkflowLogEntry {
        let mut entry =
            WorkflowLogEntry::record(QuoteId("q-1".to_string()), from, to, action, "U-1");
        entry.created_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, minute, 0).unwrap();
        entry
    }

    #[test]
    fn builder_attaches_comment_and_metadata() {
        let entry = WorkflowLogEntry::record(
            QuoteId("q-9".to_string()),
            Some(QuoteStatus::InternalReview),
            QuoteStatus::Draft,
            WorkflowAction::RequestChanges,
            "U-reviewer",
        )
        .with_comment("margin on line 2 is too thin")
        .with_metadata("requested_by", "U-reviewer");

        assert_eq!(entry.comment.as_deref(), Some("margin on line 2 is too thin"));
        assert_eq!(entry.metadata.get("requested_by").map(String::as_str), Some("U-reviewer"));
    }

    #[test]
    fn time_in_status_scans_consecutive_entries() {
        let entries = vec![
            entry(0, None, QuoteStatus::Draft, WorkflowAction::SubmitForApproval),
            entry(10, Some(QuoteStatus::Draft), QuoteStatus::InternalReview,
                WorkflowAction::SubmitForApproval),
            entry(25, Some(QuoteStatus::InternalReview), QuoteStatus::Sent,
                WorkflowAction::Approve),
        ];
        let as_of = Utc.with_ymd_and_hms(2026, 3, 1, 9, 40, 0).unwrap();

        let dwells = time_in_status(&entries, as_of);

        assert_eq!(dwells.len(), 3);
        assert_eq!(dwells[0].status, QuoteStatus::Draft);
        assert_eq!(dwells[0].duration, Duration::minutes(10));
        assert!(!dwells[0].open);
        assert_eq!(dwells[1].status, QuoteStatus::InternalReview);
        assert_eq!(dwells[1].duration, Duration::minutes(15));
        assert_eq!(dwells[2].status, QuoteStatus::Sent);
        assert_eq!(dwells[2].duration, Duration::minutes(15));
        assert!(dwells[2].open);
    }

    #[test]
    fn time_in_status_on_empty_log_is_empty() {
        assert!(time_in_status(&[], Utc::now()).is_empty());
    }
}
