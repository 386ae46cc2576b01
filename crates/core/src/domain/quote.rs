use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

impl std::fmt::Display for QuoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

/// Lifecycle states of a quote version. Terminal states are permanently
/// immutable; within a version chain exactly one version is non-superseded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    InternalReview,
    Sent,
    Viewed,
    Accepted,
    Rejected,
    Cancelled,
    Converted,
    Superseded,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InternalReview => "internal_review",
            Self::Sent => "sent",
            Self::Viewed => "viewed",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Converted => "converted",
            Self::Superseded => "superseded",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(Self::Draft),
            "internal_review" => Some(Self::InternalReview),
            "sent" => Some(Self::Sent),
            "viewed" => Some(Self::Viewed),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            "converted" => Some(Self::Converted),
            "superseded" => Some(Self::Superseded),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled | Self::Converted | Self::Superseded)
    }

    /// The ledger may only be mutated while the quote sits in an authoring
    /// state; everywhere else the item set is frozen.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft | Self::InternalReview)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    NotRequired,
    Pending,
    Approved,
    ChangesRequested,
}

impl ApprovalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRequired => "not_required",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::ChangesRequested => "changes_requested",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "not_required" => Some(Self::NotRequired),
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "changes_requested" => Some(Self::ChangesRequested),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierType {
    Single,
    ThreeTier,
}

impl TierType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::ThreeTier => "three_tier",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "single" => Some(Self::Single),
            "three_tier" => Some(Self::ThreeTier),
            _ => None,
        }
    }
}

/// Marker for the out-of-band AI draft generation job. The engine stores the
/// job reference and the terminal result only; it never blocks on the job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftState {
    None,
    Pending,
    Completed,
    Failed,
}

impl DraftState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "none" => Some(Self::None),
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Cached totals persisted on the quote row and recomputed on every ledger
/// mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
}

impl QuoteTotals {
    pub fn zero() -> Self {
        Self {
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub version_number: u32,
    pub parent_quote_id: Option<QuoteId>,
    pub status: QuoteStatus,
    pub approval_state: ApprovalState,
    pub manual_mode: bool,
    pub tier_type: TierType,
    pub currency: String,
    pub tax_rate: Decimal,
    pub totals: QuoteTotals,
    pub draft_state: DraftState,
    pub draft_job_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    /// A fresh v1 draft for a customer. `manual_mode` records whether the
    /// item set is hand-built or AI-assisted; it never affects editability.
    pub fn new_draft(
        tenant_id: TenantId,
        customer_id: CustomerId,
        currency: impl Into<String>,
        manual_mode: bool,
        created_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: QuoteId(uuid::Uuid::new_v4().to_string()),
            tenant_id,
            customer_id,
            version_number: 1,
            parent_quote_id: None,
            status: QuoteStatus::Draft,
            approval_state: ApprovalState::NotRequired,
            manual_mode,
            tier_type: TierType::Single,
            currency: currency.into(),
            tax_rate: Decimal::ZERO,
            totals: QuoteTotals::zero(),
            draft_state: DraftState::None,
            draft_job_id: None,
            sent_at: None,
            accepted_at: None,
            rejected_at: None,
            cancelled_at: None,
            cancel_reason: None,
            created_by: created_by.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Clone scalar fields into a new draft version linked to this quote.
    /// Lifecycle timestamps, approval state, and draft markers are reset;
    /// cached totals carry over until the child ledger is next mutated.
    pub fn next_version(&self) -> Self {
        let now = Utc::now();
        Self {
            id: QuoteId(uuid::Uuid::new_v4().to_string()),
            tenant_id: self.tenant_id.clone(),
            customer_id: self.customer_id.clone(),
            version_number: self.version_number + 1,
            parent_quote_id: Some(self.id.clone()),
            status: QuoteStatus::Draft,
            approval_state: ApprovalState::NotRequired,
            manual_mode: self.manual_mode,
            tier_type: self.tier_type,
            currency: self.currency.clone(),
            tax_rate: self.tax_rate,
            totals: self.totals.clone(),
            draft_state: DraftState::None,
            draft_job_id: None,
            sent_at: None,
            accepted_at: None,
            rejected_at: None,
            cancelled_at: None,
            cancel_reason: None,
            created_by: self.created_by.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}
