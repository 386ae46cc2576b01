use serde::{Deserialize, Serialize};

use crate::domain::quote::{ApprovalState, QuoteStatus};
use crate::errors::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    SubmitForApproval,
    Send,
    Approve,
    RequestChanges,
    CustomerOpened,
    Accept,
    Reject,
    Cancel,
    Amend,
    ConvertToOrder,
}

impl WorkflowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmitForApproval => "submit_for_approval",
            Self::Send => "send",
            Self::Approve => "approve",
            Self::RequestChanges => "request_changes",
            Self::CustomerOpened => "customer_opened",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Cancel => "cancel",
            Self::Amend => "amend",
            Self::ConvertToOrder => "convert_to_order",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "submit_for_approval" => Some(Self::SubmitForApproval),
            "send" => Some(Self::Send),
            "approve" => Some(Self::Approve),
            "request_changes" => Some(Self::RequestChanges),
            "customer_opened" => Some(Self::CustomerOpened),
            "accept" => Some(Self::Accept),
            "reject" => Some(Self::Reject),
            "cancel" => Some(Self::Cancel),
            "amend" => Some(Self::Amend),
            "convert_to_order" => Some(Self::ConvertToOrder),
            _ => None,
        }
    }
}

/// Facts the caller (the transactional service) gathers before asking for a
/// transition. The planner itself stays pure: same inputs, same answer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GuardContext {
    pub item_count: usize,
    pub totals_computed: bool,
    pub review_required: bool,
    pub actor_is_approver: bool,
    pub has_comment: bool,
    pub has_reason: bool,
    pub has_child_version: bool,
}

/// Which lifecycle timestamp the executing service must stamp alongside the
/// status flip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleStamp {
    Sent,
    Accepted,
    Rejected,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionPlan {
    pub from: QuoteStatus,
    pub to: QuoteStatus,
    pub action: WorkflowAction,
    pub approval_state: Option<ApprovalState>,
    pub stamp: Option<LifecycleStamp>,
}

/// Validate one row of the transition table and describe the resulting
/// mutation. Nothing is executed here; a rejected plan mutates nothing by
/// construction.
pub fn plan_transition(
    current: QuoteStatus,
    action: WorkflowAction,
    ctx: &GuardContext,
) -> Result<TransitionPlan, EngineError> {
    use QuoteStatus::{
        Accepted, Cancelled, Converted, Draft, InternalReview, Rejected, Sent, Superseded, Viewed,
    };
    use WorkflowAction::{
        Accept, Amend, Approve, Cancel, ConvertToOrder, CustomerOpened, Reject, RequestChanges,
        Send, SubmitForApproval,
    };

    let invalid = || EngineError::InvalidTransition { from: current, action };

    let (to, approval_state, stamp) = match (current, action) {
        (Draft, SubmitForApproval) => {
            require_items(current, action, ctx)?;
            (InternalReview, Some(ApprovalState::Pending), None)
        }
        (Draft, Send) => {
            require_items(current, action, ctx)?;
            if !ctx.totals_computed {
                return Err(EngineError::Validation(
                    "totals must be computed before sending".to_string(),
                ));
            }
            if ctx.review_required {
                return Err(EngineError::Validation(
                    "review policy requires internal review before send".to_string(),
                ));
            }
            (Sent, Some(ApprovalState::NotRequired), Some(LifecycleStamp::Sent))
        }
        (InternalReview, Approve) => {
            if !ctx.actor_is_approver {
                return Err(EngineError::Validation(
                    "approver role required to approve a quote".to_string(),
                ));
            }
            (Sent, Some(ApprovalState::Approved), Some(LifecycleStamp::Sent))
        }
        (InternalReview, RequestChanges) => {
            if !ctx.has_comment {
                return Err(EngineError::Validation(
                    "a comment is required when requesting changes".to_string(),
                ));
            }
            (Draft, Some(ApprovalState::ChangesRequested), None)
        }
        (Sent, CustomerOpened) => (Viewed, None, None),
        (Sent | Viewed, Accept) => (Accepted, None, Some(LifecycleStamp::Accepted)),
        (Sent | Viewed, Reject) => {
            if !ctx.has_reason {
                return Err(EngineError::Validation(
                    "a reason is required to reject a quote".to_string(),
                ));
            }
            (Rejected, None, Some(LifecycleStamp::Rejected))
        }
        (Draft | InternalReview | Sent | Viewed, Cancel) => {
            if !ctx.has_reason {
                return Err(EngineError::Validation(
                    "a reason is required to cancel a quote".to_string(),
                ));
            }
            (Cancelled, None, Some(LifecycleStamp::Cancelled))
        }
        (Sent | Accepted, Amend) => {
            if ctx.has_child_version {
                return Err(EngineError::AlreadyHasChildVersion);
            }
            (Superseded, None, None)
        }
        (Accepted, ConvertToOrder) => (Converted, None, None),
        _ => return Err(invalid()),
    };

    Ok(TransitionPlan { from: current, to, action, approval_state, stamp })
}

fn require_items(
    current: QuoteStatus,
    action: WorkflowAction,
    ctx: &GuardContext,
) -> Result<(), EngineError> {
    if ctx.item_count == 0 {
        return Err(EngineError::Validation(format!(
            "cannot {} a quote with an empty ledger (status {})",
            action.as_str(),
            current.as_str(),
        )));
    }
    Ok(())
}
