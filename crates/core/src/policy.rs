use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::line_item::LineItem;
use crate::pricing::billable_items;

/// Thresholds that force a quote through `internal_review` instead of a
/// direct `send`. Both come from the `[engine]` config section so an
/// operator can tune them without a deploy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPolicy {
    /// Any billable item with a margin below this floor needs review.
    pub margin_floor_percent: Decimal,
    /// A grand total above this ceiling needs review. `None` disables the
    /// check.
    pub total_review_threshold: Option<Decimal>,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self { margin_floor_percent: Decimal::from(10), total_review_threshold: None }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewTrigger {
    MarginBelowFloor { item_description: String, margin_percent: Decimal },
    TotalAboveThreshold { total_amount: Decimal, threshold: Decimal },
}

impl ReviewPolicy {
    /// Evaluate against the billable subset only: an unselected optional or
    /// a losing alternate cannot force a review.
    pub fn evaluate(&self, items: &[LineItem], total_amount: Decimal) -> Vec<ReviewTrigger> {
        let mut triggers = Vec::new();
        let (billable, _) = billable_items(items);

        for item in billable {
            if item.margin_percent < self.margin_floor_percent {
                triggers.push(ReviewTrigger::MarginBelowFloor {
                    item_description: item.description.clone(),
                    margin_percent: item.margin_percent,
                });
            }
        }

        if let Some(threshold) = self.total_review_threshold {
            if total_amount > threshold {
                triggers.push(ReviewTrigger::TotalAboveThreshold { total_amount, threshold });
            }
        }

        triggers
    }

    pub fn review_required(&self, items: &[LineItem], total_amount: Decimal) -> bool {
        !self.evaluate(items, total_amount).is_empty()
    }
}
