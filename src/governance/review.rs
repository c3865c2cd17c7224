//! Reviewer decisions
//!
//! Each decision is a compare-and-swap from PENDING. When two reviewers race
//! on the same item, exactly one wins and the other gets `NotFound`.

use crate::error::{validation_error, AppError};
use crate::governance::item::{DescriptionItem, Transition};
use crate::governance::store::ItemStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    #[serde(rename = "APPROVE", alias = "APPROVED")]
    Approve,
    #[serde(rename = "REJECT", alias = "REJECTED")]
    Reject,
}

/// Outcome of one id in a bulk review
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReviewOutcome {
    pub id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<DescriptionItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct ReviewCoordinator {
    store: Arc<dyn ItemStore>,
}

impl ReviewCoordinator {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    /// Approve or reject a PENDING item.
    ///
    /// On approval the trimmed `edited_text` wins when non-blank, otherwise
    /// the model's text is approved as-is.
    pub async fn review(
        &self,
        id: Uuid,
        decision: Decision,
        edited_text: Option<&str>,
        reviewer: &str,
    ) -> Result<DescriptionItem, AppError> {
        if reviewer.trim().is_empty() {
            return Err(validation_error("reviewer", "Reviewer is required"));
        }

        let transition = match decision {
            Decision::Approve => {
                let text = match edited_text.map(str::trim).filter(|t| !t.is_empty()) {
                    Some(edited) => edited.to_string(),
                    None => self.store.get(id).await?.ai_generated_description,
                };
                Transition::Approve {
                    text,
                    reviewer: reviewer.to_string(),
                }
            }
            Decision::Reject => Transition::Reject {
                reviewer: reviewer.to_string(),
            },
        };

        let item = self.store.transition(id, transition).await?;
        info!("{} marked {} as {}", reviewer, item.object_path, item.status);
        Ok(item)
    }

    /// Apply the same decision to many items; each id succeeds or fails alone
    pub async fn review_many(
        &self,
        ids: &[Uuid],
        decision: Decision,
        reviewer: &str,
    ) -> Result<Vec<BulkReviewOutcome>, AppError> {
        if reviewer.trim().is_empty() {
            return Err(validation_error("reviewer", "Reviewer is required"));
        }

        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            let outcome = match self.review(*id, decision, None, reviewer).await {
                Ok(item) => BulkReviewOutcome {
                    id: *id,
                    success: true,
                    item: Some(item),
                    error: None,
                },
                Err(e) => {
                    warn!("Bulk review of {} failed: {}", id, e);
                    BulkReviewOutcome {
                        id: *id,
                        success: false,
                        item: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}
