//! Bulk apply of approved descriptions
//!
//! Every APPROVED item is written to the catalog as a comment. The batch is
//! not atomic: successes are committed as they happen and each failure stays
//! APPROVED with its `applyError`, ready for a later retry.

use crate::catalog::CatalogDirectory;
use crate::error::AppError;
use crate::governance::item::{DescriptionItem, ItemStatus, Transition};
use crate::governance::operations::OperationHandle;
use crate::governance::store::ItemStore;
use crate::permissions::{Capability, PermissionGate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyFailure {
    pub id: Uuid,
    pub object_path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    pub operation_id: Uuid,
    pub applied_count: usize,
    pub failed_count: usize,
    pub failures: Vec<ApplyFailure>,
    pub cancelled: bool,
}

pub struct ApplyCoordinator {
    catalog: Arc<dyn CatalogDirectory>,
    gate: Arc<dyn PermissionGate>,
    store: Arc<dyn ItemStore>,
}

impl ApplyCoordinator {
    pub fn new(
        catalog: Arc<dyn CatalogDirectory>,
        gate: Arc<dyn PermissionGate>,
        store: Arc<dyn ItemStore>,
    ) -> Self {
        Self {
            catalog,
            gate,
            store,
        }
    }

    pub async fn run(
        &self,
        principal: &str,
        operation: &OperationHandle,
    ) -> Result<ApplyResult, AppError> {
        let mut approved: Vec<DescriptionItem> = self
            .store
            .snapshot()
            .await?
            .into_iter()
            .filter(|item| item.status == ItemStatus::Approved)
            .collect();
        approved.sort_by(|a, b| a.generated_at.cmp(&b.generated_at).then_with(|| a.id.cmp(&b.id)));

        info!(
            "Applying {} approved descriptions (operation {})",
            approved.len(),
            operation.id
        );

        let mut result = ApplyResult {
            operation_id: operation.id,
            applied_count: 0,
            failed_count: 0,
            failures: Vec::new(),
            cancelled: false,
        };
        let mut capabilities: HashMap<(String, String), Capability> = HashMap::new();

        for item in approved {
            if operation.flag.is_cancelled() {
                info!("Apply {} cancelled", operation.id);
                result.cancelled = true;
                break;
            }

            let scope = (item.catalog_name.clone(), item.schema_name.clone());
            if !capabilities.contains_key(&scope) {
                let capability = self.gate.check(principal, &scope.0, &scope.1).await;
                capabilities.insert(scope.clone(), capability);
            }
            let denied = capabilities
                .get(&scope)
                .filter(|c| !c.can_modify)
                .map(|c| denial_reason(principal, c));

            let outcome = match denied {
                Some(reason) => Err(self.record(&item, &reason).await),
                None => self.apply_one(&item).await,
            };

            match outcome {
                Ok(()) => result.applied_count += 1,
                Err(reason) => {
                    warn!("Apply failed for {}: {}", item.object_path, reason);
                    result.failed_count += 1;
                    result.failures.push(ApplyFailure {
                        id: item.id,
                        object_path: item.object_path.clone(),
                        reason,
                    });
                }
            }
        }

        info!(
            "Apply {} finished: {} applied, {} failed",
            operation.id, result.applied_count, result.failed_count
        );
        Ok(result)
    }

    /// Write one comment and commit the APPLIED transition
    async fn apply_one(&self, item: &DescriptionItem) -> Result<(), String> {
        let text = match item.approved_description.as_deref() {
            Some(text) if !text.trim().is_empty() => text,
            _ => return Err(self.record(item, "Approved description is empty").await),
        };

        if let Err(e) = self.catalog.write_comment(&item.path(), text).await {
            return Err(self.record(item, &e.to_string()).await);
        }

        match self.store.transition(item.id, Transition::Apply).await {
            Ok(_) => Ok(()),
            Err(AppError::NotFound(_)) => Err(format!(
                "Item {} changed concurrently and is no longer APPROVED",
                item.id
            )),
            Err(e) => Err(self
                .record(
                    item,
                    &format!("Comment written but status update failed: {}", e),
                )
                .await),
        }
    }

    /// Persist an apply error; returns the reason for the batch result
    async fn record(&self, item: &DescriptionItem, reason: &str) -> String {
        if let Err(e) = self.store.record_apply_error(item.id, reason).await {
            warn!("Could not record apply error on {}: {}", item.id, e);
        }
        reason.to_string()
    }
}

fn denial_reason(principal: &str, capability: &Capability) -> String {
    if capability.errors.is_empty() {
        format!("{} lacks modify permission", principal)
    } else {
        capability.errors.join("; ")
    }
}
