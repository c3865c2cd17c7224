//! Governance facade
//!
//! One entry point over the store, the coordinators and the external
//! collaborators. HTTP handlers and tests both drive the workflow through it.

use crate::catalog::{CatalogDirectory, TableSummary};
use crate::config::GenerationConfig;
use crate::error::AppError;
use crate::governance::apply::{ApplyCoordinator, ApplyResult};
use crate::governance::generate::{GenerationEngine, GenerationRequest, GenerationResult};
use crate::governance::item::{validate_identifier, DescriptionItem};
use crate::governance::operations::{
    OperationInfo, OperationKind, OperationRegistry, OperationState,
};
use crate::governance::review::{BulkReviewOutcome, Decision, ReviewCoordinator};
use crate::governance::stats::{
    self, ActivityBucket, BucketWindow, ComplianceStats, ReviewerActivity, SchemaCoverage,
    SchemaProgress,
};
use crate::governance::store::{ItemQuery, ItemStore, Page};
use crate::model::DescriptionModel;
use crate::permissions::{Capability, PermissionGate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewActivityReport {
    pub window_seconds: i64,
    pub buckets: Vec<ActivityBucket>,
    pub reviewers: Vec<ReviewerActivity>,
}

pub struct Governance {
    store: Arc<dyn ItemStore>,
    catalog: Arc<dyn CatalogDirectory>,
    gate: Arc<dyn PermissionGate>,
    operations: OperationRegistry,
    generation: GenerationEngine,
    review: ReviewCoordinator,
    apply: ApplyCoordinator,
}

impl Governance {
    pub fn new(
        store: Arc<dyn ItemStore>,
        catalog: Arc<dyn CatalogDirectory>,
        gate: Arc<dyn PermissionGate>,
        model: Arc<dyn DescriptionModel>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            generation: GenerationEngine::new(
                catalog.clone(),
                gate.clone(),
                model,
                store.clone(),
                config,
            ),
            review: ReviewCoordinator::new(store.clone()),
            apply: ApplyCoordinator::new(catalog.clone(), gate.clone(), store.clone()),
            operations: OperationRegistry::new(),
            store,
            catalog,
            gate,
        }
    }

    /// Create backing storage; safe to call repeatedly
    pub async fn setup(&self) -> Result<(), AppError> {
        self.store.setup().await
    }

    pub async fn generate(
        &self,
        principal: &str,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, AppError> {
        let handle = self.operations.register(OperationKind::Generate, principal).await;
        let outcome = self.generation.run(principal, request, &handle).await;
        self.operations
            .finish(handle.id, final_state(&outcome, |r| r.cancelled))
            .await;
        outcome
    }

    pub async fn review(
        &self,
        id: Uuid,
        decision: Decision,
        edited_text: Option<&str>,
        reviewer: &str,
    ) -> Result<DescriptionItem, AppError> {
        self.review.review(id, decision, edited_text, reviewer).await
    }

    pub async fn review_many(
        &self,
        ids: &[Uuid],
        decision: Decision,
        reviewer: &str,
    ) -> Result<Vec<BulkReviewOutcome>, AppError> {
        self.review.review_many(ids, decision, reviewer).await
    }

    pub async fn apply_approved(&self, principal: &str) -> Result<ApplyResult, AppError> {
        let handle = self.operations.register(OperationKind::Apply, principal).await;
        let outcome = self.apply.run(principal, &handle).await;
        self.operations
            .finish(handle.id, final_state(&outcome, |r| r.cancelled))
            .await;
        outcome
    }

    pub async fn stats(&self) -> Result<ComplianceStats, AppError> {
        let items = self.store.snapshot().await?;
        Ok(stats::compliance_stats(&items))
    }

    pub async fn schema_progress(&self) -> Result<Vec<SchemaProgress>, AppError> {
        let items = self.store.snapshot().await?;
        Ok(stats::schema_progress(&items))
    }

    pub async fn review_activity(&self, window: BucketWindow) -> Result<ReviewActivityReport, AppError> {
        let items = self.store.snapshot().await?;
        Ok(ReviewActivityReport {
            window_seconds: window.seconds(),
            buckets: stats::review_activity(&items, window),
            reviewers: stats::reviewer_activity(&items),
        })
    }

    pub async fn pending_reviews(&self, query: &ItemQuery) -> Result<Page<DescriptionItem>, AppError> {
        self.store.list(query).await
    }

    pub async fn get_item(&self, id: Uuid) -> Result<DescriptionItem, AppError> {
        self.store.get(id).await
    }

    pub async fn check_permissions(
        &self,
        principal: &str,
        catalog: &str,
        schema: &str,
    ) -> Result<Capability, AppError> {
        validate_identifier("catalog", catalog)?;
        validate_identifier("schema", schema)?;
        Ok(self.gate.check(principal, catalog, schema).await)
    }

    pub async fn list_catalogs(&self) -> Result<Vec<String>, AppError> {
        self.catalog.list_catalogs().await
    }

    pub async fn list_schemas(&self, catalog: &str) -> Result<Vec<String>, AppError> {
        validate_identifier("catalog", catalog)?;
        self.catalog.list_schemas(catalog).await
    }

    pub async fn list_tables(&self, catalog: &str, schema: &str) -> Result<Vec<TableSummary>, AppError> {
        validate_identifier("catalog", catalog)?;
        validate_identifier("schema", schema)?;
        self.catalog.list_tables(catalog, schema).await
    }

    /// Documented-table coverage per schema, straight from the catalog
    pub async fn coverage(&self, catalog: &str) -> Result<Vec<SchemaCoverage>, AppError> {
        validate_identifier("catalog", catalog)?;
        let schemas = self.catalog.list_schemas(catalog).await?;

        let mut rows = Vec::with_capacity(schemas.len());
        for schema in schemas {
            match self.catalog.list_tables(catalog, &schema).await {
                Ok(tables) if !tables.is_empty() => {
                    rows.push(stats::schema_coverage(&schema, &tables))
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping coverage for {}.{}: {}", catalog, schema, e),
            }
        }
        stats::sort_coverage(&mut rows);
        Ok(rows)
    }

    pub async fn operations(&self) -> Vec<OperationInfo> {
        self.operations.list().await
    }

    pub async fn cancel_operation(&self, id: Uuid) -> Result<OperationInfo, AppError> {
        let info = self.operations.cancel(id).await?;
        info!("Operation {} cancel requested", id);
        Ok(info)
    }
}

fn final_state<T>(outcome: &Result<T, AppError>, cancelled: impl Fn(&T) -> bool) -> OperationState {
    match outcome {
        Ok(result) if cancelled(result) => OperationState::Cancelled,
        Ok(_) => OperationState::Completed,
        Err(_) => OperationState::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::generate::GenerationTarget;
    use crate::governance::item::ItemStatus;
    use crate::governance::store::MemoryItemStore;
    use crate::testing::{FakeCatalog, FakeGate, FakeModel, CATALOG};
    use pretty_assertions::assert_eq;

    fn governance(catalog: FakeCatalog) -> Governance {
        Governance::new(
            Arc::new(MemoryItemStore::new()),
            Arc::new(catalog),
            Arc::new(FakeGate::allow_all()),
            Arc::new(FakeModel::new()),
            GenerationConfig {
                delay_ms: 0,
                ..GenerationConfig::default()
            },
        )
    }

    fn sales_request() -> GenerationRequest {
        GenerationRequest {
            target: GenerationTarget::Schema {
                catalog: CATALOG.to_string(),
                schema: "sales".to_string(),
                tables: vec!["orders".to_string()],
                batch_size: None,
            },
            include_documented: false,
        }
    }

    #[tokio::test]
    async fn test_full_lifecycle_reaches_full_compliance() {
        let gov = governance(
            FakeCatalog::new().with_table("sales", "orders", &[("id", "bigint", None)]),
        );
        gov.setup().await.unwrap();

        let generated = gov.generate("ana", &sales_request()).await.unwrap();
        assert_eq!(generated.generated, 2);

        let pending = gov.pending_reviews(&ItemQuery::pending(1, 20)).await.unwrap();
        for item in &pending.items {
            gov.review(item.id, Decision::Approve, None, "ana").await.unwrap();
        }

        let applied = gov.apply_approved("ana").await.unwrap();
        assert_eq!(applied.applied_count, 2);

        let stats = gov.stats().await.unwrap();
        assert_eq!(stats.counts.applied, 2);
        assert_eq!(stats.compliance_score, 100.0);
        assert_eq!(stats.compliance_grade, 'A');

        let item = gov.get_item(pending.items[0].id).await.unwrap();
        assert_eq!(item.status, ItemStatus::Applied);

        let coverage = gov.coverage(CATALOG).await.unwrap();
        assert_eq!(coverage[0].documented, 1);
    }

    #[tokio::test]
    async fn test_operations_are_recorded_with_final_state() {
        let gov = governance(
            FakeCatalog::new().with_table("sales", "orders", &[("id", "bigint", None)]),
        );
        gov.generate("ana", &sales_request()).await.unwrap();
        gov.apply_approved("bob").await.unwrap();

        let ops = gov.operations().await;
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|op| op.state == OperationState::Completed));
        assert!(ops.iter().any(|op| op.kind == OperationKind::Apply && op.principal == "bob"));

        assert!(matches!(gov.cancel_operation(ops[0].id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_check_permissions_validates_identifiers() {
        let gov = governance(FakeCatalog::new());
        assert!(matches!(
            gov.check_permissions("ana", "main", "bad schema").await,
            Err(AppError::Validation { .. })
        ));
        let cap = gov.check_permissions("ana", "main", "sales").await.unwrap();
        assert!(cap.can_modify);
    }
}
