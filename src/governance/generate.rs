//! Description generation
//!
//! Resolves a target set of tables, asks the model for one description per
//! table and per eligible column, and stores each result as a PENDING item.
//! Failures are recorded per object and never abort the run.

use crate::catalog::{CatalogDirectory, ColumnMetadata};
use crate::config::GenerationConfig;
use crate::error::{validation_error, AppError};
use crate::governance::item::{validate_identifier, DescriptionItem, ObjectPath};
use crate::governance::operations::OperationHandle;
use crate::governance::store::ItemStore;
use crate::model::{DescriptionContext, DescriptionModel};
use crate::permissions::PermissionGate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Which tables to generate for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationTarget {
    /// Explicit fully-qualified table paths
    Tables(Vec<ObjectPath>),
    /// Tables of one schema, optionally narrowed to names
    Schema {
        catalog: String,
        schema: String,
        tables: Vec<String>,
        batch_size: Option<usize>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub target: GenerationTarget,
    /// Also generate for columns that already carry a comment
    pub include_documented: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationFailure {
    pub object_path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub operation_id: Uuid,
    pub total_found: usize,
    pub processed: usize,
    pub generated: usize,
    pub skipped: usize,
    pub errors: usize,
    pub failures: Vec<GenerationFailure>,
    pub cancelled: bool,
    pub items: Vec<DescriptionItem>,
}

impl GenerationResult {
    fn new(operation_id: Uuid) -> Self {
        Self {
            operation_id,
            total_found: 0,
            processed: 0,
            generated: 0,
            skipped: 0,
            errors: 0,
            failures: Vec::new(),
            cancelled: false,
            items: Vec::new(),
        }
    }

    fn fail(&mut self, path: &ObjectPath, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("Generation failed for {}: {}", path, reason);
        self.errors += 1;
        self.failures.push(GenerationFailure {
            object_path: path.to_string(),
            reason,
        });
    }
}

pub struct GenerationEngine {
    catalog: Arc<dyn CatalogDirectory>,
    gate: Arc<dyn PermissionGate>,
    model: Arc<dyn DescriptionModel>,
    store: Arc<dyn ItemStore>,
    config: GenerationConfig,
}

impl GenerationEngine {
    pub fn new(
        catalog: Arc<dyn CatalogDirectory>,
        gate: Arc<dyn PermissionGate>,
        model: Arc<dyn DescriptionModel>,
        store: Arc<dyn ItemStore>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            catalog,
            gate,
            model,
            store,
            config,
        }
    }

    /// Run a generation. Refuses to start when any target schema is not
    /// modifiable by `principal`.
    pub async fn run(
        &self,
        principal: &str,
        request: &GenerationRequest,
        operation: &OperationHandle,
    ) -> Result<GenerationResult, AppError> {
        let scopes = Self::scopes(&request.target)?;

        for (catalog, schema) in &scopes {
            let capability = self.gate.check(principal, catalog, schema).await;
            if !capability.can_modify {
                return Err(AppError::Permission {
                    message: format!(
                        "{} cannot modify {}.{}; nothing was generated",
                        principal, catalog, schema
                    ),
                    errors: capability.errors,
                });
            }
        }

        let (total_found, tables) = self.resolve_tables(&request.target).await?;
        let mut result = GenerationResult::new(operation.id);
        result.total_found = total_found;

        info!(
            "Generating descriptions for {} of {} tables (operation {})",
            tables.len(),
            total_found,
            operation.id
        );

        for (index, table) in tables.iter().enumerate() {
            if operation.flag.is_cancelled() {
                info!("Generation {} cancelled after {} tables", operation.id, index);
                result.cancelled = true;
                break;
            }
            if index > 0 && self.config.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.delay_ms)).await;
            }

            result.processed += 1;
            self.generate_table(table, request.include_documented, &mut result)
                .await;
        }

        info!(
            "Generation {} finished: {} generated, {} skipped, {} errors",
            operation.id, result.generated, result.skipped, result.errors
        );
        Ok(result)
    }

    /// Distinct (catalog, schema) pairs touched by a target
    fn scopes(target: &GenerationTarget) -> Result<BTreeSet<(String, String)>, AppError> {
        match target {
            GenerationTarget::Tables(paths) => {
                if paths.is_empty() {
                    return Err(validation_error("tables", "At least one table is required"));
                }
                if let Some(path) = paths.iter().find(|p| p.column.is_some()) {
                    return Err(validation_error(
                        "tables",
                        format!("{} is a column path; expected catalog.schema.table", path),
                    ));
                }
                Ok(paths
                    .iter()
                    .map(|p| (p.catalog.clone(), p.schema.clone()))
                    .collect())
            }
            GenerationTarget::Schema {
                catalog,
                schema,
                tables,
                batch_size,
            } => {
                if catalog.trim().is_empty() {
                    return Err(validation_error("catalog", "Catalog is required"));
                }
                if schema.trim().is_empty() {
                    return Err(validation_error("schema", "Schema is required"));
                }
                validate_identifier("catalog", catalog)?;
                validate_identifier("schema", schema)?;
                for table in tables {
                    validate_identifier("tables", table)?;
                }
                if *batch_size == Some(0) {
                    return Err(validation_error("batchSize", "Batch size must be at least 1"));
                }
                Ok(BTreeSet::from([(catalog.clone(), schema.clone())]))
            }
        }
    }

    /// Tables to process, plus how many were found before narrowing
    async fn resolve_tables(
        &self,
        target: &GenerationTarget,
    ) -> Result<(usize, Vec<ObjectPath>), AppError> {
        match target {
            GenerationTarget::Tables(paths) => {
                let mut seen = BTreeSet::new();
                let unique: Vec<ObjectPath> = paths
                    .iter()
                    .filter(|p| seen.insert(p.to_string()))
                    .cloned()
                    .collect();
                Ok((unique.len(), unique))
            }
            GenerationTarget::Schema {
                catalog,
                schema,
                tables,
                batch_size,
            } => {
                let found = self.catalog.list_tables(catalog, schema).await?;
                let total = found.len();

                let selected: Vec<String> = if tables.is_empty() {
                    let limit = batch_size.unwrap_or(self.config.batch_size);
                    found.into_iter().take(limit).map(|t| t.table_name).collect()
                } else {
                    found
                        .into_iter()
                        .filter(|t| tables.contains(&t.table_name))
                        .map(|t| t.table_name)
                        .collect()
                };

                let paths = selected
                    .iter()
                    .map(|table| ObjectPath::table(catalog, schema, table))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((total, paths))
            }
        }
    }

    async fn generate_table(
        &self,
        table: &ObjectPath,
        include_documented: bool,
        result: &mut GenerationResult,
    ) {
        let columns = match self
            .catalog
            .get_columns(&table.catalog, &table.schema, &table.table)
            .await
        {
            Ok(columns) => columns,
            Err(e) => {
                result.fail(table, format!("Failed to read column metadata: {}", e));
                return;
            }
        };

        let sample_rows = match self
            .catalog
            .sample_rows(&table.catalog, &table.schema, &table.table, self.config.sample_rows)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                debug!("Sampling {} failed, continuing without rows: {}", table, e);
                Vec::new()
            }
        };

        let table_context = DescriptionContext::Table {
            path: table.clone(),
            columns: columns.clone(),
            sample_rows: sample_rows.clone(),
        };
        self.generate_object(table, None, &table_context, result).await;

        for column in columns
            .iter()
            .filter(|c| include_documented || !c.is_documented())
        {
            let path = match ObjectPath::column(
                &table.catalog,
                &table.schema,
                &table.table,
                &column.column_name,
            ) {
                Ok(path) => path,
                Err(e) => {
                    let mut display = table.clone();
                    display.column = Some(column.column_name.clone());
                    result.fail(&display, e.to_string());
                    continue;
                }
            };
            let context = DescriptionContext::Column {
                path: path.clone(),
                data_type: column.data_type.clone(),
                sample_values: column_samples(&sample_rows, column),
            };
            self.generate_object(&path, Some(column.data_type.clone()), &context, result)
                .await;
        }
    }

    async fn generate_object(
        &self,
        path: &ObjectPath,
        column_data_type: Option<String>,
        context: &DescriptionContext,
        result: &mut GenerationResult,
    ) {
        let object_path = path.to_string();
        match self.store.find_open(path.object_type(), &object_path).await {
            Ok(Some(existing)) => {
                debug!("Skipping {}: open item {} exists", object_path, existing.id);
                result.skipped += 1;
                return;
            }
            Ok(None) => {}
            Err(e) => {
                result.fail(path, format!("Failed to check existing items: {}", e));
                return;
            }
        }

        let text = match self.model.generate_description(context).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                result.fail(path, e.to_string());
                return;
            }
        };
        if text.is_empty() {
            result.fail(path, "Model returned an empty description");
            return;
        }

        let item = DescriptionItem::new_pending(
            path,
            column_data_type,
            text,
            self.model.model_id().to_string(),
        );
        match self.store.insert(item).await {
            Ok(stored) => {
                result.generated += 1;
                if result.items.len() < self.config.sample_items {
                    result.items.push(stored);
                }
            }
            // Lost a race with another run for the same object
            Err(AppError::Validation { ref field, .. }) if field == "objectPath" => {
                result.skipped += 1;
            }
            Err(e) => result.fail(path, format!("Failed to store item: {}", e)),
        }
    }
}

fn column_samples(rows: &[serde_json::Value], column: &ColumnMetadata) -> Vec<serde_json::Value> {
    rows.iter()
        .filter_map(|row| row.get(&column.column_name).cloned())
        .collect()
}
