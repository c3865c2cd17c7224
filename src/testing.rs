//! In-process fakes for the external collaborators

use crate::catalog::{CatalogDirectory, ColumnMetadata, TableSummary};
use crate::error::AppError;
use crate::governance::item::ObjectPath;
use crate::governance::operations::CancelFlag;
use crate::model::{DescriptionContext, DescriptionModel};
use crate::permissions::{Capability, PermissionGate};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const CATALOG: &str = "main";

#[derive(Debug, Clone)]
pub struct FakeTable {
    pub name: String,
    pub comment: Option<String>,
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<serde_json::Value>,
}

/// Catalog with a fixed set of tables that records written comments
#[derive(Default)]
pub struct FakeCatalog {
    schemas: Mutex<BTreeMap<String, Vec<FakeTable>>>,
    pub written: Mutex<Vec<(String, String)>>,
    failing_writes: Mutex<HashSet<String>>,
    cancel_after_write: Mutex<Option<CancelFlag>>,
    cancel_after_columns: Mutex<Option<CancelFlag>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table; columns are `(name, type, comment)`
    pub fn with_table(self, schema: &str, table: &str, columns: &[(&str, &str, Option<&str>)]) -> Self {
        let columns: Vec<ColumnMetadata> = columns
            .iter()
            .enumerate()
            .map(|(i, (name, data_type, comment))| ColumnMetadata {
                column_name: name.to_string(),
                data_type: data_type.to_string(),
                comment: comment.map(str::to_string),
                ordinal_position: i as i32 + 1,
            })
            .collect();
        let row = columns
            .iter()
            .map(|c| (c.column_name.clone(), json!(format!("{}-value", c.column_name))))
            .collect::<serde_json::Map<_, _>>();

        self.schemas
            .lock()
            .unwrap()
            .entry(schema.to_string())
            .or_default()
            .push(FakeTable {
                name: table.to_string(),
                comment: None,
                columns,
                rows: vec![serde_json::Value::Object(row)],
            });
        self
    }

    /// Make `write_comment` fail for a path
    pub fn fail_writes_for(&self, path: &str) {
        self.failing_writes.lock().unwrap().insert(path.to_string());
    }

    pub fn heal_writes(&self) {
        self.failing_writes.lock().unwrap().clear();
    }

    /// Cancel `flag` right after the next successful comment write
    pub fn cancel_after_write(&self, flag: CancelFlag) {
        *self.cancel_after_write.lock().unwrap() = Some(flag);
    }

    /// Cancel `flag` right after the next column listing
    pub fn cancel_after_columns(&self, flag: CancelFlag) {
        *self.cancel_after_columns.lock().unwrap() = Some(flag);
    }

    pub fn written_paths(&self) -> Vec<String> {
        self.written.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    fn table(&self, schema: &str, table: &str) -> Result<FakeTable, AppError> {
        self.schemas
            .lock()
            .unwrap()
            .get(schema)
            .and_then(|tables| tables.iter().find(|t| t.name == table).cloned())
            .ok_or_else(|| AppError::External(format!("Table {}.{} not found", schema, table)))
    }
}

#[async_trait]
impl CatalogDirectory for FakeCatalog {
    async fn list_catalogs(&self) -> Result<Vec<String>, AppError> {
        Ok(vec![CATALOG.to_string()])
    }

    async fn list_schemas(&self, _catalog: &str) -> Result<Vec<String>, AppError> {
        Ok(self.schemas.lock().unwrap().keys().cloned().collect())
    }

    async fn list_tables(&self, _catalog: &str, schema: &str) -> Result<Vec<TableSummary>, AppError> {
        let schemas = self.schemas.lock().unwrap();
        let tables = schemas
            .get(schema)
            .ok_or_else(|| AppError::External(format!("Schema {} not found", schema)))?;
        Ok(tables
            .iter()
            .map(|t| TableSummary {
                table_name: t.name.clone(),
                table_type: "BASE TABLE".to_string(),
                column_count: t.columns.len() as i64,
                current_comment: t.comment.clone(),
            })
            .collect())
    }

    async fn get_columns(
        &self,
        _catalog: &str,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnMetadata>, AppError> {
        let columns = self.table(schema, table)?.columns;
        if let Some(flag) = self.cancel_after_columns.lock().unwrap().take() {
            flag.cancel();
        }
        Ok(columns)
    }

    async fn sample_rows(
        &self,
        _catalog: &str,
        schema: &str,
        table: &str,
        limit: usize,
    ) -> Result<Vec<serde_json::Value>, AppError> {
        Ok(self.table(schema, table)?.rows.into_iter().take(limit).collect())
    }

    async fn write_comment(&self, path: &ObjectPath, text: &str) -> Result<(), AppError> {
        let key = path.to_string();
        if self.failing_writes.lock().unwrap().contains(&key) {
            return Err(AppError::External(format!("write to {} timed out", key)));
        }
        self.written.lock().unwrap().push((key, text.to_string()));
        if let Some(flag) = self.cancel_after_write.lock().unwrap().take() {
            flag.cancel();
        }

        let mut schemas = self.schemas.lock().unwrap();
        if let Some(table) = schemas
            .get_mut(&path.schema)
            .and_then(|tables| tables.iter_mut().find(|t| t.name == path.table))
        {
            match &path.column {
                None => table.comment = Some(text.to_string()),
                Some(column) => {
                    if let Some(c) = table.columns.iter_mut().find(|c| &c.column_name == column) {
                        c.comment = Some(text.to_string());
                    }
                }
            }
        }
        Ok(())
    }
}

/// Gate that allows everything except listed schemas
#[derive(Default)]
pub struct FakeGate {
    denied: Mutex<HashSet<String>>,
    pub checks: AtomicUsize,
}

impl FakeGate {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn deny(self, schema: &str) -> Self {
        self.denied.lock().unwrap().insert(schema.to_string());
        self
    }
}

#[async_trait]
impl PermissionGate for FakeGate {
    async fn check(&self, principal: &str, catalog: &str, schema: &str) -> Capability {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if self.denied.lock().unwrap().contains(schema) {
            return Capability {
                can_modify: false,
                can_select: true,
                user: principal.to_string(),
                errors: vec![format!("Missing CREATE privilege on schema '{}.{}'", catalog, schema)],
            };
        }
        Capability {
            can_modify: true,
            can_select: true,
            user: principal.to_string(),
            errors: Vec::new(),
        }
    }
}

/// Model that echoes the object path and can be told to fail for some paths
#[derive(Default)]
pub struct FakeModel {
    failing: Mutex<HashSet<String>>,
    empty: Mutex<HashSet<String>>,
    pub calls: AtomicUsize,
}

impl FakeModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(self, path: &str) -> Self {
        self.failing.lock().unwrap().insert(path.to_string());
        self
    }

    pub fn empty_for(self, path: &str) -> Self {
        self.empty.lock().unwrap().insert(path.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DescriptionModel for FakeModel {
    fn model_id(&self) -> &str {
        "fake-model"
    }

    async fn generate_description(&self, context: &DescriptionContext) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = context.path().to_string();
        if self.failing.lock().unwrap().contains(&path) {
            return Err(AppError::External(format!("model unavailable for {}", path)));
        }
        if self.empty.lock().unwrap().contains(&path) {
            return Ok("   ".to_string());
        }
        Ok(format!("Describes {}", path))
    }
}
