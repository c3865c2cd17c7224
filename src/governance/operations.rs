//! Long-running operation registry
//!
//! Generation and apply runs register here so they can be listed and
//! cancelled. Cancellation stops new per-target work; work already in flight
//! finishes.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Finished operations kept for listing
const MAX_FINISHED: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Generate,
    Apply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationState {
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Public view of an operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationInfo {
    pub id: Uuid,
    pub kind: OperationKind,
    pub principal: String,
    pub state: OperationState,
    pub cancel_requested: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Cooperative cancellation flag shared with a running operation
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct Entry {
    info: OperationInfo,
    flag: CancelFlag,
}

/// Handle returned to the code running an operation
pub struct OperationHandle {
    pub id: Uuid,
    pub flag: CancelFlag,
}

pub struct OperationRegistry {
    operations: RwLock<HashMap<Uuid, Entry>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self {
            operations: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, kind: OperationKind, principal: &str) -> OperationHandle {
        let id = Uuid::new_v4();
        let flag = CancelFlag::new();
        let entry = Entry {
            info: OperationInfo {
                id,
                kind,
                principal: principal.to_string(),
                state: OperationState::Running,
                cancel_requested: false,
                started_at: Utc::now(),
                finished_at: None,
            },
            flag: flag.clone(),
        };

        let mut operations = self.operations.write().await;
        Self::prune(&mut operations);
        operations.insert(id, entry);
        OperationHandle { id, flag }
    }

    /// Mark an operation finished with its final state
    pub async fn finish(&self, id: Uuid, state: OperationState) {
        let mut operations = self.operations.write().await;
        if let Some(entry) = operations.get_mut(&id) {
            entry.info.state = state;
            entry.info.finished_at = Some(Utc::now());
        }
    }

    /// Request cancellation. Finished operations cannot be cancelled.
    pub async fn cancel(&self, id: Uuid) -> Result<OperationInfo, AppError> {
        let mut operations = self.operations.write().await;
        let entry = operations
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Operation {} not found", id)))?;

        if entry.info.state != OperationState::Running {
            return Err(AppError::NotFound(format!(
                "Operation {} is no longer running ({:?})",
                id, entry.info.state
            )));
        }

        entry.flag.cancel();
        entry.info.cancel_requested = true;
        info!("Cancellation requested for {:?} operation {}", entry.info.kind, id);
        Ok(entry.info.clone())
    }

    /// Operations, newest first
    pub async fn list(&self) -> Vec<OperationInfo> {
        let operations = self.operations.read().await;
        let mut infos: Vec<OperationInfo> = operations.values().map(|e| e.info.clone()).collect();
        infos.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        infos
    }

    fn prune(operations: &mut HashMap<Uuid, Entry>) {
        let mut finished: Vec<(DateTime<Utc>, Uuid)> = operations
            .values()
            .filter_map(|e| e.info.finished_at.map(|at| (at, e.info.id)))
            .collect();
        if finished.len() < MAX_FINISHED {
            return;
        }
        finished.sort();
        for (_, id) in finished.iter().take(finished.len() + 1 - MAX_FINISHED) {
            operations.remove(id);
        }
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_sets_flag_and_blocks_after_finish() {
        let registry = OperationRegistry::new();
        let handle = registry.register(OperationKind::Generate, "ana").await;

        let info = registry.cancel(handle.id).await.unwrap();
        assert!(info.cancel_requested);
        assert!(handle.flag.is_cancelled());

        registry.finish(handle.id, OperationState::Cancelled).await;
        assert!(matches!(registry.cancel(handle.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            registry.cancel(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_finished_operations_are_pruned() {
        let registry = OperationRegistry::new();
        for _ in 0..(MAX_FINISHED + 5) {
            let handle = registry.register(OperationKind::Apply, "ana").await;
            registry.finish(handle.id, OperationState::Completed).await;
        }
        let running = registry.register(OperationKind::Apply, "ana").await;

        let listed = registry.list().await;
        assert!(listed.len() <= MAX_FINISHED + 1);
        assert!(listed.iter().any(|op| op.id == running.id));
    }
}
