//! Item storage
//!
//! `ItemStore` is the single authority for item state. Every status change is
//! a compare-and-swap against the expected prior status, so two writers racing
//! on the same item cannot both win.

use crate::error::AppError;
use crate::governance::item::{DescriptionItem, ItemStatus, ObjectType, Transition};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// Paginated, status-filtered list query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    pub statuses: Vec<ItemStatus>,
    pub page: u32,
    pub per_page: u32,
}

impl ItemQuery {
    pub fn new(statuses: Vec<ItemStatus>, page: u32, per_page: u32) -> Self {
        Self {
            statuses,
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn pending(page: u32, per_page: u32) -> Self {
        Self::new(vec![ItemStatus::Pending], page, per_page)
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.per_page as usize
    }

    fn matches(&self, status: ItemStatus) -> bool {
        self.statuses.is_empty() || self.statuses.contains(&status)
    }
}

/// One page of results plus the total matching count
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

/// Newest first, id as the tie-breaker so pages are stable
pub fn sort_for_listing(items: &mut [DescriptionItem]) {
    items.sort_by(|a, b| {
        b.generated_at
            .cmp(&a.generated_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Persistence contract for description items
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Create backing storage; safe to call repeatedly
    async fn setup(&self) -> Result<(), AppError>;

    /// Insert a new PENDING item. Fails with a validation error on `objectPath`
    /// when an open item already exists for the same object.
    async fn insert(&self, item: DescriptionItem) -> Result<DescriptionItem, AppError>;

    async fn get(&self, id: Uuid) -> Result<DescriptionItem, AppError>;

    /// The PENDING or APPROVED item for an object, if any
    async fn find_open(
        &self,
        object_type: ObjectType,
        object_path: &str,
    ) -> Result<Option<DescriptionItem>, AppError>;

    async fn list(&self, query: &ItemQuery) -> Result<Page<DescriptionItem>, AppError>;

    /// Every item; each item is internally consistent
    async fn snapshot(&self) -> Result<Vec<DescriptionItem>, AppError>;

    /// Compare-and-swap on status. Fails with `NotFound` when the item does not
    /// exist or is no longer in `transition.source()`.
    async fn transition(
        &self,
        id: Uuid,
        transition: Transition,
    ) -> Result<DescriptionItem, AppError>;

    /// Record a failed catalog write on an item that is still APPROVED
    async fn record_apply_error(&self, id: Uuid, reason: &str)
        -> Result<DescriptionItem, AppError>;
}

pub(crate) fn duplicate_open_item(item: &DescriptionItem) -> AppError {
    AppError::Validation {
        field: "objectPath".to_string(),
        message: format!(
            "{} {} already has an open description awaiting review or apply",
            item.object_type, item.object_path
        ),
    }
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// Thread-safe in-memory item store.
///
/// The outer map lock is only taken exclusively to insert; transitions hold it
/// shared and serialize on the item's own mutex.
pub struct MemoryItemStore {
    items: RwLock<HashMap<Uuid, Arc<Mutex<DescriptionItem>>>>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    async fn entry(&self, id: Uuid) -> Result<Arc<Mutex<DescriptionItem>>, AppError> {
        let items = self.items.read().await;
        items
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Description item {} not found", id)))
    }

    async fn collect(&self) -> Vec<DescriptionItem> {
        let items = self.items.read().await;
        let mut out = Vec::with_capacity(items.len());
        for entry in items.values() {
            out.push(entry.lock().await.clone());
        }
        out
    }
}

impl Default for MemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn setup(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn insert(&self, item: DescriptionItem) -> Result<DescriptionItem, AppError> {
        let mut items = self.items.write().await;
        for entry in items.values() {
            let existing = entry.lock().await;
            if existing.status.is_open()
                && existing.object_type == item.object_type
                && existing.object_path == item.object_path
            {
                return Err(duplicate_open_item(&existing));
            }
        }
        items.insert(item.id, Arc::new(Mutex::new(item.clone())));
        debug!("Stored {} item {} ({})", item.object_type, item.id, item.object_path);
        Ok(item)
    }

    async fn get(&self, id: Uuid) -> Result<DescriptionItem, AppError> {
        let entry = self.entry(id).await?;
        let item = entry.lock().await;
        Ok(item.clone())
    }

    async fn find_open(
        &self,
        object_type: ObjectType,
        object_path: &str,
    ) -> Result<Option<DescriptionItem>, AppError> {
        Ok(self.collect().await.into_iter().find(|i| {
            i.status.is_open() && i.object_type == object_type && i.object_path == object_path
        }))
    }

    async fn list(&self, query: &ItemQuery) -> Result<Page<DescriptionItem>, AppError> {
        let mut matching: Vec<DescriptionItem> = self
            .collect()
            .await
            .into_iter()
            .filter(|i| query.matches(i.status))
            .collect();
        sort_for_listing(&mut matching);

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(query.offset())
            .take(query.per_page as usize)
            .collect();

        Ok(Page {
            items,
            page: query.page,
            per_page: query.per_page,
            total,
        })
    }

    async fn snapshot(&self) -> Result<Vec<DescriptionItem>, AppError> {
        // Inserts wait for the shared map lock; items are read one at a time,
        // each under its own mutex, so transitions may land mid-copy
        Ok(self.collect().await)
    }

    async fn transition(
        &self,
        id: Uuid,
        transition: Transition,
    ) -> Result<DescriptionItem, AppError> {
        let entry = self.entry(id).await?;
        let mut item = entry.lock().await;

        // Work on a copy so a rejected transition leaves no trace
        let mut next = item.clone();
        next.apply_transition(&transition, Utc::now())?;
        *item = next;

        debug!("Item {} moved {} -> {}", id, transition.source(), item.status);
        Ok(item.clone())
    }

    async fn record_apply_error(
        &self,
        id: Uuid,
        reason: &str,
    ) -> Result<DescriptionItem, AppError> {
        let entry = self.entry(id).await?;
        let mut item = entry.lock().await;
        if item.status != ItemStatus::Approved {
            return Err(AppError::NotFound(format!(
                "No APPROVED item with id {} (current status {})",
                id, item.status
            )));
        }
        item.apply_error = Some(reason.to_string());
        Ok(item.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::item::ObjectPath;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn item(path: &str) -> DescriptionItem {
        DescriptionItem::new_pending(
            &ObjectPath::parse(path).unwrap(),
            Some("string".to_string()),
            format!("About {}", path),
            "test-model".to_string(),
        )
    }

    fn approve(reviewer: &str) -> Transition {
        Transition::Approve {
            text: "Approved text".to_string(),
            reviewer: reviewer.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_open_item() {
        let store = MemoryItemStore::new();
        let first = store.insert(item("main.sales.orders")).await.unwrap();

        let err = store.insert(item("main.sales.orders")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "objectPath"));

        // Once the open item is rejected the object can be regenerated
        store
            .transition(first.id, Transition::Reject { reviewer: "ana".to_string() })
            .await
            .unwrap();
        assert!(store.insert(item("main.sales.orders")).await.is_ok());
    }

    #[tokio::test]
    async fn test_same_path_different_type_is_not_a_duplicate() {
        let store = MemoryItemStore::new();
        store.insert(item("main.sales.orders")).await.unwrap();
        store.insert(item("main.sales.orders.id")).await.unwrap();
        assert_eq!(store.snapshot().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_reviews_exactly_one_wins() {
        let store = Arc::new(MemoryItemStore::new());
        let created = store.insert(item("main.sales.orders")).await.unwrap();

        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.transition(created.id, approve("ana")).await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .transition(created.id, Transition::Reject { reviewer: "bob".to_string() })
                    .await
            })
        };

        let results = vec![a.await.unwrap(), b.await.unwrap()];
        let winners: Vec<&DescriptionItem> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        let losers = results
            .iter()
            .filter(|r| matches!(r, Err(AppError::NotFound(_))))
            .count();

        assert_eq!(winners.len(), 1);
        assert_eq!(losers, 1);

        let stored = store.get(created.id).await.unwrap();
        assert_eq!(stored.status, winners[0].status);
        assert_eq!(stored.reviewer, winners[0].reviewer);
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates_newest_first() {
        let store = MemoryItemStore::new();
        let base = Utc::now();
        for i in 0..5 {
            let mut it = item(&format!("main.sales.t{}", i));
            it.generated_at = base + Duration::seconds(i);
            store.insert(it).await.unwrap();
        }
        let approved = store.list(&ItemQuery::pending(1, 1)).await.unwrap().items[0].id;
        store.transition(approved, approve("ana")).await.unwrap();

        let first = store.list(&ItemQuery::pending(1, 2)).await.unwrap();
        let second = store.list(&ItemQuery::pending(2, 2)).await.unwrap();

        assert_eq!(first.total, 4);
        let paths: Vec<_> = first
            .items
            .iter()
            .chain(second.items.iter())
            .map(|i| i.object_path.as_str())
            .collect();
        assert_eq!(
            paths,
            vec!["main.sales.t3", "main.sales.t2", "main.sales.t1", "main.sales.t0"]
        );
    }

    #[tokio::test]
    async fn test_apply_error_only_on_approved_items() {
        let store = MemoryItemStore::new();
        let created = store.insert(item("main.sales.orders")).await.unwrap();

        assert!(matches!(
            store.record_apply_error(created.id, "boom").await,
            Err(AppError::NotFound(_))
        ));

        store.transition(created.id, approve("ana")).await.unwrap();
        let failed = store.record_apply_error(created.id, "boom").await.unwrap();
        assert_eq!(failed.status, ItemStatus::Approved);
        assert_eq!(failed.apply_error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_query_clamps_page_bounds() {
        let query = ItemQuery::pending(0, 1000);
        assert_eq!(query.page, 1);
        assert_eq!(query.per_page, MAX_PER_PAGE);
        assert_eq!(ItemQuery::pending(3, 20).offset(), 40);
    }
}
