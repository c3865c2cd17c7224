//! Optimistic review queue
//!
//! Each review removes the item locally before the remote call and keeps the
//! removed item as the snapshot for that operation. A failed call puts the
//! snapshot back; a successful one discards it.

use crate::error::AppError;
use crate::governance::store::{sort_for_listing, DEFAULT_PER_PAGE};
use crate::governance::{Decision, DescriptionItem, Governance, ItemQuery, ItemStatus, Page};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// Remote side of the review queue
#[async_trait]
pub trait ReviewBackend: Send + Sync {
    async fn fetch_pending(&self, page: u32, per_page: u32)
        -> Result<Page<DescriptionItem>, AppError>;

    async fn submit_review(
        &self,
        id: Uuid,
        decision: Decision,
        edited_text: Option<&str>,
        reviewer: &str,
    ) -> Result<DescriptionItem, AppError>;
}

/// In-process backend over the governance facade
#[async_trait]
impl ReviewBackend for Governance {
    async fn fetch_pending(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Page<DescriptionItem>, AppError> {
        self.pending_reviews(&ItemQuery::new(vec![ItemStatus::Pending], page, per_page))
            .await
    }

    async fn submit_review(
        &self,
        id: Uuid,
        decision: Decision,
        edited_text: Option<&str>,
        reviewer: &str,
    ) -> Result<DescriptionItem, AppError> {
        self.review(id, decision, edited_text, reviewer).await
    }
}

/// Local cache of one page of PENDING items for a single reviewer
pub struct ReviewQueue<B> {
    backend: B,
    reviewer: String,
    per_page: u32,
    page: RwLock<Page<DescriptionItem>>,
    /// Items removed by reviews that have not resolved yet
    snapshots: RwLock<HashMap<Uuid, DescriptionItem>>,
    stale: AtomicBool,
}

impl<B: ReviewBackend> ReviewQueue<B> {
    pub fn new(backend: B, reviewer: impl Into<String>) -> Self {
        Self::with_page_size(backend, reviewer, DEFAULT_PER_PAGE)
    }

    pub fn with_page_size(backend: B, reviewer: impl Into<String>, per_page: u32) -> Self {
        Self {
            backend,
            reviewer: reviewer.into(),
            per_page,
            page: RwLock::new(Page {
                items: Vec::new(),
                page: 1,
                per_page,
                total: 0,
            }),
            snapshots: RwLock::new(HashMap::new()),
            stale: AtomicBool::new(false),
        }
    }

    /// Replace the local page with the server's view
    pub async fn refresh(&self, page: u32) -> Result<(), AppError> {
        let fresh = self.backend.fetch_pending(page, self.per_page).await?;
        debug!(
            "Review queue loaded page {} ({} of {} items)",
            fresh.page,
            fresh.items.len(),
            fresh.total
        );
        *self.page.write().await = fresh;
        self.stale.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub async fn items(&self) -> Vec<DescriptionItem> {
        self.page.read().await.items.clone()
    }

    /// Server-side total as of the last refresh, adjusted for local removals
    pub async fn total(&self) -> u64 {
        self.page.read().await.total
    }

    /// Set after a conflict; the caller should `refresh`
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    /// Reviews started but not resolved
    pub async fn outstanding(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn approve(
        &self,
        id: Uuid,
        edited_text: Option<&str>,
    ) -> Result<DescriptionItem, AppError> {
        self.review(id, Decision::Approve, edited_text).await
    }

    pub async fn reject(&self, id: Uuid) -> Result<DescriptionItem, AppError> {
        self.review(id, Decision::Reject, None).await
    }

    async fn review(
        &self,
        id: Uuid,
        decision: Decision,
        edited_text: Option<&str>,
    ) -> Result<DescriptionItem, AppError> {
        self.take_local(id).await?;

        match self
            .backend
            .submit_review(id, decision, edited_text, &self.reviewer)
            .await
        {
            Ok(item) => {
                self.snapshots.write().await.remove(&id);
                Ok(item)
            }
            Err(e) => {
                warn!("Review of {} failed, restoring local item: {}", id, e);
                if matches!(e, AppError::NotFound(_)) {
                    self.stale.store(true, Ordering::SeqCst);
                }
                self.restore(id).await;
                Err(e)
            }
        }
    }

    /// Remove the item from the page and keep it as this operation's snapshot
    async fn take_local(&self, id: Uuid) -> Result<(), AppError> {
        let mut page = self.page.write().await;
        let position = page
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Item {} is not in the review queue", id)))?;

        let item = page.items.remove(position);
        page.total = page.total.saturating_sub(1);
        self.snapshots.write().await.insert(id, item);
        Ok(())
    }

    async fn restore(&self, id: Uuid) {
        let Some(item) = self.snapshots.write().await.remove(&id) else {
            return;
        };
        let mut page = self.page.write().await;
        page.items.push(item);
        page.total += 1;
        sort_for_listing(&mut page.items);
    }
}
