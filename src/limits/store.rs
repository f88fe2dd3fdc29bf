//! Usage Counter Store
//!
//! The narrow counting seam the engine reads through, plus an in-memory
//! implementation used by tests and the `memory` backend.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::category::ResourceCategory;
use super::context::ScopeKey;
use super::error::StoreError;

/// Read-only count of live resources per category
///
/// Implementations answer "how many resources of this category exist in
/// this scope right now". Creating and deleting resources, and therefore
/// keeping the counts current, is the storage layer's job.
#[async_trait]
pub trait UsageCounter: Send + Sync {
    /// Count live resources of `category` within `scope`
    async fn count(
        &self,
        category: ResourceCategory,
        scope: &ScopeKey,
    ) -> Result<u64, StoreError>;
}

/// In-memory usage store
///
/// Counts are kept per `(category, tenant)`; a global query sums every
/// entry for the category.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUsageStore {
    /// Live counts
    counts: Arc<RwLock<HashMap<(ResourceCategory, ScopeKey), u64>>>,

    /// Categories whose reads currently fail
    unavailable: Arc<RwLock<HashSet<ResourceCategory>>>,
}

impl InMemoryUsageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the count for a category in a scope
    pub async fn set(&self, category: ResourceCategory, scope: ScopeKey, count: u64) {
        let mut counts = self.counts.write().await;
        counts.insert((category, scope), count);
    }

    /// Record a resource being created
    pub async fn increment(&self, category: ResourceCategory, scope: ScopeKey) -> u64 {
        let mut counts = self.counts.write().await;
        let entry = counts.entry((category, scope)).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Record a resource being deleted
    pub async fn decrement(&self, category: ResourceCategory, scope: ScopeKey) -> u64 {
        let mut counts = self.counts.write().await;
        let entry = counts.entry((category, scope)).or_insert(0);
        *entry = entry.saturating_sub(1);
        *entry
    }

    /// Make reads for a category fail until [`restore`](Self::restore)
    pub async fn make_unavailable(&self, category: ResourceCategory) {
        self.unavailable.write().await.insert(category);
    }

    /// Undo [`make_unavailable`](Self::make_unavailable)
    pub async fn restore(&self, category: ResourceCategory) {
        self.unavailable.write().await.remove(&category);
    }

    /// Clear all counts and failures
    pub async fn clear(&self) {
        self.counts.write().await.clear();
        self.unavailable.write().await.clear();
    }
}

#[async_trait]
impl UsageCounter for InMemoryUsageStore {
    async fn count(
        &self,
        category: ResourceCategory,
        scope: &ScopeKey,
    ) -> Result<u64, StoreError> {
        if self.unavailable.read().await.contains(&category) {
            return Err(StoreError::Backend(format!(
                "{} counter is unreachable",
                category
            )));
        }

        let counts = self.counts.read().await;
        let total = match scope {
            ScopeKey::Global => counts
                .iter()
                .filter(|((c, _), _)| *c == category)
                .map(|(_, n)| *n)
                .fold(0u64, u64::saturating_add),
            tenant => counts.get(&(category, tenant.clone())).copied().unwrap_or(0),
        };

        Ok(total)
    }
}
