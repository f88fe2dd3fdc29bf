//! Usage Snapshot and LimitsResponse
//!
//! Point-in-time usage against every configured ceiling. Recomputed on
//! every status query and never persisted.

use serde::{Deserialize, Serialize};

use super::category::ResourceCategory;
use super::config::UNLIMITED;
use super::context::ScopeKey;

/// Result of counting one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UsageState {
    /// Count was read
    Known { current_count: u64 },
    /// Count could not be read
    Unknown { reason: String },
}

/// Usage of a single category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUsage {
    pub category: ResourceCategory,
    pub max_count: i64,
    pub state: UsageState,
}

impl CategoryUsage {
    pub fn is_unlimited(&self) -> bool {
        self.max_count == UNLIMITED
    }

    pub fn current_count(&self) -> Option<u64> {
        match self.state {
            UsageState::Known { current_count } => Some(current_count),
            UsageState::Unknown { .. } => None,
        }
    }

    /// Slots left before the ceiling; `None` when unlimited or unknown
    pub fn remaining(&self) -> Option<u64> {
        if self.is_unlimited() {
            return None;
        }
        let max = self.max_count.max(0) as u64;
        self.current_count().map(|current| max.saturating_sub(current))
    }
}

/// Usage across every configured category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub scope: ScopeKey,
    pub categories: Vec<CategoryUsage>,
}

impl UsageSnapshot {
    pub fn get(&self, category: ResourceCategory) -> Option<&CategoryUsage> {
        self.categories.iter().find(|c| c.category == category)
    }

    /// Categories whose count could not be read
    pub fn unknown_categories(&self) -> Vec<ResourceCategory> {
        self.categories
            .iter()
            .filter(|c| c.current_count().is_none())
            .map(|c| c.category)
            .collect()
    }
}

/// Status of one category in a [`LimitsResponse`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
    Ok,
    Unknown,
}

/// Serialized usage of one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryLimitStatus {
    pub category: ResourceCategory,
    pub max_count: i64,
    pub unlimited: bool,
    pub current_count: Option<u64>,
    pub remaining: Option<u64>,
    pub status: UsageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<CategoryUsage> for CategoryLimitStatus {
    fn from(usage: CategoryUsage) -> Self {
        let unlimited = usage.is_unlimited();
        let current_count = usage.current_count();
        let remaining = usage.remaining();
        let (status, error) = match usage.state {
            UsageState::Known { .. } => (UsageStatus::Ok, None),
            UsageState::Unknown { reason } => (UsageStatus::Unknown, Some(reason)),
        };

        Self {
            category: usage.category,
            max_count: usage.max_count,
            unlimited,
            current_count,
            remaining,
            status,
            error,
        }
    }
}

/// Serialized snapshot returned by the status entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitsResponse {
    pub enabled: bool,
    pub scope: ScopeKey,
    pub categories: Vec<CategoryLimitStatus>,
}

impl LimitsResponse {
    /// Response for an installation with enforcement turned off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            scope: ScopeKey::Global,
            categories: Vec::new(),
        }
    }

    pub fn get(&self, category: ResourceCategory) -> Option<&CategoryLimitStatus> {
        self.categories.iter().find(|c| c.category == category)
    }
}

impl From<UsageSnapshot> for LimitsResponse {
    fn from(snapshot: UsageSnapshot) -> Self {
        Self {
            enabled: true,
            scope: snapshot.scope,
            categories: snapshot.categories.into_iter().map(Into::into).collect(),
        }
    }
}
