//! Limits Configuration
//!
//! Parsed, immutable description of the ceilings a deployment enforces.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use super::category::{OperationKind, ResourceCategory};

/// Ceiling sentinel meaning "no limit"
pub const UNLIMITED: i64 = -1;

/// Default store read timeout in milliseconds
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 2000;

/// Ceiling for a single resource category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLimit {
    /// Maximum allowed count, or `-1` for unlimited
    pub max_count: i64,

    /// Operation kinds gated by this ceiling
    #[serde(default = "default_enforced_operations")]
    pub enforced_operations: BTreeSet<OperationKind>,
}

fn default_enforced_operations() -> BTreeSet<OperationKind> {
    BTreeSet::from([OperationKind::Create])
}

impl CategoryLimit {
    /// Ceiling gating creates only
    pub fn new(max_count: i64) -> Self {
        Self {
            max_count,
            enforced_operations: default_enforced_operations(),
        }
    }

    /// Unlimited ceiling
    pub fn unlimited() -> Self {
        Self::new(UNLIMITED)
    }

    /// Replace the set of gated operations
    pub fn gating(mut self, operations: impl IntoIterator<Item = OperationKind>) -> Self {
        self.enforced_operations = operations.into_iter().collect();
        self
    }
}

/// How usage counts are partitioned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeStrategy {
    /// One count per category for the whole installation
    #[default]
    Global,
    /// One count per category per tenant
    PerTenant,
}

/// What to do when the usage store cannot be read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Reject the operation
    #[default]
    FailClosed,
    /// Allow the operation and log a warning
    FailOpen,
}

/// Limits configuration, loaded once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfiguration {
    /// Enable limits enforcement
    pub enabled: bool,

    /// Partitioning of usage counts
    pub scope: ScopeStrategy,

    /// Behavior when the store is unavailable
    pub failure_policy: FailurePolicy,

    /// Upper bound on a single store read
    pub store_timeout_ms: u64,

    /// Platform admins bypass limits
    pub exempt_admins: bool,

    /// Principals that bypass limits (bots, bootstrap identities)
    pub exempt_principals: Vec<String>,

    /// Per-category ceilings; absent categories are unlimited
    pub categories: BTreeMap<ResourceCategory, CategoryLimit>,
}

impl Default for LimitsConfiguration {
    fn default() -> Self {
        Self {
            enabled: true,
            scope: ScopeStrategy::Global,
            failure_policy: FailurePolicy::FailClosed,
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            exempt_admins: true,
            exempt_principals: Vec::new(),
            categories: BTreeMap::new(),
        }
    }
}

impl LimitsConfiguration {
    /// Create an empty configuration (every category unlimited)
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable enforcement
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Add or replace a category ceiling
    pub fn with_category(mut self, category: ResourceCategory, limit: CategoryLimit) -> Self {
        self.categories.insert(category, limit);
        self
    }

    /// Get the store read timeout
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
