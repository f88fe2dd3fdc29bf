//! Limits Engine
//!
//! Holds the validated configuration and turns a request's contexts plus a
//! fresh store count into an allow/deny decision.
//!
//! The engine keeps no per-request state and takes no locks. Two concurrent
//! creates can both observe `ceiling - 1` and both pass, overshooting the
//! ceiling by one. Limits are governance controls, not capacity guarantees,
//! so this is accepted rather than serialized.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::category::{OperationKind, ResourceCategory};
use super::config::{LimitsConfiguration, UNLIMITED};
use super::context::{OperationContext, ResourceContext, ScopeKey, SecurityContext};
use super::error::{LimitExceeded, LimitsError, StoreError};
use super::snapshot::{CategoryUsage, UsageSnapshot, UsageState};
use super::store::UsageCounter;
use crate::metrics;

/// Validated ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ceiling {
    Unlimited,
    Bounded(u64),
}

impl Ceiling {
    /// Interpret a configured `max_count`; `None` for values below `-1`
    pub fn from_max_count(max_count: i64) -> Option<Self> {
        match max_count {
            UNLIMITED => Some(Ceiling::Unlimited),
            n if n >= 0 => Some(Ceiling::Bounded(n as u64)),
            _ => None,
        }
    }

    /// Configured representation
    pub fn max_count(&self) -> i64 {
        match self {
            Ceiling::Unlimited => UNLIMITED,
            Ceiling::Bounded(n) => *n as i64,
        }
    }
}

#[derive(Debug, Clone)]
struct GatedCategory {
    ceiling: Ceiling,
    enforced_operations: BTreeSet<OperationKind>,
}

/// Why an operation was allowed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowReason {
    /// Resource type is not a category with a configured ceiling
    NotTracked,
    /// Operation kind is not gated for this category
    NotGated,
    /// Caller bypasses limits
    Exempt,
    /// Category ceiling is unlimited
    Unlimited,
    /// Current count is below the ceiling
    WithinLimit { current_count: u64, ceiling: u64 },
}

impl AllowReason {
    /// Metric label
    pub fn outcome(&self) -> &'static str {
        match self {
            AllowReason::Exempt => "exempt",
            _ => "allowed",
        }
    }
}

/// Result of evaluating a request against the ceilings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed(AllowReason),
    Denied(LimitExceeded),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed(_))
    }
}

/// Limits engine
#[derive(Clone)]
pub struct LimitsEngine {
    /// Configuration as loaded
    config: Arc<LimitsConfiguration>,

    /// Validated ceilings
    categories: Arc<BTreeMap<ResourceCategory, GatedCategory>>,

    /// Usage counter
    store: Arc<dyn UsageCounter>,
}

impl fmt::Debug for LimitsEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimitsEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LimitsEngine {
    /// Validate `config` and bind it to `store`
    ///
    /// # Errors
    ///
    /// Returns [`LimitsError::ConfigurationInvalid`] listing every problem
    /// found: ceilings below `-1`, gated deletes, or a zero store timeout.
    pub fn init(
        config: LimitsConfiguration,
        store: Arc<dyn UsageCounter>,
    ) -> Result<Self, LimitsError> {
        let mut problems = Vec::new();
        let mut categories = BTreeMap::new();

        if config.store_timeout_ms == 0 {
            problems.push("store_timeout_ms must be > 0".to_string());
        }

        for (category, limit) in &config.categories {
            let Some(ceiling) = Ceiling::from_max_count(limit.max_count) else {
                problems.push(format!(
                    "{}: max_count must be -1 (unlimited) or >= 0, got {}",
                    category, limit.max_count
                ));
                continue;
            };

            if limit.enforced_operations.contains(&OperationKind::Delete) {
                problems.push(format!(
                    "{}: delete cannot be a gated operation",
                    category
                ));
                continue;
            }

            if limit.enforced_operations.is_empty() && ceiling != Ceiling::Unlimited {
                warn!(
                    "{} has a ceiling of {} but gates no operations",
                    category, limit.max_count
                );
            }

            categories.insert(
                *category,
                GatedCategory {
                    ceiling,
                    enforced_operations: limit.enforced_operations.clone(),
                },
            );
        }

        if !problems.is_empty() {
            return Err(LimitsError::ConfigurationInvalid(problems.join("; ")));
        }

        info!(
            "Limits engine ready: {} categories, scope {:?}, failure policy {:?}",
            categories.len(),
            config.scope,
            config.failure_policy
        );

        Ok(Self {
            config: Arc::new(config),
            categories: Arc::new(categories),
            store,
        })
    }

    /// Configuration the engine was initialized with
    pub fn config(&self) -> &LimitsConfiguration {
        &self.config
    }

    /// Whether the caller bypasses limits
    pub fn is_exempt(&self, security: &SecurityContext) -> bool {
        security.is_system
            || (security.is_admin && self.config.exempt_admins)
            || self
                .config
                .exempt_principals
                .iter()
                .any(|p| p == &security.principal)
    }

    /// Decide whether an operation may proceed
    ///
    /// Never touches the store for untracked categories, ungated
    /// operations, exempt callers, or unlimited ceilings.
    ///
    /// # Errors
    ///
    /// Returns [`LimitsError::StoreUnavailable`] when the count cannot be
    /// read. A failed read is never treated as an allow here; failure
    /// policy is applied by the caller.
    pub async fn evaluate(
        &self,
        security: &SecurityContext,
        operation: &OperationContext,
        resource: &ResourceContext,
    ) -> Result<Decision, LimitsError> {
        let Some((category, gated)) = resource
            .category()
            .and_then(|c| self.categories.get(&c).map(|g| (c, g)))
        else {
            debug!("{} is not tracked, allowing", resource.resource_type);
            return Ok(Decision::Allowed(AllowReason::NotTracked));
        };

        if !gated.enforced_operations.contains(&operation.operation) {
            return Ok(Decision::Allowed(AllowReason::NotGated));
        }

        if self.is_exempt(security) {
            debug!("{} is exempt from limits", security.principal);
            return Ok(Decision::Allowed(AllowReason::Exempt));
        }

        let ceiling = match gated.ceiling {
            Ceiling::Unlimited => return Ok(Decision::Allowed(AllowReason::Unlimited)),
            Ceiling::Bounded(n) => n,
        };

        let scope = security.scope_key(self.config.scope);
        let current_count = self
            .count(category, &scope)
            .await
            .map_err(|source| LimitsError::StoreUnavailable { category, source })?;

        if current_count >= ceiling {
            return Ok(Decision::Denied(LimitExceeded {
                category,
                ceiling,
                current_count,
            }));
        }

        Ok(Decision::Allowed(AllowReason::WithinLimit {
            current_count,
            ceiling,
        }))
    }

    /// Current usage against every configured ceiling
    ///
    /// A category whose count cannot be read is reported as unknown; the
    /// rest of the snapshot is still filled in.
    pub async fn snapshot(&self, scope: &ScopeKey) -> UsageSnapshot {
        let mut categories = Vec::with_capacity(self.categories.len());

        for (category, gated) in self.categories.iter() {
            let state = match self.count(*category, scope).await {
                Ok(current_count) => UsageState::Known { current_count },
                Err(e) => {
                    debug!("Usage for {} in {} is unknown: {}", category, scope, e);
                    UsageState::Unknown {
                        reason: e.to_string(),
                    }
                }
            };

            categories.push(CategoryUsage {
                category: *category,
                max_count: gated.ceiling.max_count(),
                state,
            });
        }

        let snapshot = UsageSnapshot {
            scope: scope.clone(),
            categories,
        };

        let unknown = snapshot.unknown_categories();
        if !unknown.is_empty() {
            warn!(
                "Usage snapshot for {} is partial, unreadable: {:?}",
                scope, unknown
            );
        }

        snapshot
    }

    /// Read a count, bounded by the configured store timeout
    async fn count(
        &self,
        category: ResourceCategory,
        scope: &ScopeKey,
    ) -> Result<u64, StoreError> {
        let timeout = self.config.store_timeout();
        let started = Instant::now();

        let result = match tokio::time::timeout(timeout, self.store.count(category, scope)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(timeout)),
        };

        metrics::STORE_READ_DURATION_SECONDS
            .with_label_values(&[category.as_str()])
            .observe(started.elapsed().as_secs_f64());
        if result.is_err() {
            metrics::STORE_ERRORS_TOTAL
                .with_label_values(&[category.as_str()])
                .inc();
        }

        result
    }
}
