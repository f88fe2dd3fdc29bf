//! Enforcement and Status Entry Points
//!
//! What the request-handling layer calls before executing an operation,
//! and what the admin status endpoint calls to report usage.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::config::{FailurePolicy, LimitsConfiguration};
use super::context::{OperationContext, ResourceContext, ScopeKey, SecurityContext};
use super::engine::{Decision, LimitsEngine};
use super::error::LimitsError;
use super::snapshot::LimitsResponse;
use super::store::UsageCounter;
use crate::metrics;

/// Limits enforcement seam
#[async_trait]
pub trait Limits: Send + Sync {
    /// Reject the operation if it would exceed a ceiling
    ///
    /// # Errors
    ///
    /// - [`LimitsError::LimitExceeded`] when the ceiling is reached
    /// - [`LimitsError::StoreUnavailable`] when usage cannot be read and
    ///   the failure policy is fail-closed
    async fn enforce_limits(
        &self,
        security: &SecurityContext,
        operation: &OperationContext,
        resource: &ResourceContext,
    ) -> Result<(), LimitsError>;

    /// Current usage against every configured ceiling
    async fn get_limits(&self) -> LimitsResponse;
}

/// Validate `config` and build the limits implementation it asks for
///
/// Configuration is validated even when enforcement is disabled, so a
/// malformed file never reaches production unnoticed.
pub fn init(
    config: LimitsConfiguration,
    store: Arc<dyn UsageCounter>,
) -> Result<Arc<dyn Limits>, LimitsError> {
    let enabled = config.enabled;
    let engine = LimitsEngine::init(config, store)?;

    if !enabled {
        info!("Limits enforcement is disabled");
        return Ok(Arc::new(DefaultLimits));
    }

    Ok(Arc::new(CountingLimits::new(engine)))
}

/// Allows everything and reports nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLimits;

#[async_trait]
impl Limits for DefaultLimits {
    async fn enforce_limits(
        &self,
        _security: &SecurityContext,
        _operation: &OperationContext,
        _resource: &ResourceContext,
    ) -> Result<(), LimitsError> {
        Ok(())
    }

    async fn get_limits(&self) -> LimitsResponse {
        LimitsResponse::disabled()
    }
}

/// Enforces configured ceilings against live counts
#[derive(Debug, Clone)]
pub struct CountingLimits {
    engine: LimitsEngine,
}

impl CountingLimits {
    pub fn new(engine: LimitsEngine) -> Self {
        Self { engine }
    }

    /// Usage for a single scope (e.g. one tenant)
    pub async fn get_limits_for(&self, scope: &ScopeKey) -> LimitsResponse {
        self.engine.snapshot(scope).await.into()
    }
}

#[async_trait]
impl Limits for CountingLimits {
    async fn enforce_limits(
        &self,
        security: &SecurityContext,
        operation: &OperationContext,
        resource: &ResourceContext,
    ) -> Result<(), LimitsError> {
        let label = resource
            .category()
            .map(|c| c.as_str())
            .unwrap_or("untracked");

        match self.engine.evaluate(security, operation, resource).await {
            Ok(Decision::Allowed(reason)) => {
                record(label, reason.outcome());
                Ok(())
            }
            Ok(Decision::Denied(exceeded)) => {
                warn!(
                    "Denied {} on {} for {}: {}",
                    operation.operation, resource, security.principal, exceeded
                );
                record(label, "denied");
                Err(exceeded.into())
            }
            Err(err @ LimitsError::StoreUnavailable { .. }) => {
                match self.engine.config().failure_policy {
                    FailurePolicy::FailOpen => {
                        warn!(
                            "Allowing {} on {} without a limit check (fail-open): {}",
                            operation.operation, resource, err
                        );
                        record(label, "fail_open");
                        Ok(())
                    }
                    FailurePolicy::FailClosed => {
                        error!(
                            "Rejecting {} on {}: {}",
                            operation.operation, resource, err
                        );
                        record(label, "store_unavailable");
                        Err(err)
                    }
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn get_limits(&self) -> LimitsResponse {
        self.get_limits_for(&ScopeKey::Global).await
    }
}

fn record(category: &str, outcome: &str) {
    metrics::LIMIT_CHECKS_TOTAL
        .with_label_values(&[category, outcome])
        .inc();
}
