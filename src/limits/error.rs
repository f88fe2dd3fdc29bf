//! Limits Error Types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::category::ResourceCategory;

/// A gated operation would take a category past its ceiling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("Limit reached for {category}: {current_count} of {ceiling} in use")]
pub struct LimitExceeded {
    pub category: ResourceCategory,
    pub ceiling: u64,
    pub current_count: u64,
}

/// Failure reading from the usage counter store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Backend reported an error (connectivity, missing table, ...)
    #[error("Store backend error: {0}")]
    Backend(String),

    /// Read did not complete within the configured bound
    #[error("Store read timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Tenant-scoped count requested but the store has no tenant mapping
    #[error("No tenant mapping for {0}, cannot count per tenant")]
    TenantUnmapped(ResourceCategory),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Error types for limits enforcement
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimitsError {
    /// Malformed limits; the engine refuses to start
    #[error("Invalid limits configuration: {0}")]
    ConfigurationInvalid(String),

    /// Operation rejected because the ceiling is reached
    #[error(transparent)]
    LimitExceeded(#[from] LimitExceeded),

    /// Usage could not be counted, so no decision was made
    #[error("Limits enforcement unavailable for {category}: {source}")]
    StoreUnavailable {
        category: ResourceCategory,
        #[source]
        source: StoreError,
    },
}

impl LimitsError {
    /// Whether this error came from a reached ceiling
    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, LimitsError::LimitExceeded(_))
    }

    /// Whether this error came from an unreadable store
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, LimitsError::StoreUnavailable { .. })
    }
}
