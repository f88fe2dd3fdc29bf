//! Resource Limits Enforcement
//!
//! Decides, per incoming operation, whether the caller may proceed given
//! configured ceilings on resource counts, and reports usage against those
//! ceilings.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │        Limits (enforce_limits / get_limits entry points)      │
//! │        CountingLimits: failure policy, metrics, logging       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  LimitsEngine                                                 │
//! │   gating fast path → exemption → bounded store read → compare │
//! ├──────────────────────────────────────────────────────────────┤
//! │  UsageCounter (count(category, scope))                        │
//! │   InMemoryUsageStore  │  SqliteUsageStore                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Counts are always read fresh; nothing is cached across requests.
//! Initialization validates the configuration once and the result is
//! immutable for the life of the process.

pub mod category;
pub mod config;
pub mod context;
pub mod enforcement;
pub mod engine;
pub mod error;
pub mod snapshot;
pub mod sqlite;
pub mod store;

#[cfg(test)]
mod proptests;

pub use category::{OperationKind, ResourceCategory};
pub use config::{CategoryLimit, FailurePolicy, LimitsConfiguration, ScopeStrategy, UNLIMITED};
pub use context::{OperationContext, ResourceContext, ScopeKey, SecurityContext};
pub use enforcement::{init, CountingLimits, DefaultLimits, Limits};
pub use engine::{AllowReason, Ceiling, Decision, LimitsEngine};
pub use error::{LimitExceeded, LimitsError, StoreError};
pub use snapshot::{
    CategoryLimitStatus, CategoryUsage, LimitsResponse, UsageSnapshot, UsageState, UsageStatus,
};
pub use sqlite::{SqliteStoreOptions, SqliteUsageStore};
pub use store::{InMemoryUsageStore, UsageCounter};
