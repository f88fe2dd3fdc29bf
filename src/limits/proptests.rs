//! Property-Based Tests for Limits Enforcement
//!
//! Invariants that must hold for any ceiling, count and operation:
//!
//! - Untracked categories and unlimited ceilings always allow
//! - A bounded ceiling denies exactly when `count >= ceiling`
//! - Ungated operations are allowed regardless of count
//! - Snapshots have one entry per configured category and a clamped `remaining`
//! - Ceilings below `-1` never produce an engine

use proptest::prelude::*;
use std::sync::Arc;

use super::category::{OperationKind, ResourceCategory};
use super::config::{CategoryLimit, LimitsConfiguration, UNLIMITED};
use super::context::{OperationContext, ResourceContext, ScopeKey, SecurityContext};
use super::engine::LimitsEngine;
use super::enforcement::init;
use super::error::{LimitExceeded, LimitsError};
use super::store::InMemoryUsageStore;

fn arb_category() -> impl Strategy<Value = ResourceCategory> {
    prop::sample::select(ResourceCategory::ALL.to_vec())
}

fn arb_operation() -> impl Strategy<Value = OperationKind> {
    prop::sample::select(vec![
        OperationKind::Create,
        OperationKind::Ingest,
        OperationKind::Read,
        OperationKind::Update,
        OperationKind::Delete,
    ])
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn store_with(category: ResourceCategory, count: u64) -> InMemoryUsageStore {
    let store = InMemoryUsageStore::new();
    store.set(category, ScopeKey::Global, count).await;
    store
}

proptest! {
    #[test]
    fn prop_unconfigured_category_always_allows(
        configured in arb_category(),
        requested in arb_category(),
        op in arb_operation(),
        count in any::<u64>(),
    ) {
        prop_assume!(configured != requested);
        let outcome = runtime().block_on(async {
            let store = store_with(requested, count).await;
            store.make_unavailable(requested).await;
            let config = LimitsConfiguration::new()
                .with_category(configured, CategoryLimit::new(0));
            let limits = init(config, Arc::new(store)).unwrap();
            limits
                .enforce_limits(
                    &SecurityContext::user("alice"),
                    &OperationContext::new(op),
                    &ResourceContext::for_category(requested),
                )
                .await
        });
        prop_assert!(outcome.is_ok());
    }

    #[test]
    fn prop_unlimited_always_allows(
        category in arb_category(),
        count in any::<u64>(),
    ) {
        let outcome = runtime().block_on(async {
            let store = store_with(category, count).await;
            let config = LimitsConfiguration::new()
                .with_category(category, CategoryLimit::unlimited());
            let limits = init(config, Arc::new(store)).unwrap();
            limits
                .enforce_limits(
                    &SecurityContext::user("alice"),
                    &OperationContext::create(),
                    &ResourceContext::for_category(category),
                )
                .await
        });
        prop_assert!(outcome.is_ok());
    }

    #[test]
    fn prop_bounded_denies_iff_at_or_over_ceiling(
        category in arb_category(),
        ceiling in 0u64..1_000,
        count in 0u64..2_000,
    ) {
        let outcome = runtime().block_on(async {
            let store = store_with(category, count).await;
            let config = LimitsConfiguration::new()
                .with_category(category, CategoryLimit::new(ceiling as i64));
            let limits = init(config, Arc::new(store)).unwrap();
            limits
                .enforce_limits(
                    &SecurityContext::user("alice"),
                    &OperationContext::create(),
                    &ResourceContext::for_category(category),
                )
                .await
        });

        if count < ceiling {
            prop_assert!(outcome.is_ok());
        } else {
            prop_assert_eq!(
                outcome,
                Err(LimitsError::LimitExceeded(LimitExceeded {
                    category,
                    ceiling,
                    current_count: count,
                }))
            );
        }
    }

    #[test]
    fn prop_ungated_operations_always_allowed(
        category in arb_category(),
        op in prop::sample::select(vec![
            OperationKind::Read,
            OperationKind::Update,
            OperationKind::Delete,
        ]),
        count in any::<u64>(),
    ) {
        let outcome = runtime().block_on(async {
            let store = store_with(category, count).await;
            let config = LimitsConfiguration::new().with_category(
                category,
                CategoryLimit::new(1).gating([OperationKind::Create, OperationKind::Ingest]),
            );
            let limits = init(config, Arc::new(store)).unwrap();
            limits
                .enforce_limits(
                    &SecurityContext::user("alice"),
                    &OperationContext::new(op),
                    &ResourceContext::for_category(category),
                )
                .await
        });
        prop_assert!(outcome.is_ok());
    }

    #[test]
    fn prop_snapshot_one_entry_per_category(
        limits in prop::collection::btree_map(arb_category(), -1i64..50, 0..8),
        count in 0u64..100,
    ) {
        let snapshot = runtime().block_on(async {
            let store = InMemoryUsageStore::new();
            let mut config = LimitsConfiguration::new();
            for (category, max) in &limits {
                store.set(*category, ScopeKey::Global, count).await;
                config = config.with_category(*category, CategoryLimit::new(*max));
            }
            let engine = LimitsEngine::init(config, Arc::new(store)).unwrap();
            engine.snapshot(&ScopeKey::Global).await
        });

        prop_assert_eq!(snapshot.categories.len(), limits.len());
        for usage in &snapshot.categories {
            let max = limits[&usage.category];
            prop_assert_eq!(usage.max_count, max);
            if max == UNLIMITED {
                prop_assert!(usage.is_unlimited());
                prop_assert_eq!(usage.remaining(), None);
            } else {
                prop_assert_eq!(usage.remaining(), Some((max as u64).saturating_sub(count)));
            }
        }
    }

    #[test]
    fn prop_ceilings_below_unlimited_rejected(
        category in arb_category(),
        max in i64::MIN..-1,
    ) {
        let config = LimitsConfiguration::new().with_category(category, CategoryLimit::new(max));
        let result = LimitsEngine::init(config, Arc::new(InMemoryUsageStore::new()));
        prop_assert!(matches!(result, Err(LimitsError::ConfigurationInvalid(_))));
    }
}
