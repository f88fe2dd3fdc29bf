//! Request Contexts
//!
//! Read-only facts produced upstream by authentication and authorization:
//! who is calling, what they are doing, and to which resource.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::category::{OperationKind, ResourceCategory};
use super::config::ScopeStrategy;

/// Caller identity as resolved by the authentication layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityContext {
    /// Principal name
    pub principal: String,

    /// Tenant the caller belongs to, if the installation is multi-tenant
    pub tenant: Option<String>,

    /// Platform administrator
    pub is_admin: bool,

    /// System or bootstrap identity
    pub is_system: bool,
}

impl SecurityContext {
    /// Regular user
    pub fn user(principal: &str) -> Self {
        Self {
            principal: principal.to_string(),
            ..Self::default()
        }
    }

    /// Platform administrator
    pub fn admin(principal: &str) -> Self {
        Self {
            principal: principal.to_string(),
            is_admin: true,
            ..Self::default()
        }
    }

    /// System identity used during bootstrap and internal jobs
    pub fn system() -> Self {
        Self {
            principal: "system".to_string(),
            is_system: true,
            ..Self::default()
        }
    }

    /// Attach a tenant id
    pub fn in_tenant(mut self, tenant: &str) -> Self {
        self.tenant = Some(tenant.to_string());
        self
    }

    /// Key used to scope count queries for this caller
    ///
    /// A per-tenant scope without a tenant id falls back to the global
    /// count, which is never smaller than any tenant's count.
    pub fn scope_key(&self, strategy: ScopeStrategy) -> ScopeKey {
        match (strategy, &self.tenant) {
            (ScopeStrategy::PerTenant, Some(tenant)) => ScopeKey::Tenant(tenant.clone()),
            _ => ScopeKey::Global,
        }
    }
}

/// Operation being performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationContext {
    pub operation: OperationKind,
}

impl OperationContext {
    pub fn new(operation: OperationKind) -> Self {
        Self { operation }
    }

    pub fn create() -> Self {
        Self::new(OperationKind::Create)
    }
}

/// Resource being acted on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceContext {
    /// Entity type as named by the authorization layer
    pub resource_type: String,

    /// Fully qualified name of the entity, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ResourceContext {
    pub fn new(resource_type: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            name: None,
        }
    }

    pub fn for_category(category: ResourceCategory) -> Self {
        Self::new(category.as_str())
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Category this resource counts against, if it is a tracked kind
    pub fn category(&self) -> Option<ResourceCategory> {
        self.resource_type.parse().ok()
    }
}

impl fmt::Display for ResourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} {}", self.resource_type, name),
            None => f.write_str(&self.resource_type),
        }
    }
}

/// Partition a count query is scoped to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum ScopeKey {
    Global,
    Tenant(String),
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKey::Global => f.write_str("global"),
            ScopeKey::Tenant(id) => write!(f, "tenant:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_display_includes_name() {
        let bare = ResourceContext::for_category(ResourceCategory::Table);
        assert_eq!(bare.to_string(), "table");

        let named = bare.named("warehouse.sales.orders");
        assert_eq!(named.to_string(), "table warehouse.sales.orders");
        assert_eq!(named.category(), Some(ResourceCategory::Table));
    }

    #[test]
    fn test_scope_key_global_strategy_ignores_tenant() {
        let ctx = SecurityContext::user("alice").in_tenant("acme");
        assert_eq!(ctx.scope_key(ScopeStrategy::Global), ScopeKey::Global);
    }

    #[test]
    fn test_scope_key_per_tenant() {
        let ctx = SecurityContext::user("alice").in_tenant("acme");
        assert_eq!(
            ctx.scope_key(ScopeStrategy::PerTenant),
            ScopeKey::Tenant("acme".to_string())
        );
    }

    #[test]
    fn test_scope_key_per_tenant_without_tenant_falls_back() {
        let ctx = SecurityContext::user("alice");
        assert_eq!(ctx.scope_key(ScopeStrategy::PerTenant), ScopeKey::Global);
    }

    #[test]
    fn test_resource_category_resolution() {
        assert_eq!(
            ResourceContext::new("table").category(),
            Some(ResourceCategory::Table)
        );
        assert_eq!(
            ResourceContext::new("ingestionPipeline").category(),
            Some(ResourceCategory::IngestionPipeline)
        );
        assert_eq!(ResourceContext::new("lineage").category(), None);
    }

    #[test]
    fn test_security_context_deserializes_with_defaults() {
        let ctx: SecurityContext = serde_json::from_str(r#"{"principal":"bob"}"#).unwrap();
        assert_eq!(ctx, SecurityContext::user("bob"));
    }

    #[test]
    fn test_scope_key_display() {
        assert_eq!(ScopeKey::Global.to_string(), "global");
        assert_eq!(ScopeKey::Tenant("acme".into()).to_string(), "tenant:acme");
    }
}
