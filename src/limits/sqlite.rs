//! Relational Usage Counter
//!
//! Counts live rows of the entity table behind each category.

use async_trait::async_trait;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::category::ResourceCategory;
use super::context::ScopeKey;
use super::error::StoreError;
use super::store::UsageCounter;

/// Table and column mapping for count queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteStoreOptions {
    /// Boolean column marking soft-deleted rows
    pub soft_delete_column: Option<String>,

    /// Column holding the owning tenant id
    pub tenant_column: Option<String>,

    /// Per-category table overrides (default `<category>_entity`)
    pub tables: HashMap<ResourceCategory, String>,
}

impl Default for SqliteStoreOptions {
    fn default() -> Self {
        Self {
            soft_delete_column: Some("deleted".to_string()),
            tenant_column: None,
            tables: HashMap::new(),
        }
    }
}

impl SqliteStoreOptions {
    /// Table backing a category
    pub fn table_for(&self, category: ResourceCategory) -> String {
        self.tables
            .get(&category)
            .cloned()
            .unwrap_or_else(|| category.default_table())
    }

    /// Check every identifier that will be spliced into SQL
    pub fn validate(&self) -> Result<(), String> {
        let columns = self
            .soft_delete_column
            .iter()
            .chain(self.tenant_column.iter());

        for ident in self.tables.values().chain(columns) {
            if !is_identifier(ident) {
                return Err(format!("Invalid SQL identifier: {:?}", ident));
            }
        }

        Ok(())
    }

    /// Build the count query for a category and scope
    ///
    /// Returns the SQL and whether it expects a tenant parameter. A tenant
    /// scope without a `tenant_column` is an error, never a global count.
    fn count_query(
        &self,
        category: ResourceCategory,
        scope: &ScopeKey,
    ) -> Result<(String, bool), StoreError> {
        let mut sql = format!("SELECT COUNT(*) FROM \"{}\"", self.table_for(category));
        let mut clauses = Vec::new();

        if let Some(col) = &self.soft_delete_column {
            clauses.push(format!("COALESCE(\"{}\", 0) = 0", col));
        }

        let bind_tenant = match (scope, &self.tenant_column) {
            (ScopeKey::Global, _) => false,
            (ScopeKey::Tenant(_), Some(col)) => {
                clauses.push(format!("\"{}\" = ?1", col));
                true
            }
            (ScopeKey::Tenant(_), None) => {
                return Err(StoreError::TenantUnmapped(category));
            }
        };

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        Ok((sql, bind_tenant))
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// SQLite-backed usage counter
#[derive(Debug, Clone)]
pub struct SqliteUsageStore {
    conn: Arc<Mutex<Connection>>,
    options: Arc<SqliteStoreOptions>,
}

impl SqliteUsageStore {
    /// Open an existing database read-only
    pub fn open<P: AsRef<Path>>(
        path: P,
        options: SqliteStoreOptions,
    ) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::from_connection(conn, options)
    }

    /// Wrap an already open connection
    pub fn from_connection(
        conn: Connection,
        options: SqliteStoreOptions,
    ) -> Result<Self, StoreError> {
        options.validate().map_err(StoreError::Backend)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            options: Arc::new(options),
        })
    }

    fn count_blocking(
        conn: &Mutex<Connection>,
        options: &SqliteStoreOptions,
        category: ResourceCategory,
        scope: &ScopeKey,
    ) -> Result<u64, StoreError> {
        let (sql, bind_tenant) = options.count_query(category, scope)?;
        let conn = conn
            .lock()
            .map_err(|_| StoreError::Backend("connection lock poisoned".to_string()))?;

        let count: i64 = match scope {
            ScopeKey::Tenant(tenant) if bind_tenant => {
                conn.query_row(&sql, [tenant], |row| row.get(0))?
            }
            _ => conn.query_row(&sql, [], |row| row.get(0))?,
        };

        tracing::trace!("{} -> {}", sql, count);
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl UsageCounter for SqliteUsageStore {
    async fn count(
        &self,
        category: ResourceCategory,
        scope: &ScopeKey,
    ) -> Result<u64, StoreError> {
        let conn = Arc::clone(&self.conn);
        let options = Arc::clone(&self.options);
        let scope = scope.clone();

        tokio::task::spawn_blocking(move || {
            Self::count_blocking(&conn, &options, category, &scope)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("count task failed: {}", e)))?
    }
}
