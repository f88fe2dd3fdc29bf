//! Resource Categories and Operation Kinds
//!
//! The closed set of countable entities a deployment can put a ceiling on,
//! and the operation kinds a ceiling can gate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of countable entity in the metadata platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Table,
    Database,
    DatabaseSchema,
    User,
    Team,
    Bot,
    Pipeline,
    IngestionPipeline,
    Dashboard,
    Chart,
    Topic,
    MlModel,
    Container,
    SearchIndex,
    StoredProcedure,
    GlossaryTerm,
    Domain,
    DataProduct,
    TestCase,
    App,
}

impl ResourceCategory {
    /// Every category, in declaration order
    pub const ALL: [ResourceCategory; 20] = [
        ResourceCategory::Table,
        ResourceCategory::Database,
        ResourceCategory::DatabaseSchema,
        ResourceCategory::User,
        ResourceCategory::Team,
        ResourceCategory::Bot,
        ResourceCategory::Pipeline,
        ResourceCategory::IngestionPipeline,
        ResourceCategory::Dashboard,
        ResourceCategory::Chart,
        ResourceCategory::Topic,
        ResourceCategory::MlModel,
        ResourceCategory::Container,
        ResourceCategory::SearchIndex,
        ResourceCategory::StoredProcedure,
        ResourceCategory::GlossaryTerm,
        ResourceCategory::Domain,
        ResourceCategory::DataProduct,
        ResourceCategory::TestCase,
        ResourceCategory::App,
    ];

    /// Wire name, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceCategory::Table => "table",
            ResourceCategory::Database => "database",
            ResourceCategory::DatabaseSchema => "database_schema",
            ResourceCategory::User => "user",
            ResourceCategory::Team => "team",
            ResourceCategory::Bot => "bot",
            ResourceCategory::Pipeline => "pipeline",
            ResourceCategory::IngestionPipeline => "ingestion_pipeline",
            ResourceCategory::Dashboard => "dashboard",
            ResourceCategory::Chart => "chart",
            ResourceCategory::Topic => "topic",
            ResourceCategory::MlModel => "ml_model",
            ResourceCategory::Container => "container",
            ResourceCategory::SearchIndex => "search_index",
            ResourceCategory::StoredProcedure => "stored_procedure",
            ResourceCategory::GlossaryTerm => "glossary_term",
            ResourceCategory::Domain => "domain",
            ResourceCategory::DataProduct => "data_product",
            ResourceCategory::TestCase => "test_case",
            ResourceCategory::App => "app",
        }
    }

    /// Default backing table for the relational counter
    pub fn default_table(&self) -> String {
        format!("{}_entity", self.as_str())
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a resource type names no known category
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown resource category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for ResourceCategory {
    type Err = UnknownCategory;

    /// Accepts the wire name as well as the camelCase entity type names
    /// used by the authorization layer (`databaseSchema`, `mlmodel`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        ResourceCategory::ALL
            .iter()
            .copied()
            .find(|category| category.as_str().replace('_', "") == normalized)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Kind of operation being performed on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Ingest,
    Read,
    Update,
    Delete,
}

impl OperationKind {
    /// Wire name, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Ingest => "ingest",
            OperationKind::Read => "read",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "create" => Ok(OperationKind::Create),
            "ingest" => Ok(OperationKind::Ingest),
            "read" | "view" => Ok(OperationKind::Read),
            "update" | "edit" => Ok(OperationKind::Update),
            "delete" => Ok(OperationKind::Delete),
            other => Err(format!("Unknown operation kind: {}", other)),
        }
    }
}
