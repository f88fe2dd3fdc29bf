// Metadata Limits - Main Entry Point
//
// Command line front end for the limits engine:
// - Validate a limits configuration
// - Report usage against configured ceilings
// - Check a single operation
// - Serve the HTTP enforcement and status API

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metadata_limits::config::{Config, StoreBackend, StoreConfig};
use metadata_limits::limits::{
    self, CountingLimits, InMemoryUsageStore, LimitsEngine, LimitsError, LimitsResponse,
    OperationContext, OperationKind, ResourceContext, ScopeKey, SecurityContext,
    SqliteUsageStore, UsageCounter,
};
use metadata_limits::{logging, server};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

/// metalimits: resource ceilings for a metadata platform
#[derive(Parser, Debug)]
#[command(name = "metalimits")]
#[command(version)]
#[command(about = "Resource usage limits for a multi-tenant metadata platform", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration and exit
    Validate,
    /// Print usage against every configured ceiling as JSON
    Status {
        /// Report a single tenant instead of the whole installation
        #[arg(long)]
        tenant: Option<String>,
    },
    /// Check whether one operation would be allowed
    Check {
        /// Resource type (e.g. table, user, ingestion_pipeline)
        #[arg(long)]
        resource: String,

        /// Fully qualified name of the resource, for log context
        #[arg(long)]
        name: Option<String>,

        /// Operation kind
        #[arg(long, default_value = "create")]
        operation: OperationKind,

        /// Calling principal
        #[arg(long, default_value = "cli")]
        principal: String,

        /// Tenant of the caller
        #[arg(long)]
        tenant: Option<String>,

        /// Treat the caller as a platform admin
        #[arg(long)]
        admin: bool,
    },
    /// Serve the enforcement and status API
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Config::load_from_path(path)?
        }
        None => Config::load()?,
    };

    logging::init_tracing(&config.logging, args.verbose)?;

    match args.command {
        Commands::Validate => validate(&config),
        Commands::Status { tenant } => status(&config, tenant).await,
        Commands::Check {
            resource,
            name,
            operation,
            principal,
            tenant,
            admin,
        } => {
            let mut security = if admin {
                SecurityContext::admin(&principal)
            } else {
                SecurityContext::user(&principal)
            };
            if let Some(tenant) = tenant {
                security = security.in_tenant(&tenant);
            }
            let mut resource = ResourceContext::new(&resource);
            if let Some(name) = name {
                resource = resource.named(&name);
            }
            check(&config, security, OperationContext::new(operation), resource).await
        }
        Commands::Serve { port } => serve(config, port).await,
    }
}

fn validate(config: &Config) -> Result<ExitCode> {
    // Ceilings are validated without touching the store
    LimitsEngine::init(config.limits.clone(), Arc::new(InMemoryUsageStore::new()))
        .context("Invalid limits configuration")?;

    println!(
        "Configuration is valid: {} categories configured, enforcement {}",
        config.limits.categories.len(),
        if config.limits.enabled { "enabled" } else { "disabled" }
    );
    Ok(ExitCode::SUCCESS)
}

async fn status(config: &Config, tenant: Option<String>) -> Result<ExitCode> {
    if tenant.is_some()
        && config.store.backend == StoreBackend::Sqlite
        && config.store.sqlite.tenant_column.is_none()
    {
        anyhow::bail!("--tenant requires store.tenant_column for the sqlite backend");
    }

    let response = if config.limits.enabled {
        let store = build_store(&config.store)?;
        let engine = LimitsEngine::init(config.limits.clone(), store)?;
        let scope = tenant.map(ScopeKey::Tenant).unwrap_or(ScopeKey::Global);
        CountingLimits::new(engine).get_limits_for(&scope).await
    } else {
        LimitsEngine::init(config.limits.clone(), Arc::new(InMemoryUsageStore::new()))?;
        LimitsResponse::disabled()
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(ExitCode::SUCCESS)
}

async fn check(
    config: &Config,
    security: SecurityContext,
    operation: OperationContext,
    resource: ResourceContext,
) -> Result<ExitCode> {
    let store = build_store(&config.store)?;
    let limits = limits::init(config.limits.clone(), store)?;

    match limits.enforce_limits(&security, &operation, &resource).await {
        Ok(()) => {
            println!("allowed: {} {}", operation.operation, resource);
            Ok(ExitCode::SUCCESS)
        }
        Err(err @ LimitsError::LimitExceeded(_)) => {
            println!("denied: {}", err);
            Ok(ExitCode::from(1))
        }
        Err(err @ LimitsError::StoreUnavailable { .. }) => {
            println!("unavailable: {}", err);
            Ok(ExitCode::from(2))
        }
        Err(err) => Err(err.into()),
    }
}

async fn serve(config: Config, port: Option<u16>) -> Result<ExitCode> {
    let store = build_store(&config.store)?;
    let limits = limits::init(config.limits.clone(), store)?;

    let port = port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", config.server.host, port)
        .parse()
        .with_context(|| format!("Invalid server address {}:{}", config.server.host, port))?;

    info!("metalimits v{} starting", env!("CARGO_PKG_VERSION"));
    server::start_server(addr, limits).await?;
    Ok(ExitCode::SUCCESS)
}

fn build_store(config: &StoreConfig) -> Result<Arc<dyn UsageCounter>> {
    match config.backend {
        StoreBackend::Sqlite => {
            let store = SqliteUsageStore::open(&config.database_path, config.sqlite.clone())
                .with_context(|| {
                    format!("Failed to open usage database {}", config.database_path)
                })?;
            info!("Counting usage from {}", config.database_path);
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            info!("Using in-memory usage store");
            Ok(Arc::new(InMemoryUsageStore::new()))
        }
    }
}
