//! Metadata Limits Library
//!
//! Resource-usage ceilings for a multi-tenant metadata platform: the
//! enforcement engine, its usage stores, service configuration, and the
//! HTTP surface used by request handlers and admins.

pub mod config;
pub mod limits;
pub mod logging;
pub mod metrics;
pub mod server;
