//! Configuration loading and hot-reloading for the tenantgate gateway.
//!
//! Uses figment for YAML + environment configuration with sensible defaults,
//! and notify + arc-swap for live file watching.

pub mod schema;
pub mod watcher;

pub use schema::{Config, ENV_PREFIX, LogConfig, LogFormat, ProxyConfig, TenantConfig};
pub use watcher::ConfigWatcher;
