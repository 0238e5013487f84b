//! Credref Config
//!
//! This crate contains the serializable configuration for a credential
//! reference migration run. The configuration is an explicit value handed to
//! the driver at construction; nothing here reads ambient global state.
//!
//! Configuration can be loaded from:
//! - JSON files (via CLI with `--config=migration.json`)
//! - Command line overrides applied on top of the file or the defaults
//!
//! # Examples
//!
//! ```json
//! {
//!   "tables": { "prefix": "n8n_", "schema": "automation" },
//!   "recent_execution_limit": 200,
//!   "concurrency": 8,
//!   "timeout_secs": 600,
//!   "dry_run": false
//! }
//! ```

mod error;
mod migration;
mod tables;

pub use error::ConfigError;
pub use migration::MigrationConfig;
pub use tables::{TableConfig, TableNames};
