//! Credref Migration
//!
//! This crate rewrites how stored workflows and executions reference
//! credentials. Going up, name-only references become `{id, name}`
//! references resolved against the credential catalog; going down reverses
//! that, falling back to the carried name when an id no longer resolves.
//!
//! The pieces, leaf first:
//! - [`CredentialCatalog`] - snapshot of credentials with first-match lookups
//! - [`resolve`] - converts one reference in a given [`Direction`]
//! - [`for_each_reference`] - walks a node list's credential maps
//! - [`RecordRewriter`] - applies the resolver to a whole record in place
//! - [`MigrationDriver`] - selects records, rewrites them, persists the dirty ones

mod catalog;
mod driver;
mod error;
mod report;
mod resolver;
mod rewriter;
mod scanner;

pub use catalog::CredentialCatalog;
pub use driver::MigrationDriver;
pub use error::MigrationError;
pub use report::{MigrationReport, PhaseReport, RecordFailure};
pub use resolver::{Direction, Resolution, resolve};
pub use rewriter::{RecordRewriter, RewriteOutcome};
pub use scanner::for_each_reference;
