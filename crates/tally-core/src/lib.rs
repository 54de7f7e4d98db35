//! tally-core library.
//!
//! Initiatives are tracked per entity. Members may only act inside their own
//! entity, and what they submit waits for an admin to approve it. Admin
//! changes apply immediately. Progress rolls up from weighted key activities.
//!
//! [`facade::Engine`] is the entry point; the other modules are the pieces it
//! composes and are public so tools can reuse them (list filtering, rollup,
//! access predicates) without going through a store.

/// # Conventions
///
/// - **Errors**: typed [`error::WorkflowError`] from the engine, `anyhow::Result`
///   at file and database boundaries.
/// - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).
pub mod access;
pub mod alerts;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod facade;
pub mod identity;
pub mod lock;
pub mod model;
pub mod notify;
pub mod rollup;
pub mod store;
pub mod visibility;
pub mod workflow;

pub use error::{ErrorCode, WorkflowError};
pub use facade::{Engine, Outcome, Settings};
pub use identity::{IdentityContext, StaticIdentity};
