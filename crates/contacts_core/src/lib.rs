//! Core domain logic for the contact manager.
//! Organizations own units, units own persons; this crate keeps both sides of
//! every association consistent and persists the tree.

pub mod config;
pub mod db;
pub mod graph;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{AppConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError};
pub use graph::{ContactGraph, GraphChange, GraphError, OrgKey, PersonKey, UnitKey};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::contact::{
    ContactValidationError, EntityKind, Organization, OrganizationDraft, OrganizationEntry,
    OrganizationId, Person, PersonDraft, PersonEntry, PersonId, Unit, UnitDraft, UnitEntry,
    UnitId,
};
pub use repo::contact_repo::{ContactRepository, RepoError, RepoResult};
pub use repo::memory_repo::MemoryContactRepository;
pub use repo::sqlite_repo::SqliteContactRepository;
pub use service::contact_service::{
    ContactService, ContactServiceError, ContactServiceResult, ContactSnapshot,
};
pub use service::refresh::{spawn_snapshot_refresh, RefreshError, RefreshHandle};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
