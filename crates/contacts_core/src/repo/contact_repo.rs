//! Contact repository contract and error type.
//!
//! # Responsibility
//! - Define per-entity find-all / find-by-id / create / update / delete.
//! - Give every backend the same error vocabulary.
//!
//! # Invariants
//! - Each write is one atomic unit: it either fully applies or leaves the
//!   store untouched.
//! - Lists are ordered by name then id; child id lists likewise.

use crate::db::DbError;
use crate::graph::GraphError;
use crate::model::contact::{
    ContactSnapshot, ContactValidationError, EntityKind, OrganizationDraft, OrganizationEntry,
    OrganizationId, PersonDraft, PersonEntry, PersonId, UnitDraft, UnitEntry, UnitId,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by all contact backends.
#[derive(Debug)]
pub enum RepoError {
    /// Input or journal failed validation; nothing was written.
    Validation(ContactValidationError),
    /// Store or transaction failure; the transaction was rolled back.
    Db(DbError),
    /// Referenced entity does not exist.
    NotFound { kind: EntityKind, id: Uuid },
    /// Association maintenance rejected the operation.
    Graph(GraphError),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
}

impl RepoError {
    /// Stable short code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Db(_) => "db",
            Self::NotFound { .. } => "not_found",
            Self::Graph(_) => "graph",
            Self::InvalidData(_) => "invalid_data",
            Self::UninitializedConnection { .. } => "uninitialized_connection",
            Self::MissingRequiredTable(_) => "missing_table",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Graph(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid contact data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "contact repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "contact repository requires table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Graph(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ContactValidationError> for RepoError {
    fn from(value: ContactValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<GraphError> for RepoError {
    fn from(value: GraphError) -> Self {
        Self::Graph(value)
    }
}

/// Persistence contract for the contact tree.
///
/// Writes that change an association go through the graph's attach/detach
/// and cascading removal rules; backends never edit links directly.
pub trait ContactRepository {
    fn list_organizations(&self) -> RepoResult<Vec<OrganizationEntry>>;
    fn get_organization(&self, id: OrganizationId) -> RepoResult<Option<OrganizationEntry>>;
    /// Persists a new organization and returns the store-assigned id.
    fn create_organization(&self, draft: &OrganizationDraft) -> RepoResult<OrganizationId>;
    fn update_organization(&self, id: OrganizationId, draft: &OrganizationDraft)
        -> RepoResult<()>;
    /// Deletes the organization with all of its units and their persons.
    fn delete_organization(&self, id: OrganizationId) -> RepoResult<()>;

    fn list_units(&self) -> RepoResult<Vec<UnitEntry>>;
    fn get_unit(&self, id: UnitId) -> RepoResult<Option<UnitEntry>>;
    fn create_unit(&self, draft: &UnitDraft) -> RepoResult<UnitId>;
    /// Renames, reassigns to `draft.organization_id` and additively attaches
    /// `draft.person_ids`.
    fn update_unit(&self, id: UnitId, draft: &UnitDraft) -> RepoResult<()>;
    /// Deletes the unit with all of its persons.
    fn delete_unit(&self, id: UnitId) -> RepoResult<()>;

    fn list_persons(&self) -> RepoResult<Vec<PersonEntry>>;
    fn get_person(&self, id: PersonId) -> RepoResult<Option<PersonEntry>>;
    fn create_person(&self, draft: &PersonDraft) -> RepoResult<PersonId>;
    fn update_person(&self, id: PersonId, draft: &PersonDraft) -> RepoResult<()>;
    fn delete_person(&self, id: PersonId) -> RepoResult<()>;

    /// Reads all three lists from one store state.
    ///
    /// Backends whose reads can interleave with other writers must override
    /// this and read inside a single transaction.
    fn snapshot(&self) -> RepoResult<ContactSnapshot> {
        read_snapshot(self)
    }
}

/// Reads the three lists one after another, with no isolation of its own.
pub(crate) fn read_snapshot<R: ContactRepository + ?Sized>(
    repo: &R,
) -> RepoResult<ContactSnapshot> {
    Ok(ContactSnapshot {
        organizations: repo.list_organizations()?,
        units: repo.list_units()?,
        persons: repo.list_persons()?,
    })
}
