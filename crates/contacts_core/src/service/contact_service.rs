//! Contact use-case service.
//!
//! # Responsibility
//! - Expose create/update/get/list/delete for organizations, units and persons.
//! - Collapse repository failures into validation, not-found and persistence
//!   outcomes.
//! - Read back written entities so callers always see stored state.
//!
//! # Invariants
//! - `get_*` never returns an absent value; a missing entity is `NotFound`.
//! - `snapshot()` lists come from one store state and are ordered the same
//!   way as the repository lists.

pub use crate::model::contact::ContactSnapshot;

use crate::model::contact::{
    ContactValidationError, EntityKind, OrganizationDraft, OrganizationEntry, OrganizationId,
    PersonDraft, PersonEntry, PersonId, UnitDraft, UnitEntry, UnitId,
};
use crate::repo::contact_repo::{ContactRepository, RepoError};
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type ContactServiceResult<T> = Result<T, ContactServiceError>;

/// Service error for contact use-cases.
#[derive(Debug)]
pub enum ContactServiceError {
    /// Input was rejected; nothing was written.
    Validation(ContactValidationError),
    /// Target or referenced entity does not exist.
    NotFound { kind: EntityKind, id: Uuid },
    /// Store failure; the write was rolled back.
    Persistence(RepoError),
}

impl Display for ContactServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Persistence(err) => write!(f, "persistence failure: {err}"),
        }
    }
}

impl Error for ContactServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Persistence(err) => Some(err),
            Self::NotFound { .. } => None,
        }
    }
}

impl From<RepoError> for ContactServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { kind, id } => Self::NotFound { kind, id },
            other => Self::Persistence(other),
        }
    }
}

/// Contact service facade over repository implementations.
pub struct ContactService<R: ContactRepository> {
    repo: R,
}

impl<R: ContactRepository> ContactService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn list_organizations(&self) -> ContactServiceResult<Vec<OrganizationEntry>> {
        Ok(self.repo.list_organizations()?)
    }

    pub fn get_organization(&self, id: OrganizationId) -> ContactServiceResult<OrganizationEntry> {
        self.repo
            .get_organization(id)?
            .ok_or(ContactServiceError::NotFound {
                kind: EntityKind::Organization,
                id,
            })
    }

    /// Creates one organization and returns its stored entry.
    pub fn create_organization(
        &self,
        draft: &OrganizationDraft,
    ) -> ContactServiceResult<OrganizationEntry> {
        let id = self.repo.create_organization(draft)?;
        self.read_back(EntityKind::Organization, id, self.repo.get_organization(id))
    }

    pub fn update_organization(
        &self,
        id: OrganizationId,
        draft: &OrganizationDraft,
    ) -> ContactServiceResult<OrganizationEntry> {
        self.repo.update_organization(id, draft)?;
        self.read_back(EntityKind::Organization, id, self.repo.get_organization(id))
    }

    /// Deletes an organization together with its units and their persons.
    pub fn delete_organization(&self, id: OrganizationId) -> ContactServiceResult<()> {
        Ok(self.repo.delete_organization(id)?)
    }

    pub fn list_units(&self) -> ContactServiceResult<Vec<UnitEntry>> {
        Ok(self.repo.list_units()?)
    }

    pub fn get_unit(&self, id: UnitId) -> ContactServiceResult<UnitEntry> {
        self.repo.get_unit(id)?.ok_or(ContactServiceError::NotFound {
            kind: EntityKind::Unit,
            id,
        })
    }

    pub fn create_unit(&self, draft: &UnitDraft) -> ContactServiceResult<UnitEntry> {
        let id = self.repo.create_unit(draft)?;
        self.read_back(EntityKind::Unit, id, self.repo.get_unit(id))
    }

    /// Updates a unit. Persons listed in the draft are attached; persons
    /// already in the unit but not listed stay attached.
    pub fn update_unit(&self, id: UnitId, draft: &UnitDraft) -> ContactServiceResult<UnitEntry> {
        self.repo.update_unit(id, draft)?;
        self.read_back(EntityKind::Unit, id, self.repo.get_unit(id))
    }

    /// Deletes a unit together with its persons.
    pub fn delete_unit(&self, id: UnitId) -> ContactServiceResult<()> {
        Ok(self.repo.delete_unit(id)?)
    }

    pub fn list_persons(&self) -> ContactServiceResult<Vec<PersonEntry>> {
        Ok(self.repo.list_persons()?)
    }

    pub fn get_person(&self, id: PersonId) -> ContactServiceResult<PersonEntry> {
        self.repo.get_person(id)?.ok_or(ContactServiceError::NotFound {
            kind: EntityKind::Person,
            id,
        })
    }

    pub fn create_person(&self, draft: &PersonDraft) -> ContactServiceResult<PersonEntry> {
        let id = self.repo.create_person(draft)?;
        self.read_back(EntityKind::Person, id, self.repo.get_person(id))
    }

    pub fn update_person(
        &self,
        id: PersonId,
        draft: &PersonDraft,
    ) -> ContactServiceResult<PersonEntry> {
        self.repo.update_person(id, draft)?;
        self.read_back(EntityKind::Person, id, self.repo.get_person(id))
    }

    pub fn delete_person(&self, id: PersonId) -> ContactServiceResult<()> {
        Ok(self.repo.delete_person(id)?)
    }

    /// Reads all three lists from one consistent store state.
    pub fn snapshot(&self) -> ContactServiceResult<ContactSnapshot> {
        let snapshot = self.repo.snapshot()?;
        debug!(
            "event=snapshot_read module=service status=ok organizations={} units={} persons={}",
            snapshot.organizations.len(),
            snapshot.units.len(),
            snapshot.persons.len()
        );
        Ok(snapshot)
    }

    fn read_back<T>(
        &self,
        kind: EntityKind,
        id: Uuid,
        entry: Result<Option<T>, RepoError>,
    ) -> ContactServiceResult<T> {
        entry?.ok_or_else(|| {
            ContactServiceError::Persistence(RepoError::InvalidData(format!(
                "{kind} {id} missing in read-back"
            )))
        })
    }
}
