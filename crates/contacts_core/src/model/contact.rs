//! Organization, unit and person records.
//!
//! # Responsibility
//! - Define entity records, their validation rules and read/write models.
//! - Provide one-line summaries used by list renderers.
//!
//! # Invariants
//! - Organization and unit names are non-blank.
//! - A person has at least one non-blank name part.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Store-assigned organization identifier.
pub type OrganizationId = Uuid;
/// Store-assigned unit identifier.
pub type UnitId = Uuid;
/// Store-assigned person identifier.
pub type PersonId = Uuid;

/// The three entity kinds of the contact tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Organization,
    Unit,
    Person,
}

impl EntityKind {
    /// Stable lowercase name used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Unit => "unit",
            Self::Person => "person",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failures for contact records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactValidationError {
    /// Required name is empty after trim.
    BlankName(EntityKind),
    /// Entity has no store identifier yet but the operation needs one.
    Unpersisted(EntityKind),
}

impl Display for ContactValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName(kind) => write!(f, "{kind} name must not be blank"),
            Self::Unpersisted(kind) => {
                write!(f, "{kind} has no identifier; persist it first")
            }
        }
    }
}

impl Error for ContactValidationError {}

/// Top-level entity owning a set of units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// `None` until the store assigns one.
    pub id: Option<OrganizationId>,
    pub name: String,
}

impl Organization {
    /// Creates a transient organization.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    /// Creates an organization that already exists in the store.
    pub fn with_id(id: OrganizationId, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ContactValidationError> {
        require_name(&self.name, EntityKind::Organization)
    }
}

/// Mid-level entity owned by at most one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: Option<UnitId>,
    pub name: String,
}

impl Unit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    pub fn with_id(id: UnitId, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ContactValidationError> {
        require_name(&self.name, EntityKind::Unit)
    }
}

/// Leaf entity owned by at most one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: Option<PersonId>,
    pub first_name: String,
    pub last_name: String,
}

impl Person {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    pub fn with_id(
        id: PersonId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Validates that at least one name part is present.
    pub fn validate(&self) -> Result<(), ContactValidationError> {
        if self.first_name.trim().is_empty() && self.last_name.trim().is_empty() {
            return Err(ContactValidationError::BlankName(EntityKind::Person));
        }
        Ok(())
    }

    /// Joins non-blank name parts with one space.
    pub fn full_name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }
}

/// Persisted organization with the ids of its units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationEntry {
    pub id: OrganizationId,
    pub name: String,
    pub unit_ids: Vec<UnitId>,
}

/// Persisted unit with its owner and the ids of its persons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitEntry {
    pub id: UnitId,
    pub name: String,
    pub organization_id: Option<OrganizationId>,
    pub person_ids: Vec<PersonId>,
}

/// Persisted person with its owning unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonEntry {
    pub id: PersonId,
    pub first_name: String,
    pub last_name: String,
    pub unit_id: Option<UnitId>,
}

impl PersonEntry {
    pub fn full_name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }
}

impl Display for OrganizationEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Organization {} [{}] units={}",
            self.name,
            self.id,
            self.unit_ids.len()
        )
    }
}

impl Display for UnitEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unit {} [{}]", self.name, self.id)?;
        match self.organization_id {
            Some(organization_id) => write!(f, " organization={organization_id}")?,
            None => f.write_str(" organization=-")?,
        }
        write!(f, " persons={}", self.person_ids.len())
    }
}

impl Display for PersonEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Person {} [{}]", self.full_name(), self.id)?;
        match self.unit_id {
            Some(unit_id) => write!(f, " unit={unit_id}"),
            None => f.write_str(" unit=-"),
        }
    }
}

/// All three entity lists read from one consistent store state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSnapshot {
    pub organizations: Vec<OrganizationEntry>,
    pub units: Vec<UnitEntry>,
    pub persons: Vec<PersonEntry>,
}

/// New values for creating or updating an organization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizationDraft {
    pub name: String,
}

/// New values for creating or updating a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitDraft {
    pub name: String,
    /// Target owner. `None` leaves the unit unassigned.
    pub organization_id: Option<OrganizationId>,
    /// Persons to attach. Additive: persons not listed stay attached.
    /// `None` leaves the person set untouched.
    pub person_ids: Option<Vec<PersonId>>,
}

/// New values for creating or updating a person.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonDraft {
    pub first_name: String,
    pub last_name: String,
    /// Target owner. `None` leaves the person unassigned.
    pub unit_id: Option<UnitId>,
}

impl OrganizationDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl UnitDraft {
    /// Unassigned unit draft that leaves persons untouched.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn in_organization(mut self, organization_id: OrganizationId) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn with_persons(mut self, person_ids: Vec<PersonId>) -> Self {
        self.person_ids = Some(person_ids);
        self
    }
}

impl PersonDraft {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            unit_id: None,
        }
    }

    pub fn in_unit(mut self, unit_id: UnitId) -> Self {
        self.unit_id = Some(unit_id);
        self
    }
}

fn require_name(value: &str, kind: EntityKind) -> Result<(), ContactValidationError> {
    if value.trim().is_empty() {
        return Err(ContactValidationError::BlankName(kind));
    }
    Ok(())
}

fn full_name(first_name: &str, last_name: &str) -> String {
    [first_name.trim(), last_name.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::{ContactValidationError, EntityKind, Organization, Person, PersonEntry, Unit};
    use uuid::Uuid;

    #[test]
    fn blank_names_fail_validation() {
        assert_eq!(
            Organization::new("  ").validate(),
            Err(ContactValidationError::BlankName(EntityKind::Organization))
        );
        assert_eq!(
            Unit::new("").validate(),
            Err(ContactValidationError::BlankName(EntityKind::Unit))
        );
        assert_eq!(
            Person::new(" ", "\t").validate(),
            Err(ContactValidationError::BlankName(EntityKind::Person))
        );
    }

    #[test]
    fn person_with_one_name_part_is_valid() {
        assert!(Person::new("Jane", "").validate().is_ok());
        assert!(Person::new("", "Doe").validate().is_ok());
        assert_eq!(Person::new(" Jane ", "").full_name(), "Jane");
    }

    #[test]
    fn person_entry_renders_summary_line() {
        let id = Uuid::new_v4();
        let entry = PersonEntry {
            id,
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            unit_id: None,
        };
        assert_eq!(entry.to_string(), format!("Person Jane Doe [{id}] unit=-"));
    }
}
