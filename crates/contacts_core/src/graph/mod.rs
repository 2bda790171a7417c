//! In-memory contact graph with bidirectional association maintenance.
//!
//! # Responsibility
//! - Hold organizations, units and persons in a two-level ownership tree.
//! - Keep forward collections and back-references mutually consistent
//!   across attach, detach, reassignment and cascading removal.
//! - Journal every structural effect so a persistence boundary can replay it.
//!
//! # Invariants
//! - A unit is listed by organization `O` iff its back-reference is `O`.
//! - A person is listed by unit `U` iff its back-reference is `U`.
//! - Re-attaching to the current owner is a no-op and journals nothing.
//! - Removing a parent removes every descendant first.
//! - `set_units`/`set_persons` are additive: children absent from the list
//!   stay attached.
//!
//! Mutation takes `&mut self`; the graph has no internal synchronization.

mod arena;

use self::arena::{relink, verify_pair, Arena, ArenaKey, Record};
use crate::model::contact::{
    EntityKind, Organization, OrganizationId, Person, PersonId, Unit, UnitId,
};
use std::convert::Infallible;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type GraphResult<T> = Result<T, GraphError>;

/// Errors from graph operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Key refers to a removed slot or to another graph.
    StaleKey { kind: EntityKind, index: usize },
    /// Identifier is already used by another entity, or the entity already
    /// carries one.
    IdentifierConflict { kind: EntityKind, id: Uuid },
    /// Forward and backward references disagree.
    Inconsistent(String),
}

impl GraphError {
    fn stale<K: ArenaKey>(key: K) -> Self {
        Self::StaleKey {
            kind: K::KIND,
            index: key.index(),
        }
    }
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StaleKey { kind, index } => write!(f, "stale {kind} key #{index}"),
            Self::IdentifierConflict { kind, id } => {
                write!(f, "{kind} identifier conflict: {id}")
            }
            Self::Inconsistent(message) => write!(f, "inconsistent contact graph: {message}"),
        }
    }
}

impl Error for GraphError {}

/// Handle to an organization inside one `ContactGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrgKey(usize);

/// Handle to a unit inside one `ContactGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitKey(usize);

/// Handle to a person inside one `ContactGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PersonKey(usize);

impl ArenaKey for OrgKey {
    const KIND: EntityKind = EntityKind::Organization;

    fn from_index(index: usize) -> Self {
        Self(index)
    }

    fn index(self) -> usize {
        self.0
    }
}

impl ArenaKey for UnitKey {
    const KIND: EntityKind = EntityKind::Unit;

    fn from_index(index: usize) -> Self {
        Self(index)
    }

    fn index(self) -> usize {
        self.0
    }
}

impl ArenaKey for PersonKey {
    const KIND: EntityKind = EntityKind::Person;

    fn from_index(index: usize) -> Self {
        Self(index)
    }

    fn index(self) -> usize {
        self.0
    }
}

impl Record for Organization {
    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }
}

impl Record for Unit {
    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }
}

impl Record for Person {
    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }
}

/// Key of any entity kind, used by the change journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Organization(OrgKey),
    Unit(UnitKey),
    Person(PersonKey),
}

/// One structural effect recorded by the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphChange {
    /// Entity was inserted.
    Added(EntityKey),
    /// Own fields (names) changed.
    Updated(EntityKey),
    /// Back-reference changed; both owners' collections changed with it.
    Linked(EntityKey),
    /// Entity was deleted. `id` is captured at removal time.
    Removed { kind: EntityKind, id: Option<Uuid> },
}

/// Arena-backed organization → unit → person tree.
#[derive(Debug, Clone, Default)]
pub struct ContactGraph {
    organizations: Arena<OrgKey, Organization, Infallible, UnitKey>,
    units: Arena<UnitKey, Unit, OrgKey, PersonKey>,
    persons: Arena<PersonKey, Person, UnitKey, Infallible>,
    changes: Vec<GraphChange>,
}

impl ContactGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an organization.
    ///
    /// # Errors
    /// - `IdentifierConflict` when its id is already present.
    pub fn add_organization(&mut self, organization: Organization) -> GraphResult<OrgKey> {
        let key = self.organizations.insert(organization)?;
        self.changes.push(GraphChange::Added(EntityKey::Organization(key)));
        Ok(key)
    }

    /// Inserts a unit, optionally attached to `organization` right away.
    pub fn add_unit(
        &mut self,
        unit: Unit,
        organization: Option<OrgKey>,
    ) -> GraphResult<UnitKey> {
        if let Some(organization) = organization {
            self.organizations.node(organization)?;
        }
        let key = self.units.insert(unit)?;
        self.changes.push(GraphChange::Added(EntityKey::Unit(key)));
        self.attach_unit(key, organization)?;
        Ok(key)
    }

    /// Inserts a person, optionally attached to `unit` right away.
    pub fn add_person(&mut self, person: Person, unit: Option<UnitKey>) -> GraphResult<PersonKey> {
        if let Some(unit) = unit {
            self.units.node(unit)?;
        }
        let key = self.persons.insert(person)?;
        self.changes.push(GraphChange::Added(EntityKey::Person(key)));
        self.attach_person(key, unit)?;
        Ok(key)
    }

    /// Moves `unit` under `organization`, or detaches it when `None`.
    ///
    /// Returns `false` when the unit already belongs to `organization`.
    pub fn attach_unit(&mut self, unit: UnitKey, organization: Option<OrgKey>) -> GraphResult<bool> {
        let changed = relink(&mut self.organizations, &mut self.units, unit, organization)?;
        if changed {
            self.changes.push(GraphChange::Linked(EntityKey::Unit(unit)));
        }
        Ok(changed)
    }

    pub fn detach_unit(&mut self, unit: UnitKey) -> GraphResult<bool> {
        self.attach_unit(unit, None)
    }

    /// Moves `person` under `unit`, or detaches it when `None`.
    ///
    /// Returns `false` when the person already belongs to `unit`.
    pub fn attach_person(&mut self, person: PersonKey, unit: Option<UnitKey>) -> GraphResult<bool> {
        let changed = relink(&mut self.units, &mut self.persons, person, unit)?;
        if changed {
            self.changes.push(GraphChange::Linked(EntityKey::Person(person)));
        }
        Ok(changed)
    }

    pub fn detach_person(&mut self, person: PersonKey) -> GraphResult<bool> {
        self.attach_person(person, None)
    }

    /// Attaches every listed unit to `organization`.
    ///
    /// Additive only: units owned by `organization` but missing from `units`
    /// keep their assignment. `None` is a no-op.
    pub fn set_units(&mut self, organization: OrgKey, units: Option<&[UnitKey]>) -> GraphResult<()> {
        let Some(units) = units else {
            return Ok(());
        };
        self.organizations.node(organization)?;
        for unit in units {
            self.attach_unit(*unit, Some(organization))?;
        }
        Ok(())
    }

    /// Attaches every listed person to `unit`. Same additive rule as
    /// [`ContactGraph::set_units`].
    pub fn set_persons(&mut self, unit: UnitKey, persons: Option<&[PersonKey]>) -> GraphResult<()> {
        let Some(persons) = persons else {
            return Ok(());
        };
        self.units.node(unit)?;
        for person in persons {
            self.attach_person(*person, Some(unit))?;
        }
        Ok(())
    }

    /// Detaches and deletes one person.
    pub fn remove_person(&mut self, person: PersonKey) -> GraphResult<Person> {
        self.detach_person(person)?;
        let node = self.persons.remove(person)?;
        self.changes.push(GraphChange::Removed {
            kind: EntityKind::Person,
            id: node.value.id,
        });
        Ok(node.value)
    }

    /// Deletes every person of `unit`, then detaches and deletes `unit`.
    pub fn remove_unit(&mut self, unit: UnitKey) -> GraphResult<Unit> {
        let persons = self.units.node(unit)?.children.clone();
        for person in persons {
            self.remove_person(person)?;
        }
        self.detach_unit(unit)?;
        let node = self.units.remove(unit)?;
        self.changes.push(GraphChange::Removed {
            kind: EntityKind::Unit,
            id: node.value.id,
        });
        Ok(node.value)
    }

    /// Removes every unit of `organization` via [`ContactGraph::remove_unit`],
    /// then deletes `organization`.
    pub fn remove_organization(&mut self, organization: OrgKey) -> GraphResult<Organization> {
        let units = self.organizations.node(organization)?.children.clone();
        for unit in units {
            self.remove_unit(unit)?;
        }
        let node = self.organizations.remove(organization)?;
        self.changes.push(GraphChange::Removed {
            kind: EntityKind::Organization,
            id: node.value.id,
        });
        Ok(node.value)
    }

    pub fn rename_organization(
        &mut self,
        organization: OrgKey,
        name: impl Into<String>,
    ) -> GraphResult<()> {
        self.organizations.node_mut(organization)?.value.name = name.into();
        self.changes
            .push(GraphChange::Updated(EntityKey::Organization(organization)));
        Ok(())
    }

    pub fn rename_unit(&mut self, unit: UnitKey, name: impl Into<String>) -> GraphResult<()> {
        self.units.node_mut(unit)?.value.name = name.into();
        self.changes.push(GraphChange::Updated(EntityKey::Unit(unit)));
        Ok(())
    }

    pub fn rename_person(
        &mut self,
        person: PersonKey,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> GraphResult<()> {
        let node = self.persons.node_mut(person)?;
        node.value.first_name = first_name.into();
        node.value.last_name = last_name.into();
        self.changes.push(GraphChange::Updated(EntityKey::Person(person)));
        Ok(())
    }

    /// Stamps a store identifier onto a transient organization.
    pub fn assign_organization_id(
        &mut self,
        organization: OrgKey,
        id: OrganizationId,
    ) -> GraphResult<()> {
        self.organizations.assign_id(organization, id)
    }

    pub fn assign_unit_id(&mut self, unit: UnitKey, id: UnitId) -> GraphResult<()> {
        self.units.assign_id(unit, id)
    }

    pub fn assign_person_id(&mut self, person: PersonKey, id: PersonId) -> GraphResult<()> {
        self.persons.assign_id(person, id)
    }

    pub fn organization(&self, organization: OrgKey) -> Option<&Organization> {
        self.organizations.get(organization).map(|node| &node.value)
    }

    pub fn unit(&self, unit: UnitKey) -> Option<&Unit> {
        self.units.get(unit).map(|node| &node.value)
    }

    pub fn person(&self, person: PersonKey) -> Option<&Person> {
        self.persons.get(person).map(|node| &node.value)
    }

    /// Units owned by `organization`; empty for a stale key.
    pub fn units_of(&self, organization: OrgKey) -> &[UnitKey] {
        self.organizations
            .get(organization)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    /// Persons owned by `unit`; empty for a stale key.
    pub fn persons_of(&self, unit: UnitKey) -> &[PersonKey] {
        self.units
            .get(unit)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    pub fn organization_of(&self, unit: UnitKey) -> Option<OrgKey> {
        self.units.get(unit).and_then(|node| node.parent)
    }

    pub fn unit_of(&self, person: PersonKey) -> Option<UnitKey> {
        self.persons.get(person).and_then(|node| node.parent)
    }

    pub fn find_organization(&self, id: OrganizationId) -> Option<OrgKey> {
        self.organizations.find(id)
    }

    pub fn find_unit(&self, id: UnitId) -> Option<UnitKey> {
        self.units.find(id)
    }

    pub fn find_person(&self, id: PersonId) -> Option<PersonKey> {
        self.persons.find(id)
    }

    pub fn organizations(&self) -> impl Iterator<Item = (OrgKey, &Organization)> + '_ {
        self.organizations.iter().map(|(key, node)| (key, &node.value))
    }

    pub fn units(&self) -> impl Iterator<Item = (UnitKey, &Unit)> + '_ {
        self.units.iter().map(|(key, node)| (key, &node.value))
    }

    pub fn persons(&self) -> impl Iterator<Item = (PersonKey, &Person)> + '_ {
        self.persons.iter().map(|(key, node)| (key, &node.value))
    }

    pub fn organization_count(&self) -> usize {
        self.organizations.len()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn person_count(&self) -> usize {
        self.persons.len()
    }

    /// Store identifier of any entity, if it is live and persisted.
    pub fn id_of(&self, key: EntityKey) -> Option<Uuid> {
        match key {
            EntityKey::Organization(key) => self.organization(key).and_then(|value| value.id),
            EntityKey::Unit(key) => self.unit(key).and_then(|value| value.id),
            EntityKey::Person(key) => self.person(key).and_then(|value| value.id),
        }
    }

    /// Returns journaled changes recorded since the previous call.
    pub fn take_changes(&mut self) -> Vec<GraphChange> {
        std::mem::take(&mut self.changes)
    }

    /// Verifies both association pairs over the whole arena.
    pub fn verify_consistency(&self) -> GraphResult<()> {
        verify_pair(&self.organizations, &self.units)?;
        verify_pair(&self.units, &self.persons)
    }
}
