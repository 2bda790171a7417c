//! Write steps shared by every backend, expressed as graph operations.
//!
//! Backends load (or clone) a graph, run one of these steps, then persist the
//! graph journal. Identifiers for new entities are chosen by the backend.

use super::contact_repo::{RepoError, RepoResult};
use crate::graph::{ContactGraph, OrgKey, PersonKey, UnitKey};
use crate::model::contact::{
    ContactValidationError, EntityKind, Organization, OrganizationDraft, OrganizationEntry,
    OrganizationId, Person, PersonDraft, PersonEntry, PersonId, Unit, UnitDraft, UnitEntry,
    UnitId,
};
use uuid::Uuid;

pub(crate) fn create_organization(
    graph: &mut ContactGraph,
    id: OrganizationId,
    draft: &OrganizationDraft,
) -> RepoResult<OrgKey> {
    let organization = Organization::new(draft.name.trim());
    organization.validate()?;
    let key = graph.add_organization(organization)?;
    graph.assign_organization_id(key, id)?;
    Ok(key)
}

pub(crate) fn update_organization(
    graph: &mut ContactGraph,
    id: OrganizationId,
    draft: &OrganizationDraft,
) -> RepoResult<()> {
    let key = require_organization(graph, id)?;
    let name = draft.name.trim();
    Organization::new(name).validate()?;
    graph.rename_organization(key, name)?;
    Ok(())
}

pub(crate) fn delete_organization(graph: &mut ContactGraph, id: OrganizationId) -> RepoResult<()> {
    let key = require_organization(graph, id)?;
    graph.remove_organization(key)?;
    Ok(())
}

pub(crate) fn create_unit(
    graph: &mut ContactGraph,
    id: UnitId,
    draft: &UnitDraft,
) -> RepoResult<UnitKey> {
    let unit = Unit::new(draft.name.trim());
    unit.validate()?;
    let organization = resolve_organization(graph, draft.organization_id)?;
    let persons = resolve_persons(graph, draft.person_ids.as_deref())?;

    let key = graph.add_unit(unit, organization)?;
    graph.assign_unit_id(key, id)?;
    graph.set_persons(key, persons.as_deref())?;
    Ok(key)
}

pub(crate) fn update_unit(graph: &mut ContactGraph, id: UnitId, draft: &UnitDraft) -> RepoResult<()> {
    let key = require_unit(graph, id)?;
    let name = draft.name.trim();
    Unit::new(name).validate()?;
    let organization = resolve_organization(graph, draft.organization_id)?;
    let persons = resolve_persons(graph, draft.person_ids.as_deref())?;

    graph.rename_unit(key, name)?;
    graph.attach_unit(key, organization)?;
    graph.set_persons(key, persons.as_deref())?;
    Ok(())
}

pub(crate) fn delete_unit(graph: &mut ContactGraph, id: UnitId) -> RepoResult<()> {
    let key = require_unit(graph, id)?;
    graph.remove_unit(key)?;
    Ok(())
}

pub(crate) fn create_person(
    graph: &mut ContactGraph,
    id: PersonId,
    draft: &PersonDraft,
) -> RepoResult<PersonKey> {
    let person = Person::new(draft.first_name.trim(), draft.last_name.trim());
    person.validate()?;
    let unit = resolve_unit(graph, draft.unit_id)?;

    let key = graph.add_person(person, unit)?;
    graph.assign_person_id(key, id)?;
    Ok(key)
}

pub(crate) fn update_person(
    graph: &mut ContactGraph,
    id: PersonId,
    draft: &PersonDraft,
) -> RepoResult<()> {
    let key = require_person(graph, id)?;
    let (first_name, last_name) = (draft.first_name.trim(), draft.last_name.trim());
    Person::new(first_name, last_name).validate()?;
    let unit = resolve_unit(graph, draft.unit_id)?;

    graph.rename_person(key, first_name, last_name)?;
    graph.attach_person(key, unit)?;
    Ok(())
}

pub(crate) fn delete_person(graph: &mut ContactGraph, id: PersonId) -> RepoResult<()> {
    let key = require_person(graph, id)?;
    graph.remove_person(key)?;
    Ok(())
}

/// Builds the read model of one organization; children ordered by name.
pub(crate) fn organization_entry(
    graph: &ContactGraph,
    key: OrgKey,
) -> RepoResult<Option<OrganizationEntry>> {
    let Some(organization) = graph.organization(key) else {
        return Ok(None);
    };
    let mut units = graph
        .units_of(key)
        .iter()
        .filter_map(|unit| graph.unit(*unit))
        .map(|unit| -> RepoResult<_> {
            Ok((unit.name.as_str(), persisted_id(unit.id, EntityKind::Unit)?))
        })
        .collect::<RepoResult<Vec<_>>>()?;
    units.sort();

    Ok(Some(OrganizationEntry {
        id: persisted_id(organization.id, EntityKind::Organization)?,
        name: organization.name.clone(),
        unit_ids: units.into_iter().map(|(_, id)| id).collect(),
    }))
}

pub(crate) fn unit_entry(graph: &ContactGraph, key: UnitKey) -> RepoResult<Option<UnitEntry>> {
    let Some(unit) = graph.unit(key) else {
        return Ok(None);
    };
    let organization_id = graph
        .organization_of(key)
        .and_then(|organization| graph.organization(organization))
        .map(|organization| persisted_id(organization.id, EntityKind::Organization))
        .transpose()?;
    let mut persons = graph
        .persons_of(key)
        .iter()
        .filter_map(|person| graph.person(*person))
        .map(|person| -> RepoResult<_> {
            Ok((
                person.last_name.as_str(),
                person.first_name.as_str(),
                persisted_id(person.id, EntityKind::Person)?,
            ))
        })
        .collect::<RepoResult<Vec<_>>>()?;
    persons.sort();

    Ok(Some(UnitEntry {
        id: persisted_id(unit.id, EntityKind::Unit)?,
        name: unit.name.clone(),
        organization_id,
        person_ids: persons.into_iter().map(|(_, _, id)| id).collect(),
    }))
}

pub(crate) fn person_entry(graph: &ContactGraph, key: PersonKey) -> RepoResult<Option<PersonEntry>> {
    let Some(person) = graph.person(key) else {
        return Ok(None);
    };
    let unit_id = graph
        .unit_of(key)
        .and_then(|unit| graph.unit(unit))
        .map(|unit| persisted_id(unit.id, EntityKind::Unit))
        .transpose()?;

    Ok(Some(PersonEntry {
        id: persisted_id(person.id, EntityKind::Person)?,
        first_name: person.first_name.clone(),
        last_name: person.last_name.clone(),
        unit_id,
    }))
}

fn persisted_id(id: Option<Uuid>, kind: EntityKind) -> Result<Uuid, ContactValidationError> {
    id.ok_or(ContactValidationError::Unpersisted(kind))
}

fn require_organization(graph: &ContactGraph, id: OrganizationId) -> RepoResult<OrgKey> {
    graph.find_organization(id).ok_or(RepoError::NotFound {
        kind: EntityKind::Organization,
        id,
    })
}

fn require_unit(graph: &ContactGraph, id: UnitId) -> RepoResult<UnitKey> {
    graph.find_unit(id).ok_or(RepoError::NotFound {
        kind: EntityKind::Unit,
        id,
    })
}

fn require_person(graph: &ContactGraph, id: PersonId) -> RepoResult<PersonKey> {
    graph.find_person(id).ok_or(RepoError::NotFound {
        kind: EntityKind::Person,
        id,
    })
}

fn resolve_organization(
    graph: &ContactGraph,
    id: Option<OrganizationId>,
) -> RepoResult<Option<OrgKey>> {
    id.map(|id| require_organization(graph, id)).transpose()
}

fn resolve_unit(graph: &ContactGraph, id: Option<UnitId>) -> RepoResult<Option<UnitKey>> {
    id.map(|id| require_unit(graph, id)).transpose()
}

fn resolve_persons(
    graph: &ContactGraph,
    ids: Option<&[PersonId]>,
) -> RepoResult<Option<Vec<PersonKey>>> {
    ids.map(|ids| {
        ids.iter()
            .map(|id| require_person(graph, *id))
            .collect::<RepoResult<Vec<_>>>()
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::{organization_entry, person_entry, unit_entry};
    use crate::graph::ContactGraph;
    use crate::model::contact::{ContactValidationError, EntityKind, Organization, Person, Unit};
    use crate::repo::contact_repo::RepoError;
    use uuid::Uuid;

    fn unpersisted_kind(err: RepoError) -> Option<EntityKind> {
        match err {
            RepoError::Validation(ContactValidationError::Unpersisted(kind)) => Some(kind),
            _ => None,
        }
    }

    #[test]
    fn entries_require_store_identifiers() {
        let mut graph = ContactGraph::new();
        let acme = graph.add_organization(Organization::new("Acme")).unwrap();
        let sales = graph
            .add_unit(Unit::with_id(Uuid::new_v4(), "Sales"), Some(acme))
            .unwrap();
        let jane = graph
            .add_person(Person::new("Jane", "Doe"), Some(sales))
            .unwrap();

        assert_eq!(
            unpersisted_kind(organization_entry(&graph, acme).unwrap_err()),
            Some(EntityKind::Organization)
        );
        // The unit itself has an id; its owner and its person do not.
        assert_eq!(
            unpersisted_kind(unit_entry(&graph, sales).unwrap_err()),
            Some(EntityKind::Organization)
        );
        assert_eq!(
            unpersisted_kind(person_entry(&graph, jane).unwrap_err()),
            Some(EntityKind::Person)
        );
    }

    #[test]
    fn entries_list_children_by_name() {
        let (acme, billing, sales) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut graph = ContactGraph::new();
        let acme_key = graph
            .add_organization(Organization::with_id(acme, "Acme"))
            .unwrap();
        graph
            .add_unit(Unit::with_id(sales, "Sales"), Some(acme_key))
            .unwrap();
        graph
            .add_unit(Unit::with_id(billing, "Billing"), Some(acme_key))
            .unwrap();

        let entry = organization_entry(&graph, acme_key).unwrap().unwrap();

        assert_eq!(entry.unit_ids, vec![billing, sales]);
    }
}
