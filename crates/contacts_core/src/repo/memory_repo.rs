//! In-memory implementation of the contact repository.
//!
//! Writes run against a clone of the graph which replaces the live graph
//! only when the step succeeds, so failed writes leave no trace.

use super::apply;
use super::contact_repo::{ContactRepository, RepoResult};
use crate::graph::ContactGraph;
use crate::model::contact::{
    ContactValidationError, EntityKind, OrganizationDraft, OrganizationEntry, OrganizationId,
    PersonDraft, PersonEntry, PersonId, UnitDraft, UnitEntry, UnitId,
};
use log::debug;
use std::cell::RefCell;
use uuid::Uuid;

/// Contact repository kept entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryContactRepository {
    graph: RefCell<ContactGraph>,
}

impl MemoryContactRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing graph. Pending journal entries are discarded.
    ///
    /// # Errors
    /// - `Validation(Unpersisted)` when any entity has no store identifier.
    /// - `Graph` when forward and backward references disagree.
    pub fn from_graph(mut graph: ContactGraph) -> RepoResult<Self> {
        if graph.organizations().any(|(_, value)| value.id.is_none()) {
            return Err(ContactValidationError::Unpersisted(EntityKind::Organization).into());
        }
        if graph.units().any(|(_, value)| value.id.is_none()) {
            return Err(ContactValidationError::Unpersisted(EntityKind::Unit).into());
        }
        if graph.persons().any(|(_, value)| value.id.is_none()) {
            return Err(ContactValidationError::Unpersisted(EntityKind::Person).into());
        }
        graph.verify_consistency()?;
        graph.take_changes();
        Ok(Self {
            graph: RefCell::new(graph),
        })
    }

    fn write<T>(
        &self,
        event: &'static str,
        step: impl FnOnce(&mut ContactGraph) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let mut working = self.graph.borrow().clone();
        let value = step(&mut working)?;
        let change_count = working.take_changes().len();
        *self.graph.borrow_mut() = working;
        debug!("event={event} module=repo backend=memory status=ok changes={change_count}");
        Ok(value)
    }
}

impl ContactRepository for MemoryContactRepository {
    fn list_organizations(&self) -> RepoResult<Vec<OrganizationEntry>> {
        let graph = self.graph.borrow();
        let mut entries = Vec::with_capacity(graph.organization_count());
        for (key, _) in graph.organizations() {
            entries.extend(apply::organization_entry(&graph, key)?);
        }
        entries.sort_by(|left, right| (&left.name, left.id).cmp(&(&right.name, right.id)));
        Ok(entries)
    }

    fn get_organization(&self, id: OrganizationId) -> RepoResult<Option<OrganizationEntry>> {
        let graph = self.graph.borrow();
        match graph.find_organization(id) {
            Some(key) => apply::organization_entry(&graph, key),
            None => Ok(None),
        }
    }

    fn create_organization(&self, draft: &OrganizationDraft) -> RepoResult<OrganizationId> {
        self.write("organization_create", |graph| {
            let id = Uuid::new_v4();
            apply::create_organization(graph, id, draft)?;
            Ok(id)
        })
    }

    fn update_organization(
        &self,
        id: OrganizationId,
        draft: &OrganizationDraft,
    ) -> RepoResult<()> {
        self.write("organization_update", |graph| {
            apply::update_organization(graph, id, draft)
        })
    }

    fn delete_organization(&self, id: OrganizationId) -> RepoResult<()> {
        self.write("organization_delete", |graph| {
            apply::delete_organization(graph, id)
        })
    }

    fn list_units(&self) -> RepoResult<Vec<UnitEntry>> {
        let graph = self.graph.borrow();
        let mut entries = Vec::with_capacity(graph.unit_count());
        for (key, _) in graph.units() {
            entries.extend(apply::unit_entry(&graph, key)?);
        }
        entries.sort_by(|left, right| (&left.name, left.id).cmp(&(&right.name, right.id)));
        Ok(entries)
    }

    fn get_unit(&self, id: UnitId) -> RepoResult<Option<UnitEntry>> {
        let graph = self.graph.borrow();
        match graph.find_unit(id) {
            Some(key) => apply::unit_entry(&graph, key),
            None => Ok(None),
        }
    }

    fn create_unit(&self, draft: &UnitDraft) -> RepoResult<UnitId> {
        self.write("unit_create", |graph| {
            let id = Uuid::new_v4();
            apply::create_unit(graph, id, draft)?;
            Ok(id)
        })
    }

    fn update_unit(&self, id: UnitId, draft: &UnitDraft) -> RepoResult<()> {
        self.write("unit_update", |graph| apply::update_unit(graph, id, draft))
    }

    fn delete_unit(&self, id: UnitId) -> RepoResult<()> {
        self.write("unit_delete", |graph| apply::delete_unit(graph, id))
    }

    fn list_persons(&self) -> RepoResult<Vec<PersonEntry>> {
        let graph = self.graph.borrow();
        let mut entries = Vec::with_capacity(graph.person_count());
        for (key, _) in graph.persons() {
            entries.extend(apply::person_entry(&graph, key)?);
        }
        entries.sort_by(|left, right| {
            (&left.last_name, &left.first_name, left.id).cmp(&(
                &right.last_name,
                &right.first_name,
                right.id,
            ))
        });
        Ok(entries)
    }

    fn get_person(&self, id: PersonId) -> RepoResult<Option<PersonEntry>> {
        let graph = self.graph.borrow();
        match graph.find_person(id) {
            Some(key) => apply::person_entry(&graph, key),
            None => Ok(None),
        }
    }

    fn create_person(&self, draft: &PersonDraft) -> RepoResult<PersonId> {
        self.write("person_create", |graph| {
            let id = Uuid::new_v4();
            apply::create_person(graph, id, draft)?;
            Ok(id)
        })
    }

    fn update_person(&self, id: PersonId, draft: &PersonDraft) -> RepoResult<()> {
        self.write("person_update", |graph| apply::update_person(graph, id, draft))
    }

    fn delete_person(&self, id: PersonId) -> RepoResult<()> {
        self.write("person_delete", |graph| apply::delete_person(graph, id))
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryContactRepository;
    use crate::graph::ContactGraph;
    use crate::model::contact::{
        ContactValidationError, EntityKind, Organization, OrganizationDraft, Person, Unit,
        UnitDraft,
    };
    use crate::repo::contact_repo::{ContactRepository, RepoError};
    use uuid::Uuid;

    #[test]
    fn from_graph_rejects_transient_entities() {
        let mut graph = ContactGraph::new();
        let acme = graph
            .add_organization(Organization::with_id(Uuid::new_v4(), "Acme"))
            .unwrap();
        graph.add_unit(Unit::new("Sales"), Some(acme)).unwrap();

        let err = MemoryContactRepository::from_graph(graph).unwrap_err();

        assert!(matches!(
            err,
            RepoError::Validation(ContactValidationError::Unpersisted(EntityKind::Unit))
        ));
    }

    #[test]
    fn from_graph_serves_persisted_entities_and_accepts_writes() {
        let (acme, sales, jane) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut graph = ContactGraph::new();
        let acme_key = graph
            .add_organization(Organization::with_id(acme, "Acme"))
            .unwrap();
        let sales_key = graph
            .add_unit(Unit::with_id(sales, "Sales"), Some(acme_key))
            .unwrap();
        graph
            .add_person(Person::with_id(jane, "Jane", "Doe"), Some(sales_key))
            .unwrap();

        let repo = MemoryContactRepository::from_graph(graph).unwrap();
        repo.create_organization(&OrganizationDraft::new("Globex"))
            .unwrap();

        assert_eq!(repo.list_organizations().unwrap().len(), 2);
        assert_eq!(repo.get_organization(acme).unwrap().unwrap().unit_ids, vec![sales]);
        assert_eq!(repo.get_unit(sales).unwrap().unwrap().person_ids, vec![jane]);
    }

    #[test]
    fn failed_write_leaves_graph_untouched() {
        let repo = MemoryContactRepository::new();
        let acme = repo
            .create_organization(&OrganizationDraft::new("Acme"))
            .unwrap();

        let draft = UnitDraft {
            name: "Sales".to_string(),
            organization_id: Some(acme),
            person_ids: Some(vec![Uuid::new_v4()]),
        };
        let err = repo.create_unit(&draft).unwrap_err();

        assert!(matches!(err, RepoError::NotFound { .. }));
        assert!(repo.list_units().unwrap().is_empty());
        assert!(repo.get_organization(acme).unwrap().unwrap().unit_ids.is_empty());
    }
}
