//! Behavior every `ContactRepository` backend must share.

use contacts_core::db::open_db_in_memory;
use contacts_core::{
    ContactRepository, ContactValidationError, EntityKind, MemoryContactRepository,
    OrganizationDraft, PersonDraft, RepoError, SqliteContactRepository, UnitDraft,
};
use uuid::Uuid;

macro_rules! contract_tests {
    ($($name:ident),* $(,)?) => {
        mod sqlite {
            use super::*;
            $(
                #[test]
                fn $name() {
                    let conn = open_db_in_memory().unwrap();
                    let repo = SqliteContactRepository::try_new(&conn).unwrap();
                    super::$name(&repo);
                }
            )*
        }

        mod memory {
            use super::*;
            $(
                #[test]
                fn $name() {
                    let repo = MemoryContactRepository::new();
                    super::$name(&repo);
                }
            )*
        }
    };
}

contract_tests!(
    create_links_both_sides,
    deleting_organization_cascades_to_units_and_persons,
    deleting_unit_cascades_to_persons_only,
    reassigning_person_moves_it_exactly_once,
    unit_update_attaches_persons_additively,
    unit_update_without_organization_detaches,
    person_update_without_unit_detaches,
    deleting_person_shrinks_unit,
    lists_are_ordered_by_name,
    missing_parent_is_rejected_without_writing,
    blank_names_are_rejected_without_writing,
    unknown_targets_are_not_found,
);

fn create_links_both_sides<R: ContactRepository>(repo: &R) {
    let acme = repo
        .create_organization(&OrganizationDraft::new("Acme"))
        .unwrap();
    let sales = repo
        .create_unit(&UnitDraft::new("Sales").in_organization(acme))
        .unwrap();
    let jane = repo
        .create_person(&PersonDraft::new("Jane", "Doe").in_unit(sales))
        .unwrap();

    let organization = repo.get_organization(acme).unwrap().unwrap();
    assert_eq!(organization.name, "Acme");
    assert_eq!(organization.unit_ids, vec![sales]);

    let unit = repo.get_unit(sales).unwrap().unwrap();
    assert_eq!(unit.organization_id, Some(acme));
    assert_eq!(unit.person_ids, vec![jane]);

    let person = repo.get_person(jane).unwrap().unwrap();
    assert_eq!(person.first_name, "Jane");
    assert_eq!(person.last_name, "Doe");
    assert_eq!(person.unit_id, Some(sales));
}

fn deleting_organization_cascades_to_units_and_persons<R: ContactRepository>(repo: &R) {
    let acme = repo
        .create_organization(&OrganizationDraft::new("Acme"))
        .unwrap();
    let other = repo
        .create_organization(&OrganizationDraft::new("Globex"))
        .unwrap();
    let sales = repo
        .create_unit(&UnitDraft::new("Sales").in_organization(acme))
        .unwrap();
    let research = repo
        .create_unit(&UnitDraft::new("Research").in_organization(other))
        .unwrap();
    let jane = repo
        .create_person(&PersonDraft::new("Jane", "Doe").in_unit(sales))
        .unwrap();
    let john = repo
        .create_person(&PersonDraft::new("John", "Roe").in_unit(research))
        .unwrap();

    repo.delete_organization(acme).unwrap();

    assert!(repo.get_organization(acme).unwrap().is_none());
    assert!(repo.get_unit(sales).unwrap().is_none());
    assert!(repo.get_person(jane).unwrap().is_none());

    let organizations = repo.list_organizations().unwrap();
    assert_eq!(organizations.len(), 1);
    assert_eq!(organizations[0].unit_ids, vec![research]);
    assert_eq!(repo.list_units().unwrap().len(), 1);
    let persons = repo.list_persons().unwrap();
    assert_eq!(persons.len(), 1);
    assert_eq!(persons[0].id, john);
}

fn deleting_unit_cascades_to_persons_only<R: ContactRepository>(repo: &R) {
    let acme = repo
        .create_organization(&OrganizationDraft::new("Acme"))
        .unwrap();
    let sales = repo
        .create_unit(&UnitDraft::new("Sales").in_organization(acme))
        .unwrap();
    let marketing = repo
        .create_unit(&UnitDraft::new("Marketing").in_organization(acme))
        .unwrap();
    let jane = repo
        .create_person(&PersonDraft::new("Jane", "Doe").in_unit(sales))
        .unwrap();
    let loose = repo.create_person(&PersonDraft::new("Lee", "")).unwrap();

    repo.delete_unit(sales).unwrap();

    assert!(repo.get_person(jane).unwrap().is_none());
    assert!(repo.get_person(loose).unwrap().is_some());
    let organization = repo.get_organization(acme).unwrap().unwrap();
    assert_eq!(organization.unit_ids, vec![marketing]);
}

fn reassigning_person_moves_it_exactly_once<R: ContactRepository>(repo: &R) {
    let sales = repo.create_unit(&UnitDraft::new("Sales")).unwrap();
    let support = repo.create_unit(&UnitDraft::new("Support")).unwrap();
    let jane = repo
        .create_person(&PersonDraft::new("Jane", "Doe").in_unit(sales))
        .unwrap();

    repo.update_person(jane, &PersonDraft::new("Jane", "Doe").in_unit(support))
        .unwrap();
    repo.update_person(jane, &PersonDraft::new("Jane", "Doe").in_unit(support))
        .unwrap();

    assert!(repo.get_unit(sales).unwrap().unwrap().person_ids.is_empty());
    assert_eq!(repo.get_unit(support).unwrap().unwrap().person_ids, vec![jane]);
    assert_eq!(repo.get_person(jane).unwrap().unwrap().unit_id, Some(support));
}

fn unit_update_attaches_persons_additively<R: ContactRepository>(repo: &R) {
    let sales = repo.create_unit(&UnitDraft::new("Sales")).unwrap();
    let marketing = repo.create_unit(&UnitDraft::new("Marketing")).unwrap();
    let jane = repo
        .create_person(&PersonDraft::new("Jane", "Doe").in_unit(sales))
        .unwrap();
    let john = repo
        .create_person(&PersonDraft::new("John", "Adams").in_unit(marketing))
        .unwrap();

    repo.update_unit(sales, &UnitDraft::new("Sales").with_persons(vec![john]))
        .unwrap();

    let unit = repo.get_unit(sales).unwrap().unwrap();
    assert_eq!(unit.person_ids, vec![john, jane]);
    assert!(repo.get_unit(marketing).unwrap().unwrap().person_ids.is_empty());
    assert_eq!(repo.get_person(john).unwrap().unwrap().unit_id, Some(sales));

    // Without a person list the set is left alone.
    repo.update_unit(sales, &UnitDraft::new("Field Sales")).unwrap();
    let unit = repo.get_unit(sales).unwrap().unwrap();
    assert_eq!(unit.name, "Field Sales");
    assert_eq!(unit.person_ids.len(), 2);
}

fn unit_update_without_organization_detaches<R: ContactRepository>(repo: &R) {
    let acme = repo
        .create_organization(&OrganizationDraft::new("Acme"))
        .unwrap();
    let sales = repo
        .create_unit(&UnitDraft::new("Sales").in_organization(acme))
        .unwrap();

    repo.update_unit(sales, &UnitDraft::new("Sales")).unwrap();

    assert_eq!(repo.get_unit(sales).unwrap().unwrap().organization_id, None);
    assert!(repo
        .get_organization(acme)
        .unwrap()
        .unwrap()
        .unit_ids
        .is_empty());
}

fn person_update_without_unit_detaches<R: ContactRepository>(repo: &R) {
    let sales = repo.create_unit(&UnitDraft::new("Sales")).unwrap();
    let jane = repo
        .create_person(&PersonDraft::new("Jane", "Doe").in_unit(sales))
        .unwrap();

    repo.update_person(jane, &PersonDraft::new("Janet", "Doe"))
        .unwrap();

    let person = repo.get_person(jane).unwrap().unwrap();
    assert_eq!(person.first_name, "Janet");
    assert_eq!(person.unit_id, None);
    assert!(repo.get_unit(sales).unwrap().unwrap().person_ids.is_empty());
}

fn deleting_person_shrinks_unit<R: ContactRepository>(repo: &R) {
    let sales = repo.create_unit(&UnitDraft::new("Sales")).unwrap();
    let jane = repo
        .create_person(&PersonDraft::new("Jane", "Doe").in_unit(sales))
        .unwrap();
    let john = repo
        .create_person(&PersonDraft::new("John", "Roe").in_unit(sales))
        .unwrap();

    repo.delete_person(jane).unwrap();

    assert_eq!(repo.get_unit(sales).unwrap().unwrap().person_ids, vec![john]);
    assert!(repo.get_person(jane).unwrap().is_none());
}

fn lists_are_ordered_by_name<R: ContactRepository>(repo: &R) {
    for name in ["Globex", "Acme", "Initech"] {
        repo.create_organization(&OrganizationDraft::new(name))
            .unwrap();
    }
    let sales = repo.create_unit(&UnitDraft::new("Sales")).unwrap();
    repo.create_unit(&UnitDraft::new("Marketing")).unwrap();
    repo.create_person(&PersonDraft::new("Zoe", "Adams").in_unit(sales))
        .unwrap();
    repo.create_person(&PersonDraft::new("Amy", "Baker").in_unit(sales))
        .unwrap();
    repo.create_person(&PersonDraft::new("Adam", "Adams").in_unit(sales))
        .unwrap();

    let organizations: Vec<_> = repo
        .list_organizations()
        .unwrap()
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    assert_eq!(organizations, ["Acme", "Globex", "Initech"]);

    let units: Vec<_> = repo
        .list_units()
        .unwrap()
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    assert_eq!(units, ["Marketing", "Sales"]);

    let persons = repo.list_persons().unwrap();
    let names: Vec<_> = persons.iter().map(|entry| entry.full_name()).collect();
    assert_eq!(names, ["Adam Adams", "Zoe Adams", "Amy Baker"]);

    let ids: Vec<_> = persons.iter().map(|entry| entry.id).collect();
    assert_eq!(repo.get_unit(sales).unwrap().unwrap().person_ids, ids);
}

fn missing_parent_is_rejected_without_writing<R: ContactRepository>(repo: &R) {
    let ghost = Uuid::new_v4();

    let err = repo
        .create_unit(&UnitDraft::new("Sales").in_organization(ghost))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound { kind: EntityKind::Organization, id } if id == ghost
    ));

    let err = repo
        .create_person(&PersonDraft::new("Jane", "Doe").in_unit(ghost))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            kind: EntityKind::Unit,
            ..
        }
    ));

    assert!(repo.list_units().unwrap().is_empty());
    assert!(repo.list_persons().unwrap().is_empty());
}

fn blank_names_are_rejected_without_writing<R: ContactRepository>(repo: &R) {
    let err = repo
        .create_organization(&OrganizationDraft::new("   "))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ContactValidationError::BlankName(EntityKind::Organization))
    ));

    let sales = repo.create_unit(&UnitDraft::new(" Sales ")).unwrap();
    assert_eq!(repo.get_unit(sales).unwrap().unwrap().name, "Sales");

    let err = repo.update_unit(sales, &UnitDraft::new("")).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
    assert_eq!(repo.get_unit(sales).unwrap().unwrap().name, "Sales");

    let err = repo.create_person(&PersonDraft::new("", " ")).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ContactValidationError::BlankName(EntityKind::Person))
    ));
    assert!(repo.list_organizations().unwrap().is_empty());
    assert!(repo.list_persons().unwrap().is_empty());
}

fn unknown_targets_are_not_found<R: ContactRepository>(repo: &R) {
    let ghost = Uuid::new_v4();

    assert!(repo.get_organization(ghost).unwrap().is_none());
    assert!(matches!(
        repo.update_organization(ghost, &OrganizationDraft::new("Acme")),
        Err(RepoError::NotFound { .. })
    ));
    assert!(matches!(
        repo.delete_unit(ghost),
        Err(RepoError::NotFound {
            kind: EntityKind::Unit,
            ..
        })
    ));
    assert!(matches!(
        repo.delete_person(ghost),
        Err(RepoError::NotFound {
            kind: EntityKind::Person,
            ..
        })
    ));
}
