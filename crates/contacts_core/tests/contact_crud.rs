use contacts_core::db::migrations::latest_version;
use contacts_core::db::{open_db, open_db_in_memory};
use contacts_core::{
    ContactRepository, OrganizationDraft, PersonDraft, RepoError, SqliteContactRepository,
    UnitDraft,
};
use rusqlite::Connection;
use uuid::Uuid;

#[test]
fn try_new_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    let result = SqliteContactRepository::try_new(&conn);
    match result {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        }) => {
            assert_eq!(expected_version, latest_version());
            assert_eq!(actual_version, 0);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("unmigrated connection must be rejected"),
    }
}

#[test]
fn try_new_rejects_connection_without_contact_tables() {
    let conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "user_version", latest_version())
        .unwrap();

    let result = SqliteContactRepository::try_new(&conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredTable("organizations"))
    ));
}

#[test]
fn created_rows_carry_foreign_keys_and_timestamps() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&conn).unwrap();

    let acme = repo
        .create_organization(&OrganizationDraft::new("Acme"))
        .unwrap();
    let sales = repo
        .create_unit(&UnitDraft::new("Sales").in_organization(acme))
        .unwrap();
    let jane = repo
        .create_person(&PersonDraft::new("Jane", "Doe").in_unit(sales))
        .unwrap();

    let unit_owner: String = conn
        .query_row(
            "SELECT organization_id FROM units WHERE id = ?1;",
            [sales.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(unit_owner, acme.to_string());

    let (person_owner, created_at): (String, i64) = conn
        .query_row(
            "SELECT unit_id, created_at FROM persons WHERE id = ?1;",
            [jane.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(person_owner, sales.to_string());
    assert!(created_at > 0);
}

#[test]
fn cascading_delete_removes_rows() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&conn).unwrap();

    let acme = repo
        .create_organization(&OrganizationDraft::new("Acme"))
        .unwrap();
    let sales = repo
        .create_unit(&UnitDraft::new("Sales").in_organization(acme))
        .unwrap();
    repo.create_person(&PersonDraft::new("Jane", "Doe").in_unit(sales))
        .unwrap();

    repo.delete_organization(acme).unwrap();

    for table in ["organizations", "units", "persons"] {
        assert_eq!(row_count(&conn, table), 0, "{table} should be empty");
    }
}

#[test]
fn failed_write_rolls_back_every_statement() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&conn).unwrap();

    let sales = repo.create_unit(&UnitDraft::new("Sales")).unwrap();
    let jane = repo.create_person(&PersonDraft::new("Jane", "Doe")).unwrap();

    // Jane resolves, the second id does not: the rename must not survive.
    let draft = UnitDraft::new("Renamed").with_persons(vec![jane, Uuid::new_v4()]);
    assert!(matches!(
        repo.update_unit(sales, &draft),
        Err(RepoError::NotFound { .. })
    ));

    let unit = repo.get_unit(sales).unwrap().unwrap();
    assert_eq!(unit.name, "Sales");
    assert!(unit.person_ids.is_empty());
    assert_eq!(repo.get_person(jane).unwrap().unwrap().unit_id, None);
}

#[test]
fn data_survives_reopening_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contacts.sqlite3");

    let (acme, sales) = {
        let conn = open_db(&path).unwrap();
        let repo = SqliteContactRepository::try_new(&conn).unwrap();
        let acme = repo
            .create_organization(&OrganizationDraft::new("Acme"))
            .unwrap();
        let sales = repo
            .create_unit(&UnitDraft::new("Sales").in_organization(acme))
            .unwrap();
        (acme, sales)
    };

    let conn = open_db(&path).unwrap();
    let repo = SqliteContactRepository::try_new(&conn).unwrap();
    let organization = repo.get_organization(acme).unwrap().unwrap();
    assert_eq!(organization.unit_ids, vec![sales]);
}

#[test]
fn dangling_owner_reference_is_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&conn).unwrap();
    let orphan = Uuid::new_v4();
    conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
    conn.execute(
        "INSERT INTO units (id, name, organization_id) VALUES (?1, 'Ghost', ?2);",
        [Uuid::new_v4().to_string(), orphan.to_string()],
    )
    .unwrap();

    let err = repo
        .create_organization(&OrganizationDraft::new("Acme"))
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
    assert_eq!(row_count(&conn, "organizations"), 0);
}

#[test]
fn consistent_read_ignores_commits_from_other_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contacts.sqlite3");
    let reader_conn = open_db(&path).unwrap();
    let journal_mode: String = reader_conn
        .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(journal_mode, "wal");
    let writer_conn = open_db(&path).unwrap();
    let reader = SqliteContactRepository::try_new(&reader_conn).unwrap();
    let writer = SqliteContactRepository::try_new(&writer_conn).unwrap();

    let acme = writer
        .create_organization(&OrganizationDraft::new("Acme"))
        .unwrap();
    let sales = writer
        .create_unit(&UnitDraft::new("Sales").in_organization(acme))
        .unwrap();

    let (organizations, units) = reader
        .read_consistent(|repo| {
            let organizations = repo.list_organizations()?;
            writer.delete_unit(sales)?;
            let units = repo.list_units()?;
            Ok((organizations, units))
        })
        .unwrap();

    assert_eq!(organizations[0].unit_ids, vec![sales]);
    assert_eq!(
        units.iter().map(|unit| unit.id).collect::<Vec<_>>(),
        vec![sales]
    );
    assert!(reader.list_units().unwrap().is_empty());
    assert!(reader
        .get_organization(acme)
        .unwrap()
        .unwrap()
        .unit_ids
        .is_empty());
}

#[test]
fn snapshot_reads_one_store_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contacts.sqlite3");
    let reader_conn = open_db(&path).unwrap();
    reader_conn
        .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get::<_, String>(0))
        .unwrap();
    let writer_conn = open_db(&path).unwrap();
    let reader = SqliteContactRepository::try_new(&reader_conn).unwrap();
    let writer = SqliteContactRepository::try_new(&writer_conn).unwrap();

    let acme = writer
        .create_organization(&OrganizationDraft::new("Acme"))
        .unwrap();
    let sales = writer
        .create_unit(&UnitDraft::new("Sales").in_organization(acme))
        .unwrap();
    writer
        .create_person(&PersonDraft::new("Jane", "Doe").in_unit(sales))
        .unwrap();

    reader
        .read_consistent(|repo| {
            let before = repo.snapshot()?;
            writer.delete_organization(acme)?;
            let after = repo.snapshot()?;
            assert_eq!(before, after);
            assert_eq!(after.persons.len(), 1);
            Ok(())
        })
        .unwrap();

    let current = reader.snapshot().unwrap();
    assert!(current.organizations.is_empty());
    assert!(current.units.is_empty());
    assert!(current.persons.is_empty());
}

fn row_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}
