//! SQLite implementation of the contact repository.
//!
//! # Responsibility
//! - Answer list/get queries straight from SQL.
//! - Run writes as: load graph, apply graph step, replay journal, commit.
//!
//! # Invariants
//! - Every write runs inside one `BEGIN IMMEDIATE` transaction; any error
//!   drops the transaction, which rolls it back.
//! - Journal replay order is the order in which the graph recorded changes,
//!   so descendants are deleted before their owners.

use super::apply;
use super::contact_repo::{read_snapshot, ContactRepository, RepoError, RepoResult};
use crate::db::migrations::{current_version, latest_version};
use crate::graph::{ContactGraph, EntityKey, GraphChange};
use crate::model::contact::{
    ContactSnapshot, ContactValidationError, EntityKind, Organization, OrganizationDraft,
    OrganizationEntry, OrganizationId, Person, PersonDraft, PersonEntry, PersonId, Unit,
    UnitDraft, UnitEntry, UnitId,
};
use log::{error, info, warn};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

const REQUIRED_TABLES: [&str; 3] = ["organizations", "units", "persons"];

/// SQLite-backed contact repository borrowing a migrated connection.
pub struct SqliteContactRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContactRepository<'conn> {
    /// Creates repository from a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when the schema version is not the latest.
    /// - `MissingRequiredTable` when a contact table is absent.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_contact_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Runs `read` inside one deferred transaction so every query it issues
    /// sees the same committed state. `read` must not write.
    ///
    /// Joins the enclosing transaction when one is already open.
    pub fn read_consistent<T>(
        &self,
        read: impl FnOnce(&Self) -> RepoResult<T>,
    ) -> RepoResult<T> {
        if !self.conn.is_autocommit() {
            return read(self);
        }
        let tx = self.conn.unchecked_transaction()?;
        let value = read(self)?;
        tx.commit()?;
        Ok(value)
    }

    fn query_organizations(&self) -> RepoResult<Vec<OrganizationEntry>> {
        let mut units_by_organization = child_ids_by_parent(
            self.conn,
            "SELECT id, organization_id AS parent_id
             FROM units
             WHERE organization_id IS NOT NULL
             ORDER BY name ASC, id ASC;",
            "units",
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT id, name
             FROM organizations
             ORDER BY name ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let id = uuid_column(row, "id", "organizations.id")?;
            entries.push(OrganizationEntry {
                id,
                name: row.get("name")?,
                unit_ids: units_by_organization.remove(&id).unwrap_or_default(),
            });
        }
        Ok(entries)
    }

    fn query_organization(&self, id: OrganizationId) -> RepoResult<Option<OrganizationEntry>> {
        let name: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM organizations WHERE id = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(name) = name else {
            return Ok(None);
        };

        let unit_ids = child_ids(
            self.conn,
            "SELECT id
             FROM units
             WHERE organization_id = ?1
             ORDER BY name ASC, id ASC;",
            id,
            "units.id",
        )?;
        Ok(Some(OrganizationEntry { id, name, unit_ids }))
    }

    fn query_units(&self) -> RepoResult<Vec<UnitEntry>> {
        let mut persons_by_unit = child_ids_by_parent(
            self.conn,
            "SELECT id, unit_id AS parent_id
             FROM persons
             WHERE unit_id IS NOT NULL
             ORDER BY last_name ASC, first_name ASC, id ASC;",
            "persons",
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT id, name, organization_id
             FROM units
             ORDER BY name ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let id = uuid_column(row, "id", "units.id")?;
            entries.push(UnitEntry {
                id,
                name: row.get("name")?,
                organization_id: optional_uuid_column(
                    row,
                    "organization_id",
                    "units.organization_id",
                )?,
                person_ids: persons_by_unit.remove(&id).unwrap_or_default(),
            });
        }
        Ok(entries)
    }

    fn query_unit(&self, id: UnitId) -> RepoResult<Option<UnitEntry>> {
        let row: Option<(String, Option<String>)> = self
            .conn
            .query_row(
                "SELECT name, organization_id FROM units WHERE id = ?1;",
                [id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((name, organization_id)) = row else {
            return Ok(None);
        };

        let person_ids = child_ids(
            self.conn,
            "SELECT id
             FROM persons
             WHERE unit_id = ?1
             ORDER BY last_name ASC, first_name ASC, id ASC;",
            id,
            "persons.id",
        )?;
        Ok(Some(UnitEntry {
            id,
            name,
            organization_id: organization_id
                .map(|value| parse_uuid(&value, "units.organization_id"))
                .transpose()?,
            person_ids,
        }))
    }

    fn write<T>(
        &self,
        event: &'static str,
        step: impl FnOnce(&mut ContactGraph) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let started_at = Instant::now();
        match self.write_in_transaction(step) {
            Ok((value, change_count)) => {
                info!(
                    "event={event} module=repo status=ok changes={change_count} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(err) => {
                let duration_ms = started_at.elapsed().as_millis();
                match err {
                    RepoError::Db(_) | RepoError::InvalidData(_) => error!(
                        "event={event} module=repo status=error error_code={} duration_ms={duration_ms} error={err}",
                        err.code()
                    ),
                    _ => warn!(
                        "event={event} module=repo status=rejected error_code={} duration_ms={duration_ms} error={err}",
                        err.code()
                    ),
                }
                Err(err)
            }
        }
    }

    fn write_in_transaction<T>(
        &self,
        step: impl FnOnce(&mut ContactGraph) -> RepoResult<T>,
    ) -> RepoResult<(T, usize)> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut graph = load_graph(&tx)?;
        let value = step(&mut graph)?;
        let changes = graph.take_changes();
        replay_changes(&tx, &graph, &changes)?;
        tx.commit()?;
        Ok((value, changes.len()))
    }
}

impl ContactRepository for SqliteContactRepository<'_> {
    fn list_organizations(&self) -> RepoResult<Vec<OrganizationEntry>> {
        self.read_consistent(|repo| repo.query_organizations())
    }

    fn get_organization(&self, id: OrganizationId) -> RepoResult<Option<OrganizationEntry>> {
        self.read_consistent(|repo| repo.query_organization(id))
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
        self.read_consistent(|repo| repo.query_units())
    }

    fn get_unit(&self, id: UnitId) -> RepoResult<Option<UnitEntry>> {
        self.read_consistent(|repo| repo.query_unit(id))
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
        let mut stmt = self.conn.prepare(
            "SELECT id, first_name, last_name, unit_id
             FROM persons
             ORDER BY last_name ASC, first_name ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_person_row(row)?);
        }
        Ok(entries)
    }

    fn get_person(&self, id: PersonId) -> RepoResult<Option<PersonEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, first_name, last_name, unit_id
             FROM persons
             WHERE id = ?1;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_person_row(row)?));
        }
        Ok(None)
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

    fn snapshot(&self) -> RepoResult<ContactSnapshot> {
        self.read_consistent(|repo| read_snapshot(repo))
    }
}

/// Loads every stored entity into a fresh graph with an empty journal.
fn load_graph(conn: &Connection) -> RepoResult<ContactGraph> {
    let mut graph = ContactGraph::new();

    let mut stmt = conn.prepare("SELECT id, name FROM organizations ORDER BY name ASC, id ASC;")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let id = uuid_column(row, "id", "organizations.id")?;
        graph.add_organization(Organization::with_id(id, row.get::<_, String>("name")?))?;
    }

    let mut stmt = conn.prepare(
        "SELECT id, name, organization_id FROM units ORDER BY name ASC, id ASC;",
    )?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let id = uuid_column(row, "id", "units.id")?;
        let organization = optional_uuid_column(row, "organization_id", "units.organization_id")?
            .map(|organization_id| {
                graph.find_organization(organization_id).ok_or_else(|| {
                    RepoError::InvalidData(format!(
                        "unit {id} references missing organization {organization_id}"
                    ))
                })
            })
            .transpose()?;
        graph.add_unit(Unit::with_id(id, row.get::<_, String>("name")?), organization)?;
    }

    let mut stmt = conn.prepare(
        "SELECT id, first_name, last_name, unit_id
         FROM persons
         ORDER BY last_name ASC, first_name ASC, id ASC;",
    )?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let id = uuid_column(row, "id", "persons.id")?;
        let unit = optional_uuid_column(row, "unit_id", "persons.unit_id")?
            .map(|unit_id| {
                graph.find_unit(unit_id).ok_or_else(|| {
                    RepoError::InvalidData(format!("person {id} references missing unit {unit_id}"))
                })
            })
            .transpose()?;
        let person = Person::with_id(
            id,
            row.get::<_, String>("first_name")?,
            row.get::<_, String>("last_name")?,
        );
        graph.add_person(person, unit)?;
    }

    graph.take_changes();
    Ok(graph)
}

/// Translates journaled graph changes into SQL writes.
///
/// Entities removed later in the same journal are skipped for insert/update;
/// their `Removed` entry deletes the row.
fn replay_changes(
    conn: &Connection,
    graph: &ContactGraph,
    changes: &[GraphChange],
) -> RepoResult<()> {
    for change in changes {
        match *change {
            GraphChange::Added(key) => insert_row(conn, graph, key)?,
            GraphChange::Updated(key) => update_fields(conn, graph, key)?,
            GraphChange::Linked(key) => update_link(conn, graph, key)?,
            GraphChange::Removed { kind, id } => delete_row(conn, kind, id)?,
        }
    }
    Ok(())
}

fn insert_row(conn: &Connection, graph: &ContactGraph, key: EntityKey) -> RepoResult<()> {
    match key {
        EntityKey::Organization(organization_key) => {
            let Some(organization) = graph.organization(organization_key) else {
                return Ok(());
            };
            conn.execute(
                "INSERT INTO organizations (id, name) VALUES (?1, ?2);",
                params![
                    stored_id(organization.id, EntityKind::Organization)?,
                    organization.name.as_str(),
                ],
            )?;
        }
        EntityKey::Unit(unit_key) => {
            let Some(unit) = graph.unit(unit_key) else {
                return Ok(());
            };
            conn.execute(
                "INSERT INTO units (id, name, organization_id) VALUES (?1, ?2, ?3);",
                params![
                    stored_id(unit.id, EntityKind::Unit)?,
                    unit.name.as_str(),
                    owner_id(graph, key)?,
                ],
            )?;
        }
        EntityKey::Person(person_key) => {
            let Some(person) = graph.person(person_key) else {
                return Ok(());
            };
            conn.execute(
                "INSERT INTO persons (id, first_name, last_name, unit_id)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    stored_id(person.id, EntityKind::Person)?,
                    person.first_name.as_str(),
                    person.last_name.as_str(),
                    owner_id(graph, key)?,
                ],
            )?;
        }
    }
    Ok(())
}

fn update_fields(conn: &Connection, graph: &ContactGraph, key: EntityKey) -> RepoResult<()> {
    let (kind, id, changed) = match key {
        EntityKey::Organization(organization_key) => {
            let Some(organization) = graph.organization(organization_key) else {
                return Ok(());
            };
            let id = stored_id(organization.id, EntityKind::Organization)?;
            let changed = conn.execute(
                "UPDATE organizations
                 SET name = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                params![id, organization.name.as_str()],
            )?;
            (EntityKind::Organization, id, changed)
        }
        EntityKey::Unit(unit_key) => {
            let Some(unit) = graph.unit(unit_key) else {
                return Ok(());
            };
            let id = stored_id(unit.id, EntityKind::Unit)?;
            let changed = conn.execute(
                "UPDATE units
                 SET name = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                params![id, unit.name.as_str()],
            )?;
            (EntityKind::Unit, id, changed)
        }
        EntityKey::Person(person_key) => {
            let Some(person) = graph.person(person_key) else {
                return Ok(());
            };
            let id = stored_id(person.id, EntityKind::Person)?;
            let changed = conn.execute(
                "UPDATE persons
                 SET first_name = ?2,
                     last_name = ?3,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                params![id, person.first_name.as_str(), person.last_name.as_str()],
            )?;
            (EntityKind::Person, id, changed)
        }
    };
    ensure_row_changed(kind, &id, changed)
}

fn update_link(conn: &Connection, graph: &ContactGraph, key: EntityKey) -> RepoResult<()> {
    let Some(id) = graph.id_of(key) else {
        return match live_kind(graph, key) {
            Some(kind) => Err(ContactValidationError::Unpersisted(kind).into()),
            None => Ok(()),
        };
    };
    let (kind, sql) = match key {
        EntityKey::Organization(_) => return Ok(()),
        EntityKey::Unit(_) => (
            EntityKind::Unit,
            "UPDATE units
             SET organization_id = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
        ),
        EntityKey::Person(_) => (
            EntityKind::Person,
            "UPDATE persons
             SET unit_id = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
        ),
    };
    let id = id.to_string();
    let changed = conn.execute(sql, params![id, owner_id(graph, key)?])?;
    ensure_row_changed(kind, &id, changed)
}

fn delete_row(conn: &Connection, kind: EntityKind, id: Option<Uuid>) -> RepoResult<()> {
    // Never stored, nothing to delete.
    let Some(id) = id else {
        return Ok(());
    };
    let sql = match kind {
        EntityKind::Organization => "DELETE FROM organizations WHERE id = ?1;",
        EntityKind::Unit => "DELETE FROM units WHERE id = ?1;",
        EntityKind::Person => "DELETE FROM persons WHERE id = ?1;",
    };
    conn.execute(sql, [id.to_string()])?;
    Ok(())
}

/// Store id of the current owner of a unit or person, as bound text.
fn owner_id(graph: &ContactGraph, key: EntityKey) -> RepoResult<Option<String>> {
    let owner = match key {
        EntityKey::Organization(_) => None,
        EntityKey::Unit(unit) => graph
            .organization_of(unit)
            .map(|organization| (EntityKind::Organization, EntityKey::Organization(organization))),
        EntityKey::Person(person) => graph
            .unit_of(person)
            .map(|unit| (EntityKind::Unit, EntityKey::Unit(unit))),
    };
    owner
        .map(|(kind, owner)| {
            graph
                .id_of(owner)
                .map(|id| id.to_string())
                .ok_or(RepoError::Validation(ContactValidationError::Unpersisted(
                    kind,
                )))
        })
        .transpose()
}

fn live_kind(graph: &ContactGraph, key: EntityKey) -> Option<EntityKind> {
    match key {
        EntityKey::Organization(key) => graph
            .organization(key)
            .map(|_| EntityKind::Organization),
        EntityKey::Unit(key) => graph.unit(key).map(|_| EntityKind::Unit),
        EntityKey::Person(key) => graph.person(key).map(|_| EntityKind::Person),
    }
}

fn stored_id(id: Option<Uuid>, kind: EntityKind) -> RepoResult<String> {
    id.map(|id| id.to_string())
        .ok_or(RepoError::Validation(ContactValidationError::Unpersisted(kind)))
}

fn ensure_row_changed(kind: EntityKind, id: &str, changed: usize) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound {
            kind,
            id: parse_uuid(id, "journal id")?,
        });
    }
    Ok(())
}

fn child_ids(
    conn: &Connection,
    sql: &str,
    parent_id: Uuid,
    column: &'static str,
) -> RepoResult<Vec<Uuid>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([parent_id.to_string()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(uuid_column(row, "id", column)?);
    }
    Ok(ids)
}

fn child_ids_by_parent(
    conn: &Connection,
    sql: &str,
    table: &'static str,
) -> RepoResult<HashMap<Uuid, Vec<Uuid>>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut grouped: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let id = uuid_column(row, "id", table)?;
        let parent_id = uuid_column(row, "parent_id", table)?;
        grouped.entry(parent_id).or_default().push(id);
    }
    Ok(grouped)
}

fn parse_person_row(row: &Row<'_>) -> RepoResult<PersonEntry> {
    Ok(PersonEntry {
        id: uuid_column(row, "id", "persons.id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        unit_id: optional_uuid_column(row, "unit_id", "persons.unit_id")?,
    })
}

fn uuid_column(row: &Row<'_>, name: &str, column: &'static str) -> RepoResult<Uuid> {
    let value: String = row.get(name)?;
    parse_uuid(&value, column)
}

fn optional_uuid_column(
    row: &Row<'_>,
    name: &str,
    column: &'static str,
) -> RepoResult<Option<Uuid>> {
    row.get::<_, Option<String>>(name)?
        .map(|value| parse_uuid(&value, column))
        .transpose()
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn ensure_contact_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}
