//! `contacts` command-line entry point.
//!
//! # Responsibility
//! - Map subcommands onto `ContactService` calls.
//! - Print stored state again after every mutation.
//!
//! Exit code is non-zero on any failure, with the message on stderr.

use clap::{Parser, Subcommand};
use contacts_core::{
    init_logging, open_db, spawn_snapshot_refresh, AppConfig, ContactService, ContactSnapshot,
    OrganizationDraft, PersonDraft, SqliteContactRepository, UnitDraft,
};
use log::{error, info};
use serde::Serialize;
use std::error::Error;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use uuid::Uuid;

const DEFAULT_CONFIG_FILE: &str = "contacts.toml";

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser, Debug)]
#[command(
    name = "contacts",
    version,
    about = "Organizations, their units and the persons in them"
)]
struct Cli {
    /// Config file; missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// SQLite database file (overrides config).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Absolute log directory (overrides config).
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log level (overrides config).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check core linkage.
    Ping,
    /// Print all organizations, units and persons.
    Snapshot,
    /// Manage organizations.
    #[command(subcommand)]
    Org(OrgCommand),
    /// Manage units.
    #[command(subcommand)]
    Unit(UnitCommand),
    /// Manage persons.
    #[command(subcommand)]
    Person(PersonCommand),
}

#[derive(Subcommand, Debug)]
enum OrgCommand {
    List,
    Show { id: Uuid },
    Add { name: String },
    Update { id: Uuid, name: String },
    /// Delete with all units and their persons.
    Rm { id: Uuid },
}

#[derive(Subcommand, Debug)]
enum UnitCommand {
    List,
    Show {
        id: Uuid,
    },
    Add {
        name: String,
        #[arg(long)]
        org: Option<Uuid>,
        /// Person to attach; repeatable.
        #[arg(long = "person")]
        persons: Vec<Uuid>,
    },
    /// Replace name and organization; listed persons are attached, others stay.
    Update {
        id: Uuid,
        name: String,
        /// Omit to detach from the current organization.
        #[arg(long)]
        org: Option<Uuid>,
        #[arg(long = "person")]
        persons: Vec<Uuid>,
    },
    /// Delete with all its persons.
    Rm {
        id: Uuid,
    },
}

#[derive(Subcommand, Debug)]
enum PersonCommand {
    List,
    Show {
        id: Uuid,
    },
    Add {
        #[arg(long, default_value = "")]
        first: String,
        #[arg(long, default_value = "")]
        last: String,
        #[arg(long)]
        unit: Option<Uuid>,
    },
    Update {
        id: Uuid,
        #[arg(long, default_value = "")]
        first: String,
        #[arg(long, default_value = "")]
        last: String,
        /// Omit to detach from the current unit.
        #[arg(long)]
        unit: Option<Uuid>,
    },
    Rm {
        id: Uuid,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_exit module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config = effective_config(&cli)?;
    if let Some(log_dir) = config.log_dir.as_deref() {
        init_logging(&config.log_level, log_dir)?;
    }

    if let Commands::Ping = cli.command {
        println!("contacts_core ping={}", contacts_core::ping());
        println!("contacts_core version={}", contacts_core::core_version());
        return Ok(());
    }

    let conn = open_db(&config.db_path)?;
    let service = ContactService::new(SqliteContactRepository::try_new(&conn)?);
    let json = cli.json;

    match cli.command {
        Commands::Ping => {}
        Commands::Snapshot => print_snapshot(&service.snapshot()?, json)?,
        Commands::Org(command) => match command {
            OrgCommand::List => print_list(&service.list_organizations()?, json)?,
            OrgCommand::Show { id } => print_one(&service.get_organization(id)?, json)?,
            OrgCommand::Add { name } => {
                let created = service.create_organization(&OrganizationDraft::new(name))?;
                info!("event=cli_org_add module=cli status=ok id={}", created.id);
                refresh(&config.db_path, json)?;
            }
            OrgCommand::Update { id, name } => {
                service.update_organization(id, &OrganizationDraft::new(name))?;
                refresh(&config.db_path, json)?;
            }
            OrgCommand::Rm { id } => {
                service.delete_organization(id)?;
                refresh(&config.db_path, json)?;
            }
        },
        Commands::Unit(command) => match command {
            UnitCommand::List => print_list(&service.list_units()?, json)?,
            UnitCommand::Show { id } => print_one(&service.get_unit(id)?, json)?,
            UnitCommand::Add { name, org, persons } => {
                let created = service.create_unit(&unit_draft(name, org, persons))?;
                info!("event=cli_unit_add module=cli status=ok id={}", created.id);
                refresh(&config.db_path, json)?;
            }
            UnitCommand::Update {
                id,
                name,
                org,
                persons,
            } => {
                service.update_unit(id, &unit_draft(name, org, persons))?;
                refresh(&config.db_path, json)?;
            }
            UnitCommand::Rm { id } => {
                service.delete_unit(id)?;
                refresh(&config.db_path, json)?;
            }
        },
        Commands::Person(command) => match command {
            PersonCommand::List => print_list(&service.list_persons()?, json)?,
            PersonCommand::Show { id } => print_one(&service.get_person(id)?, json)?,
            PersonCommand::Add { first, last, unit } => {
                let created = service.create_person(&person_draft(first, last, unit))?;
                info!("event=cli_person_add module=cli status=ok id={}", created.id);
                refresh(&config.db_path, json)?;
            }
            PersonCommand::Update {
                id,
                first,
                last,
                unit,
            } => {
                service.update_person(id, &person_draft(first, last, unit))?;
                refresh(&config.db_path, json)?;
            }
            PersonCommand::Rm { id } => {
                service.delete_person(id)?;
                refresh(&config.db_path, json)?;
            }
        },
    }
    Ok(())
}

fn effective_config(cli: &Cli) -> CliResult<AppConfig> {
    let mut config = AppConfig::load(&cli.config)?;
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(log_dir) = &cli.log_dir {
        config.log_dir = Some(log_dir.clone());
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

fn unit_draft(name: String, org: Option<Uuid>, persons: Vec<Uuid>) -> UnitDraft {
    UnitDraft {
        name,
        organization_id: org,
        person_ids: (!persons.is_empty()).then_some(persons),
    }
}

fn person_draft(first: String, last: String, unit: Option<Uuid>) -> PersonDraft {
    PersonDraft {
        first_name: first,
        last_name: last,
        unit_id: unit,
    }
}

/// Re-reads every list from the store after a write.
fn refresh(db_path: &Path, json: bool) -> CliResult<()> {
    let snapshot = spawn_snapshot_refresh(db_path).wait()?;
    print_snapshot(&snapshot, json)
}

fn print_snapshot(snapshot: &ContactSnapshot, json: bool) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
        return Ok(());
    }
    print_section("Organizations", &snapshot.organizations);
    print_section("Units", &snapshot.units);
    print_section("Persons", &snapshot.persons);
    Ok(())
}

fn print_section<T: Display>(title: &str, entries: &[T]) {
    println!("{title} ({})", entries.len());
    for entry in entries {
        println!("  {entry}");
    }
}

fn print_list<T: Display + Serialize>(entries: &[T], json: bool) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
    } else {
        for entry in entries {
            println!("{entry}");
        }
    }
    Ok(())
}

fn print_one<T: Display + Serialize>(entry: &T, json: bool) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entry)?);
    } else {
        println!("{entry}");
    }
    Ok(())
}
