//! Command-line front end for the single-track event timeline.
//!
//! # Responsibility
//! - Parse timestamps and ids into well-formed drafts before they reach core.
//! - Print results as JSON on stdout.
//! - Exit non-zero on any failure; `2` for rejected mutations, `1` otherwise.

mod timestamp;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use timeline_core::db::open_db_with_busy_timeout;
use timeline_core::{
    init_logging_from_config, CategoryId, CategoryPolicy, CategoryRepository, CoreConfig, Event,
    EventDraft, EventId, EventService, EventServiceError, SqliteCategoryRepository,
    SqliteEventRepository,
};
use timestamp::{format_timestamp_ms, parse_timestamp_ms};

#[derive(Parser)]
#[command(
    name = "timeline",
    version,
    about = "Conflict-checked single-track event timeline",
    propagate_version = true
)]
struct Cli {
    /// SQLite database file; overrides TIMELINE_DB_PATH
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Accept events without categories
    #[arg(long, global = true)]
    allow_empty_categories: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Category reference data
    #[command(subcommand)]
    Categories(CategoryCommands),
    #[command(flatten)]
    Event(EventCommands),
}

#[derive(Subcommand)]
enum EventCommands {
    /// Create an event
    Create(EventArgs),
    /// Replace an existing event
    Update {
        id: EventId,
        #[command(flatten)]
        event: EventArgs,
    },
    /// Delete an event
    Delete { id: EventId },
    /// Show one event
    Get { id: EventId },
    /// List events ordered by start
    List {
        /// Match events carrying any of these categories
        #[arg(long = "category")]
        categories: Vec<CategoryId>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Preview conflicts for an interval without writing
    Check {
        #[arg(long, value_parser = parse_timestamp_ms)]
        start: Option<i64>,
        #[arg(long, value_parser = parse_timestamp_ms)]
        end: Option<i64>,
        /// Event to ignore, usually the one being edited
        #[arg(long)]
        exclude: Option<EventId>,
    },
}

#[derive(Subcommand)]
enum CategoryCommands {
    /// List categories by name
    List,
    /// Insert the default category set
    Seed,
    /// Add a category, or return the existing one with that name
    Add { name: String },
}

#[derive(Args)]
struct EventArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long, value_parser = parse_timestamp_ms)]
    start: i64,
    #[arg(long, value_parser = parse_timestamp_ms)]
    end: i64,
    /// Category id; repeat for several
    #[arg(long = "category")]
    categories: Vec<CategoryId>,
}

impl EventArgs {
    fn into_draft(self) -> EventDraft {
        let draft = EventDraft::new(self.name, self.start, self.end, self.categories);
        match self.description {
            Some(description) => draft.with_description(description),
            None => draft,
        }
    }
}

#[derive(Serialize)]
struct EventView<'a> {
    #[serde(flatten)]
    event: &'a Event,
    start: String,
    end: String,
}

impl<'a> From<&'a Event> for EventView<'a> {
    fn from(event: &'a Event) -> Self {
        Self {
            event,
            start: format_timestamp_ms(event.start_ms),
            end: format_timestamp_ms(event.end_ms),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_failure(&err),
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = CoreConfig::from_env().context("failed to read TIMELINE_* configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if cli.allow_empty_categories {
        config.category_policy = CategoryPolicy::AllowEmpty;
    }
    init_logging_from_config(&config).map_err(anyhow::Error::msg)?;
    info!(
        "event=cli_start module=cli status=ok version={} policy={}",
        timeline_core::core_version(),
        config.category_policy.as_str()
    );

    let mut conn = open_db_with_busy_timeout(&config.db_path, config.busy_timeout)
        .with_context(|| format!("failed to open `{}`", config.db_path.display()))?;

    match cli.command {
        Commands::Categories(command) => run_categories(&mut conn, command),
        Commands::Event(command) => run_events(&mut conn, config.category_policy, command),
    }
}

fn run_categories(conn: &mut Connection, command: CategoryCommands) -> Result<()> {
    let mut repo = SqliteCategoryRepository::try_new(conn)?;
    match command {
        CategoryCommands::List => print_json(&repo.list_categories()?),
        CategoryCommands::Seed => print_json(&repo.seed_default_categories()?),
        CategoryCommands::Add { name } => print_json(&repo.ensure_category(&name)?),
    }
}

fn run_events(
    conn: &mut Connection,
    policy: CategoryPolicy,
    command: EventCommands,
) -> Result<()> {
    let mut service = EventService::with_policy(SqliteEventRepository::try_new(conn)?, policy);
    match command {
        EventCommands::Create(args) => {
            let event = service.create_event(args.into_draft())?;
            print_json(&EventView::from(&event))
        }
        EventCommands::Update { id, event } => {
            let event = service.update_event(id, event.into_draft())?;
            print_json(&EventView::from(&event))
        }
        EventCommands::Delete { id } => {
            service.delete_event(id)?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
        EventCommands::Get { id } => match service.get_event(id)? {
            Some(event) => print_json(&EventView::from(&event)),
            None => Err(EventServiceError::EventNotFound(id).into()),
        },
        EventCommands::List {
            categories,
            limit,
            offset,
        } => {
            let page = service.list_events(categories, limit, offset)?;
            print_json(&serde_json::json!({
                "items": page.items.iter().map(EventView::from).collect::<Vec<_>>(),
                "total": page.total,
                "limit": page.limit,
                "offset": page.offset,
            }))
        }
        EventCommands::Check {
            start,
            end,
            exclude,
        } => print_json(&service.check_conflicts(start, end, exclude)?),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_failure(err: &anyhow::Error) -> ExitCode {
    eprintln!("error: {err:#}");

    let Some(service_err) = err.downcast_ref::<EventServiceError>() else {
        return ExitCode::from(1);
    };
    if let EventServiceError::OverlapConflict(conflicts) = service_err {
        let views = conflicts.iter().map(EventView::from).collect::<Vec<_>>();
        if let Ok(rendered) = serde_json::to_string_pretty(&views) {
            eprintln!("{rendered}");
        }
    }
    if service_err.is_domain_outcome() {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, EventCommands};
    use clap::{CommandFactory, Parser};

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn create_parses_timestamps_and_repeated_categories() {
        let cli = Cli::try_parse_from([
            "timeline",
            "--db",
            "/tmp/t.db",
            "create",
            "--name",
            "Keynote",
            "--start",
            "2024-01-01T10:00:00Z",
            "--end",
            "2024-01-01T11:00",
            "--category",
            "00000000-0000-4000-8000-000000000001",
            "--category",
            "00000000-0000-4000-8000-000000000002",
        ])
        .unwrap();

        let Commands::Event(EventCommands::Create(args)) = cli.command else {
            panic!("expected create command");
        };
        let draft = args.into_draft();
        assert_eq!(draft.end_ms - draft.start_ms, 60 * 60 * 1000);
        assert_eq!(draft.category_ids.len(), 2);
        assert!(draft.description.is_none());
    }

    #[test]
    fn malformed_ids_and_timestamps_are_rejected_before_core() {
        assert!(Cli::try_parse_from(["timeline", "get", "not-a-uuid"]).is_err());
        assert!(Cli::try_parse_from([
            "timeline",
            "check",
            "--start",
            "yesterday",
            "--end",
            "2024-01-01T11:00"
        ])
        .is_err());
    }

    #[test]
    fn check_accepts_missing_bounds() {
        let cli = Cli::try_parse_from(["timeline", "check"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Event(EventCommands::Check {
                start: None,
                end: None,
                exclude: None
            })
        ));
    }
}
