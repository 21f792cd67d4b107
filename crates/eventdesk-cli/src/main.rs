// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use eventdesk_app::{
    AuthToken, EntityKind, EventId, FormPayload, InviteFormInput, Role, SortOrder, TeamFormInput,
    TeamId,
};
use eventdesk_db::Store;
use runtime::{AdminRuntime, ListRequest, Mutation, Prompter};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DEMO_SUBJECT: &str = "demo@eventdesk.local";

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `eventdesk --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;
    init_tracing(config.log_level())?;

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or EVENTDESK_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;

    let now = OffsetDateTime::now_utc();
    let token = if options.demo {
        store.seed_demo_data()?;
        Some(AuthToken {
            subject: DEMO_SUBJECT.to_owned(),
            expires_at: now + Duration::hours(1),
        })
    } else {
        AuthToken::load(&config.token_path()?)?
    };
    let mutation = options.mutation()?;
    if options.check_only {
        return Ok(());
    }

    let store = Rc::new(store);
    if let Some(mutation) = mutation {
        let prompter = Prompter::new(io::stdin().lock(), io::stdout(), options.assume_yes);
        let mut runtime =
            AdminRuntime::new(Rc::clone(&store), config.route_guard(), token, prompter);
        let summary = runtime
            .run(mutation, now)?
            .unwrap_or_else(|| "nothing changed".to_owned());
        writeln!(runtime.prompter().output(), "{summary}").context("write summary")?;
        return Ok(());
    }

    let request = options.list_request();
    let report = runtime::list(&store, &request)?;
    for row in &report.rows {
        println!("{row}");
    }
    println!(
        "{} of {} {}(s)",
        report.visible,
        report.total,
        request.kind.as_str()
    );
    if let Some(status) = report.status {
        println!("{status}");
    }
    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log filter {level:?}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|error| anyhow!("install log subscriber: {error}"))?;
    debug!(level, "logging initialized");
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliCommand {
    DeleteEvent(EventId),
    DeleteTeam(TeamId),
    Invite(String),
    Import(PathBuf),
    CreateTeam(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
    list: Option<EntityKind>,
    filters: Vec<(String, String)>,
    sort: Option<SortOrder>,
    include_deleted: bool,
    command: Option<CliCommand>,
    team: Option<TeamId>,
    role: Option<Role>,
    assume_yes: bool,
}

impl CliOptions {
    fn list_request(&self) -> ListRequest {
        ListRequest {
            filters: self.filters.clone(),
            sort: self.sort.clone(),
            include_deleted: self.include_deleted,
            ..ListRequest::new(self.list.unwrap_or(EntityKind::Event))
        }
    }

    fn mutation(&self) -> Result<Option<Mutation>> {
        let Some(command) = &self.command else {
            return Ok(None);
        };
        let mutation = match command {
            CliCommand::DeleteEvent(event_id) => Mutation::DeleteEvent(*event_id),
            CliCommand::DeleteTeam(team_id) => Mutation::DeleteTeam(*team_id),
            CliCommand::Invite(email) => Mutation::Invite {
                team_id: self.require_team("--invite")?,
                invite: InviteFormInput {
                    email: email.clone(),
                    display_name: String::new(),
                    role: self.role.unwrap_or(Role::Viewer),
                },
            },
            CliCommand::Import(path) => Mutation::Import {
                team_id: self.require_team("--import")?,
                rows: read_import_file(path)?,
            },
            CliCommand::CreateTeam(name) => Mutation::Submit(FormPayload::Team(TeamFormInput {
                name: name.clone(),
                description: String::new(),
            })),
        };
        Ok(Some(mutation))
    }

    fn require_team(&self, flag: &str) -> Result<TeamId> {
        self.team
            .ok_or_else(|| anyhow!("{flag} requires --team <id>; run with --list teams to find it"))
    }
}

fn read_import_file(path: &Path) -> Result<Vec<InviteFormInput>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read member import {}", path.display()))?;
    let rows: Vec<InviteFormInput> = serde_json::from_str(&raw).with_context(|| {
        format!(
            "parse member import {}; expected a JSON array of {{\"email\", \"display_name\", \"role\"}} objects",
            path.display()
        )
    })?;
    if rows.is_empty() {
        bail!("member import {} has no rows", path.display());
    }
    Ok(rows)
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
        list: None,
        filters: Vec::new(),
        sort: None,
        include_deleted: false,
        command: None,
        team: None,
        role: None,
        assume_yes: false,
    };

    let mut iter = args.into_iter().map(|arg| arg.as_ref().to_owned());
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = next_value(&mut iter, "--config", "a file path")?;
                options.config_path = PathBuf::from(path);
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            "--list" => {
                let value =
                    next_value(&mut iter, "--list", "teams, members, events or sessions")?;
                options.list = Some(EntityKind::parse(&value).ok_or_else(|| {
                    anyhow!("cannot list {value:?}; use teams, members, events or sessions")
                })?);
            }
            "--filter" => {
                let value = next_value(&mut iter, "--filter", "key=value")?;
                let (key, raw) = value
                    .split_once('=')
                    .ok_or_else(|| anyhow!("--filter expects key=value, got {value:?}"))?;
                options.filters.push((key.trim().to_owned(), raw.to_owned()));
            }
            "--sort" => {
                let value = next_value(&mut iter, "--sort", "key[:asc|:desc]")?;
                options.sort = Some(SortOrder::parse(&value).ok_or_else(|| {
                    anyhow!("--sort expects key, key:asc or key:desc, got {value:?}")
                })?);
            }
            "--deleted" => {
                options.include_deleted = true;
            }
            "--delete-event" => {
                let value = next_value(&mut iter, "--delete-event", "an event id")?;
                let id = parse_id("--delete-event", &value)?;
                set_command(&mut options.command, CliCommand::DeleteEvent(EventId::new(id)))?;
            }
            "--delete-team" => {
                let value = next_value(&mut iter, "--delete-team", "a team id")?;
                let id = parse_id("--delete-team", &value)?;
                set_command(&mut options.command, CliCommand::DeleteTeam(TeamId::new(id)))?;
            }
            "--invite" => {
                let email = next_value(&mut iter, "--invite", "an email address")?;
                set_command(&mut options.command, CliCommand::Invite(email))?;
            }
            "--import" => {
                let path = next_value(&mut iter, "--import", "a JSON file path")?;
                set_command(&mut options.command, CliCommand::Import(PathBuf::from(path)))?;
            }
            "--create-team" => {
                let name = next_value(&mut iter, "--create-team", "a team name")?;
                set_command(&mut options.command, CliCommand::CreateTeam(name))?;
            }
            "--team" => {
                let value = next_value(&mut iter, "--team", "a team id")?;
                let id = parse_id("--team", &value)?;
                options.team = Some(TeamId::new(id));
            }
            "--role" => {
                let value = next_value(&mut iter, "--role", "a role")?;
                options.role = Some(Role::parse(&value.to_ascii_lowercase()).ok_or_else(|| {
                    anyhow!("unknown role {value:?}; use owner, admin, organizer or viewer")
                })?);
            }
            "--yes" | "-y" => {
                options.assume_yes = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn next_value(
    iter: &mut impl Iterator<Item = String>,
    flag: &str,
    what: &str,
) -> Result<String> {
    iter.next().ok_or_else(|| anyhow!("{flag} requires {what}"))
}

fn set_command(command: &mut Option<CliCommand>, next: CliCommand) -> Result<()> {
    if let Some(previous) = command {
        bail!("pass one change at a time; got {previous:?} and {next:?}");
    }
    *command = Some(next);
    Ok(())
}

fn parse_id(flag: &str, value: &str) -> Result<i64> {
    match value.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => bail!("{flag} expects a positive numeric id, got {value:?}"),
    }
}

fn print_help() {
    println!("eventdesk");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Use seeded demo data (in-memory, signed in)");
    println!("  --check                  Validate config + DB + arguments, then exit");
    println!("  --list <kind>            List teams, members, events (default) or sessions");
    println!("  --filter <key=value>     Filter the list; repeat to combine");
    println!("  --sort <key[:desc]>      Sort the list");
    println!("  --deleted                Include soft-deleted rows in the list");
    println!("  --delete-event <id>      Soft-delete an event");
    println!("  --delete-team <id>       Soft-delete a team");
    println!("  --create-team <name>     Create a team");
    println!("  --invite <email>         Invite a member (needs --team, optional --role)");
    println!("  --import <file.json>     Import members from JSON (needs --team)");
    println!("  --team <id>              Target team for --invite/--import");
    println!("  --role <role>            owner, admin, organizer or viewer (default viewer)");
    println!("  --yes, -y                Confirm changes without prompting");
    println!("  --help                   Show this help");
}
