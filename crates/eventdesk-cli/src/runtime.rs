// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use eventdesk_app::{
    AuthToken, EntityKind, Event, EventId, FilterPopups, Filterable, FormPayload, GuardDecision,
    InviteFormInput, ListView, Member, PopupController, PopupError, PopupOutcome, RedirectReason,
    RouteGuard, Session, SessionStatus, SortOrder, Team, TeamId, ViewCommand, filter_spec_for,
    format_date, open_filter_popup,
};
use eventdesk_db::Store;
use futures::StreamExt;
use futures::executor::block_on;
use std::io::{BufRead, Write};
use std::rc::Rc;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// A change to the store that needs the user's confirmation first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    DeleteEvent(EventId),
    DeleteTeam(TeamId),
    Invite {
        team_id: TeamId,
        invite: InviteFormInput,
    },
    Import {
        team_id: TeamId,
        rows: Vec<InviteFormInput>,
    },
    Submit(FormPayload),
}

impl Mutation {
    pub fn prompt(&self) -> String {
        match self {
            Self::DeleteEvent(event_id) => format!("delete event {event_id}?"),
            Self::DeleteTeam(team_id) => format!("delete team {team_id}?"),
            Self::Invite { team_id, invite } => format!(
                "invite {} as {} to team {team_id}?",
                invite.email.trim(),
                invite.role.label()
            ),
            Self::Import { team_id, rows } => {
                format!("import {} member(s) into team {team_id}?", rows.len())
            }
            Self::Submit(FormPayload::Team(form)) => format!("create team {:?}?", form.name.trim()),
            Self::Submit(FormPayload::Event(form)) => format!(
                "create event {:?} on {} for team {}?",
                form.title.trim(),
                format_date(form.starts_on),
                form.team_id
            ),
            Self::Submit(FormPayload::Session(form)) => format!(
                "add session {:?} to event {}?",
                form.title.trim(),
                form.event_id
            ),
            Self::Submit(FormPayload::Invite(form)) => format!("invite {}?", form.email.trim()),
            Self::Submit(FormPayload::Profile(form)) => {
                format!("update profile of member {}?", form.member_id)
            }
        }
    }

    /// Runs the change and returns a one-line summary of it.
    pub fn apply(&self, store: &Store) -> Result<String> {
        match self {
            Self::DeleteEvent(event_id) => {
                store.soft_delete_event(*event_id)?;
                Ok(format!("deleted event {event_id}"))
            }
            Self::DeleteTeam(team_id) => {
                store.soft_delete_team(*team_id)?;
                Ok(format!("deleted team {team_id}"))
            }
            Self::Invite { team_id, invite } => {
                let member_id = store.invite_member(*team_id, invite)?;
                Ok(format!(
                    "invited {} to team {team_id} as member {member_id}",
                    invite.email.trim()
                ))
            }
            Self::Import { team_id, rows } => {
                let imported = store.import_members(*team_id, rows)?;
                Ok(format!(
                    "imported {} member(s) into team {team_id}",
                    imported.len()
                ))
            }
            Self::Submit(payload) => submit_form(store, payload),
        }
    }
}

fn submit_form(store: &Store, payload: &FormPayload) -> Result<String> {
    payload.validate()?;

    match payload {
        FormPayload::Team(form) => {
            let team_id = store.create_team(form)?;
            Ok(format!("created team {team_id}"))
        }
        FormPayload::Event(form) => {
            let event_id = store.create_event(form)?;
            Ok(format!("created event {event_id}"))
        }
        FormPayload::Session(form) => {
            let session_id = store.create_session(form)?;
            Ok(format!(
                "added session {session_id} to event {}",
                form.event_id
            ))
        }
        FormPayload::Invite(_) => {
            bail!("an invite needs a team -- use --invite <email> --team <id>")
        }
        FormPayload::Profile(form) => {
            store.update_profile(form)?;
            Ok(format!("updated profile of member {}", form.member_id))
        }
    }
}

pub struct Prompter<R, W> {
    input: R,
    output: W,
    assume_yes: bool,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W, assume_yes: bool) -> Self {
        Self {
            input,
            output,
            assume_yes,
        }
    }

    /// Anything but `y`/`yes` declines, including end of input.
    pub fn ask(&mut self, question: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        write!(self.output, "{question} [y/N] ").context("write confirmation prompt")?;
        self.output.flush().context("flush confirmation prompt")?;

        let mut answer = String::new();
        self.input
            .read_line(&mut answer)
            .context("read confirmation answer")?;
        Ok(matches!(
            answer.trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        ))
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }
}

/// Runs guarded, confirmed mutations against the store. Dropping the runtime
/// disposes its popup host.
pub struct AdminRuntime<R, W> {
    store: Rc<Store>,
    guard: RouteGuard,
    token: Option<AuthToken>,
    popups: PopupController<Mutation, String>,
    prompter: Prompter<R, W>,
}

impl<R: BufRead, W: Write> AdminRuntime<R, W> {
    pub fn new(
        store: Rc<Store>,
        guard: RouteGuard,
        token: Option<AuthToken>,
        prompter: Prompter<R, W>,
    ) -> Self {
        Self {
            store,
            guard,
            token,
            popups: PopupController::new(),
            prompter,
        }
    }

    pub fn prompter(&mut self) -> &mut Prompter<R, W> {
        &mut self.prompter
    }

    /// `Ok(None)` means the user declined and nothing changed.
    pub fn run(&mut self, mutation: Mutation, now: OffsetDateTime) -> Result<Option<String>> {
        let subject = match self.guard.check(self.token.as_ref(), now) {
            GuardDecision::Allow { subject } => subject,
            GuardDecision::Redirect {
                to,
                reason: RedirectReason::MissingToken,
            } => bail!("not signed in -- sign in at {to} and retry"),
            GuardDecision::Redirect {
                to,
                reason: RedirectReason::Expired,
            } => bail!("sign-in expired -- sign in again at {to} and retry"),
        };

        let question = mutation.prompt();
        let store = Rc::clone(&self.store);
        let handle = self.popups.open(mutation, move |mutation: &Mutation| {
            let store = Rc::clone(&store);
            let mutation = mutation.clone();
            async move { mutation.apply(&store) }
        })?;
        let mut outcomes = self.popups.subscribe(handle)?;

        if !self.prompter.ask(&question)? {
            self.popups.cancel(handle)?;
        } else if let Err(error) = block_on(self.popups.confirm(handle)) {
            if self.popups.status(handle) == SessionStatus::Open {
                self.popups.cancel(handle)?;
            }
            warn!(%subject, session = %handle, error = %error, "mutation failed");
            return Err(match error {
                PopupError::ActionFailed(error) => error,
                other => other.into(),
            });
        }

        match block_on(outcomes.next()) {
            Some(PopupOutcome::Confirmed(summary)) => {
                info!(%subject, session = %handle, %summary, "mutation applied");
                Ok(Some(summary))
            }
            Some(PopupOutcome::Cancelled) => {
                info!(%subject, session = %handle, "mutation declined");
                Ok(None)
            }
            Some(PopupOutcome::Failed(reason)) => bail!(reason),
            None => bail!("popup session {handle} closed without an outcome"),
        }
    }
}

impl<R, W> Drop for AdminRuntime<R, W> {
    fn drop(&mut self) {
        self.popups.dispose();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub kind: EntityKind,
    pub filters: Vec<(String, String)>,
    pub sort: Option<SortOrder>,
    pub include_deleted: bool,
}

impl ListRequest {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            filters: Vec::new(),
            sort: None,
            include_deleted: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListReport {
    pub rows: Vec<String>,
    pub visible: usize,
    pub total: usize,
    pub status: Option<String>,
}

pub fn list(store: &Store, request: &ListRequest) -> Result<ListReport> {
    match request.kind {
        EntityKind::Team => render_list(store.list_teams(request.include_deleted)?, request),
        EntityKind::Member => {
            render_list(store.list_members(None, request.include_deleted)?, request)
        }
        EntityKind::Event => render_list(store.list_events(request.include_deleted)?, request),
        EntityKind::Session => render_list(store.list_sessions(request.include_deleted)?, request),
    }
}

fn render_list<E: Filterable + ListRow>(
    entities: Vec<E>,
    request: &ListRequest,
) -> Result<ListReport> {
    let spec = filter_spec_for(request.kind)?;
    let mut view = ListView::new(spec, entities);

    if !request.filters.is_empty() {
        let popups = FilterPopups::new();
        let handle = open_filter_popup(&popups, view.draft())?;
        let mut outcomes = popups.subscribe(handle)?;
        for (key, raw) in &request.filters {
            popups
                .edit(handle, |draft| draft.set_raw(key, raw))?
                .with_context(|| format!("invalid --filter {key}={raw}"))?;
        }
        block_on(popups.confirm(handle))?;
        if let Some(outcome) = block_on(outcomes.next()) {
            view.observe(outcome);
        }
    }

    if let Some(sort) = &request.sort {
        let keys = request.kind.sort_keys();
        if !keys.contains(&sort.key.as_str()) {
            bail!(
                "invalid --sort {} for {}s -- use one of {}",
                sort.key,
                request.kind.as_str(),
                keys.join(", ")
            );
        }
        view.dispatch(ViewCommand::SortBy(sort.clone()));
    }
    debug!(
        kind = request.kind.as_str(),
        visible = view.visible_rows().len(),
        total = view.total(),
        "list rendered"
    );

    let rows: Vec<String> = view.visible_rows().into_iter().map(ListRow::render).collect();
    Ok(ListReport {
        visible: rows.len(),
        rows,
        total: view.total(),
        status: view.status_line().map(ToOwned::to_owned),
    })
}

trait ListRow {
    fn render(&self) -> String;
}

fn deleted_marker(deleted: bool) -> &'static str {
    if deleted { " [deleted]" } else { "" }
}

impl ListRow for Team {
    fn render(&self) -> String {
        format!(
            "{:>4}  {}{}{}",
            self.id.get(),
            self.name,
            if self.archived { " (archived)" } else { "" },
            deleted_marker(self.deleted_at.is_some())
        )
    }
}

impl ListRow for Member {
    fn render(&self) -> String {
        format!(
            "{:>4}  {:<24} {:<32} {:<10} team {}{}{}",
            self.id.get(),
            self.display_name,
            self.email,
            self.role.label(),
            self.team_id,
            if self.active { "" } else { " (inactive)" },
            deleted_marker(self.deleted_at.is_some())
        )
    }
}

impl ListRow for Event {
    fn render(&self) -> String {
        let dates = match self.ends_on {
            Some(ends_on) if ends_on != self.starts_on => {
                format!("{}..{}", format_date(self.starts_on), format_date(ends_on))
            }
            _ => format_date(self.starts_on),
        };
        format!(
            "{:>4}  {:<22} {:<32} {:<10} {}{}{}",
            self.id.get(),
            dates,
            self.title,
            self.status.label(),
            self.location,
            if self.published { "" } else { " (unpublished)" },
            deleted_marker(self.deleted_at.is_some())
        )
    }
}

impl ListRow for Session {
    fn render(&self) -> String {
        format!(
            "{:>4}  {}  {:<32} {:<20} {} (event {}){}",
            self.id.get(),
            format_date(self.held_on),
            self.title,
            self.speaker,
            self.room,
            self.event_id,
            deleted_marker(self.deleted_at.is_some())
        )
    }
}
