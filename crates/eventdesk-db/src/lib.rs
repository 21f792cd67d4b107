// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use eventdesk_app::{
    Event, EventFormInput, EventId, EventStatus, InviteFormInput, Member, MemberId, Profile,
    ProfileFormInput, Role, Session, SessionFormInput, SessionId, Team, TeamFormInput, TeamId,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, info};

pub const APP_NAME: &str = "eventdesk";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "teams",
        &[
            "id",
            "name",
            "description",
            "archived",
            "created_at",
            "updated_at",
            "deleted_at",
        ],
    ),
    (
        "members",
        &[
            "id",
            "team_id",
            "email",
            "display_name",
            "role",
            "active",
            "invited_on",
            "bio",
            "created_at",
            "updated_at",
            "deleted_at",
        ],
    ),
    (
        "events",
        &[
            "id",
            "team_id",
            "title",
            "location",
            "status",
            "starts_on",
            "ends_on",
            "published",
            "created_at",
            "updated_at",
            "deleted_at",
        ],
    ),
    (
        "sessions",
        &[
            "id",
            "event_id",
            "title",
            "speaker",
            "room",
            "held_on",
            "created_at",
            "updated_at",
            "deleted_at",
        ],
    ),
    (
        "deletion_records",
        &["id", "entity", "target_id", "deleted_at", "restored_at"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_teams_deleted_at",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_teams_deleted_at ON teams (deleted_at);",
    },
    RequiredIndex {
        name: "idx_members_team_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_members_team_id ON members (team_id);",
    },
    RequiredIndex {
        name: "idx_members_team_email",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_members_team_email ON members (team_id, email);",
    },
    RequiredIndex {
        name: "idx_members_deleted_at",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_members_deleted_at ON members (deleted_at);",
    },
    RequiredIndex {
        name: "idx_events_team_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_events_team_id ON events (team_id);",
    },
    RequiredIndex {
        name: "idx_events_starts_on",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_events_starts_on ON events (starts_on);",
    },
    RequiredIndex {
        name: "idx_events_deleted_at",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_events_deleted_at ON events (deleted_at);",
    },
    RequiredIndex {
        name: "idx_sessions_event_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_sessions_event_id ON sessions (event_id);",
    },
    RequiredIndex {
        name: "idx_sessions_deleted_at",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_sessions_deleted_at ON sessions (deleted_at);",
    },
    RequiredIndex {
        name: "idx_deletion_records_entity",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_deletion_records_entity ON deletion_records (entity, target_id);",
    },
];

const TEAM_COLUMNS: &str = "id, name, description, archived, created_at, updated_at, deleted_at";
const MEMBER_COLUMNS: &str =
    "id, team_id, email, display_name, role, active, invited_on, created_at, updated_at, deleted_at";
const EVENT_COLUMNS: &str = "id, team_id, title, location, status, starts_on, ends_on, published, \
                             created_at, updated_at, deleted_at";
const SESSION_COLUMNS: &str =
    "id, event_id, title, speaker, room, held_on, created_at, updated_at, deleted_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEntityRef {
    Team(TeamId),
    Member(MemberId),
    Event(EventId),
    Session(SessionId),
}

impl LifecycleEntityRef {
    const fn kind(self) -> StoredKind {
        match self {
            Self::Team(_) => StoredKind::Team,
            Self::Member(_) => StoredKind::Member,
            Self::Event(_) => StoredKind::Event,
            Self::Session(_) => StoredKind::Session,
        }
    }

    const fn id(self) -> i64 {
        match self {
            Self::Team(id) => id.get(),
            Self::Member(id) => id.get(),
            Self::Event(id) => id.get(),
            Self::Session(id) => id.get(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DependentRelation {
    TeamEvents,
    EventSessions,
}

impl DependentRelation {
    const fn table(self) -> &'static str {
        match self {
            Self::TeamEvents => "events",
            Self::EventSessions => "sessions",
        }
    }

    const fn fk_column(self) -> &'static str {
        match self {
            Self::TeamEvents => "team_id",
            Self::EventSessions => "event_id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoredKind {
    Team,
    Member,
    Event,
    Session,
}

impl StoredKind {
    const fn table(self) -> &'static str {
        match self {
            Self::Team => "teams",
            Self::Member => "members",
            Self::Event => "events",
            Self::Session => "sessions",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Team => "team",
            Self::Member => "member",
            Self::Event => "event",
            Self::Session => "session",
        }
    }
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        debug!(path = %path.display(), "opened database");
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    /// Creates the schema on an empty database, otherwise checks that the
    /// existing one carries every table and column this build reads.
    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }
        ensure_required_indexes(&self.conn)
    }

    /// Fills an empty database with a small, fixed admin-console dataset.
    /// Does nothing when any team already exists.
    pub fn seed_demo_data(&self) -> Result<()> {
        let existing: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM teams", [], |row| row.get(0))
            .context("count teams")?;
        if existing > 0 {
            return Ok(());
        }

        let teams = [
            ("Harbor Meetups", "Monthly talks on the waterfront."),
            ("Granite Guild", "Workshops for platform engineers."),
            ("Prairie Forum", "Retired community forum."),
        ];
        let mut team_ids = Vec::with_capacity(teams.len());
        for (name, description) in teams {
            team_ids.push(self.create_team(&TeamFormInput {
                name: name.to_owned(),
                description: description.to_owned(),
            })?);
        }
        self.set_team_archived(team_ids[2], true)?;

        let invites = [
            (0, "avery.walker@example.com", "Avery Walker", Role::Admin),
            (0, "jordan.hill@example.com", "Jordan Hill", Role::Organizer),
            (0, "kai.reed@example.org", "Kai Reed", Role::Viewer),
            (1, "rowan.price@example.com", "Rowan Price", Role::Admin),
            (1, "quinn.diaz@mail.test", "Quinn Diaz", Role::Organizer),
        ];
        for (team, email, display_name, role) in invites {
            self.invite_member(
                team_ids[team],
                &InviteFormInput {
                    email: email.to_owned(),
                    display_name: display_name.to_owned(),
                    role,
                },
            )?;
        }

        let events = [
            (0, "Rust Meetup", "Hall A", EventStatus::Scheduled, (3, 12), None, true),
            (0, "Testing Roundtable", "Library Annex", EventStatus::Draft, (4, 2), None, false),
            (
                0,
                "Observability Summit",
                "Civic Center",
                EventStatus::Finished,
                (1, 20),
                Some((1, 21)),
                true,
            ),
            (
                1,
                "Databases Workshop",
                "Innovation Hub",
                EventStatus::Live,
                (2, 19),
                Some((2, 20)),
                true,
            ),
            (1, "Security Hack Night", "Online", EventStatus::Cancelled, (5, 8), None, false),
        ];
        let mut event_ids = Vec::with_capacity(events.len());
        for (team, title, location, status, starts, ends, published) in events {
            event_ids.push(self.create_event(&EventFormInput {
                team_id: team_ids[team],
                title: title.to_owned(),
                location: location.to_owned(),
                status,
                starts_on: demo_date(starts)?,
                ends_on: ends.map(demo_date).transpose()?,
                published,
            })?);
        }

        let sessions = [
            (0, "Intro to Ownership", "Avery Walker", "Main Stage", (3, 12)),
            (0, "Async Without Tears", "Kai Reed", "Room 101", (3, 12)),
            (2, "Tracing in Practice", "Jordan Hill", "Atrium", (1, 20)),
            (2, "Dashboards that Lie", "Casey Gray", "Studio", (1, 21)),
            (3, "Practical Indexing", "Rowan Price", "Lab", (2, 19)),
        ];
        for (event, title, speaker, room, held) in sessions {
            self.create_session(&SessionFormInput {
                event_id: event_ids[event],
                title: title.to_owned(),
                speaker: speaker.to_owned(),
                room: room.to_owned(),
                held_on: demo_date(held)?,
            })?;
        }
        info!(
            teams = team_ids.len(),
            events = event_ids.len(),
            "seeded demo data"
        );
        Ok(())
    }

    pub fn create_team(&self, team: &TeamFormInput) -> Result<TeamId> {
        team.validate()?;
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO teams (name, description, created_at, updated_at)
                VALUES (?, ?, ?, ?)
                ",
                params![team.name.trim(), team.description, now, now],
            )
            .context("insert team")?;
        let id = TeamId::new(self.conn.last_insert_rowid());
        debug!(team = %id, "created team");
        Ok(id)
    }

    pub fn set_team_archived(&self, team_id: TeamId, archived: bool) -> Result<()> {
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "UPDATE teams SET archived = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
                params![archived, now, team_id.get()],
            )
            .context("update team archive flag")?;
        if rows_affected == 0 {
            bail!(
                "team {} not found or deleted -- choose an existing team and retry",
                team_id.get()
            );
        }
        Ok(())
    }

    pub fn get_team(&self, team_id: TeamId) -> Result<Team> {
        self.conn
            .query_row(
                &format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = ?"),
                params![team_id.get()],
                team_from_row,
            )
            .with_context(|| format!("load team {}", team_id.get()))
    }

    pub fn list_teams(&self, include_deleted: bool) -> Result<Vec<Team>> {
        let sql = list_sql(TEAM_COLUMNS, "teams", None, include_deleted, "name ASC, id ASC");
        let mut stmt = self.conn.prepare(&sql).context("prepare teams query")?;
        let rows = stmt
            .query_map([], team_from_row)
            .context("query teams")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect teams")
    }

    /// Adds one member. The team must be live and must not already have an
    /// active member with the same email, compared case-insensitively.
    pub fn invite_member(&self, team_id: TeamId, invite: &InviteFormInput) -> Result<MemberId> {
        invite.validate()?;
        self.require_alive(StoredKind::Team, team_id.get())?;
        let id = insert_member(&self.conn, team_id, invite)?;
        info!(team = %team_id, member = %id, role = invite.role.as_str(), "invited member");
        Ok(id)
    }

    /// Imports a batch of invitations in one transaction. Any invalid row,
    /// including an email repeated within the batch, rolls back every row.
    pub fn import_members(
        &self,
        team_id: TeamId,
        invites: &[InviteFormInput],
    ) -> Result<Vec<MemberId>> {
        self.require_alive(StoredKind::Team, team_id.get())?;

        let mut seen = BTreeSet::new();
        for (index, invite) in invites.iter().enumerate() {
            invite
                .validate()
                .with_context(|| format!("import row {}", index + 1))?;
            if !seen.insert(normalize_email(&invite.email)) {
                bail!(
                    "import row {} repeats email {} -- remove the duplicate row and retry",
                    index + 1,
                    invite.email.trim()
                );
            }
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin member import")?;
        let mut ids = Vec::with_capacity(invites.len());
        for (index, invite) in invites.iter().enumerate() {
            let id = insert_member(&tx, team_id, invite)
                .with_context(|| format!("import row {}", index + 1))?;
            ids.push(id);
        }
        tx.commit().context("commit member import")?;
        info!(team = %team_id, count = ids.len(), "imported members");
        Ok(ids)
    }

    pub fn get_member(&self, member_id: MemberId) -> Result<Member> {
        self.conn
            .query_row(
                &format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = ?"),
                params![member_id.get()],
                member_from_row,
            )
            .with_context(|| format!("load member {}", member_id.get()))
    }

    pub fn list_members(
        &self,
        team_id: Option<TeamId>,
        include_deleted: bool,
    ) -> Result<Vec<Member>> {
        let sql = list_sql(
            MEMBER_COLUMNS,
            "members",
            team_id.map(|_| "team_id = ?1"),
            include_deleted,
            "display_name ASC, id ASC",
        );
        let mut stmt = self.conn.prepare(&sql).context("prepare members query")?;
        let rows = match team_id {
            Some(team_id) => stmt.query_map(params![team_id.get()], member_from_row),
            None => stmt.query_map([], member_from_row),
        }
        .context("query members")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect members")
    }

    pub fn get_profile(&self, member_id: MemberId) -> Result<Profile> {
        self.conn
            .query_row(
                "
                SELECT id, display_name, email, bio
                FROM members
                WHERE id = ? AND deleted_at IS NULL
                ",
                params![member_id.get()],
                |row| {
                    Ok(Profile {
                        member_id: MemberId::new(row.get(0)?),
                        display_name: row.get(1)?,
                        email: row.get(2)?,
                        bio: row.get(3)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("load profile for member {}", member_id.get()))?
            .ok_or_else(|| anyhow!("member {} not found or deleted", member_id.get()))
    }

    pub fn update_profile(&self, profile: &ProfileFormInput) -> Result<()> {
        profile.validate()?;
        let team_id: i64 = self
            .conn
            .query_row(
                "SELECT team_id FROM members WHERE id = ? AND deleted_at IS NULL",
                params![profile.member_id.get()],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("load member {}", profile.member_id.get()))?
            .ok_or_else(|| anyhow!("member {} not found or deleted", profile.member_id.get()))?;
        ensure_email_free(
            &self.conn,
            TeamId::new(team_id),
            &profile.email,
            Some(profile.member_id),
        )?;

        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                UPDATE members
                SET display_name = ?, email = ?, bio = ?, updated_at = ?
                WHERE id = ? AND deleted_at IS NULL
                ",
                params![
                    profile.display_name.trim(),
                    profile.email.trim(),
                    profile.bio,
                    now,
                    profile.member_id.get(),
                ],
            )
            .context("update profile")?;
        debug!(member = %profile.member_id, "updated profile");
        Ok(())
    }

    pub fn create_event(&self, event: &EventFormInput) -> Result<EventId> {
        event.validate()?;
        self.require_alive(StoredKind::Team, event.team_id.get())?;
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO events (
                  team_id, title, location, status, starts_on, ends_on,
                  published, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    event.team_id.get(),
                    event.title.trim(),
                    event.location,
                    event.status.as_str(),
                    format_date(event.starts_on),
                    event.ends_on.map(format_date),
                    event.published,
                    now,
                    now,
                ],
            )
            .context("insert event")?;
        let id = EventId::new(self.conn.last_insert_rowid());
        debug!(event = %id, team = %event.team_id, "created event");
        Ok(id)
    }

    pub fn update_event(&self, event_id: EventId, update: &EventFormInput) -> Result<()> {
        update.validate()?;
        self.require_alive(StoredKind::Team, update.team_id.get())?;
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "
                UPDATE events
                SET
                  team_id = ?,
                  title = ?,
                  location = ?,
                  status = ?,
                  starts_on = ?,
                  ends_on = ?,
                  published = ?,
                  updated_at = ?
                WHERE id = ? AND deleted_at IS NULL
                ",
                params![
                    update.team_id.get(),
                    update.title.trim(),
                    update.location,
                    update.status.as_str(),
                    format_date(update.starts_on),
                    update.ends_on.map(format_date),
                    update.published,
                    now,
                    event_id.get(),
                ],
            )
            .context("update event")?;
        if rows_affected == 0 {
            bail!(
                "event {} not found or deleted -- choose an existing event and retry",
                event_id.get()
            );
        }
        Ok(())
    }

    pub fn get_event(&self, event_id: EventId) -> Result<Event> {
        self.conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?"),
                params![event_id.get()],
                event_from_row,
            )
            .with_context(|| format!("load event {}", event_id.get()))
    }

    pub fn list_events(&self, include_deleted: bool) -> Result<Vec<Event>> {
        let sql = list_sql(
            EVENT_COLUMNS,
            "events",
            None,
            include_deleted,
            "starts_on ASC, id ASC",
        );
        let mut stmt = self.conn.prepare(&sql).context("prepare events query")?;
        let rows = stmt
            .query_map([], event_from_row)
            .context("query events")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect events")
    }

    pub fn create_session(&self, session: &SessionFormInput) -> Result<SessionId> {
        session.validate()?;
        self.require_alive(StoredKind::Event, session.event_id.get())?;
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO sessions (
                  event_id, title, speaker, room, held_on, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    session.event_id.get(),
                    session.title.trim(),
                    session.speaker,
                    session.room,
                    format_date(session.held_on),
                    now,
                    now,
                ],
            )
            .context("insert session")?;
        Ok(SessionId::new(self.conn.last_insert_rowid()))
    }

    pub fn get_session(&self, session_id: SessionId) -> Result<Session> {
        self.conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?"),
                params![session_id.get()],
                session_from_row,
            )
            .with_context(|| format!("load session {}", session_id.get()))
    }

    pub fn list_sessions(&self, include_deleted: bool) -> Result<Vec<Session>> {
        let sql = list_sql(
            SESSION_COLUMNS,
            "sessions",
            None,
            include_deleted,
            "held_on ASC, id ASC",
        );
        let mut stmt = self.conn.prepare(&sql).context("prepare sessions query")?;
        let rows = stmt
            .query_map([], session_from_row)
            .context("query sessions")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect sessions")
    }

    pub fn soft_delete(&self, target: LifecycleEntityRef) -> Result<()> {
        self.ensure_can_soft_delete(target)?;
        self.soft_delete_entity(target.kind(), target.id())
    }

    pub fn restore(&self, target: LifecycleEntityRef) -> Result<()> {
        self.ensure_can_restore(target)?;
        self.restore_entity(target.kind(), target.id())
    }

    pub fn soft_delete_team(&self, team_id: TeamId) -> Result<()> {
        self.soft_delete(LifecycleEntityRef::Team(team_id))
    }

    pub fn restore_team(&self, team_id: TeamId) -> Result<()> {
        self.restore(LifecycleEntityRef::Team(team_id))
    }

    pub fn soft_delete_member(&self, member_id: MemberId) -> Result<()> {
        self.soft_delete(LifecycleEntityRef::Member(member_id))
    }

    pub fn restore_member(&self, member_id: MemberId) -> Result<()> {
        self.restore(LifecycleEntityRef::Member(member_id))
    }

    pub fn soft_delete_event(&self, event_id: EventId) -> Result<()> {
        self.soft_delete(LifecycleEntityRef::Event(event_id))
    }

    pub fn restore_event(&self, event_id: EventId) -> Result<()> {
        self.restore(LifecycleEntityRef::Event(event_id))
    }

    pub fn soft_delete_session(&self, session_id: SessionId) -> Result<()> {
        self.soft_delete(LifecycleEntityRef::Session(session_id))
    }

    pub fn restore_session(&self, session_id: SessionId) -> Result<()> {
        self.restore(LifecycleEntityRef::Session(session_id))
    }

    fn count_active_dependents(&self, relation: DependentRelation, parent_id: i64) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ? AND deleted_at IS NULL",
            relation.table(),
            relation.fk_column()
        );
        self.conn
            .query_row(&sql, params![parent_id], |row| row.get(0))
            .with_context(|| {
                format!(
                    "count dependents in {} for {}={parent_id}",
                    relation.table(),
                    relation.fk_column()
                )
            })
    }

    fn ensure_can_soft_delete(&self, target: LifecycleEntityRef) -> Result<()> {
        match target {
            LifecycleEntityRef::Team(team_id) => {
                let event_count = self
                    .count_active_dependents(DependentRelation::TeamEvents, team_id.get())
                    .context("count events linked to team")?;
                if event_count > 0 {
                    bail!(
                        "team {} has {event_count} active event(s) -- delete or move them first",
                        team_id.get()
                    );
                }
            }
            LifecycleEntityRef::Event(event_id) => {
                let session_count = self
                    .count_active_dependents(DependentRelation::EventSessions, event_id.get())
                    .context("count sessions linked to event")?;
                if session_count > 0 {
                    bail!(
                        "event {} has {session_count} session(s) -- delete sessions first",
                        event_id.get()
                    );
                }
            }
            LifecycleEntityRef::Member(_) | LifecycleEntityRef::Session(_) => {}
        }
        Ok(())
    }

    fn ensure_can_restore(&self, target: LifecycleEntityRef) -> Result<()> {
        match target {
            LifecycleEntityRef::Member(member_id) => {
                let (team_id, email): (i64, String) = self
                    .conn
                    .query_row(
                        "SELECT team_id, email FROM members WHERE id = ?",
                        params![member_id.get()],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .with_context(|| format!("load member {}", member_id.get()))?;
                self.require_alive(StoredKind::Team, team_id)?;
                ensure_email_free(&self.conn, TeamId::new(team_id), &email, Some(member_id))?;
            }
            LifecycleEntityRef::Event(event_id) => {
                let team_id: i64 = self
                    .conn
                    .query_row(
                        "SELECT team_id FROM events WHERE id = ?",
                        params![event_id.get()],
                        |row| row.get(0),
                    )
                    .with_context(|| format!("load event {}", event_id.get()))?;
                self.require_alive(StoredKind::Team, team_id)?;
            }
            LifecycleEntityRef::Session(session_id) => {
                let event_id: i64 = self
                    .conn
                    .query_row(
                        "SELECT event_id FROM sessions WHERE id = ?",
                        params![session_id.get()],
                        |row| row.get(0),
                    )
                    .with_context(|| format!("load session {}", session_id.get()))?;
                self.require_alive(StoredKind::Event, event_id)?;
            }
            LifecycleEntityRef::Team(_) => {}
        }
        Ok(())
    }

    fn soft_delete_entity(&self, kind: StoredKind, entity_id: i64) -> Result<()> {
        let now = now_rfc3339()?;
        let sql = format!(
            "UPDATE {} SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
            kind.table()
        );
        let rows_affected = self
            .conn
            .execute(&sql, params![now, now, entity_id])
            .with_context(|| format!("soft delete {} {}", kind.label(), entity_id))?;
        if rows_affected == 0 {
            bail!("{} {} not found or already deleted", kind.label(), entity_id);
        }
        self.conn
            .execute(
                "INSERT INTO deletion_records (entity, target_id, deleted_at) VALUES (?, ?, ?)",
                params![kind.label(), entity_id, now],
            )
            .with_context(|| format!("record deletion for {} {}", kind.label(), entity_id))?;
        info!(entity = kind.label(), id = entity_id, "soft deleted");
        Ok(())
    }

    fn restore_entity(&self, kind: StoredKind, entity_id: i64) -> Result<()> {
        let now = now_rfc3339()?;
        let sql = format!(
            "UPDATE {} SET deleted_at = NULL, updated_at = ? WHERE id = ? AND deleted_at IS NOT NULL",
            kind.table()
        );
        let rows_affected = self
            .conn
            .execute(&sql, params![now, entity_id])
            .with_context(|| format!("restore {} {}", kind.label(), entity_id))?;
        if rows_affected == 0 {
            bail!(
                "{} {} is not deleted or does not exist",
                kind.label(),
                entity_id
            );
        }
        self.conn
            .execute(
                "
                UPDATE deletion_records
                SET restored_at = ?
                WHERE entity = ? AND target_id = ? AND restored_at IS NULL
                ",
                params![now, kind.label(), entity_id],
            )
            .with_context(|| {
                format!(
                    "mark deletion record restored for {} {}",
                    kind.label(),
                    entity_id
                )
            })?;
        info!(entity = kind.label(), id = entity_id, "restored");
        Ok(())
    }

    fn require_alive(&self, kind: StoredKind, id: i64) -> Result<()> {
        let sql = format!("SELECT deleted_at FROM {} WHERE id = ?", kind.table());
        let deleted_at: Option<Option<String>> = self
            .conn
            .query_row(&sql, params![id], |row| row.get(0))
            .optional()
            .with_context(|| format!("load {} {} for relationship check", kind.label(), id))?;

        match deleted_at {
            Some(None) => Ok(()),
            Some(Some(_)) => bail!("{} {id} is deleted -- restore it first", kind.label()),
            None => bail!("{} {id} does not exist", kind.label()),
        }
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("EVENTDESK_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set EVENTDESK_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("eventdesk.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn insert_member(conn: &Connection, team_id: TeamId, invite: &InviteFormInput) -> Result<MemberId> {
    ensure_email_free(conn, team_id, &invite.email, None)?;
    let now = OffsetDateTime::now_utc();
    let stamp = now.format(&Rfc3339).context("format current timestamp")?;
    conn.execute(
        "
        INSERT INTO members (
          team_id, email, display_name, role, active, invited_on, created_at, updated_at
        ) VALUES (?, ?, ?, ?, 1, ?, ?, ?)
        ",
        params![
            team_id.get(),
            invite.email.trim(),
            invite.effective_display_name(),
            invite.role.as_str(),
            format_date(now.date()),
            stamp,
            stamp,
        ],
    )
    .with_context(|| format!("insert member {}", invite.email.trim()))?;
    Ok(MemberId::new(conn.last_insert_rowid()))
}

fn ensure_email_free(
    conn: &Connection,
    team_id: TeamId,
    email: &str,
    except: Option<MemberId>,
) -> Result<()> {
    let taken: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM members
            WHERE team_id = ?
              AND lower(trim(email)) = ?
              AND deleted_at IS NULL
              AND id != ?
            ",
            params![
                team_id.get(),
                normalize_email(email),
                except.map_or(0, MemberId::get)
            ],
            |row| row.get(0),
        )
        .context("check member email")?;
    if taken > 0 {
        bail!(
            "{} is already an active member of team {} -- edit the existing member instead",
            email.trim(),
            team_id.get()
        );
    }
    Ok(())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn list_sql(
    columns: &str,
    table: &str,
    condition: Option<&str>,
    include_deleted: bool,
    order_by: &str,
) -> String {
    let mut clauses = Vec::new();
    if let Some(condition) = condition {
        clauses.push(condition);
    }
    if !include_deleted {
        clauses.push("deleted_at IS NULL");
    }
    let mut sql = format!("SELECT {columns} FROM {table}\n");
    if !clauses.is_empty() {
        sql.push_str(&format!("WHERE {}\n", clauses.join(" AND ")));
    }
    sql.push_str(&format!("ORDER BY {order_by}"));
    sql
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    let created_at_raw: String = row.get(4)?;
    let updated_at_raw: String = row.get(5)?;
    let deleted_at_raw: Option<String> = row.get(6)?;
    Ok(Team {
        id: TeamId::new(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        archived: row.get(3)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
        deleted_at: parse_opt_datetime(deleted_at_raw).map_err(to_sql_error)?,
    })
}

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<Member> {
    let role_raw: String = row.get(4)?;
    let role = Role::parse(&role_raw)
        .ok_or_else(|| invalid_stored_value(4, format!("unknown member role {role_raw}")))?;
    let invited_on_raw: Option<String> = row.get(6)?;
    let created_at_raw: String = row.get(7)?;
    let updated_at_raw: String = row.get(8)?;
    let deleted_at_raw: Option<String> = row.get(9)?;
    Ok(Member {
        id: MemberId::new(row.get(0)?),
        team_id: TeamId::new(row.get(1)?),
        email: row.get(2)?,
        display_name: row.get(3)?,
        role,
        active: row.get(5)?,
        invited_on: parse_opt_date(invited_on_raw).map_err(to_sql_error)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
        deleted_at: parse_opt_datetime(deleted_at_raw).map_err(to_sql_error)?,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    let status_raw: String = row.get(4)?;
    let status = EventStatus::parse(&status_raw)
        .ok_or_else(|| invalid_stored_value(4, format!("unknown event status {status_raw}")))?;
    let starts_on_raw: String = row.get(5)?;
    let ends_on_raw: Option<String> = row.get(6)?;
    let created_at_raw: String = row.get(8)?;
    let updated_at_raw: String = row.get(9)?;
    let deleted_at_raw: Option<String> = row.get(10)?;
    Ok(Event {
        id: EventId::new(row.get(0)?),
        team_id: TeamId::new(row.get(1)?),
        title: row.get(2)?,
        location: row.get(3)?,
        status,
        starts_on: parse_date(&starts_on_raw).map_err(to_sql_error)?,
        ends_on: parse_opt_date(ends_on_raw).map_err(to_sql_error)?,
        published: row.get(7)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
        deleted_at: parse_opt_datetime(deleted_at_raw).map_err(to_sql_error)?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let held_on_raw: String = row.get(5)?;
    let created_at_raw: String = row.get(6)?;
    let updated_at_raw: String = row.get(7)?;
    let deleted_at_raw: Option<String> = row.get(8)?;
    Ok(Session {
        id: SessionId::new(row.get(0)?),
        event_id: EventId::new(row.get(1)?),
        title: row.get(2)?,
        speaker: row.get(3)?,
        room: row.get(4)?,
        held_on: parse_date(&held_on_raw).map_err(to_sql_error)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
        deleted_at: parse_opt_datetime(deleted_at_raw).map_err(to_sql_error)?,
    })
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; use an eventdesk database or migrate first"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; run migration before launching",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }

    let existing_indexes = index_names(conn)?;
    let missing = REQUIRED_INDEXES
        .iter()
        .filter(|index| !existing_indexes.contains(index.name))
        .map(|index| index.name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!(
            "database is missing required indexes: {}; run migration before launching",
            missing.join(", ")
        );
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn index_names(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(
            "
            SELECT name
            FROM sqlite_master
            WHERE type = 'index'
              AND name NOT LIKE 'sqlite_%'
            ORDER BY name ASC
            ",
        )
        .context("prepare index names query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query index names")?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .context("collect index names")
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    bail!("unsupported datetime format {raw:?}")
}

fn parse_date(raw: &str) -> Result<Date> {
    if let Ok(value) = Date::parse(raw, &format_description!("[year]-[month]-[day]")) {
        return Ok(value);
    }
    Ok(parse_datetime(raw)?.date())
}

fn parse_opt_datetime(raw: Option<String>) -> Result<Option<OffsetDateTime>> {
    raw.as_deref().map(parse_datetime).transpose()
}

fn parse_opt_date(raw: Option<String>) -> Result<Option<Date>> {
    raw.as_deref().map(parse_date).transpose()
}

fn to_sql_error(error: anyhow::Error) -> rusqlite::Error {
    invalid_stored_value(0, error.to_string())
}

fn invalid_stored_value(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

fn format_date(value: Date) -> String {
    eventdesk_app::format_date(value)
}

fn demo_date((month, day): (u8, u8)) -> Result<Date> {
    let month = time::Month::try_from(month).context("demo month")?;
    Date::from_calendar_date(2026, month, day).context("demo date")
}

#[cfg(test)]
mod tests {
    use super::{Store, list_sql, parse_date, parse_datetime};
    use anyhow::Result;
    use time::macros::{date, datetime};

    #[test]
    fn list_sql_joins_conditions() {
        assert_eq!(
            list_sql("id", "members", Some("team_id = ?1"), false, "id ASC"),
            "SELECT id FROM members\nWHERE team_id = ?1 AND deleted_at IS NULL\nORDER BY id ASC"
        );
        assert_eq!(
            list_sql("id", "teams", None, true, "id ASC"),
            "SELECT id FROM teams\nORDER BY id ASC"
        );
    }

    #[test]
    fn stored_timestamps_accept_sqlite_default_format() -> Result<()> {
        assert_eq!(
            parse_datetime("2026-02-19T12:34:56Z")?,
            datetime!(2026-02-19 12:34:56 UTC)
        );
        assert_eq!(
            parse_datetime("2026-02-19 12:34:56")?,
            datetime!(2026-02-19 12:34:56 UTC)
        );
        assert_eq!(parse_date("2026-02-19T08:00:00Z")?, date!(2026 - 02 - 19));
        assert!(parse_datetime("yesterday").is_err());
        Ok(())
    }

    #[test]
    fn demo_seed_runs_once() -> Result<()> {
        let store = Store::open_memory()?;
        store.bootstrap()?;
        store.seed_demo_data()?;
        let teams = store.list_teams(false)?.len();
        let events = store.list_events(false)?.len();
        store.seed_demo_data()?;
        assert_eq!(store.list_teams(false)?.len(), teams);
        assert_eq!(store.list_events(false)?.len(), events);
        assert!(store.list_sessions(false)?.len() >= 5);
        Ok(())
    }
}
