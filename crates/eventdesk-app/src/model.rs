// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::filter::{FieldValue, Filterable};
use crate::ids::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Organizer,
    Viewer,
}

impl Role {
    pub const ALL: [Self; 4] = [Self::Owner, Self::Admin, Self::Organizer, Self::Viewer];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Organizer => "organizer",
            Self::Viewer => "viewer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "organizer" => Some(Self::Organizer),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::Admin => "Administrator",
            Self::Organizer => "Organizer",
            Self::Viewer => "Viewer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    Draft,
    Scheduled,
    Live,
    Finished,
    Cancelled,
}

impl EventStatus {
    pub const ALL: [Self; 5] = [
        Self::Draft,
        Self::Scheduled,
        Self::Live,
        Self::Finished,
        Self::Cancelled,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Live => "live",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "scheduled" => Some(Self::Scheduled),
            "live" => Some(Self::Live),
            "finished" => Some(Self::Finished),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Scheduled => "Scheduled",
            Self::Live => "Live",
            Self::Finished => "Finished",
            Self::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Team,
    Member,
    Event,
    Session,
}

impl EntityKind {
    pub const ALL: [Self; 4] = [Self::Team, Self::Member, Self::Event, Self::Session];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Team => "team",
            Self::Member => "member",
            Self::Event => "event",
            Self::Session => "session",
        }
    }

    /// Keys the kind's `Filterable` impl answers, and therefore the keys a
    /// list of this kind can be sorted by.
    pub const fn sort_keys(self) -> &'static [&'static str] {
        match self {
            Self::Team => &["name", "description", "archived", "deleted"],
            Self::Member => &["display_name", "email", "role", "active", "invited_on"],
            Self::Event => &[
                "title",
                "location",
                "status",
                "starts_on",
                "ends_on",
                "published",
            ],
            Self::Session => &["title", "speaker", "room", "held_on"],
        }
    }

    /// Accepts both singular and plural spellings, as typed on the command line.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "team" | "teams" => Some(Self::Team),
            "member" | "members" => Some(Self::Member),
            "event" | "events" => Some(Self::Event),
            "session" | "sessions" => Some(Self::Session),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormKind {
    Team,
    Event,
    Session,
    Invite,
    Profile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub description: String,
    pub archived: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub team_id: TeamId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub active: bool,
    pub invited_on: Option<Date>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub team_id: TeamId,
    pub title: String,
    pub location: String,
    pub status: EventStatus,
    pub starts_on: Date,
    pub ends_on: Option<Date>,
    pub published: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub event_id: EventId,
    pub title: String,
    pub speaker: String,
    pub room: String,
    pub held_on: Date,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub member_id: MemberId,
    pub display_name: String,
    pub email: String,
    pub bio: String,
}

impl Filterable for Team {
    fn field_value(&self, key: &str) -> Option<FieldValue<'_>> {
        match key {
            "name" => Some(FieldValue::Text(&self.name)),
            "description" => Some(FieldValue::Text(&self.description)),
            "archived" => Some(FieldValue::Bool(self.archived)),
            "deleted" => Some(FieldValue::Bool(self.deleted_at.is_some())),
            _ => None,
        }
    }
}

impl Filterable for Member {
    fn field_value(&self, key: &str) -> Option<FieldValue<'_>> {
        match key {
            "display_name" => Some(FieldValue::Text(&self.display_name)),
            "email" => Some(FieldValue::Text(&self.email)),
            "role" => Some(FieldValue::Text(self.role.as_str())),
            "active" => Some(FieldValue::Bool(self.active)),
            "invited_on" => self.invited_on.map(FieldValue::Date),
            _ => None,
        }
    }
}

impl Filterable for Event {
    fn field_value(&self, key: &str) -> Option<FieldValue<'_>> {
        match key {
            "title" => Some(FieldValue::Text(&self.title)),
            "location" => Some(FieldValue::Text(&self.location)),
            "status" => Some(FieldValue::Text(self.status.as_str())),
            "starts_on" => Some(FieldValue::Date(self.starts_on)),
            "ends_on" => self.ends_on.map(FieldValue::Date),
            "published" => Some(FieldValue::Bool(self.published)),
            _ => None,
        }
    }
}

impl Filterable for Session {
    fn field_value(&self, key: &str) -> Option<FieldValue<'_>> {
        match key {
            "title" => Some(FieldValue::Text(&self.title)),
            "speaker" => Some(FieldValue::Text(&self.speaker)),
            "room" => Some(FieldValue::Text(&self.room)),
            "held_on" => Some(FieldValue::Date(self.held_on)),
            _ => None,
        }
    }
}
