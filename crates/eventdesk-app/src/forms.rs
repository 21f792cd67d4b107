// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{EventId, EventStatus, FormKind, MemberId, Role, TeamId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamFormInput {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFormInput {
    pub team_id: TeamId,
    pub title: String,
    pub location: String,
    pub status: EventStatus,
    pub starts_on: Date,
    pub ends_on: Option<Date>,
    pub published: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFormInput {
    pub event_id: EventId,
    pub title: String,
    pub speaker: String,
    pub room: String,
    pub held_on: Date,
}

/// One invitation. Also the row shape of a member import file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteFormInput {
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_invite_role")]
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFormInput {
    pub member_id: MemberId,
    pub display_name: String,
    pub email: String,
    pub bio: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPayload {
    Team(TeamFormInput),
    Event(EventFormInput),
    Session(SessionFormInput),
    Invite(InviteFormInput),
    Profile(ProfileFormInput),
}

impl FormPayload {
    pub fn kind(&self) -> FormKind {
        match self {
            Self::Team(_) => FormKind::Team,
            Self::Event(_) => FormKind::Event,
            Self::Session(_) => FormKind::Session,
            Self::Invite(_) => FormKind::Invite,
            Self::Profile(_) => FormKind::Profile,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Team(team) => team.validate(),
            Self::Event(event) => event.validate(),
            Self::Session(session) => session.validate(),
            Self::Invite(invite) => invite.validate(),
            Self::Profile(profile) => profile.validate(),
        }
    }
}

impl TeamFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("team name is required -- enter a name and retry");
        }
        Ok(())
    }
}

impl EventFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.team_id.get() <= 0 {
            bail!("event team is required -- choose a team and retry");
        }
        if self.title.trim().is_empty() {
            bail!("event title is required -- enter a title and retry");
        }
        if let Some(ends_on) = self.ends_on
            && ends_on < self.starts_on
        {
            bail!("event end date must be on/after start date");
        }
        if self.published && self.status == EventStatus::Draft {
            bail!("draft events cannot be published -- schedule the event first");
        }
        Ok(())
    }
}

impl SessionFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.event_id.get() <= 0 {
            bail!("session event is required -- choose an event and retry");
        }
        if self.title.trim().is_empty() {
            bail!("session title is required -- enter a title and retry");
        }
        Ok(())
    }
}

impl InviteFormInput {
    pub fn validate(&self) -> Result<()> {
        if !looks_like_email(&self.email) {
            bail!(
                "invite email {:?} is not a valid address -- use name@domain",
                self.email
            );
        }
        if self.role == Role::Owner {
            bail!("owners cannot be invited -- invite as admin and transfer ownership");
        }
        Ok(())
    }

    /// Display name to store when the invite leaves it blank.
    pub fn effective_display_name(&self) -> &str {
        let trimmed = self.display_name.trim();
        if trimmed.is_empty() {
            self.email.split('@').next().unwrap_or(&self.email)
        } else {
            trimmed
        }
    }
}

impl ProfileFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.member_id.get() <= 0 {
            bail!("profile member is required");
        }
        if self.display_name.trim().is_empty() {
            bail!("display name is required -- enter a name and retry");
        }
        if !looks_like_email(&self.email) {
            bail!(
                "profile email {:?} is not a valid address -- use name@domain",
                self.email
            );
        }
        if self.bio.chars().count() > 500 {
            bail!("profile bio is limited to 500 characters");
        }
        Ok(())
    }
}

fn default_invite_role() -> Role {
    Role::Viewer
}

fn looks_like_email(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.chars().any(char::is_whitespace) {
        return false;
    }
    match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        EventFormInput, FormPayload, InviteFormInput, ProfileFormInput, SessionFormInput,
        TeamFormInput,
    };
    use crate::{EventId, EventStatus, FormKind, MemberId, Role, TeamId};
    use time::{Date, Month};

    fn date(day: u8) -> Date {
        Date::from_calendar_date(2026, Month::May, day).expect("valid fixture date")
    }

    fn event() -> EventFormInput {
        EventFormInput {
            team_id: TeamId::new(1),
            title: "Spring Summit".to_owned(),
            location: "Hall A".to_owned(),
            status: EventStatus::Scheduled,
            starts_on: date(10),
            ends_on: Some(date(12)),
            published: true,
        }
    }

    #[test]
    fn team_validation_rejects_blank_name() {
        let payload = FormPayload::Team(TeamFormInput {
            name: "  ".to_owned(),
            description: String::new(),
        });
        assert_eq!(payload.kind(), FormKind::Team);
        assert!(payload.validate().is_err());
    }

    #[test]
    fn event_validation_accepts_valid_payload() {
        assert!(FormPayload::Event(event()).validate().is_ok());
    }

    #[test]
    fn event_validation_rejects_bad_date_range() {
        let payload = FormPayload::Event(EventFormInput {
            ends_on: Some(date(9)),
            ..event()
        });
        let error = payload.validate().expect_err("end before start");
        assert!(error.to_string().contains("on/after start date"));
    }

    #[test]
    fn published_draft_is_rejected() {
        let payload = FormPayload::Event(EventFormInput {
            status: EventStatus::Draft,
            ..event()
        });
        assert!(payload.validate().is_err());
    }

    #[test]
    fn session_validation_requires_event() {
        let payload = FormPayload::Session(SessionFormInput {
            event_id: EventId::new(0),
            title: "Keynote".to_owned(),
            speaker: String::new(),
            room: String::new(),
            held_on: date(10),
        });
        assert!(payload.validate().is_err());
    }

    #[test]
    fn invite_validation_checks_email_and_role() {
        let invite = |email: &str, role| InviteFormInput {
            email: email.to_owned(),
            display_name: String::new(),
            role,
        };
        assert!(invite("ada@example.com", Role::Admin).validate().is_ok());
        assert!(invite("ada@example", Role::Admin).validate().is_err());
        assert!(invite("ada example@x.io", Role::Viewer).validate().is_err());
        assert!(invite("@example.com", Role::Viewer).validate().is_err());
        assert!(invite("ada@example.com", Role::Owner).validate().is_err());
    }

    #[test]
    fn invite_display_name_falls_back_to_local_part() {
        let invite = InviteFormInput {
            email: "grace@navy.mil".to_owned(),
            display_name: " ".to_owned(),
            role: Role::Viewer,
        };
        assert_eq!(invite.effective_display_name(), "grace");
    }

    #[test]
    fn invite_rows_deserialize_with_default_role() {
        let rows: Vec<InviteFormInput> =
            serde_json::from_str(r#"[{"email": "lin@example.com"}]"#).expect("parse rows");
        assert_eq!(rows[0].role, Role::Viewer);
    }

    #[test]
    fn profile_validation_limits_bio() {
        let payload = FormPayload::Profile(ProfileFormInput {
            member_id: MemberId::new(3),
            display_name: "Lin".to_owned(),
            email: "lin@example.com".to_owned(),
            bio: "x".repeat(501),
        });
        assert!(payload.validate().is_err());
    }
}
