// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use eventdesk_app::{
    Event, EventId, EventStatus, InviteFormInput, Member, MemberId, Role, Session, SessionId,
    Team, TeamId,
};
use std::path::PathBuf;
use time::{Date, Duration, Month, OffsetDateTime, Time};

const TEAM_ADJECTIVES: [&str; 10] = [
    "Northern", "Harbor", "Summit", "Civic", "Open", "Lakeside", "Metro", "Prairie", "Coastal",
    "Granite",
];
const TEAM_NOUNS: [&str; 8] = [
    "Meetups",
    "Collective",
    "Guild",
    "Circle",
    "Society",
    "Crew",
    "Forum",
    "Network",
];

const FIRST_NAMES: [&str; 16] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Elliot", "Robin", "Cameron", "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 18] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Campbell", "Turner", "Flores", "Bennett", "Price", "Morris", "Foster", "Brooks",
];
const EMAIL_DOMAINS: [&str; 5] = [
    "example.com",
    "example.org",
    "mail.test",
    "events.test",
    "team.example",
];

const EVENT_TOPICS: [&str; 12] = [
    "Rust",
    "Databases",
    "Design Systems",
    "Observability",
    "Accessibility",
    "Cloud Costs",
    "Testing",
    "Security",
    "Open Source",
    "Mobile",
    "Data Engineering",
    "Developer Experience",
];
const EVENT_FORMATS: [&str; 6] = [
    "Summit",
    "Meetup",
    "Workshop",
    "Hack Night",
    "Conference",
    "Roundtable",
];
const VENUES: [&str; 10] = [
    "Hall A",
    "Hall B",
    "Riverside Pavilion",
    "Library Annex",
    "Innovation Hub",
    "Union Station Loft",
    "Civic Center",
    "Online",
    "Harbor Warehouse",
    "Garden Room",
];
const ROOMS: [&str; 6] = ["Main Stage", "Room 101", "Room 204", "Atrium", "Studio", "Lab"];
const TALK_OPENERS: [&str; 8] = [
    "Intro to",
    "Scaling",
    "Debugging",
    "Lessons from",
    "Practical",
    "The State of",
    "Hands-on",
    "Rethinking",
];

const EVENT_STATUSES: [EventStatus; 5] = EventStatus::ALL;
const INVITE_ROLES: [Role; 3] = [Role::Admin, Role::Organizer, Role::Viewer];

const REFERENCE_YEAR: i32 = 2026;

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Seeded generator of admin-console fixtures. The same seed always yields
/// the same sequence of records.
#[derive(Debug, Clone)]
pub struct EventFaker {
    rng: DeterministicRng,
}

impl EventFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn team(&mut self, id: TeamId) -> Team {
        let name = format!("{} {}", self.pick(&TEAM_ADJECTIVES), self.pick(&TEAM_NOUNS));
        let created_at = self.datetime_before(reference_now(), 365);
        Team {
            id,
            description: format!("{name} organizes {} events.", self.topic_lower()),
            name,
            archived: self.rng.int_n(5) == 0,
            created_at,
            updated_at: created_at,
            deleted_at: None,
        }
    }

    pub fn invite(&mut self) -> InviteFormInput {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        InviteFormInput {
            email: format!(
                "{}.{}{}@{}",
                first.to_ascii_lowercase(),
                last.to_ascii_lowercase(),
                self.rng.int_n(100),
                self.pick(&EMAIL_DOMAINS)
            ),
            display_name: format!("{first} {last}"),
            role: INVITE_ROLES[self.rng.int_n(INVITE_ROLES.len())],
        }
    }

    pub fn member(&mut self, team_id: TeamId, id: MemberId) -> Member {
        let invite = self.invite();
        let created_at = self.datetime_before(reference_now(), 365);
        Member {
            id,
            team_id,
            email: invite.email,
            display_name: invite.display_name,
            role: invite.role,
            active: self.rng.int_n(4) != 0,
            invited_on: Some(created_at.date()),
            created_at,
            updated_at: created_at,
            deleted_at: None,
        }
    }

    /// Drafts are never published and an end date never precedes the start.
    pub fn event(&mut self, team_id: TeamId, id: EventId) -> Event {
        let status = EVENT_STATUSES[self.rng.int_n(EVENT_STATUSES.len())];
        let starts_on = self.date_in_year(REFERENCE_YEAR);
        let ends_on = self
            .rng
            .bool()
            .then(|| starts_on + Duration::days(self.rng.int_n(3) as i64));
        let published = status != EventStatus::Draft && self.rng.int_n(4) != 0;
        let created_at = self.datetime_before(reference_now(), 120);
        Event {
            id,
            team_id,
            title: format!("{} {}", self.pick(&EVENT_TOPICS), self.pick(&EVENT_FORMATS)),
            location: self.pick(&VENUES).to_owned(),
            status,
            starts_on,
            ends_on,
            published,
            created_at,
            updated_at: created_at,
            deleted_at: None,
        }
    }

    pub fn session(&mut self, event: &Event, id: SessionId) -> Session {
        let span = event
            .ends_on
            .map_or(0, |ends_on| (ends_on - event.starts_on).whole_days());
        let held_on = event.starts_on + Duration::days(self.rng.int_n(span as usize + 1) as i64);
        let created_at = event.created_at;
        Session {
            id,
            event_id: event.id,
            title: format!("{} {}", self.pick(&TALK_OPENERS), self.pick(&EVENT_TOPICS)),
            speaker: format!("{} {}", self.pick(&FIRST_NAMES), self.pick(&LAST_NAMES)),
            room: self.pick(&ROOMS).to_owned(),
            held_on,
            created_at,
            updated_at: created_at,
            deleted_at: None,
        }
    }

    pub fn date_in_year(&mut self, year: i32) -> Date {
        let start = fixture_date(year, Month::January, 1);
        let days = if time::util::is_leap_year(year) {
            366
        } else {
            365
        };
        start + Duration::days(self.rng.int_n(days) as i64)
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn topic_lower(&mut self) -> String {
        self.pick(&EVENT_TOPICS).to_ascii_lowercase()
    }

    fn datetime_before(&mut self, end: OffsetDateTime, max_days: usize) -> OffsetDateTime {
        let seconds = self.rng.next_u64() % (max_days as u64 * 86_400 + 1);
        end - Duration::seconds(seconds as i64)
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("eventdesk.db");
    Ok((dir, db_path))
}

/// Panics on an impossible calendar date; fixtures are hard-coded.
pub fn fixture_date(year: i32, month: Month, day: u8) -> Date {
    Date::from_calendar_date(year, month, day).expect("valid calendar date")
}

pub fn reference_now() -> OffsetDateTime {
    let midnight = Time::from_hms(0, 0, 0).expect("valid midnight");
    fixture_date(REFERENCE_YEAR, Month::January, 1)
        .with_time(midnight)
        .assume_utc()
}
