// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use eventdesk_app::{
    EntityKind, EventFormInput, EventId, EventStatus, FilterState, InviteFormInput,
    ProfileFormInput, Role, SessionFormInput, TeamFormInput, TeamId, apply_filter,
    filter_spec_for,
};
use eventdesk_db::{LifecycleEntityRef, Store, validate_db_path};
use eventdesk_testkit::{EventFaker, fixture_date, temp_db_path};
use time::Month;

fn bootstrapped() -> Result<Store> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    Ok(store)
}

fn team(store: &Store, name: &str) -> Result<TeamId> {
    store.create_team(&TeamFormInput {
        name: name.to_owned(),
        description: String::new(),
    })
}

fn event_input(team_id: TeamId, title: &str) -> EventFormInput {
    EventFormInput {
        team_id,
        title: title.to_owned(),
        location: "Hall A".to_owned(),
        status: EventStatus::Scheduled,
        starts_on: fixture_date(2026, Month::May, 10),
        ends_on: Some(fixture_date(2026, Month::May, 11)),
        published: true,
    }
}

fn invite(email: &str, role: Role) -> InviteFormInput {
    InviteFormInput {
        email: email.to_owned(),
        display_name: String::new(),
        role,
    }
}

#[test]
fn validate_db_path_rejects_uri_forms() {
    assert!(validate_db_path("file:test.db").is_err());
    assert!(validate_db_path("https://example.com/db.sqlite").is_err());
    assert!(validate_db_path("db.sqlite?mode=ro").is_err());
    assert!(validate_db_path("").is_err());
    assert!(validate_db_path(":memory:").is_ok());
    assert!(validate_db_path("/tmp/eventdesk.db").is_ok());
}

#[test]
fn bootstrap_is_idempotent_on_disk() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    {
        let store = Store::open(&path)?;
        store.bootstrap()?;
        team(&store, "Harbor Meetups")?;
    }
    let reopened = Store::open(&path)?;
    reopened.bootstrap()?;
    let teams = reopened.list_teams(false)?;
    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0].name, "Harbor Meetups");
    assert!(!teams[0].archived);
    Ok(())
}

#[test]
fn bootstrap_rejects_schema_missing_required_column() -> Result<()> {
    let store = bootstrapped()?;
    store.raw_connection().execute_batch(
        "
        DROP TABLE sessions;
        CREATE TABLE sessions (
          id INTEGER PRIMARY KEY,
          event_id INTEGER NOT NULL,
          title TEXT NOT NULL,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL,
          deleted_at TEXT
        );
        ",
    )?;

    let message = store
        .bootstrap()
        .expect_err("schema validation should fail")
        .to_string();
    assert!(message.contains("table `sessions` is missing required columns"));
    assert!(message.contains("held_on"));
    Ok(())
}

#[test]
fn event_round_trips_and_updates() -> Result<()> {
    let store = bootstrapped()?;
    let team_id = team(&store, "Granite Guild")?;
    let event_id = store.create_event(&event_input(team_id, "Rust Meetup"))?;

    let event = store.get_event(event_id)?;
    assert_eq!(event.title, "Rust Meetup");
    assert_eq!(event.status, EventStatus::Scheduled);
    assert_eq!(event.ends_on, Some(fixture_date(2026, Month::May, 11)));
    assert!(event.published);

    store.update_event(
        event_id,
        &EventFormInput {
            status: EventStatus::Live,
            ends_on: None,
            ..event_input(team_id, "Rust Meetup, Live")
        },
    )?;
    let updated = store.get_event(event_id)?;
    assert_eq!(updated.status, EventStatus::Live);
    assert_eq!(updated.ends_on, None);
    assert_eq!(updated.title, "Rust Meetup, Live");
    Ok(())
}

#[test]
fn create_event_rejects_invalid_form_and_deleted_team() -> Result<()> {
    let store = bootstrapped()?;
    let team_id = team(&store, "Prairie Forum")?;

    let backwards = EventFormInput {
        ends_on: Some(fixture_date(2026, Month::May, 1)),
        ..event_input(team_id, "Backwards")
    };
    assert!(store.create_event(&backwards).is_err());

    store.soft_delete_team(team_id)?;
    let error = store
        .create_event(&event_input(team_id, "Orphan"))
        .expect_err("deleted team should be rejected");
    assert!(error.to_string().contains("restore it first"));
    Ok(())
}

#[test]
fn team_with_active_events_cannot_be_deleted() -> Result<()> {
    let store = bootstrapped()?;
    let team_id = team(&store, "Harbor Meetups")?;
    let event_id = store.create_event(&event_input(team_id, "Rust Meetup"))?;

    let error = store
        .soft_delete_team(team_id)
        .expect_err("team has an active event");
    assert!(error.to_string().contains("1 active event(s)"));

    store.soft_delete_event(event_id)?;
    store.soft_delete_team(team_id)?;
    assert!(store.list_teams(false)?.is_empty());
    assert_eq!(store.list_teams(true)?.len(), 1);

    let error = store
        .restore_event(event_id)
        .expect_err("event's team is deleted");
    assert!(error.to_string().contains("team"));
    store.restore_team(team_id)?;
    assert_eq!(store.list_teams(false)?.len(), 1);
    assert!(
        store
            .restore_team(team_id)
            .expect_err("team is already active")
            .to_string()
            .contains("not deleted")
    );
    store.restore(LifecycleEntityRef::Event(event_id))?;
    assert!(store.get_event(event_id)?.deleted_at.is_none());
    Ok(())
}

#[test]
fn event_with_sessions_cannot_be_deleted() -> Result<()> {
    let store = bootstrapped()?;
    let team_id = team(&store, "Granite Guild")?;
    let event_id = store.create_event(&event_input(team_id, "Databases Workshop"))?;
    let session_id = store.create_session(&SessionFormInput {
        event_id,
        title: "Practical Indexing".to_owned(),
        speaker: "Rowan Price".to_owned(),
        room: "Lab".to_owned(),
        held_on: fixture_date(2026, Month::May, 10),
    })?;

    let error = store
        .soft_delete_event(event_id)
        .expect_err("event has a session");
    assert!(error.to_string().contains("delete sessions first"));

    let session = store.get_session(session_id)?;
    assert_eq!(session.event_id, event_id);
    assert_eq!(session.speaker, "Rowan Price");
    assert_eq!(session.held_on, fixture_date(2026, Month::May, 10));

    store.soft_delete_session(session_id)?;
    assert!(store.get_session(session_id)?.deleted_at.is_some());
    store.soft_delete_event(event_id)?;
    assert!(
        store
            .soft_delete_event(event_id)
            .expect_err("already deleted")
            .to_string()
            .contains("already deleted")
    );
    Ok(())
}

#[test]
fn invite_rejects_duplicate_active_email_per_team() -> Result<()> {
    let store = bootstrapped()?;
    let harbor = team(&store, "Harbor Meetups")?;
    let granite = team(&store, "Granite Guild")?;

    let member_id = store.invite_member(harbor, &invite("ada@example.com", Role::Admin))?;
    let member = store.get_member(member_id)?;
    assert_eq!(member.display_name, "ada");
    assert_eq!(member.role, Role::Admin);
    assert!(member.active);
    assert!(member.invited_on.is_some());

    let error = store
        .invite_member(harbor, &invite(" ADA@example.com ", Role::Viewer))
        .expect_err("duplicate email");
    assert!(error.to_string().contains("already an active member"));

    store.invite_member(granite, &invite("ada@example.com", Role::Viewer))?;

    store.soft_delete_member(member_id)?;
    let second = store.invite_member(harbor, &invite("ada@example.com", Role::Organizer))?;
    assert!(
        store
            .restore_member(member_id)
            .expect_err("email taken again")
            .to_string()
            .contains("already an active member")
    );
    assert_eq!(store.list_members(Some(harbor), false)?.len(), 1);
    assert_eq!(store.list_members(Some(harbor), false)?[0].id, second);
    assert_eq!(store.list_members(None, false)?.len(), 2);
    Ok(())
}

#[test]
fn invite_rejects_owner_role() -> Result<()> {
    let store = bootstrapped()?;
    let team_id = team(&store, "Harbor Meetups")?;
    assert!(
        store
            .invite_member(team_id, &invite("boss@example.com", Role::Owner))
            .is_err()
    );
    Ok(())
}

#[test]
fn import_members_is_all_or_nothing() -> Result<()> {
    let store = bootstrapped()?;
    let team_id = team(&store, "Harbor Meetups")?;
    store.invite_member(team_id, &invite("taken@example.com", Role::Viewer))?;

    let mut faker = EventFaker::new(17);
    let mut rows: Vec<InviteFormInput> = (0..4).map(|_| faker.invite()).collect();
    rows.push(invite("taken@example.com", Role::Organizer));

    let error = store
        .import_members(team_id, &rows)
        .expect_err("last row collides with an existing member");
    assert!(format!("{error:#}").contains("import row 5"));
    assert_eq!(store.list_members(Some(team_id), false)?.len(), 1);

    rows.pop();
    let ids = store.import_members(team_id, &rows)?;
    assert_eq!(ids.len(), 4);
    assert_eq!(store.list_members(Some(team_id), false)?.len(), 5);
    Ok(())
}

#[test]
fn import_members_rejects_repeated_rows_before_writing() -> Result<()> {
    let store = bootstrapped()?;
    let team_id = team(&store, "Granite Guild")?;
    let rows = vec![
        invite("lin@example.com", Role::Viewer),
        invite("LIN@example.com", Role::Admin),
    ];
    let error = store
        .import_members(team_id, &rows)
        .expect_err("repeated email");
    assert!(error.to_string().contains("import row 2 repeats email"));
    assert!(store.list_members(Some(team_id), true)?.is_empty());
    Ok(())
}

#[test]
fn profile_updates_are_validated() -> Result<()> {
    let store = bootstrapped()?;
    let team_id = team(&store, "Harbor Meetups")?;
    let lin = store.invite_member(team_id, &invite("lin@example.com", Role::Viewer))?;
    store.invite_member(team_id, &invite("kai@example.com", Role::Viewer))?;

    store.update_profile(&ProfileFormInput {
        member_id: lin,
        display_name: "Lin Park".to_owned(),
        email: "lin.park@example.com".to_owned(),
        bio: "Runs the speaker program.".to_owned(),
    })?;
    let profile = store.get_profile(lin)?;
    assert_eq!(profile.display_name, "Lin Park");
    assert_eq!(profile.email, "lin.park@example.com");
    assert_eq!(profile.bio, "Runs the speaker program.");

    let clash = store.update_profile(&ProfileFormInput {
        member_id: lin,
        display_name: "Lin Park".to_owned(),
        email: "kai@example.com".to_owned(),
        bio: String::new(),
    });
    assert!(clash.is_err());
    assert_eq!(store.get_profile(lin)?.email, "lin.park@example.com");
    Ok(())
}

#[test]
fn listed_events_feed_the_filter_engine() -> Result<()> {
    let store = bootstrapped()?;
    let team_id = team(&store, "Harbor Meetups")?;
    let mut faker = EventFaker::new(99);
    for id in 1..=25 {
        let fake = faker.event(team_id, EventId::new(id));
        store.create_event(&EventFormInput {
            team_id,
            title: fake.title,
            location: fake.location,
            status: fake.status,
            starts_on: fake.starts_on,
            ends_on: fake.ends_on,
            published: fake.published,
        })?;
    }

    let events = store.list_events(false)?;
    assert_eq!(events.len(), 25);
    assert!(
        events
            .windows(2)
            .all(|pair| pair[0].starts_on <= pair[1].starts_on)
    );

    let spec = filter_spec_for(EntityKind::Event)?;
    let mut state = FilterState::new();
    state.set_raw(&spec, "published", "no")?;
    let unpublished = apply_filter(&events, &spec, &state);
    assert!(unpublished.iter().all(|event| !event.published));
    assert_eq!(
        unpublished.len(),
        events.iter().filter(|event| !event.published).count()
    );
    Ok(())
}
