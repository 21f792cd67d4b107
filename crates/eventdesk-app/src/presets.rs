// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::filter::{FilterError, FilterField, FilterSpec, FilterValue, SelectOption};
use crate::{EntityKind, EventStatus, Role};

/// Filter fields offered by the list screen of each entity kind.
pub fn filter_spec_for(kind: EntityKind) -> Result<FilterSpec, FilterError> {
    let fields = match kind {
        EntityKind::Team => vec![
            FilterField::text("name", "Name"),
            FilterField::boolean("archived", "Archived").with_default(FilterValue::Boolean(false)),
        ],
        EntityKind::Member => vec![
            FilterField::text("display_name", "Name"),
            FilterField::text("email", "Email"),
            FilterField::select(
                "role",
                "Role",
                Role::ALL
                    .iter()
                    .map(|role| SelectOption::new(role.as_str(), role.label()))
                    .collect(),
            ),
            FilterField::boolean("active", "Active"),
        ],
        EntityKind::Event => vec![
            FilterField::text("title", "Title"),
            FilterField::text("location", "Location"),
            FilterField::select(
                "status",
                "Status",
                EventStatus::ALL
                    .iter()
                    .map(|status| SelectOption::new(status.as_str(), status.label()))
                    .collect(),
            ),
            FilterField::date_range("starts_on", "Starts"),
            FilterField::boolean("published", "Published"),
        ],
        EntityKind::Session => vec![
            FilterField::text("title", "Title"),
            FilterField::text("speaker", "Speaker"),
            FilterField::text("room", "Room"),
            FilterField::date_range("held_on", "Held"),
        ],
    };
    FilterSpec::new(fields)
}
