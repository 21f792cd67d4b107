// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::rc::Rc;

use crate::filter::{
    FilterError, FilterSpec, FilterState, FilterValue, Filterable, SortOrder, matching_indices,
    sort_indices,
};
use crate::popup::{PopupController, PopupError, PopupOutcome, SessionHandle};

/// Payload of a filter popup: the `FilterSpec` is fixed for the session, the state is
/// what the user edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDraft {
    spec: Rc<FilterSpec>,
    pub state: FilterState,
}

impl FilterDraft {
    pub fn new(spec: Rc<FilterSpec>, state: FilterState) -> Self {
        Self { spec, state }
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn set(&mut self, key: &str, value: FilterValue) -> Result<(), FilterError> {
        self.state.set(&self.spec, key, value)
    }

    pub fn set_raw(&mut self, key: &str, raw: &str) -> Result<(), FilterError> {
        self.state.set_raw(&self.spec, key, raw)
    }

    pub fn reset_to_defaults(&mut self) {
        self.state = FilterState::defaults(&self.spec);
    }
}

pub type FilterPopups = PopupController<FilterDraft, FilterState>;

/// Opens a filter popup whose confirm hands the edited state back unchanged.
pub fn open_filter_popup(
    popups: &FilterPopups,
    draft: FilterDraft,
) -> Result<SessionHandle, PopupError> {
    popups.open(draft, |draft: &FilterDraft| {
        let state = draft.state.clone();
        async move { Ok(state) }
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCommand<E> {
    ReplaceEntities(Vec<E>),
    ApplyFilter(FilterState),
    ClearFilter,
    SortBy(SortOrder),
    ClearSort,
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    RowsChanged { visible: usize, total: usize },
    FilterChanged(FilterState),
    SortChanged(Option<SortOrder>),
    StatusUpdated(String),
    StatusCleared,
}

/// A list screen: entities, the filter applied to them, and the rows left
/// visible. Every change re-runs the filter engine explicitly.
#[derive(Debug, Clone)]
pub struct ListView<E> {
    entities: Vec<E>,
    spec: Rc<FilterSpec>,
    applied: FilterState,
    sort: Option<SortOrder>,
    visible: Vec<usize>,
    status_line: Option<String>,
}

impl<E: Filterable> ListView<E> {
    pub fn new(spec: FilterSpec, entities: Vec<E>) -> Self {
        let applied = FilterState::defaults(&spec);
        let mut view = Self {
            entities,
            spec: Rc::new(spec),
            applied,
            sort: None,
            visible: Vec::new(),
            status_line: None,
        };
        view.refresh();
        view
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn applied(&self) -> &FilterState {
        &self.applied
    }

    pub fn sort(&self) -> Option<&SortOrder> {
        self.sort.as_ref()
    }

    pub fn status_line(&self) -> Option<&str> {
        self.status_line.as_deref()
    }

    pub fn total(&self) -> usize {
        self.entities.len()
    }

    pub fn visible_rows(&self) -> Vec<&E> {
        self.visible
            .iter()
            .map(|index| &self.entities[*index])
            .collect()
    }

    /// Draft to seed a filter popup with the currently applied state.
    pub fn draft(&self) -> FilterDraft {
        FilterDraft::new(Rc::clone(&self.spec), self.applied.clone())
    }

    pub fn dispatch(&mut self, command: ViewCommand<E>) -> Vec<ViewEvent> {
        match command {
            ViewCommand::ReplaceEntities(entities) => {
                self.entities = entities;
                vec![self.refresh()]
            }
            ViewCommand::ApplyFilter(state) => {
                self.applied = state;
                let rows = self.refresh();
                let chips = self.applied.summary(&self.spec);
                let status = if chips.is_empty() {
                    "filter cleared".to_owned()
                } else {
                    format!("filter: {}", chips.join(", "))
                };
                vec![
                    ViewEvent::FilterChanged(self.applied.clone()),
                    rows,
                    self.set_status(&status),
                ]
            }
            ViewCommand::ClearFilter => {
                self.applied.clear();
                vec![
                    ViewEvent::FilterChanged(self.applied.clone()),
                    self.refresh(),
                    self.set_status("filter cleared"),
                ]
            }
            ViewCommand::SortBy(sort) => {
                let status = format!("sorted by {} {}", sort.key, sort.direction.as_str());
                self.sort = Some(sort);
                vec![
                    ViewEvent::SortChanged(self.sort.clone()),
                    self.refresh(),
                    self.set_status(&status),
                ]
            }
            ViewCommand::ClearSort => {
                self.sort = None;
                vec![ViewEvent::SortChanged(None), self.refresh()]
            }
            ViewCommand::ClearStatus => {
                self.status_line = None;
                vec![ViewEvent::StatusCleared]
            }
        }
    }

    /// Feeds a filter popup outcome back into the view.
    pub fn observe(&mut self, outcome: PopupOutcome<FilterState>) -> Vec<ViewEvent> {
        match outcome {
            PopupOutcome::Confirmed(state) => self.dispatch(ViewCommand::ApplyFilter(state)),
            PopupOutcome::Cancelled => vec![self.set_status("filter unchanged")],
            PopupOutcome::Failed(reason) => {
                vec![self.set_status(&format!("filter not applied: {reason}"))]
            }
        }
    }

    fn refresh(&mut self) -> ViewEvent {
        let mut visible = matching_indices(&self.entities, &self.spec, &self.applied);
        if let Some(sort) = &self.sort {
            sort_indices(&self.entities, &mut visible, sort);
        }
        self.visible = visible;
        ViewEvent::RowsChanged {
            visible: self.visible.len(),
            total: self.entities.len(),
        }
    }

    fn set_status(&mut self, message: &str) -> ViewEvent {
        self.status_line = Some(message.to_owned());
        ViewEvent::StatusUpdated(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{FilterPopups, ListView, ViewCommand, ViewEvent, open_filter_popup};
    use crate::filter::{
        FieldValue, FilterField, FilterSpec, FilterState, FilterValue, Filterable, SortOrder,
    };
    use crate::popup::PopupOutcome;
    use futures::StreamExt;
    use futures::executor::block_on;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Row {
        name: &'static str,
        active: bool,
    }

    impl Filterable for Row {
        fn field_value(&self, key: &str) -> Option<FieldValue<'_>> {
            match key {
                "name" => Some(FieldValue::Text(self.name)),
                "active" => Some(FieldValue::Bool(self.active)),
                _ => None,
            }
        }
    }

    fn view() -> ListView<Row> {
        let spec = FilterSpec::new(vec![
            FilterField::text("name", "Name"),
            FilterField::boolean("active", "Active"),
        ])
        .expect("valid spec");
        ListView::new(
            spec,
            vec![
                Row {
                    name: "Cleo",
                    active: true,
                },
                Row {
                    name: "Abe",
                    active: false,
                },
                Row {
                    name: "Bea",
                    active: true,
                },
            ],
        )
    }

    fn names(view: &ListView<Row>) -> Vec<&'static str> {
        view.visible_rows().into_iter().map(|row| row.name).collect()
    }

    #[test]
    fn new_view_shows_every_row() {
        let view = view();
        assert_eq!(names(&view), vec!["Cleo", "Abe", "Bea"]);
        assert_eq!(view.total(), 3);
    }

    #[test]
    fn apply_filter_updates_rows_and_status() {
        let mut view = view();
        let state: FilterState = [("active", FilterValue::Boolean(true))].into_iter().collect();

        let events = view.dispatch(ViewCommand::ApplyFilter(state.clone()));
        assert_eq!(
            events,
            vec![
                ViewEvent::FilterChanged(state),
                ViewEvent::RowsChanged {
                    visible: 2,
                    total: 3
                },
                ViewEvent::StatusUpdated("filter: Active: yes".to_owned()),
            ]
        );
        assert_eq!(names(&view), vec!["Cleo", "Bea"]);
    }

    #[test]
    fn sort_applies_on_top_of_filter() {
        let mut view = view();
        view.dispatch(ViewCommand::ApplyFilter(
            [("active", FilterValue::Boolean(true))].into_iter().collect(),
        ));
        view.dispatch(ViewCommand::SortBy(SortOrder::asc("name")));
        assert_eq!(names(&view), vec!["Bea", "Cleo"]);
        assert_eq!(view.status_line(), Some("sorted by name asc"));

        view.dispatch(ViewCommand::ClearSort);
        assert_eq!(names(&view), vec!["Cleo", "Bea"]);
    }

    #[test]
    fn replacing_entities_keeps_the_applied_filter() {
        let mut view = view();
        view.dispatch(ViewCommand::ApplyFilter(
            [("name", FilterValue::Text("e".to_owned()))].into_iter().collect(),
        ));
        let events = view.dispatch(ViewCommand::ReplaceEntities(vec![
            Row {
                name: "Dee",
                active: false,
            },
            Row {
                name: "Kip",
                active: true,
            },
        ]));
        assert_eq!(
            events,
            vec![ViewEvent::RowsChanged {
                visible: 1,
                total: 2
            }]
        );
        assert_eq!(names(&view), vec!["Dee"]);
    }

    #[test]
    fn filter_popup_round_trip_applies_confirmed_state() {
        let mut view = view();
        let popups = FilterPopups::new();
        let handle = open_filter_popup(&popups, view.draft()).expect("open filter popup");
        let mut outcomes = popups.subscribe(handle).expect("subscribe");

        popups
            .edit(handle, |draft| draft.set_raw("name", "bea"))
            .expect("session open")
            .expect("valid filter value");
        block_on(popups.confirm(handle)).expect("confirm");

        let outcome = block_on(outcomes.next()).expect("outcome emitted");
        view.observe(outcome);
        assert_eq!(names(&view), vec!["Bea"]);
        assert_eq!(view.status_line(), Some("filter: Name: bea"));
    }

    #[test]
    fn cancelled_popup_leaves_filter_alone() {
        let mut view = view();
        let popups = FilterPopups::new();
        let handle = open_filter_popup(&popups, view.draft()).expect("open");
        popups
            .edit(handle, |draft| draft.set("active", FilterValue::Boolean(false)))
            .expect("session open")
            .expect("valid value");
        popups.cancel(handle).expect("cancel");

        let events = view.observe(PopupOutcome::Cancelled);
        assert_eq!(
            events,
            vec![ViewEvent::StatusUpdated("filter unchanged".to_owned())]
        );
        assert!(view.applied().is_empty());
        assert_eq!(names(&view).len(), 3);
    }

    #[test]
    fn defaults_seed_the_initial_filter() {
        let spec = FilterSpec::new(vec![
            FilterField::boolean("active", "Active").with_default(FilterValue::Boolean(true)),
        ])
        .expect("spec");
        let mut view = ListView::new(
            spec,
            vec![
                Row {
                    name: "On",
                    active: true,
                },
                Row {
                    name: "Off",
                    active: false,
                },
            ],
        );
        assert_eq!(names(&view), vec!["On"]);

        view.dispatch(ViewCommand::ClearFilter);
        assert_eq!(names(&view), vec!["On", "Off"]);

        let mut draft = view.draft();
        draft.reset_to_defaults();
        assert_eq!(draft.state.get("active"), Some(&FilterValue::Boolean(true)));
    }
}
