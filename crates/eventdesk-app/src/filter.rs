// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Declarative, data-driven filtering over any entity that implements
//! [`Filterable`].
//!
//! A [`FilterSpec`] describes which attributes can be filtered and how; a
//! [`FilterState`] holds the values a user picked. [`apply_filter`] is a pure
//! function of the two plus the entity slice: it never reorders, and an empty
//! state is the identity.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use time::Date;
use time::macros::format_description;
use tracing::debug;

use crate::SortDirection;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error(
        "filter field `{key}` has unrecognized kind {kind:?}; use one of text, select, dateRange, boolean"
    )]
    InvalidFieldKind { key: String, kind: String },
    #[error("filter field key must not be empty")]
    EmptyKey,
    #[error("filter key `{0}` appears more than once in the filter spec")]
    DuplicateKey(String),
    #[error("select filter `{0}` has no options -- add at least one option")]
    EmptyOptions(String),
    #[error("filter `{key}` expects a {expected} value")]
    ValueKindMismatch { key: String, expected: &'static str },
    #[error("filter `{key}` has no option {value:?}")]
    UnknownOption { key: String, value: String },
    #[error("filter `{0}` is not part of this filter spec")]
    UnknownKey(String),
    #[error("invalid {expected} value {raw:?} for filter `{key}`")]
    InvalidValue {
        key: String,
        expected: &'static str,
        raw: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKind {
    Text,
    Select { options: Vec<SelectOption> },
    DateRange,
    Boolean,
}

impl FilterKind {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Select { .. } => "select",
            Self::DateRange => "dateRange",
            Self::Boolean => "boolean",
        }
    }

    fn from_descriptor(kind: &str, options: Vec<SelectOption>) -> Option<Self> {
        match kind {
            "text" => Some(Self::Text),
            "select" => Some(Self::Select { options }),
            "dateRange" => Some(Self::DateRange),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum FilterValue {
    Text(String),
    Select(String),
    DateRange {
        from: Option<Date>,
        to: Option<Date>,
    },
    Boolean(bool),
}

impl FilterValue {
    /// Blank text and open-on-both-ends ranges select nothing, so they count
    /// as unset.
    pub fn is_unset(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::DateRange { from, to } => from.is_none() && to.is_none(),
            Self::Select(_) | Self::Boolean(_) => false,
        }
    }

    pub fn matches_kind(&self, kind: &FilterKind) -> bool {
        matches!(
            (kind, self),
            (FilterKind::Text, Self::Text(_))
                | (FilterKind::Select { .. }, Self::Select(_))
                | (FilterKind::DateRange, Self::DateRange { .. })
                | (FilterKind::Boolean, Self::Boolean(_))
        )
    }

    pub fn parse_for_field(field: &FilterField, raw: &str) -> Result<Self, FilterError> {
        let trimmed = raw.trim();
        match &field.kind {
            FilterKind::Text => Ok(Self::Text(raw.to_owned())),
            FilterKind::Select { options } => options
                .iter()
                .find(|option| option.value == trimmed)
                .or_else(|| {
                    options
                        .iter()
                        .find(|option| option.label.eq_ignore_ascii_case(trimmed))
                })
                .map(|option| Self::Select(option.value.clone()))
                .ok_or_else(|| FilterError::UnknownOption {
                    key: field.key.clone(),
                    value: trimmed.to_owned(),
                }),
            FilterKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => Ok(Self::Boolean(true)),
                "0" | "false" | "off" | "no" => Ok(Self::Boolean(false)),
                _ => Err(invalid_value(field, "boolean", raw)),
            },
            FilterKind::DateRange => {
                let (from_raw, to_raw) = trimmed.split_once("..").unwrap_or((trimmed, trimmed));
                let from = parse_optional_date(from_raw)
                    .ok_or_else(|| invalid_value(field, "date range", raw))?;
                let to = parse_optional_date(to_raw)
                    .ok_or_else(|| invalid_value(field, "date range", raw))?;
                Ok(Self::DateRange { from, to })
            }
        }
    }

    pub fn display(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Select(value) => value.clone(),
            Self::DateRange { from, to } => format!(
                "{}..{}",
                from.map(format_date).unwrap_or_default(),
                to.map(format_date).unwrap_or_default()
            ),
            Self::Boolean(true) => "yes".to_owned(),
            Self::Boolean(false) => "no".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterField {
    pub key: String,
    pub label: String,
    pub kind: FilterKind,
    pub default: Option<FilterValue>,
}

impl FilterField {
    pub fn text(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_kind(key, label, FilterKind::Text)
    }

    pub fn select(
        key: impl Into<String>,
        label: impl Into<String>,
        options: Vec<SelectOption>,
    ) -> Self {
        Self::with_kind(key, label, FilterKind::Select { options })
    }

    pub fn date_range(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_kind(key, label, FilterKind::DateRange)
    }

    pub fn boolean(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_kind(key, label, FilterKind::Boolean)
    }

    pub fn with_default(mut self, value: FilterValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn options(&self) -> &[SelectOption] {
        match &self.kind {
            FilterKind::Select { options } => options,
            FilterKind::Text | FilterKind::DateRange | FilterKind::Boolean => &[],
        }
    }

    fn with_kind(key: impl Into<String>, label: impl Into<String>, kind: FilterKind) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind,
            default: None,
        }
    }

    fn check_value(&self, value: &FilterValue) -> Result<(), FilterError> {
        if !value.matches_kind(&self.kind) {
            return Err(FilterError::ValueKindMismatch {
                key: self.key.clone(),
                expected: self.kind.name(),
            });
        }
        if let FilterValue::Select(selected) = value
            && !self.options().iter().any(|option| option.value == *selected)
        {
            return Err(FilterError::UnknownOption {
                key: self.key.clone(),
                value: selected.clone(),
            });
        }
        Ok(())
    }
}

/// Raw, serializable field description as a host view or config file states
/// it. The kind is a plain string until [`FilterSpec::from_descriptors`]
/// checks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub key: String,
    #[serde(default)]
    pub label: String,
    pub kind: String,
    #[serde(default)]
    pub options: Vec<SelectOption>,
    #[serde(default)]
    pub default: Option<FilterValue>,
}

impl TryFrom<FieldDescriptor> for FilterField {
    type Error = FilterError;

    fn try_from(descriptor: FieldDescriptor) -> Result<Self, Self::Error> {
        let kind = FilterKind::from_descriptor(&descriptor.kind, descriptor.options).ok_or_else(
            || FilterError::InvalidFieldKind {
                key: descriptor.key.clone(),
                kind: descriptor.kind.clone(),
            },
        )?;
        let label = if descriptor.label.is_empty() {
            descriptor.key.clone()
        } else {
            descriptor.label
        };
        Ok(Self {
            key: descriptor.key,
            label,
            kind,
            default: descriptor.default,
        })
    }
}

/// Ordered, validated set of filter fields. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    fields: Vec<FilterField>,
}

impl FilterSpec {
    pub fn new(fields: Vec<FilterField>) -> Result<Self, FilterError> {
        let mut seen = BTreeSet::new();
        for field in &fields {
            if field.key.trim().is_empty() {
                return Err(FilterError::EmptyKey);
            }
            if !seen.insert(field.key.as_str()) {
                return Err(FilterError::DuplicateKey(field.key.clone()));
            }
            if let FilterKind::Select { options } = &field.kind
                && options.is_empty()
            {
                return Err(FilterError::EmptyOptions(field.key.clone()));
            }
            if let Some(default) = &field.default {
                field.check_value(default)?;
            }
        }
        Ok(Self { fields })
    }

    pub fn from_descriptors<I>(descriptors: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = FieldDescriptor>,
    {
        let fields = descriptors
            .into_iter()
            .map(FilterField::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(fields)
    }

    pub fn fields(&self) -> &[FilterField] {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&FilterField> {
        self.fields.iter().find(|field| field.key == key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Selected values keyed by [`FilterField::key`]. Absent keys are unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterState {
    values: BTreeMap<String, FilterValue>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defaults(spec: &FilterSpec) -> Self {
        let values = spec
            .fields()
            .iter()
            .filter_map(|field| {
                field
                    .default
                    .clone()
                    .filter(|value| !value.is_unset())
                    .map(|value| (field.key.clone(), value))
            })
            .collect();
        Self { values }
    }

    /// Checks the value against the field before storing it. Unset values
    /// remove the key.
    pub fn set(
        &mut self,
        spec: &FilterSpec,
        key: &str,
        value: FilterValue,
    ) -> Result<(), FilterError> {
        let field = spec
            .field(key)
            .ok_or_else(|| FilterError::UnknownKey(key.to_owned()))?;
        field.check_value(&value)?;
        if value.is_unset() {
            self.values.remove(key);
        } else {
            self.values.insert(key.to_owned(), value);
        }
        Ok(())
    }

    pub fn set_raw(&mut self, spec: &FilterSpec, key: &str, raw: &str) -> Result<(), FilterError> {
        let field = spec
            .field(key)
            .ok_or_else(|| FilterError::UnknownKey(key.to_owned()))?;
        let value = FilterValue::parse_for_field(field, raw)?;
        self.set(spec, key, value)
    }

    pub fn unset(&mut self, key: &str) -> Option<FilterValue> {
        self.values.remove(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(FilterValue::is_unset)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn active_count(&self, spec: &FilterSpec) -> usize {
        active_fields(spec, self).len()
    }

    /// `label: value` chips for the active filters, in spec order.
    pub fn summary(&self, spec: &FilterSpec) -> Vec<String> {
        active_fields(spec, self)
            .into_iter()
            .map(|(field, value)| {
                let shown = match value {
                    FilterValue::Select(selected) => field
                        .options()
                        .iter()
                        .find(|option| option.value == *selected)
                        .map_or_else(|| selected.clone(), |option| option.label.clone()),
                    other => other.display(),
                };
                format!("{}: {shown}", field.label)
            })
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, FilterValue)> for FilterState {
    fn from_iter<T: IntoIterator<Item = (K, FilterValue)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Date(Date),
    Bool(bool),
}

/// Read access to the attributes a [`FilterSpec`] can address.
pub trait Filterable {
    fn field_value(&self, key: &str) -> Option<FieldValue<'_>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub key: String,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn asc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Parses `key` or `key:asc` / `key:desc`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (key, direction) = match raw.split_once(':') {
            Some((key, direction)) => (key.trim(), SortDirection::parse(direction.trim())?),
            None => (raw.trim(), SortDirection::Asc),
        };
        if key.is_empty() {
            return None;
        }
        Some(Self {
            key: key.to_owned(),
            direction,
        })
    }
}

/// Indices of the entities that pass every active filter, in input order.
pub fn matching_indices<E: Filterable>(
    entities: &[E],
    spec: &FilterSpec,
    state: &FilterState,
) -> Vec<usize> {
    let active = active_fields(spec, state);
    if active.is_empty() {
        return (0..entities.len()).collect();
    }

    let indices: Vec<usize> = entities
        .iter()
        .enumerate()
        .filter(|(_, entity)| {
            active.iter().all(|(field, value)| {
                field_matches(&field.kind, value, entity.field_value(&field.key))
            })
        })
        .map(|(index, _)| index)
        .collect();
    debug!(
        active = active.len(),
        total = entities.len(),
        matched = indices.len(),
        "filter applied"
    );
    indices
}

pub fn apply_filter<E: Filterable + Clone>(
    entities: &[E],
    spec: &FilterSpec,
    state: &FilterState,
) -> Vec<E> {
    matching_indices(entities, spec, state)
        .into_iter()
        .map(|index| entities[index].clone())
        .collect()
}

/// Filters, then stable-sorts by `sort` if given. Entities without the sort
/// attribute go last in either direction.
pub fn apply_view<E: Filterable + Clone>(
    entities: &[E],
    spec: &FilterSpec,
    state: &FilterState,
    sort: Option<&SortOrder>,
) -> Vec<E> {
    let mut indices = matching_indices(entities, spec, state);
    if let Some(sort) = sort {
        sort_indices(entities, &mut indices, sort);
    }
    indices
        .into_iter()
        .map(|index| entities[index].clone())
        .collect()
}

pub fn sort_indices<E: Filterable>(entities: &[E], indices: &mut [usize], sort: &SortOrder) {
    indices.sort_by(|left, right| {
        let left = entities[*left].field_value(&sort.key);
        let right = entities[*right].field_value(&sort.key);
        match (left, right) {
            (Some(left), Some(right)) => {
                let ordering = compare_field_values(left, right);
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

fn active_fields<'a>(
    spec: &'a FilterSpec,
    state: &'a FilterState,
) -> Vec<(&'a FilterField, &'a FilterValue)> {
    spec.fields()
        .iter()
        .filter_map(|field| {
            let value = state.get(&field.key)?;
            if value.is_unset() {
                return None;
            }
            if !value.matches_kind(&field.kind) {
                debug!(key = %field.key, expected = field.kind.name(), "ignoring mismatched filter value");
                return None;
            }
            Some((field, value))
        })
        .collect()
}

fn field_matches(kind: &FilterKind, value: &FilterValue, actual: Option<FieldValue<'_>>) -> bool {
    match (kind, value, actual) {
        (FilterKind::Text, FilterValue::Text(needle), Some(FieldValue::Text(haystack))) => {
            contains_ignore_case(haystack, needle.trim())
        }
        (
            FilterKind::Select { .. },
            FilterValue::Select(selected),
            Some(FieldValue::Text(text)),
        ) => text == selected.as_str(),
        (
            FilterKind::DateRange,
            FilterValue::DateRange { from, to },
            Some(FieldValue::Date(date)),
        ) => {
            from.is_none_or(|from| date >= from) && to.is_none_or(|to| date <= to)
        }
        (FilterKind::Boolean, FilterValue::Boolean(expected), Some(FieldValue::Bool(flag))) => {
            flag == *expected
        }
        _ => false,
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn compare_field_values(left: FieldValue<'_>, right: FieldValue<'_>) -> Ordering {
    match (left, right) {
        (FieldValue::Text(left), FieldValue::Text(right)) => left
            .to_lowercase()
            .cmp(&right.to_lowercase())
            .then_with(|| left.cmp(right)),
        (FieldValue::Date(left), FieldValue::Date(right)) => left.cmp(&right),
        (FieldValue::Bool(left), FieldValue::Bool(right)) => left.cmp(&right),
        _ => Ordering::Equal,
    }
}

fn invalid_value(field: &FilterField, expected: &'static str, raw: &str) -> FilterError {
    FilterError::InvalidValue {
        key: field.key.clone(),
        expected,
        raw: raw.to_owned(),
    }
}

fn parse_optional_date(raw: &str) -> Option<Option<Date>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(None);
    }
    Date::parse(trimmed, &format_description!("[year]-[month]-[day]"))
        .ok()
        .map(Some)
}

pub fn format_date(value: Date) -> String {
    value
        .format(&format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| "1970-01-01".to_owned())
}
