// 🔎 Filter Engine
// Conjunction of per-field predicates over an immutable entity set

use crate::entity::Entity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ============================================================================
// FIELDS & VALUES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Category,
    Subcategory,
    Region,
    /// Free text, matched by case-insensitive substring
    Name,
    /// Any original source column, matched exactly
    Raw(String),
}

impl Field {
    /// Parse the names used by the CLI and HTTP API
    pub fn parse(name: &str) -> Field {
        match name {
            "category" | "type" => Field::Category,
            "subcategory" | "sub_type" => Field::Subcategory,
            "region" => Field::Region,
            "name" => Field::Name,
            other => Field::Raw(other.to_string()),
        }
    }

    pub fn value_of<'e>(&self, entity: &'e Entity) -> Option<&'e str> {
        match self {
            Field::Category => Some(entity.category.as_str()),
            Field::Subcategory => Some(entity.subcategory.as_str()),
            Field::Region => entity.region.as_deref(),
            Field::Name => Some(entity.name.as_str()),
            Field::Raw(column) => entity.raw_value(column),
        }
    }

    fn is_free_text(&self) -> bool {
        matches!(self, Field::Name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Category => write!(f, "category"),
            Field::Subcategory => write!(f, "subcategory"),
            Field::Region => write!(f, "region"),
            Field::Name => write!(f, "name"),
            Field::Raw(column) => write!(f, "{}", column),
        }
    }
}

/// A field's constraint
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "match", content = "value", rename_all = "snake_case")]
pub enum FilterValue {
    #[default]
    MatchAll,
    Exact(String),
}

impl FilterValue {
    pub fn exact(value: impl Into<String>) -> Self {
        FilterValue::Exact(value.into())
    }

    /// `None` or a blank string means no constraint
    pub fn from_option(value: Option<String>) -> Self {
        match value {
            Some(v) if !v.trim().is_empty() => FilterValue::Exact(v),
            _ => FilterValue::MatchAll,
        }
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, FilterValue::MatchAll)
    }
}

// ============================================================================
// FILTER SPEC
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSpec {
    predicates: BTreeMap<Field, FilterValue>,
}

impl FilterSpec {
    /// No constraints: every entity passes
    pub fn match_all() -> Self {
        FilterSpec::default()
    }

    /// Builder: constrain one field
    pub fn with(mut self, field: Field, value: FilterValue) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: Field, value: FilterValue) {
        self.predicates.insert(field, value);
    }

    pub fn get(&self, field: &Field) -> &FilterValue {
        static MATCH_ALL: FilterValue = FilterValue::MatchAll;
        self.predicates.get(field).unwrap_or(&MATCH_ALL)
    }

    pub fn clear(&mut self) {
        self.predicates.clear();
    }

    /// True when every bound field is `MatchAll`
    pub fn is_unconstrained(&self) -> bool {
        self.predicates.values().all(FilterValue::is_match_all)
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        self.predicates.iter().all(|(field, value)| match value {
            FilterValue::MatchAll => true,
            FilterValue::Exact(target) => field_matches(field, entity, target),
        })
    }

    /// Order-preserving read-only view; the input is never touched
    pub fn apply<'e>(&self, entities: &'e [Entity]) -> Vec<&'e Entity> {
        entities.iter().filter(|e| self.matches(e)).collect()
    }

    /// Same as [`apply`](Self::apply) over an existing view
    pub fn refine<'e>(&self, view: &[&'e Entity]) -> Vec<&'e Entity> {
        view.iter().copied().filter(|e| self.matches(e)).collect()
    }
}

fn field_matches(field: &Field, entity: &Entity, target: &str) -> bool {
    let Some(value) = field.value_of(entity) else {
        return false;
    };

    if field.is_free_text() {
        let value = value.trim();
        !value.is_empty() && value.to_lowercase().contains(&target.to_lowercase())
    } else {
        value == target
    }
}

/// Sorted distinct non-blank values of a field, the option list of a dropdown
pub fn distinct_values(entities: &[Entity], field: &Field) -> Vec<String> {
    entities
        .iter()
        .filter_map(|e| field.value_of(e))
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
