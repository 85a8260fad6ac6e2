// 📍 Entity - Canonical facility record
// One normalized row per facility, immutable once the pipeline has built it

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// CANONICAL FIELD NAMES
// ============================================================================

pub const FIELD_ID: &str = "id";
pub const FIELD_NAME: &str = "name";
pub const FIELD_TYPE: &str = "type";
pub const FIELD_SUB_TYPE: &str = "sub_type";
pub const FIELD_REGION: &str = "region";
pub const FIELD_CAPACITY: &str = "capacity";

/// Category used when nothing better can be derived
pub const DEFAULT_CATEGORY: &str = "Other";

// ============================================================================
// LOCATION
// ============================================================================

/// A latitude/longitude pair. Both components are always present and finite;
/// an entity without a usable position has no `Location` at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    /// Returns `None` unless both components are finite
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        if latitude.is_finite() && longitude.is_finite() {
            Some(Location { latitude, longitude })
        } else {
            None
        }
    }

    pub fn in_bounds(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

// ============================================================================
// ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique within one dataset only
    pub id: String,

    /// Display name, synthesized at ingestion when the source left it blank
    pub name: String,

    /// Derived classification ("type"), never empty
    pub category: String,

    /// Secondary classification ("sub_type"), falls back to `category`
    pub subcategory: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,

    /// Every original source column, for display columns the canonical shape
    /// does not cover
    #[serde(default)]
    pub raw: BTreeMap<String, String>,
}

impl Entity {
    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }

    /// Original cell text for a source column
    pub fn raw_value(&self, column: &str) -> Option<&str> {
        self.raw.get(column).map(String::as_str)
    }

    /// Value shown in a table column: canonical fields first, then raw cells
    pub fn display_value(&self, column: &str) -> String {
        match column {
            FIELD_ID => self.id.clone(),
            FIELD_NAME => self.name.clone(),
            FIELD_TYPE | "category" => self.category.clone(),
            FIELD_SUB_TYPE | "subcategory" => self.subcategory.clone(),
            FIELD_REGION => self.region.clone().unwrap_or_default(),
            FIELD_CAPACITY => self.capacity.map(|c| c.to_string()).unwrap_or_default(),
            "latitude" => self
                .location
                .map(|l| l.latitude.to_string())
                .unwrap_or_default(),
            "longitude" => self
                .location
                .map(|l| l.longitude.to_string())
                .unwrap_or_default(),
            other => self.raw_value(other).unwrap_or_default().to_string(),
        }
    }
}
