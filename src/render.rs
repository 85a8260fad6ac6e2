// 🗺️ Marker Template Renderer
// Coordinate-valid entities → marker statements → map document

use crate::config::MapCredentials;
use crate::entity::Entity;
use crate::error::{Error, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

pub const MARKERS_PLACEHOLDER: &str = "##MARKERS_PLACEHOLDER##";
pub const API_KEY_PLACEHOLDER: &str = "__API_KEY__";
pub const MAP_ID_PLACEHOLDER: &str = "__MAP_ID__";

// ============================================================================
// MARKER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub latitude: f64,
    pub longitude: f64,
    pub title: String,
}

impl Marker {
    /// `None` for entities without a location
    pub fn from_entity(entity: &Entity) -> Option<Self> {
        entity.location.map(|location| Marker {
            latitude: location.latitude,
            longitude: location.longitude,
            title: entity.name.clone(),
        })
    }

    /// One marker-construction statement. The title is emitted as a JSON
    /// string literal so quotes and backslashes cannot break out of it.
    pub fn statement(&self) -> String {
        format!(
            "new map4d.Marker({{ position: {{ lat: {}, lng: {} }}, title: {} }}).setMap(map);",
            self.latitude,
            self.longitude,
            encode_title(&self.title)
        )
    }
}

fn encode_title(title: &str) -> String {
    serde_json::Value::String(title.to_string())
        .to_string()
        .replace("</", "<\\/")
}

/// Markers for every entity that has a location, in input order
pub fn collect_markers<'e, I>(entities: I) -> Vec<Marker>
where
    I: IntoIterator<Item = &'e Entity>,
{
    entities.into_iter().filter_map(Marker::from_entity).collect()
}

/// The text that replaces the markers placeholder
pub fn marker_block(markers: &[Marker]) -> String {
    markers
        .iter()
        .map(|m| format!("        {}\n", m.statement()))
        .collect()
}

// ============================================================================
// TEMPLATE
// ============================================================================

#[derive(Debug, Clone)]
pub struct MarkerTemplate {
    source: String,
}

impl MarkerTemplate {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|_| Error::TemplateNotFound {
            path: path.to_path_buf(),
        })?;

        Self::parse(source)
    }

    /// Every placeholder must be present
    pub fn parse(source: impl Into<String>) -> Result<Self> {
        let source = source.into();

        for placeholder in [MARKERS_PLACEHOLDER, API_KEY_PLACEHOLDER, MAP_ID_PLACEHOLDER] {
            if !source.contains(placeholder) {
                return Err(Error::TemplatePlaceholderMissing {
                    placeholder: placeholder.to_string(),
                });
            }
        }

        Ok(MarkerTemplate { source })
    }

    /// Replace every placeholder occurrence in a single pass over the
    /// template. Substituted text is never rescanned, so a title that happens
    /// to contain a placeholder token stays literal.
    pub fn render(&self, markers: &[Marker], credentials: &MapCredentials) -> String {
        let substitutions = [
            (MARKERS_PLACEHOLDER, marker_block(markers)),
            (API_KEY_PLACEHOLDER, credentials.api_key.clone()),
            (MAP_ID_PLACEHOLDER, credentials.map_id.clone().unwrap_or_default()),
        ];

        let mut spans: Vec<(usize, &str, &str)> = substitutions
            .iter()
            .flat_map(|(token, value)| {
                self.source
                    .match_indices(*token)
                    .map(move |(at, _)| (at, *token, value.as_str()))
            })
            .collect();
        spans.sort_by_key(|(at, _, _)| *at);

        let mut output = String::with_capacity(self.source.len() + spans.iter().map(|s| s.2.len()).sum::<usize>());
        let mut cursor = 0;

        for (at, token, value) in spans {
            if at < cursor {
                // overlapping tokens, keep the earlier one
                continue;
            }
            output.push_str(&self.source[cursor..at]);
            output.push_str(value);
            cursor = at + token.len();
        }
        output.push_str(&self.source[cursor..]);

        output
    }
}

/// Render a map document for any entity set. Entities without a location are
/// dropped here, whatever the caller passed in.
pub fn render_map<'e, I>(template: &MarkerTemplate, entities: I, credentials: &MapCredentials) -> String
where
    I: IntoIterator<Item = &'e Entity>,
{
    let markers = collect_markers(entities);
    tracing::debug!(markers = markers.len(), "rendering map document");
    template.render(&markers, credentials)
}

// ============================================================================
// TESTS
// ============================================================================
