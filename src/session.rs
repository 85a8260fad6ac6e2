// 🪪 Session State
// Per-session toggles and filters; one instance per user, never shared

use crate::config::{MapCredentials, ENV_API_KEY};
use crate::error::Result;
use crate::filter::FilterSpec;
use crate::pipeline::Dataset;
use crate::render::{render_map, MarkerTemplate};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// A view that evaluates its own filter over the shared backing set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    Table,
    Map,
    Chart,
}

/// Result of asking for a map
#[derive(Debug, Clone, PartialEq)]
pub enum MapView {
    /// Toggle is off
    Hidden,
    /// Credentials missing; show the notice instead of a map
    Unavailable(String),
    Rendered { html: String, markers: usize },
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    map_visible: HashMap<String, bool>,
    filters: HashMap<(String, Surface), FilterSpec>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_map_visible(&self, domain: &str) -> bool {
        self.map_visible.get(domain).copied().unwrap_or(false)
    }

    /// Flip the map toggle for a domain, returning the new state
    pub fn toggle_map(&mut self, domain: &str) -> bool {
        let visible = !self.is_map_visible(domain);
        self.map_visible.insert(domain.to_string(), visible);
        visible
    }

    pub fn filter(&self, domain: &str, surface: Surface) -> FilterSpec {
        self.filters
            .get(&(domain.to_string(), surface))
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_filter(&mut self, domain: &str, surface: Surface, spec: FilterSpec) {
        self.filters.insert((domain.to_string(), surface), spec);
    }

    /// Apply one spec to every surface of a domain, as a single dropdown
    /// driving table and map together does
    pub fn set_filter_everywhere(&mut self, domain: &str, spec: FilterSpec) {
        for surface in [Surface::Table, Surface::Map, Surface::Chart] {
            self.set_filter(domain, surface, spec.clone());
        }
    }
}

/// Degraded-mode text shown in place of a map
pub fn map_unavailable_notice() -> String {
    format!("Map unavailable: configure {} to enable it", ENV_API_KEY)
}

/// Render the map surface of a domain for this session. The renderer is not
/// invoked when the map is hidden or credentials are missing.
pub fn render_map_view(
    session: &Session,
    dataset: &Dataset,
    template_path: &Path,
    credentials: Option<&MapCredentials>,
) -> Result<MapView> {
    if !session.is_map_visible(&dataset.domain) {
        return Ok(MapView::Hidden);
    }

    let Some(credentials) = credentials else {
        warn!(domain = %dataset.domain, "map credentials missing, map unavailable");
        return Ok(MapView::Unavailable(map_unavailable_notice()));
    };

    let template = MarkerTemplate::from_file(template_path)?;
    let view = dataset.view(&session.filter(&dataset.domain, Surface::Map));
    let markers = view.iter().filter(|e| e.has_location()).count();

    Ok(MapView::Rendered {
        html: render_map(&template, view, credentials),
        markers,
    })
}
