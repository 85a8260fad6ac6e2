// Facility Map - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod entity;
pub mod ingest;
pub mod schema;         // Normalizer: required columns, renames, name fallback
pub mod coordinates;    // "<lat>,<lng>" and lat/lng pairs
pub mod rules;          // Keyword classification
pub mod filter;         // MatchAll | Exact predicates
pub mod render;         // Marker statements + template substitution
pub mod domains;
pub mod pipeline;
pub mod report;
pub mod session;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use error::{CoordinateError, Error, Result};
pub use entity::{Entity, Location};
pub use ingest::{Table, TableRow};
pub use schema::{NameFallback, NormalizedRow, SchemaDescriptor, SchemaNormalizer};
pub use coordinates::{parse_combined, CoordinateParser, PositionSource};
pub use rules::{
    Classification, ClassificationConfig, DefaultCategory, EntityClassifier, KeywordRule,
    RuleEngine,
};
pub use filter::{distinct_values, Field, FilterSpec, FilterValue};
pub use render::{collect_markers, render_map, Marker, MarkerTemplate};
pub use domains::{DomainCatalog, DomainDescriptor};
pub use pipeline::{build_entities, Dataset, DatasetCache, LoadReport};
pub use report::{category_counts, coordinate_coverage, preview, CoordinateCoverage};
pub use session::{map_unavailable_notice, render_map_view, MapView, Session, Surface};
pub use config::{AppConfig, MapCredentials};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Catalog from `FACILITY_MAP_DOMAINS` when set, otherwise the built-ins
pub fn load_catalog(config: &AppConfig) -> Result<DomainCatalog> {
    match &config.domains_file {
        Some(path) => DomainCatalog::from_file(path),
        None => Ok(DomainCatalog::builtin()),
    }
}
