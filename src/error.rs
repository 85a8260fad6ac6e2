// ⚠️ Error Taxonomy
// Load-level and render-level failures are returned; row-level problems are absorbed

use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced to the caller of a load or render operation.
///
/// Row-level coordinate problems are NOT part of this enum, see
/// [`CoordinateError`]. They never abort a load.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read source file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed table in {path}: {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("schema validation failed for domain '{domain}': missing column(s) {}", missing.join(", "))]
    SchemaValidation { domain: String, missing: Vec<String> },

    #[error("map template not found: {path}")]
    TemplateNotFound { path: PathBuf },

    #[error("map template has no '{placeholder}' placeholder")]
    TemplatePlaceholderMissing { placeholder: String },

    #[error("configuration missing: {key}")]
    ConfigurationMissing { key: String },

    #[error("invalid domain descriptor file {path}: {reason}")]
    Descriptor { path: PathBuf, reason: String },

    #[error("unknown domain: {0}")]
    UnknownDomain(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Row-level coordinate failure. Recovered by the pipeline: the row is kept
/// without a location and only excluded from map output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("expected '<lat>,<lng>', got '{0}'")]
    Malformed(String),

    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("coordinate component {0} is not finite")]
    NotFinite(f64),

    #[error("coordinate ({latitude}, {longitude}) is out of range")]
    OutOfRange { latitude: f64, longitude: f64 },
}
