// 🧭 Coordinate Parser
// "<lat>,<lng>" strings or lat/lng column pairs → Location, never (0,0) on failure

use crate::entity::Location;
use crate::error::CoordinateError;
use crate::schema::NormalizedRow;
use serde::{Deserialize, Serialize};

/// Where a domain keeps its position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PositionSource {
    /// One column holding `"<lat>,<lng>"`, possibly quoted
    Combined { column: String },
    /// Two precomputed columns
    Pair { latitude: String, longitude: String },
}

impl PositionSource {
    pub fn combined(column: &str) -> Self {
        PositionSource::Combined {
            column: column.to_string(),
        }
    }

    pub fn pair(latitude: &str, longitude: &str) -> Self {
        PositionSource::Pair {
            latitude: latitude.to_string(),
            longitude: longitude.to_string(),
        }
    }
}

/// Outcome for one row. `Ok(None)` means the row simply has no position.
pub type CoordinateOutcome = Result<Option<Location>, CoordinateError>;

pub struct CoordinateParser {
    source: PositionSource,
    validate_bounds: bool,
}

impl CoordinateParser {
    pub fn new(source: PositionSource) -> Self {
        CoordinateParser {
            source,
            validate_bounds: false,
        }
    }

    /// Builder: reject latitudes outside ±90 and longitudes outside ±180
    pub fn with_bounds_validation(mut self, enabled: bool) -> Self {
        self.validate_bounds = enabled;
        self
    }

    pub fn parse_row(&self, row: &NormalizedRow) -> CoordinateOutcome {
        let location = match &self.source {
            PositionSource::Combined { column } => match row.get(column) {
                Some(text) => parse_combined(text)?,
                None => None,
            },
            PositionSource::Pair {
                latitude,
                longitude,
            } => match (row.get(latitude), row.get(longitude)) {
                (Some(lat), Some(lng)) => Some(parse_pair(lat, lng)?),
                _ => None,
            },
        };

        match location {
            Some(loc) if self.validate_bounds && !loc.in_bounds() => {
                Err(CoordinateError::OutOfRange {
                    latitude: loc.latitude,
                    longitude: loc.longitude,
                })
            }
            other => Ok(other),
        }
    }
}

/// Parse a combined position string. Blank input is not an error.
pub fn parse_combined(text: &str) -> CoordinateOutcome {
    let cleaned: String = text.chars().filter(|c| *c != '"' && *c != '\'').collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return Ok(None);
    }

    let (lat, lng) = cleaned
        .split_once(',')
        .ok_or_else(|| CoordinateError::Malformed(text.to_string()))?;

    parse_pair(lat, lng).map(Some)
}

/// Coerce two components; both must be finite numbers
pub fn parse_pair(latitude: &str, longitude: &str) -> Result<Location, CoordinateError> {
    let lat = coerce(latitude)?;
    let lng = coerce(longitude)?;

    Location::new(lat, lng).ok_or(CoordinateError::NotFinite(if lat.is_finite() { lng } else { lat }))
}

fn coerce(part: &str) -> Result<f64, CoordinateError> {
    let part = part.trim();
    part.parse::<f64>()
        .map_err(|_| CoordinateError::NotANumber(part.to_string()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn row_with(pairs: &[(&str, &str)]) -> NormalizedRow {
        let fields: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        NormalizedRow {
            line: 2,
            raw: fields.clone(),
            fields,
            name_synthesized: false,
        }
    }

    #[test]
    fn test_parse_plain() {
        let loc = parse_combined("10.5,106.7").unwrap().unwrap();
        assert_eq!(loc.latitude, 10.5);
        assert_eq!(loc.longitude, 106.7);
    }

    #[test]
    fn test_parse_quoted_matches_plain() {
        assert_eq!(
            parse_combined("\"10.5,106.7\"").unwrap(),
            parse_combined("10.5,106.7").unwrap()
        );
    }

    #[test]
    fn test_parse_with_spaces() {
        let loc = parse_combined(" 10.5 , 106.7 ").unwrap().unwrap();
        assert_eq!(loc.longitude, 106.7);
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert_eq!(
            parse_combined("abc"),
            Err(CoordinateError::Malformed("abc".to_string()))
        );
        assert!(matches!(
            parse_combined("abc,106.7"),
            Err(CoordinateError::NotANumber(_))
        ));
    }

    #[test]
    fn test_parse_splits_on_first_comma_only() {
        assert!(parse_combined("10.5,106.7,3").is_err());
    }

    #[test]
    fn test_parse_empty_is_absent() {
        assert_eq!(parse_combined(""), Ok(None));
        assert_eq!(parse_combined("\"\""), Ok(None));
    }

    #[test]
    fn test_parse_rejects_nan() {
        assert!(matches!(
            parse_combined("NaN,106.7"),
            Err(CoordinateError::NotFinite(_))
        ));
    }

    #[test]
    fn test_row_without_column_has_no_location() {
        let parser = CoordinateParser::new(PositionSource::combined("latlng"));
        let row = row_with(&[("name", "A")]);

        assert_eq!(parser.parse_row(&row), Ok(None));
    }

    #[test]
    fn test_pair_requires_both() {
        let parser = CoordinateParser::new(PositionSource::pair("latitude", "longitude"));

        let full = row_with(&[("latitude", "21.02"), ("longitude", "105.85")]);
        assert!(parser.parse_row(&full).unwrap().is_some());

        let half = row_with(&[("latitude", "21.02"), ("longitude", "")]);
        assert_eq!(parser.parse_row(&half), Ok(None));

        let bad = row_with(&[("latitude", "north"), ("longitude", "105.85")]);
        assert!(parser.parse_row(&bad).is_err());
    }

    #[test]
    fn test_out_of_range_accepted_by_default() {
        let parser = CoordinateParser::new(PositionSource::combined("latlng"));
        let row = row_with(&[("latlng", "106.7,10.5")]);

        assert!(parser.parse_row(&row).unwrap().is_some());
    }

    #[test]
    fn test_out_of_range_rejected_when_bounded() {
        let parser =
            CoordinateParser::new(PositionSource::combined("latlng")).with_bounds_validation(true);
        let row = row_with(&[("latlng", "106.7,10.5")]);

        assert!(matches!(
            parser.parse_row(&row),
            Err(CoordinateError::OutOfRange { .. })
        ));
    }
}
