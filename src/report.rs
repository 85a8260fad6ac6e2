// 📊 Reports
// Coordinate coverage and category counts over a filtered view

use crate::entity::Entity;
use serde::Serialize;
use std::collections::HashMap;

const UNKNOWN_REGION: &str = "(unknown)";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinateCoverage {
    pub total: usize,
    pub valid: usize,
    pub missing: usize,
    /// 0.0 when the view is empty
    pub missing_percent: f64,
    /// Missing-location count per region, largest first
    pub missing_by_region: Vec<(String, usize)>,
}

impl CoordinateCoverage {
    pub fn summary(&self) -> String {
        format!(
            "{} rows, {} with valid coordinates, {} missing ({:.2}%)",
            self.total, self.valid, self.missing, self.missing_percent
        )
    }
}

pub fn coordinate_coverage(view: &[&Entity]) -> CoordinateCoverage {
    let total = view.len();
    let mut by_region: HashMap<&str, usize> = HashMap::new();

    for entity in view.iter().filter(|e| !e.has_location()) {
        let region = entity.region.as_deref().unwrap_or(UNKNOWN_REGION);
        *by_region.entry(region).or_insert(0) += 1;
    }

    let missing: usize = by_region.values().sum();
    let valid = total - missing;

    CoordinateCoverage {
        total,
        valid,
        missing,
        missing_percent: if total == 0 {
            0.0
        } else {
            missing as f64 / total as f64 * 100.0
        },
        missing_by_region: sorted_counts(by_region),
    }
}

/// Entity count per category, largest first (ties by name)
pub fn category_counts(view: &[&Entity]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for entity in view {
        *counts.entry(entity.category.as_str()).or_insert(0) += 1;
    }
    sorted_counts(counts)
}

fn sorted_counts(counts: HashMap<&str, usize>) -> Vec<(String, usize)> {
    let mut result: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(key, count)| (key.to_string(), count))
        .collect();

    result.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    result
}

/// First `limit` entities as display rows for the given columns
pub fn preview(view: &[&Entity], columns: &[String], limit: usize) -> Vec<Vec<String>> {
    view.iter()
        .take(limit)
        .map(|entity| columns.iter().map(|c| entity.display_value(c)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Location;
    use std::collections::BTreeMap;

    fn entity(category: &str, region: Option<&str>, located: bool) -> Entity {
        Entity {
            id: format!("{}-{:?}", category, region),
            name: category.to_string(),
            category: category.to_string(),
            subcategory: category.to_string(),
            location: if located { Location::new(10.0, 106.0) } else { None },
            region: region.map(str::to_string),
            capacity: None,
            raw: BTreeMap::new(),
        }
    }

    #[test]
    fn test_coverage_counts() {
        let entities = vec![
            entity("WinMart", Some("Hà Nội"), true),
            entity("WinMart", Some("Hà Nội"), false),
            entity("Co.op Mart", Some("Huế"), false),
            entity("Co.op Mart", None, false),
        ];
        let view: Vec<&Entity> = entities.iter().collect();

        let coverage = coordinate_coverage(&view);
        assert_eq!(coverage.total, 4);
        assert_eq!(coverage.valid, 1);
        assert_eq!(coverage.missing, 3);
        assert_eq!(coverage.missing_percent, 75.0);
        assert_eq!(coverage.missing_by_region.len(), 3);
        assert!(coverage
            .missing_by_region
            .contains(&("(unknown)".to_string(), 1)));
        assert!(coverage.summary().contains("75.00%"));
    }

    #[test]
    fn test_coverage_empty_view() {
        let coverage = coordinate_coverage(&[]);
        assert_eq!(coverage.missing_percent, 0.0);
    }

    #[test]
    fn test_category_counts_sorted() {
        let entities = vec![
            entity("Solar", None, true),
            entity("Wind", None, true),
            entity("Wind", None, true),
            entity("Hydro", None, true),
        ];
        let view: Vec<&Entity> = entities.iter().collect();

        assert_eq!(
            category_counts(&view),
            vec![
                ("Wind".to_string(), 2),
                ("Hydro".to_string(), 1),
                ("Solar".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_preview_limits_rows() {
        let entities = vec![
            entity("Solar", Some("Ninh Thuận"), true),
            entity("Wind", None, false),
        ];
        let view: Vec<&Entity> = entities.iter().collect();
        let columns = vec!["name".to_string(), "region".to_string()];

        let rows = preview(&view, &columns, 1);
        assert_eq!(rows, vec![vec!["Solar".to_string(), "Ninh Thuận".to_string()]]);
    }
}
