// 📐 Shape Layer - Schema Normalization
// Validates required columns and maps domain columns onto canonical names

use crate::entity::FIELD_NAME;
use crate::error::{Error, Result};
use crate::ingest::{Table, TableRow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// SCHEMA DESCRIPTOR
// ============================================================================

/// Builds a display name from two source columns when `name` is blank:
/// `"{prefix} {suffix}"`, e.g. `retail_chain` + `address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameFallback {
    pub prefix: String,
    pub suffix: String,
}

/// Per-domain table shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    /// Columns that must exist in the header, or the whole load fails
    pub required_columns: Vec<String>,

    /// Source column → canonical column (`name`, `type`, `sub_type`, `region`, ...)
    #[serde(default)]
    pub renames: BTreeMap<String, String>,

    #[serde(default)]
    pub name_fallback: Option<NameFallback>,
}

impl SchemaDescriptor {
    pub fn new(required_columns: &[&str]) -> Self {
        SchemaDescriptor {
            required_columns: required_columns.iter().map(|c| c.to_string()).collect(),
            renames: BTreeMap::new(),
            name_fallback: None,
        }
    }

    /// Builder: rename a source column to a canonical one
    pub fn with_rename(mut self, from: &str, to: &str) -> Self {
        self.renames.insert(from.to_string(), to.to_string());
        self
    }

    /// Builder: synthesize blank names from two columns
    pub fn with_name_fallback(mut self, prefix: &str, suffix: &str) -> Self {
        self.name_fallback = Some(NameFallback {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        });
        self
    }
}

// ============================================================================
// NORMALIZED ROW
// ============================================================================

/// A row after renaming, before coordinates and classification
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub line: usize,

    /// Cells keyed by canonical name (unrenamed columns keep their source name)
    pub fields: BTreeMap<String, String>,

    /// Cells keyed by original source column
    pub raw: BTreeMap<String, String>,

    pub name_synthesized: bool,
}

impl NormalizedRow {
    /// Non-blank cell value, looked up by canonical name then by source name
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .or_else(|| self.raw.get(column))
            .map(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }
}

// ============================================================================
// NORMALIZER
// ============================================================================

pub struct SchemaNormalizer<'a> {
    domain: &'a str,
    schema: &'a SchemaDescriptor,
}

impl<'a> SchemaNormalizer<'a> {
    pub fn new(domain: &'a str, schema: &'a SchemaDescriptor) -> Self {
        SchemaNormalizer { domain, schema }
    }

    /// Every required column must be in the header. Reports all of the
    /// missing ones at once.
    pub fn validate_columns(&self, headers: &[String]) -> Result<()> {
        let missing: Vec<String> = self
            .schema
            .required_columns
            .iter()
            .filter(|required| !headers.iter().any(|h| h == *required))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::SchemaValidation {
                domain: self.domain.to_string(),
                missing,
            })
        }
    }

    /// All-or-nothing: either every row is normalized or none is
    pub fn normalize(&self, table: &Table) -> Result<Vec<NormalizedRow>> {
        self.validate_columns(&table.headers)?;

        Ok(table
            .rows
            .iter()
            .map(|row| self.normalize_row(&table.headers, row))
            .collect())
    }

    pub fn normalize_row(&self, headers: &[String], row: &TableRow) -> NormalizedRow {
        let mut raw = BTreeMap::new();
        let mut fields = BTreeMap::new();

        for (index, header) in headers.iter().enumerate() {
            let value = row.cells.get(index).cloned().unwrap_or_default();
            let canonical = self
                .schema
                .renames
                .get(header)
                .cloned()
                .unwrap_or_else(|| header.clone());

            // A renamed column wins over a same-named source column
            if canonical == *header && fields.contains_key(&canonical) {
                raw.insert(header.clone(), value);
                continue;
            }

            fields.insert(canonical, value.clone());
            raw.insert(header.clone(), value);
        }

        let mut normalized = NormalizedRow {
            line: row.line,
            fields,
            raw,
            name_synthesized: false,
        };
        self.apply_name_fallback(&mut normalized);
        normalized
    }

    /// Fill a blank `name`. Returns true only when it wrote a name; a row
    /// that already has one is left untouched.
    pub fn apply_name_fallback(&self, row: &mut NormalizedRow) -> bool {
        let Some(fallback) = &self.schema.name_fallback else {
            return false;
        };

        if row.get(FIELD_NAME).is_some() {
            return false;
        }

        let prefix = row.get(&fallback.prefix).unwrap_or_default();
        let suffix = row.get(&fallback.suffix).unwrap_or_default();
        let synthesized = format!("{} {}", prefix, suffix);

        if synthesized.trim().is_empty() {
            return false;
        }

        row.fields.insert(FIELD_NAME.to_string(), synthesized);
        row.name_synthesized = true;
        true
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn retail_schema() -> SchemaDescriptor {
        SchemaDescriptor::new(&["id", "retail_chain", "name", "address", "city"])
            .with_rename("city", "region")
            .with_name_fallback("retail_chain", "address")
    }

    fn table(data: &str) -> Table {
        Table::from_reader(data.as_bytes(), b',', PathBuf::from("mem.csv")).unwrap()
    }

    #[test]
    fn test_missing_columns_reported_together() {
        let schema = SchemaDescriptor::new(&["id", "name", "latitude", "longitude"]);
        let normalizer = SchemaNormalizer::new("retail", &schema);
        let table = table("id,name\n1,A\n");

        let result = normalizer.normalize(&table);
        match result {
            Err(Error::SchemaValidation { domain, missing }) => {
                assert_eq!(domain, "retail");
                assert_eq!(missing, vec!["latitude", "longitude"]);
            }
            other => panic!("expected SchemaValidation, got {:?}", other),
        }
    }

    #[test]
    fn test_rename_to_canonical() {
        let schema = retail_schema();
        let normalizer = SchemaNormalizer::new("retail", &schema);
        let table = table("id,retail_chain,name,address,city\n1,WinMart,WM Q1,1 Lê Lợi,Hồ Chí Minh\n");

        let rows = normalizer.normalize(&table).unwrap();
        assert_eq!(rows[0].get("region"), Some("Hồ Chí Minh"));
        assert!(rows[0].fields.get("city").is_none());
        assert_eq!(rows[0].raw.get("city").map(String::as_str), Some("Hồ Chí Minh"));
    }

    #[test]
    fn test_blank_name_is_synthesized() {
        let schema = retail_schema();
        let normalizer = SchemaNormalizer::new("retail", &schema);
        let table = table("id,retail_chain,name,address,city\n1,WinMart,  ,1 Lê Lợi,Hà Nội\n");

        let rows = normalizer.normalize(&table).unwrap();
        assert_eq!(rows[0].get("name"), Some("WinMart 1 Lê Lợi"));
        assert!(rows[0].name_synthesized);
    }

    #[test]
    fn test_synthesized_name_keeps_cells_verbatim() {
        let schema = retail_schema();
        let normalizer = SchemaNormalizer::new("retail", &schema);
        let table = table("id,retail_chain,name,address,city\n1,WinMart ,,1 Lê Lợi,Hà Nội\n");

        let rows = normalizer.normalize(&table).unwrap();
        assert_eq!(rows[0].get("name"), Some("WinMart  1 Lê Lợi"));
    }

    #[test]
    fn test_name_fallback_is_idempotent() {
        let schema = retail_schema();
        let normalizer = SchemaNormalizer::new("retail", &schema);
        let table = table("id,retail_chain,name,address,city\n1,WinMart,,1 Lê Lợi,Hà Nội\n");

        let mut rows = normalizer.normalize(&table).unwrap();
        let before = rows[0].clone();

        assert!(!normalizer.apply_name_fallback(&mut rows[0]));
        assert_eq!(rows[0], before);
    }

    #[test]
    fn test_present_name_is_kept() {
        let schema = retail_schema();
        let normalizer = SchemaNormalizer::new("retail", &schema);
        let table = table("id,retail_chain,name,address,city\n1,WinMart,WinMart Times City,1 Lê Lợi,Hà Nội\n");

        let rows = normalizer.normalize(&table).unwrap();
        assert_eq!(rows[0].get("name"), Some("WinMart Times City"));
        assert!(!rows[0].name_synthesized);
    }

    #[test]
    fn test_short_row_cells_are_blank() {
        let schema = SchemaDescriptor::new(&["id", "name"]);
        let normalizer = SchemaNormalizer::new("x", &schema);
        let table = table("id,name,extra\n1\n");

        let rows = normalizer.normalize(&table).unwrap();
        assert_eq!(rows[0].get("name"), None);
        assert_eq!(rows[0].raw.get("extra").map(String::as_str), Some(""));
    }
}
