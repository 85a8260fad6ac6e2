// 🗂️ Domain Catalog
// One descriptor per facility dataset; the pipeline itself knows no domain

use crate::coordinates::PositionSource;
use crate::entity::{FIELD_NAME, FIELD_REGION};
use crate::error::{Error, Result};
use crate::filter::Field;
use crate::rules::{ClassificationConfig, DefaultCategory, KeywordRule};
use crate::schema::SchemaDescriptor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainDescriptor {
    /// Stable key, e.g. `retail`
    pub name: String,

    /// Human-readable title
    pub title: String,

    /// File name relative to the data directory
    pub file: String,

    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    pub schema: SchemaDescriptor,

    pub position: PositionSource,

    pub classification: ClassificationConfig,

    #[serde(default)]
    pub id_column: Option<String>,

    #[serde(default)]
    pub capacity_column: Option<String>,

    /// Reject out-of-range coordinates instead of accepting them
    #[serde(default)]
    pub validate_bounds: bool,

    /// Columns shown in tabular views
    #[serde(default)]
    pub display_columns: Vec<String>,

    /// Fields offered as dropdown filters
    #[serde(default)]
    pub filter_fields: Vec<Field>,
}

fn default_delimiter() -> char {
    ','
}

impl DomainDescriptor {
    /// Field separator as the byte the csv reader expects
    pub fn delimiter_byte(&self) -> u8 {
        if self.delimiter.is_ascii() {
            self.delimiter as u8
        } else {
            b','
        }
    }
}

// ============================================================================
// BUILT-IN DOMAINS
// ============================================================================

pub fn power_plants() -> DomainDescriptor {
    DomainDescriptor {
        name: "power_plants".to_string(),
        title: "Nhà máy điện".to_string(),
        file: "power_plants.tsv".to_string(),
        delimiter: '\t',
        schema: SchemaDescriptor::new(&["Column1", "type", "latlng"])
            .with_rename("Column1", FIELD_NAME),
        position: PositionSource::combined("latlng"),
        classification: ClassificationConfig {
            source_field: "type".to_string(),
            rules: vec![
                KeywordRule::new("mặt trời", "Solar"),
                KeywordRule::new("gió", "Wind"),
                KeywordRule::new("thủy", "Hydro"),
            ],
            default: DefaultCategory::Literal("Other".to_string()),
            subcategory_field: Some("sub_type".to_string()),
            rules_file: None,
        },
        id_column: None,
        capacity_column: Some("capacity".to_string()),
        validate_bounds: false,
        display_columns: columns(&["name", "category", "subcategory", "capacity", "latitude", "longitude"]),
        filter_fields: vec![Field::Category, Field::Region],
    }
}

pub fn retail() -> DomainDescriptor {
    DomainDescriptor {
        name: "retail".to_string(),
        title: "Cơ sở bán lẻ".to_string(),
        file: "retail_chain_data.csv".to_string(),
        delimiter: ',',
        schema: SchemaDescriptor::new(&[
            "id",
            "retail_chain",
            "name",
            "address",
            "city",
            "latitude",
            "longitude",
        ])
        .with_rename("city", FIELD_REGION)
        .with_name_fallback("retail_chain", "address"),
        position: PositionSource::pair("latitude", "longitude"),
        classification: pass_through("retail_chain"),
        id_column: Some("id".to_string()),
        capacity_column: None,
        validate_bounds: false,
        display_columns: columns(&[
            "id",
            "retail_chain",
            "name",
            "address",
            "region",
            "latitude",
            "longitude",
        ]),
        filter_fields: vec![Field::Region, Field::Category],
    }
}

pub fn banking() -> DomainDescriptor {
    DomainDescriptor {
        name: "banking".to_string(),
        title: "Cơ sở ngân hàng".to_string(),
        file: "banking_data.csv".to_string(),
        delimiter: ',',
        schema: SchemaDescriptor::new(&[
            "id",
            "bank",
            "bank_name",
            "name",
            "address",
            "city",
            "latitude",
            "longitude",
        ])
        .with_rename("city", FIELD_REGION)
        .with_name_fallback("bank_name", "address"),
        position: PositionSource::pair("latitude", "longitude"),
        classification: pass_through("bank"),
        id_column: Some("id".to_string()),
        capacity_column: None,
        validate_bounds: false,
        display_columns: columns(&[
            "id",
            "bank",
            "bank_name",
            "name",
            "region",
            "latitude",
            "longitude",
        ]),
        filter_fields: vec![Field::Region, Field::Category],
    }
}

pub fn industry() -> DomainDescriptor {
    DomainDescriptor {
        name: "industry".to_string(),
        title: "Khu công nghiệp".to_string(),
        file: "kcn.csv".to_string(),
        delimiter: ',',
        schema: SchemaDescriptor::new(&[
            "id",
            "name",
            "address",
            "city",
            "investor",
            "latitude",
            "longitude",
        ])
        .with_rename("city", FIELD_REGION),
        position: PositionSource::pair("latitude", "longitude"),
        classification: pass_through("investor"),
        id_column: Some("id".to_string()),
        capacity_column: None,
        validate_bounds: false,
        display_columns: columns(&["id", "name", "address", "region", "latitude", "longitude"]),
        filter_fields: vec![Field::Region, Field::Category],
    }
}

fn pass_through(source_field: &str) -> ClassificationConfig {
    ClassificationConfig {
        source_field: source_field.to_string(),
        rules: Vec::new(),
        default: DefaultCategory::PassThrough,
        subcategory_field: Some("sub_type".to_string()),
        rules_file: None,
    }
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

// ============================================================================
// CATALOG
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DomainCatalog {
    domains: Vec<DomainDescriptor>,
}

impl DomainCatalog {
    pub fn builtin() -> Self {
        DomainCatalog {
            domains: vec![power_plants(), retail(), banking(), industry()],
        }
    }

    pub fn new(domains: Vec<DomainDescriptor>) -> Self {
        DomainCatalog { domains }
    }

    /// Load descriptors from a JSON array
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let mut domains: Vec<DomainDescriptor> =
            serde_json::from_str(&content).map_err(|e| Error::Descriptor {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        for domain in &mut domains {
            domain.classification.load_rules_file(base_dir)?;
        }

        Ok(DomainCatalog { domains })
    }

    pub fn get(&self, name: &str) -> Result<&DomainDescriptor> {
        self.domains
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| Error::UnknownDomain(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.domains.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DomainDescriptor> {
        self.domains.iter()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl Default for DomainCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let catalog = DomainCatalog::builtin();

        assert_eq!(
            catalog.names(),
            vec!["power_plants", "retail", "banking", "industry"]
        );
        assert_eq!(catalog.get("retail").unwrap().delimiter_byte(), b',');
        assert_eq!(catalog.get("power_plants").unwrap().delimiter_byte(), b'\t');
    }

    #[test]
    fn test_unknown_domain() {
        let catalog = DomainCatalog::builtin();
        assert!(matches!(catalog.get("airports"), Err(Error::UnknownDomain(_))));
    }

    #[test]
    fn test_descriptor_json_roundtrip() {
        let original = banking();
        let json = serde_json::to_string(&original).unwrap();
        let parsed: DomainDescriptor = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, original);
    }

    #[test]
    fn test_catalog_file_loads_rules_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("plant_rules.json"),
            r#"[{"keyword": "than", "category": "Coal"}]"#,
        )
        .unwrap();

        let mut plants = power_plants();
        plants.classification.rules_file = Some("plant_rules.json".into());
        let catalog_path = dir.path().join("domains.json");
        fs::write(&catalog_path, serde_json::to_string(&vec![plants]).unwrap()).unwrap();

        let catalog = DomainCatalog::from_file(&catalog_path).unwrap();
        let classification = &catalog.get("power_plants").unwrap().classification;

        assert_eq!(classification.rules.len(), 4);
        assert_eq!(classification.rules[3].category, "Coal");
        assert!(classification.rules_file.is_none());
    }

    #[test]
    fn test_catalog_file_missing_rules_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut plants = power_plants();
        plants.classification.rules_file = Some("absent.json".into());
        let catalog_path = dir.path().join("domains.json");
        fs::write(&catalog_path, serde_json::to_string(&vec![plants]).unwrap()).unwrap();

        assert!(matches!(
            DomainCatalog::from_file(&catalog_path),
            Err(Error::FileRead { .. })
        ));
    }

    #[test]
    fn test_descriptor_json_defaults() {
        let json = r#"{
            "name": "ports",
            "title": "Ports",
            "file": "ports.csv",
            "schema": { "required_columns": ["name", "latlng"] },
            "position": { "kind": "combined", "column": "latlng" },
            "classification": { "source_field": "name" }
        }"#;

        let parsed: DomainDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.delimiter, ',');
        assert_eq!(parsed.classification.default, DefaultCategory::Literal("Other".to_string()));
        assert!(!parsed.validate_bounds);
        assert!(parsed.filter_fields.is_empty());
    }
}
