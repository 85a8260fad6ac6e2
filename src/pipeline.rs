// 🔁 Pipeline - Normalize → Coordinates → Classify
// Builds the immutable backing set once per file load and caches it

use crate::coordinates::CoordinateParser;
use crate::domains::{DomainCatalog, DomainDescriptor};
use crate::entity::{Entity, FIELD_NAME, FIELD_REGION};
use crate::error::{Error, Result};
use crate::filter::FilterSpec;
use crate::ingest::Table;
use crate::rules::EntityClassifier;
use crate::schema::{NormalizedRow, SchemaNormalizer};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

// ============================================================================
// LOAD REPORT
// ============================================================================

/// What happened to the rows of one load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub rows: usize,
    pub located: usize,
    /// Rows with no position at all
    pub missing_location: usize,
    /// Rows whose position could not be parsed (kept, without location)
    pub coordinate_errors: usize,
    pub synthesized_names: usize,
}

// ============================================================================
// ENTITY BUILDING
// ============================================================================

/// Run every stage over a table. Fails only at the schema stage.
pub fn build_entities(descriptor: &DomainDescriptor, table: &Table) -> Result<(Vec<Entity>, LoadReport)> {
    let normalizer = SchemaNormalizer::new(&descriptor.name, &descriptor.schema);
    let rows = normalizer.normalize(table)?;

    let parser = CoordinateParser::new(descriptor.position.clone())
        .with_bounds_validation(descriptor.validate_bounds);
    let classifier = EntityClassifier::new(&descriptor.classification);

    let mut report = LoadReport {
        rows: rows.len(),
        ..LoadReport::default()
    };

    let entities = rows
        .iter()
        .map(|row| {
            let location = match parser.parse_row(row) {
                Ok(Some(location)) => {
                    report.located += 1;
                    Some(location)
                }
                Ok(None) => {
                    report.missing_location += 1;
                    None
                }
                Err(e) => {
                    debug!(domain = %descriptor.name, line = row.line, error = %e, "coordinate rejected");
                    report.coordinate_errors += 1;
                    None
                }
            };

            if row.name_synthesized {
                report.synthesized_names += 1;
            }

            let classification = classifier.classify(row);
            let id = entity_id(descriptor, row);

            Entity {
                name: match row.get(FIELD_NAME) {
                    Some(name) if row.name_synthesized => name.to_string(),
                    Some(name) => name.trim().to_string(),
                    None => id.clone(),
                },
                id,
                category: classification.category,
                subcategory: classification.subcategory,
                location,
                region: row.get(FIELD_REGION).map(|r| r.trim().to_string()),
                capacity: descriptor
                    .capacity_column
                    .as_deref()
                    .and_then(|column| row.get(column))
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .filter(|v| v.is_finite()),
                raw: row.raw.clone(),
            }
        })
        .collect();

    Ok((entities, report))
}

fn entity_id(descriptor: &DomainDescriptor, row: &NormalizedRow) -> String {
    descriptor
        .id_column
        .as_deref()
        .and_then(|column| row.get(column))
        .map(|id| id.trim().to_string())
        .unwrap_or_else(|| format!("row-{}", row.line))
}

// ============================================================================
// DATASET
// ============================================================================

/// The backing set for one domain. Never mutated; reloading builds a new one.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub domain: String,
    pub source: PathBuf,
    /// SHA-256 of the source bytes
    pub fingerprint: String,
    pub loaded_at: DateTime<Utc>,
    pub report: LoadReport,
    entities: Arc<[Entity]>,
}

impl Dataset {
    /// Read and process `data_dir/descriptor.file`
    pub fn load(descriptor: &DomainDescriptor, data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(&descriptor.file);
        let bytes = fs::read(&path).map_err(|source| Error::FileRead {
            path: path.clone(),
            source,
        })?;

        Self::from_bytes(descriptor, &bytes, path)
    }

    pub fn from_bytes(descriptor: &DomainDescriptor, bytes: &[u8], source: PathBuf) -> Result<Self> {
        let table = Table::from_reader(bytes, descriptor.delimiter_byte(), source.clone())?;
        let (entities, report) = build_entities(descriptor, &table)?;

        info!(
            domain = %descriptor.name,
            rows = report.rows,
            located = report.located,
            coordinate_errors = report.coordinate_errors,
            "dataset loaded"
        );

        Ok(Dataset {
            domain: descriptor.name.clone(),
            source,
            fingerprint: fingerprint(bytes),
            loaded_at: Utc::now(),
            report,
            entities: entities.into(),
        })
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Shared handle to the backing set
    pub fn shared(&self) -> Arc<[Entity]> {
        Arc::clone(&self.entities)
    }

    pub fn view(&self, spec: &FilterSpec) -> Vec<&Entity> {
        spec.apply(&self.entities)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// DATASET CACHE
// ============================================================================

/// Parse once per file version: a domain is rebuilt only when its source
/// bytes change. Readers get an `Arc` and never block each other.
pub struct DatasetCache {
    catalog: DomainCatalog,
    data_dir: PathBuf,
    datasets: RwLock<HashMap<String, Arc<Dataset>>>,
}

impl DatasetCache {
    pub fn new(catalog: DomainCatalog, data_dir: impl Into<PathBuf>) -> Self {
        DatasetCache {
            catalog,
            data_dir: data_dir.into(),
            datasets: RwLock::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &DomainCatalog {
        &self.catalog
    }

    /// Current dataset for a domain, reloading if the file changed
    pub fn get(&self, domain: &str) -> Result<Arc<Dataset>> {
        let descriptor = self.catalog.get(domain)?;
        let path = self.data_dir.join(&descriptor.file);
        let bytes = fs::read(&path).map_err(|source| Error::FileRead {
            path: path.clone(),
            source,
        })?;
        let current = fingerprint(&bytes);

        {
            let datasets = self.datasets.read().unwrap_or_else(|e| e.into_inner());
            if let Some(dataset) = datasets.get(domain) {
                if dataset.fingerprint == current {
                    return Ok(Arc::clone(dataset));
                }
            }
        }

        let dataset = Arc::new(Dataset::from_bytes(descriptor, &bytes, path)?);
        let mut datasets = self.datasets.write().unwrap_or_else(|e| e.into_inner());
        datasets.insert(domain.to_string(), Arc::clone(&dataset));

        Ok(dataset)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains;
    use crate::filter::{Field, FilterValue};
    use std::thread;

    const RETAIL: &str = "id,retail_chain,name,address,city,latitude,longitude\n\
        1,WinMart,WinMart Times City,458 Minh Khai,Hà Nội,20.995,105.868\n\
        2,Co.op Mart,,168 Nguyễn Đình Chiểu,Hồ Chí Minh,10.776,106.689\n\
        3,WinMart,WinMart Đà Nẵng,,Đà Nẵng,,\n\
        4,Bách Hóa Xanh,BHX 4,12 Trần Phú,Nha Trang,north,109.19\n";

    const POWER: &str = "Column1\ttype\tlatlng\tcapacity\n\
        Nhà máy điện gió Bạc Liêu\tĐiện gió\t\"9.25,105.72\"\t99\n\
        Nhà máy Thủy điện Hòa Bình\tThủy điện\t\"20.81,105.32\"\t1920\n\
        Nhà máy nhiệt điện Phả Lại\tNhiệt điện\tabc\t\n";

    fn load(descriptor: &DomainDescriptor, data: &str) -> Dataset {
        Dataset::from_bytes(descriptor, data.as_bytes(), PathBuf::from("mem")).unwrap()
    }

    #[test]
    fn test_retail_load_report() {
        let dataset = load(&domains::retail(), RETAIL);

        assert_eq!(
            dataset.report,
            LoadReport {
                rows: 4,
                located: 2,
                missing_location: 1,
                coordinate_errors: 1,
                synthesized_names: 1,
            }
        );
    }

    #[test]
    fn test_synthesized_name_reaches_entity_unchanged() {
        let data = "id,retail_chain,name,address,city,latitude,longitude\n\
            7,WinMart ,,1 Lê Lợi ,Hà Nội,21.0,105.8\n";
        let dataset = load(&domains::retail(), data);

        assert_eq!(dataset.entities()[0].name, "WinMart  1 Lê Lợi ");
    }

    #[test]
    fn test_rows_without_location_are_kept() {
        let dataset = load(&domains::retail(), RETAIL);

        assert_eq!(dataset.len(), 4);
        assert!(dataset.entities()[2].location.is_none());
        assert!(dataset.entities()[3].location.is_none());
    }

    #[test]
    fn test_retail_entities() {
        let dataset = load(&domains::retail(), RETAIL);
        let coop = &dataset.entities()[1];

        assert_eq!(coop.id, "2");
        assert_eq!(coop.name, "Co.op Mart 168 Nguyễn Đình Chiểu");
        assert_eq!(coop.category, "Co.op Mart");
        assert_eq!(coop.subcategory, "Co.op Mart");
        assert_eq!(coop.region.as_deref(), Some("Hồ Chí Minh"));
        assert_eq!(coop.raw_value("city"), Some("Hồ Chí Minh"));
    }

    #[test]
    fn test_power_plants_classified() {
        let dataset = load(&domains::power_plants(), POWER);
        let categories: Vec<&str> = dataset
            .entities()
            .iter()
            .map(|e| e.category.as_str())
            .collect();

        assert_eq!(categories, vec!["Wind", "Hydro", "Other"]);
        assert_eq!(dataset.entities()[0].id, "row-2");
        assert_eq!(dataset.entities()[1].capacity, Some(1920.0));
        assert_eq!(dataset.entities()[2].capacity, None);
        assert!(dataset.entities()[2].location.is_none());
    }

    #[test]
    fn test_schema_failure_produces_nothing() {
        let result = Dataset::from_bytes(
            &domains::industry(),
            b"id,name\n1,KCN VSIP\n",
            PathBuf::from("mem"),
        );

        match result {
            Err(Error::SchemaValidation { missing, .. }) => {
                assert!(missing.contains(&"investor".to_string()));
            }
            other => panic!("expected SchemaValidation, got {:?}", other),
        }
    }

    #[test]
    fn test_normalizing_twice_is_identical() {
        let first = load(&domains::retail(), RETAIL);
        let second = load(&domains::retail(), RETAIL);

        assert_eq!(first.entities(), second.entities());
        assert_eq!(first.fingerprint, second.fingerprint);
    }

    #[test]
    fn test_view_does_not_touch_backing_set() {
        let dataset = load(&domains::retail(), RETAIL);
        let spec = FilterSpec::match_all().with(Field::Category, FilterValue::exact("WinMart"));

        let view = dataset.view(&spec);
        assert_eq!(view.len(), 2);
        assert_eq!(dataset.len(), 4);
    }

    #[test]
    fn test_cache_reuses_until_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retail_chain_data.csv");
        fs::write(&path, RETAIL).unwrap();

        let cache = DatasetCache::new(DomainCatalog::builtin(), dir.path());
        let first = cache.get("retail").unwrap();
        let again = cache.get("retail").unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        fs::write(&path, "id,retail_chain,name,address,city,latitude,longitude\n9,X,Y,Z,Huế,16.46,107.59\n").unwrap();
        let reloaded = cache.get("retail").unwrap();
        assert!(!Arc::ptr_eq(&first, &reloaded));
        assert_eq!(reloaded.len(), 1);

        // old handles keep working
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn test_concurrent_views_over_shared_set() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("retail_chain_data.csv"), RETAIL).unwrap();

        let cache = DatasetCache::new(DomainCatalog::builtin(), dir.path());
        let dataset = cache.get("retail").unwrap();
        let before: Vec<Entity> = dataset.entities().to_vec();

        let specs = vec![
            FilterSpec::match_all(),
            FilterSpec::match_all().with(Field::Category, FilterValue::exact("WinMart")),
            FilterSpec::match_all().with(Field::Region, FilterValue::exact("Hồ Chí Minh")),
            FilterSpec::match_all().with(Field::Name, FilterValue::exact("winmart")),
        ];
        let sequential: Vec<Vec<String>> = specs
            .iter()
            .map(|spec| dataset.view(spec).iter().map(|e| e.id.clone()).collect())
            .collect();

        let concurrent: Vec<Vec<String>> = thread::scope(|scope| {
            let handles: Vec<_> = specs
                .iter()
                .map(|spec| {
                    let entities = dataset.shared();
                    scope.spawn(move || {
                        spec.apply(&entities)
                            .into_iter()
                            .map(|e| e.id.clone())
                            .collect::<Vec<String>>()
                    })
                })
                .collect();

            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(concurrent, sequential);
        assert_eq!(sequential[1], vec!["1", "3"]);
        assert_eq!(dataset.entities(), before.as_slice());
        assert!(Arc::ptr_eq(&dataset, &cache.get("retail").unwrap()));
    }

    #[test]
    fn test_cache_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DatasetCache::new(DomainCatalog::builtin(), dir.path());

        assert!(matches!(cache.get("banking"), Err(Error::FileRead { .. })));
        assert!(matches!(cache.get("nope"), Err(Error::UnknownDomain(_))));
    }
}
