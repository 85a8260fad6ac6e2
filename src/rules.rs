// 🏷️ Classification Rules - Rules as Data
// Keyword rules that derive an entity's category and sub-category

use crate::entity::{DEFAULT_CATEGORY, FIELD_SUB_TYPE};
use crate::error::{Error, Result};
use crate::schema::NormalizedRow;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Sub-category value meaning "no sub-category"
pub const SUBCATEGORY_NONE: &str = "none";

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Substring to look for (case-insensitive)
    pub keyword: String,

    /// Category assigned on match
    pub category: String,

    /// Priority (higher = applied first, equal keeps list order)
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    0
}

impl KeywordRule {
    pub fn new(keyword: &str, category: &str) -> Self {
        KeywordRule {
            keyword: keyword.to_string(),
            category: category.to_string(),
            priority: 0,
        }
    }

    /// `text_lower` must already be lower-cased
    fn matches_lowered(&self, text_lower: &str) -> bool {
        let keyword = self.keyword.to_lowercase();
        !keyword.is_empty() && text_lower.contains(&keyword)
    }

    pub fn matches(&self, text: &str) -> bool {
        self.matches_lowered(&text.to_lowercase())
    }
}

// ============================================================================
// DEFAULT POLICY
// ============================================================================

/// What to do when no rule matches. Domains disagree, so it is configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "label", rename_all = "snake_case")]
pub enum DefaultCategory {
    /// Always this label
    Literal(String),
    /// Keep the unclassified source text
    PassThrough,
}

impl Default for DefaultCategory {
    fn default() -> Self {
        DefaultCategory::Literal(DEFAULT_CATEGORY.to_string())
    }
}

// ============================================================================
// RULE ENGINE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<KeywordRule>,
}

impl RuleEngine {
    /// Create a new empty rule engine
    pub fn new() -> Self {
        RuleEngine { rules: Vec::new() }
    }

    /// Load rules from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let rules: Vec<KeywordRule> =
            serde_json::from_str(&content).map_err(|e| Error::Descriptor {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(RuleEngine::from_rules(rules))
    }

    /// Create engine from a list of rules
    pub fn from_rules(mut rules: Vec<KeywordRule>) -> Self {
        // Stable sort: equal priorities keep their list order
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        RuleEngine { rules }
    }

    /// Add a single rule
    pub fn add_rule(&mut self, rule: KeywordRule) {
        self.rules.push(rule);
        self.rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Category of the first matching rule
    pub fn classify(&self, text: &str) -> Option<&str> {
        let text_lower = text.to_lowercase();

        self.rules
            .iter()
            .find(|rule| rule.matches_lowered(&text_lower))
            .map(|rule| rule.category.as_str())
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    /// Get number of rules loaded
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

/// Per-domain classification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Canonical or source column holding the text to classify
    pub source_field: String,

    #[serde(default)]
    pub rules: Vec<KeywordRule>,

    #[serde(default)]
    pub default: DefaultCategory,

    /// Column with the source sub-classification, if the domain has one
    #[serde(default = "default_subcategory_field")]
    pub subcategory_field: Option<String>,

    /// JSON rule list appended after `rules`, relative to the descriptor file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<PathBuf>,
}

fn default_subcategory_field() -> Option<String> {
    Some(FIELD_SUB_TYPE.to_string())
}

impl ClassificationConfig {
    /// Merge the rules of `rules_file` into `rules`. Once loaded the file
    /// reference is cleared, so a second call does nothing.
    pub fn load_rules_file(&mut self, base_dir: &Path) -> Result<()> {
        let Some(file) = self.rules_file.take() else {
            return Ok(());
        };

        let engine = RuleEngine::from_file(base_dir.join(file))?;
        self.rules.extend(engine.rules().iter().cloned());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: String,
    pub subcategory: String,
}

pub struct EntityClassifier<'a> {
    config: &'a ClassificationConfig,
    engine: RuleEngine,
}

impl<'a> EntityClassifier<'a> {
    pub fn new(config: &'a ClassificationConfig) -> Self {
        EntityClassifier {
            engine: RuleEngine::from_rules(config.rules.clone()),
            config,
        }
    }

    /// Category for free text, applying the default policy on no match
    pub fn category_for(&self, text: Option<&str>) -> String {
        let text = text.map(str::trim).unwrap_or_default();

        if let Some(category) = self.engine.classify(text) {
            return category.to_string();
        }

        match &self.config.default {
            DefaultCategory::Literal(label) if !label.trim().is_empty() => label.clone(),
            DefaultCategory::PassThrough if !text.is_empty() => text.to_string(),
            _ => DEFAULT_CATEGORY.to_string(),
        }
    }

    /// Pure function of the row
    pub fn classify(&self, row: &NormalizedRow) -> Classification {
        let category = self.category_for(row.get(&self.config.source_field));

        let subcategory = self
            .config
            .subcategory_field
            .as_deref()
            .and_then(|field| row.get(field))
            .map(str::trim)
            .filter(|sub| !sub.eq_ignore_ascii_case(SUBCATEGORY_NONE))
            .map(str::to_string)
            .unwrap_or_else(|| category.clone());

        Classification {
            category,
            subcategory,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn energy_config(default: DefaultCategory) -> ClassificationConfig {
        ClassificationConfig {
            source_field: "type".to_string(),
            rules: vec![
                KeywordRule::new("mặt trời", "Solar"),
                KeywordRule::new("gió", "Wind"),
            ],
            default,
            subcategory_field: Some("sub_type".to_string()),
            rules_file: None,
        }
    }

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
    fn test_keyword_match_is_case_insensitive() {
        let rule = KeywordRule::new("GIÓ", "Wind");

        assert!(rule.matches("Nhà máy điện gió Bạc Liêu"));
        assert!(rule.matches("ĐIỆN GIÓ"));
        assert!(!rule.matches("Thủy điện Hòa Bình"));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let config = energy_config(DefaultCategory::default());
        let classifier = EntityClassifier::new(&config);

        assert_eq!(
            classifier.category_for(Some("Nhà máy điện gió mặt trời A")),
            "Solar"
        );
    }

    #[test]
    fn test_rule_priority() {
        let mut engine = RuleEngine::new();
        engine.add_rule(KeywordRule::new("điện", "Power"));
        engine.add_rule(KeywordRule {
            keyword: "thủy".to_string(),
            category: "Hydro".to_string(),
            priority: 10,
        });

        assert_eq!(engine.classify("Thủy điện Sơn La"), Some("Hydro"));
        assert_eq!(engine.rule_count(), 2);
    }

    #[test]
    fn test_default_literal() {
        let config = energy_config(DefaultCategory::Literal("Other".to_string()));
        let classifier = EntityClassifier::new(&config);

        assert_eq!(classifier.category_for(Some("Nhiệt điện than")), "Other");
    }

    #[test]
    fn test_default_pass_through() {
        let config = energy_config(DefaultCategory::PassThrough);
        let classifier = EntityClassifier::new(&config);

        assert_eq!(
            classifier.category_for(Some("Nhiệt điện than")),
            "Nhiệt điện than"
        );
        assert_eq!(classifier.category_for(None), "Other");
    }

    #[test]
    fn test_subcategory_falls_back_to_category() {
        let config = energy_config(DefaultCategory::default());
        let classifier = EntityClassifier::new(&config);

        let missing = classifier.classify(&row_with(&[("type", "Điện gió")]));
        assert_eq!(missing.subcategory, "Wind");

        let sentinel = classifier.classify(&row_with(&[("type", "Điện gió"), ("sub_type", "None")]));
        assert_eq!(sentinel.subcategory, "Wind");

        let given = classifier.classify(&row_with(&[("type", "Điện gió"), ("sub_type", "Offshore")]));
        assert_eq!(given.subcategory, "Offshore");
    }

    #[test]
    fn test_classification_is_pure() {
        let config = energy_config(DefaultCategory::default());
        let classifier = EntityClassifier::new(&config);
        let row = row_with(&[("type", "Điện mặt trời")]);

        assert_eq!(classifier.classify(&row), classifier.classify(&row));
    }

    #[test]
    fn test_rules_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("energy_rules.json");
        fs::write(
            &path,
            r#"[{"keyword": "than", "category": "Coal"}, {"keyword": "thủy", "category": "Hydro", "priority": 5}]"#,
        )
        .unwrap();

        let engine = RuleEngine::from_file(&path).unwrap();
        assert_eq!(engine.rule_count(), 2);
        assert_eq!(engine.classify("Nhiệt điện than Phả Lại"), Some("Coal"));
        assert_eq!(engine.rules()[0].category, "Hydro");
    }

    #[test]
    fn test_rules_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not a list").unwrap();

        assert!(matches!(
            RuleEngine::from_file(dir.path().join("absent.json")),
            Err(Error::FileRead { .. })
        ));
        assert!(matches!(
            RuleEngine::from_file(&broken),
            Err(Error::Descriptor { .. })
        ));
    }

    #[test]
    fn test_rules_file_merged_into_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("extra.json"),
            r#"[{"keyword": "than", "category": "Coal"}]"#,
        )
        .unwrap();

        let mut config = energy_config(DefaultCategory::default());
        config.rules_file = Some(PathBuf::from("extra.json"));
        config.load_rules_file(dir.path()).unwrap();

        assert_eq!(config.rules.len(), 3);
        assert!(config.rules_file.is_none());

        let classifier = EntityClassifier::new(&config);
        assert_eq!(classifier.category_for(Some("Nhiệt điện than")), "Coal");
        assert_eq!(classifier.category_for(Some("Điện gió")), "Wind");

        config.load_rules_file(dir.path()).unwrap();
        assert_eq!(config.rules.len(), 3);
    }

    #[test]
    fn test_rules_from_json() {
        let json = r#"[{"keyword": "gió", "category": "Wind"}, {"keyword": "thủy", "category": "Hydro", "priority": 5}]"#;
        let rules: Vec<KeywordRule> = serde_json::from_str(json).unwrap();
        let engine = RuleEngine::from_rules(rules);

        assert_eq!(engine.rules()[0].category, "Hydro");
    }
}
