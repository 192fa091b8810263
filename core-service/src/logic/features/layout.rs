//! Feature Layout - Schema Registry
//!
//! **CRITICAL: This file controls the feature schema**
//!
//! ## Rules (NEVER break these):
//! 1. Add feature → increment schema version
//! 2. Change order → increment schema version
//! 3. Remove feature → increment schema version
//!
//! Thứ tự cột phải khớp tuyệt đối với thứ tự lúc train classifier.
//! Schema được load một lần lúc startup, sau đó read-only.

use std::collections::{BTreeMap, HashMap, HashSet};

use crc32fast::Hasher;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::canonical::{CategoricalField, NumericField};

// ============================================================================
// DEFAULT LAYOUT (stroke model v1)
// ============================================================================

/// Default schema version
pub const DEFAULT_SCHEMA_VERSION: u8 = 1;

/// Feature names in the exact order the default classifier was trained on
pub const DEFAULT_FEATURE_LAYOUT: &[&str] = &[
    // === Numeric (0-5) ===
    "age",
    "hypertension",
    "heart_disease",
    "avg_glucose_level",
    "bmi",
    "ever_married",
    // === Gender (6-7) ===
    "female",
    "male",
    // === Work type (8-12) ===
    "private_work",
    "self_employed",
    "government_work",
    "children_work",
    "never_worked",
    // === Residence (13-14) ===
    "urban_resident",
    "rural_resident",
    // === Smoking (15-18) ===
    "formerly_smoked",
    "never_smoked",
    "smokes",
    "smoking_unknown",
];

/// Continuous features; also the subset a 3-wide scaler normalizes
pub const DEFAULT_CONTINUOUS: &[&str] = &["age", "avg_glucose_level", "bmi"];

pub const DEFAULT_CLASS_NAMES: [&str; 2] = ["No Stroke", "Stroke"];

static DEFAULT_SCHEMA: Lazy<FeatureSchema> = Lazy::new(|| {
    FeatureSchema::from_document(SchemaDocument::default_layout())
        .expect("built-in feature schema is valid")
});

// ============================================================================
// SCHEMA DOCUMENT (on-disk shape)
// ============================================================================

/// How a categorical field becomes columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "encoding", rename_all = "snake_case")]
pub enum CategoricalEncoding {
    /// canonical label → column; exactly one column is 1
    OneHot {
        field: CategoricalField,
        columns: BTreeMap<String, String>,
    },
    /// single 0/1 column, 1 when the field equals `positive`
    Flag {
        field: CategoricalField,
        column: String,
        positive: String,
    },
}

impl CategoricalEncoding {
    pub fn field(&self) -> CategoricalField {
        match self {
            CategoricalEncoding::OneHot { field, .. } => *field,
            CategoricalEncoding::Flag { field, .. } => *field,
        }
    }
}

/// Schema metadata as stored next to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default = "default_version")]
    pub version: u8,
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub continuous: Vec<String>,
    /// Columns a subset-width scaler normalizes; defaults to `continuous`
    #[serde(default)]
    pub scaled: Option<Vec<String>>,
    #[serde(default)]
    pub categorical: Vec<CategoricalEncoding>,
    #[serde(default = "default_class_names")]
    pub class_names: Vec<String>,
}

fn default_version() -> u8 {
    DEFAULT_SCHEMA_VERSION
}

fn default_class_names() -> Vec<String> {
    DEFAULT_CLASS_NAMES.iter().map(|s| s.to_string()).collect()
}

fn one_hot(field: CategoricalField, pairs: &[(&str, &str)]) -> CategoricalEncoding {
    CategoricalEncoding::OneHot {
        field,
        columns: pairs
            .iter()
            .map(|(label, column)| (label.to_string(), column.to_string()))
            .collect(),
    }
}

impl SchemaDocument {
    pub fn default_layout() -> Self {
        Self {
            version: DEFAULT_SCHEMA_VERSION,
            feature_names: DEFAULT_FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
            continuous: DEFAULT_CONTINUOUS.iter().map(|s| s.to_string()).collect(),
            scaled: None,
            categorical: vec![
                one_hot(CategoricalField::Gender, &[("Female", "female"), ("Male", "male")]),
                one_hot(
                    CategoricalField::WorkType,
                    &[
                        ("Private", "private_work"),
                        ("Self-employed", "self_employed"),
                        ("Govt_job", "government_work"),
                        ("children", "children_work"),
                        ("Never_worked", "never_worked"),
                    ],
                ),
                one_hot(
                    CategoricalField::ResidenceType,
                    &[("Urban", "urban_resident"), ("Rural", "rural_resident")],
                ),
                one_hot(
                    CategoricalField::SmokingStatus,
                    &[
                        ("formerly smoked", "formerly_smoked"),
                        ("never smoked", "never_smoked"),
                        ("smokes", "smokes"),
                        ("Unknown", "smoking_unknown"),
                    ],
                ),
                CategoricalEncoding::Flag {
                    field: CategoricalField::EverMarried,
                    column: "ever_married".to_string(),
                    positive: "Yes".to_string(),
                },
            ],
            class_names: default_class_names(),
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("schema has no features")]
    Empty,
    #[error("duplicate feature column '{0}'")]
    DuplicateColumn(String),
    #[error("column '{0}' is referenced but not in feature_names")]
    UnknownColumn(String),
    #[error("field '{0}' is encoded more than once")]
    DuplicateField(&'static str),
    #[error("one-hot group '{field}' does not cover label '{label}'")]
    UncoveredLabel { field: &'static str, label: String },
    #[error("'{label}' is not a label of field '{field}'")]
    UnknownLabel { field: &'static str, label: String },
    #[error("column '{0}' is claimed by more than one encoding")]
    SharedColumn(String),
    #[error("expected 2 class names, got {0}")]
    ClassNames(usize),
}

// ============================================================================
// FEATURE SCHEMA (validated, read-only)
// ============================================================================

/// Role of a column, used by the explainer's sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Continuous,
    /// Member of the one-hot group with this index
    OneHot(usize),
    /// Any other discrete column (flags, 0/1 numerics)
    Discrete,
}

#[derive(Debug, Clone)]
pub struct FeatureSchema {
    version: u8,
    names: Vec<String>,
    index: HashMap<String, usize>,
    continuous: Vec<usize>,
    scaled: Vec<usize>,
    encodings: Vec<CategoricalEncoding>,
    /// Column indices of each one-hot group
    groups: Vec<Vec<usize>>,
    kinds: Vec<FeatureKind>,
    class_names: [String; 2],
    layout_hash: u32,
}

impl FeatureSchema {
    /// Built-in stroke layout
    pub fn default_schema() -> Self {
        DEFAULT_SCHEMA.clone()
    }

    pub fn from_document(doc: SchemaDocument) -> Result<Self, SchemaError> {
        if doc.feature_names.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut index = HashMap::with_capacity(doc.feature_names.len());
        for (i, name) in doc.feature_names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateColumn(name.clone()));
            }
        }

        let lookup = |name: &String| -> Result<usize, SchemaError> {
            index
                .get(name)
                .copied()
                .ok_or_else(|| SchemaError::UnknownColumn(name.clone()))
        };

        let continuous = doc.continuous.iter().map(lookup).collect::<Result<Vec<_>, _>>()?;
        let scaled = match &doc.scaled {
            Some(cols) => cols.iter().map(lookup).collect::<Result<Vec<_>, _>>()?,
            None => continuous.clone(),
        };

        let mut kinds = vec![FeatureKind::Discrete; doc.feature_names.len()];
        for &i in &continuous {
            kinds[i] = FeatureKind::Continuous;
        }

        let mut seen_fields = HashSet::new();
        let mut claimed = HashSet::new();
        let mut groups = Vec::new();

        for encoding in &doc.categorical {
            let field = encoding.field();
            if !seen_fields.insert(field) {
                return Err(SchemaError::DuplicateField(field.key()));
            }
            let labels = field.labels();

            match encoding {
                CategoricalEncoding::OneHot { columns, .. } => {
                    for label in columns.keys() {
                        if !labels.contains(&label.as_str()) {
                            return Err(SchemaError::UnknownLabel { field: field.key(), label: label.clone() });
                        }
                    }
                    let mut members = Vec::with_capacity(labels.len());
                    for label in &labels {
                        let column = columns.get(*label).ok_or_else(|| SchemaError::UncoveredLabel {
                            field: field.key(),
                            label: label.to_string(),
                        })?;
                        let i = lookup(column)?;
                        if !claimed.insert(i) {
                            return Err(SchemaError::SharedColumn(column.clone()));
                        }
                        kinds[i] = FeatureKind::OneHot(groups.len());
                        members.push(i);
                    }
                    groups.push(members);
                }
                CategoricalEncoding::Flag { column, positive, .. } => {
                    if !labels.contains(&positive.as_str()) {
                        return Err(SchemaError::UnknownLabel { field: field.key(), label: positive.clone() });
                    }
                    let i = lookup(column)?;
                    if !claimed.insert(i) {
                        return Err(SchemaError::SharedColumn(column.clone()));
                    }
                    kinds[i] = FeatureKind::Discrete;
                }
            }
        }

        let class_names = match doc.class_names.as_slice() {
            [negative, positive] => [negative.clone(), positive.clone()],
            other => return Err(SchemaError::ClassNames(other.len())),
        };

        let layout_hash = compute_layout_hash(doc.version, &doc.feature_names);

        Ok(Self {
            version: doc.version,
            names: doc.feature_names,
            index,
            continuous,
            scaled,
            encodings: doc.categorical,
            groups,
            kinds,
            class_names,
            layout_hash,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn layout_hash(&self) -> u32 {
        self.layout_hash
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Get feature index by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Get feature name by index
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn kind(&self, index: usize) -> Option<FeatureKind> {
        self.kinds.get(index).copied()
    }

    pub fn continuous_indices(&self) -> &[usize] {
        &self.continuous
    }

    pub fn scaled_indices(&self) -> &[usize] {
        &self.scaled
    }

    pub fn encodings(&self) -> &[CategoricalEncoding] {
        &self.encodings
    }

    pub fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }

    pub fn numeric_column(&self, field: NumericField) -> Option<usize> {
        self.index_of(field.key())
    }

    pub fn class_name(&self, class: u8) -> &str {
        &self.class_names[usize::from(class.min(1))]
    }

    pub fn info(&self) -> LayoutInfo {
        LayoutInfo {
            version: self.version,
            hash: self.layout_hash,
            feature_count: self.len(),
            feature_names: self.names.clone(),
        }
    }

    /// Validate that data tagged with (version, hash) matches this layout
    pub fn validate_layout(&self, version: u8, hash: u32) -> Result<(), LayoutMismatchError> {
        if version != self.version || hash != self.layout_hash {
            return Err(LayoutMismatchError {
                expected_version: self.version,
                expected_hash: self.layout_hash,
                actual_version: version,
                actual_hash: hash,
            });
        }
        Ok(())
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::default_schema()
    }
}

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// CRC32 over version + ordered names. Used to detect layout mismatches at runtime.
pub fn compute_layout_hash(version: u8, names: &[String]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[version]);
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update(&[0]); // Separator
    }
    hasher.finalize()
}

/// Complete layout information for serialization/logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
}

/// Error when feature layout doesn't match expected
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "Feature layout mismatch: expected v{expected_version} (hash: {expected_hash:08x}), got v{actual_version} (hash: {actual_hash:08x})"
)]
pub struct LayoutMismatchError {
    pub expected_version: u8,
    pub expected_hash: u32,
    pub actual_version: u8,
    pub actual_hash: u32,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema_shape() {
        let schema = FeatureSchema::default_schema();
        assert_eq!(schema.len(), 19);
        assert_eq!(schema.len(), DEFAULT_FEATURE_LAYOUT.len());
        assert_eq!(schema.groups().len(), 4);
        assert_eq!(schema.continuous_indices(), &[0, 3, 4]);
        assert_eq!(schema.scaled_indices(), schema.continuous_indices());
    }

    #[test]
    fn test_feature_index() {
        let schema = FeatureSchema::default_schema();
        assert_eq!(schema.index_of("age"), Some(0));
        assert_eq!(schema.index_of("smoking_unknown"), Some(18));
        assert_eq!(schema.index_of("nonexistent"), None);
        assert_eq!(schema.name(7), Some("male"));
        assert_eq!(schema.name(100), None);
    }

    #[test]
    fn test_feature_kinds() {
        let schema = FeatureSchema::default_schema();
        assert_eq!(schema.kind(0), Some(FeatureKind::Continuous));
        assert_eq!(schema.kind(1), Some(FeatureKind::Discrete));
        assert_eq!(schema.kind(5), Some(FeatureKind::Discrete));
        assert!(matches!(schema.kind(17), Some(FeatureKind::OneHot(_))));
    }

    #[test]
    fn test_layout_hash_consistency() {
        let a = FeatureSchema::default_schema();
        let b = FeatureSchema::from_document(SchemaDocument::default_layout()).unwrap();
        assert_eq!(a.layout_hash(), b.layout_hash());
        assert_ne!(a.layout_hash(), 0);
    }

    #[test]
    fn test_layout_hash_changes_with_order() {
        let mut doc = SchemaDocument::default_layout();
        doc.feature_names.swap(0, 1);
        let swapped = FeatureSchema::from_document(doc).unwrap();
        assert_ne!(swapped.layout_hash(), FeatureSchema::default_schema().layout_hash());
    }

    #[test]
    fn test_validate_layout() {
        let schema = FeatureSchema::default_schema();
        assert!(schema.validate_layout(schema.version(), schema.layout_hash()).is_ok());
        assert!(schema.validate_layout(schema.version() + 1, schema.layout_hash()).is_err());
        assert!(schema.validate_layout(schema.version(), schema.layout_hash() ^ 1).is_err());
    }

    #[test]
    fn test_rejects_uncovered_label() {
        let mut doc = SchemaDocument::default_layout();
        if let Some(CategoricalEncoding::OneHot { columns, .. }) = doc.categorical.get_mut(3) {
            columns.remove("Unknown");
        }
        let err = FeatureSchema::from_document(doc).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UncoveredLabel { field: "smoking_status", label: "Unknown".to_string() }
        );
    }

    #[test]
    fn test_rejects_unknown_column() {
        let mut doc = SchemaDocument::default_layout();
        doc.continuous.push("cholesterol".to_string());
        assert_eq!(
            FeatureSchema::from_document(doc).unwrap_err(),
            SchemaError::UnknownColumn("cholesterol".to_string())
        );
    }

    #[test]
    fn test_rejects_duplicate_column() {
        let mut doc = SchemaDocument::default_layout();
        doc.feature_names.push("age".to_string());
        assert_eq!(
            FeatureSchema::from_document(doc).unwrap_err(),
            SchemaError::DuplicateColumn("age".to_string())
        );
    }

    #[test]
    fn test_document_json_shape() {
        let json = serde_json::json!({
            "version": 2,
            "feature_names": ["age", "bmi", "smokes", "non_smoker"],
            "continuous": ["age", "bmi"],
            "categorical": [
                {
                    "encoding": "one_hot",
                    "field": "smoking_status",
                    "columns": {
                        "formerly smoked": "non_smoker",
                        "never smoked": "non_smoker",
                        "smokes": "smokes",
                        "Unknown": "non_smoker"
                    }
                }
            ]
        });
        let doc: SchemaDocument = serde_json::from_value(json).unwrap();
        // Several labels sharing one column breaks one-hot exclusivity
        assert_eq!(
            FeatureSchema::from_document(doc).unwrap_err(),
            SchemaError::SharedColumn("non_smoker".to_string())
        );
    }
}
