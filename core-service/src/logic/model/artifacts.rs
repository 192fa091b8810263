//! Artifact Loader
//!
//! Tìm classifier / scaler / schema / reference sample trong các thư mục ứng viên
//! (file đầu tiên tồn tại thắng), decode theo đúng một strategy cho mỗi loại.
//! Thiếu classifier → scoring tắt; thiếu reference sample → chỉ explanation tắt.

use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::inference::{LabelRules, LogisticModel, OnnxClassifier, RiskClassifier};
use super::scaler::Scaler;
use crate::constants;
use crate::logic::explain::ReferenceSample;
use crate::logic::features::{FeatureSchema, SchemaDocument};

// ============================================================================
// ERRORS & STATUS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArtifactError {
    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },
    #[error("cannot decode {path}: {message}")]
    Decode { path: String, message: String },
    #[error("unsupported artifact: {0}")]
    Unsupported(String),
    #[error("invalid artifact {path}: {message}")]
    Invalid { path: String, message: String },
}

/// Outcome of one artifact lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArtifactStatus {
    Loaded { path: String, sha256: String },
    Missing,
    Failed { path: String, error: String },
}

impl ArtifactStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ArtifactStatus::Loaded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub model: ArtifactStatus,
    pub scaler: ArtifactStatus,
    pub schema: ArtifactStatus,
    pub reference_sample: ArtifactStatus,
}

impl Default for LoadReport {
    fn default() -> Self {
        Self {
            model: ArtifactStatus::Missing,
            scaler: ArtifactStatus::Missing,
            schema: ArtifactStatus::Missing,
            reference_sample: ArtifactStatus::Missing,
        }
    }
}

/// Everything found at startup. Absent pieces are `None`; the schema falls back to the built-in one.
pub struct LoadResult {
    pub classifier: Option<Box<dyn RiskClassifier>>,
    pub scaler: Option<Scaler>,
    pub schema: FeatureSchema,
    pub reference: Option<ReferenceSample>,
    pub report: LoadReport,
}

// ============================================================================
// PATHS
// ============================================================================

/// Artifact file names and the directories they are searched in
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub search_dirs: Vec<PathBuf>,
    /// Classifier candidates, in preference order
    pub model_files: Vec<String>,
    pub scaler_file: String,
    pub schema_file: String,
    pub reference_file: String,
}

impl ArtifactPaths {
    /// Defaults overridden by `MODEL_PATH`, `SCALER_PATH`, `SCHEMA_PATH`,
    /// `REFERENCE_SAMPLE_PATH` and `ARTIFACT_DIR`
    pub fn from_env() -> Self {
        Self {
            search_dirs: constants::get_search_dirs().into_iter().map(PathBuf::from).collect(),
            model_files: constants::get_model_files(),
            scaler_file: constants::get_scaler_file(),
            schema_file: constants::get_schema_file(),
            reference_file: constants::get_reference_file(),
        }
    }

    /// Default file names, searched only in `dir`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            search_dirs: vec![dir.into()],
            model_files: constants::DEFAULT_MODEL_FILES.iter().map(|s| s.to_string()).collect(),
            scaler_file: constants::DEFAULT_SCALER_FILE.to_string(),
            schema_file: constants::DEFAULT_SCHEMA_FILE.to_string(),
            reference_file: constants::DEFAULT_REFERENCE_FILE.to_string(),
        }
    }

    /// First existing location of `file`. Absolute paths are tried as is.
    pub fn resolve(&self, file: &str) -> Option<PathBuf> {
        let path = Path::new(file);
        if path.is_absolute() {
            return path.is_file().then(|| path.to_path_buf());
        }
        self.search_dirs
            .iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.is_file())
    }

    fn resolve_model(&self) -> Option<PathBuf> {
        self.model_files.iter().find_map(|file| self.resolve(file))
    }
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::from_env()
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Load every artifact. Never fails: each outcome is recorded in the report.
pub fn load_artifacts(paths: &ArtifactPaths) -> LoadResult {
    let mut report = LoadReport::default();

    let schema = match load_one(paths.resolve(&paths.schema_file), load_schema, "feature schema") {
        (Some(schema), status) => {
            report.schema = status;
            schema
        }
        (None, status) => {
            report.schema = status;
            log::info!("Using built-in feature schema");
            FeatureSchema::default_schema()
        }
    };

    let (scaler, status) = load_one(paths.resolve(&paths.scaler_file), load_scaler, "scaler");
    report.scaler = status;

    let (classifier, status) = load_one(
        paths.resolve_model(),
        |path| load_classifier(path, &schema),
        "classifier",
    );
    report.model = status;
    if classifier.is_none() {
        log::warn!("No classifier loaded; scoring is disabled");
    }

    let (reference, status) = load_one(
        paths.resolve(&paths.reference_file),
        |path| load_reference(path, &schema),
        "reference sample",
    );
    report.reference_sample = status;
    if reference.is_none() {
        log::warn!("No reference sample loaded; explanations are disabled");
    }

    LoadResult {
        classifier,
        scaler,
        schema,
        reference,
        report,
    }
}

fn load_one<T>(
    path: Option<PathBuf>,
    decode: impl FnOnce(&Path) -> Result<T, ArtifactError>,
    what: &str,
) -> (Option<T>, ArtifactStatus) {
    let Some(path) = path else {
        log::info!("No {} artifact found", what);
        return (None, ArtifactStatus::Missing);
    };
    let display = path.display().to_string();

    let result = decode(&path).and_then(|value| {
        let sha256 = compute_file_hash(&path).map_err(|e| ArtifactError::Io {
            path: display.clone(),
            message: e.to_string(),
        })?;
        Ok((value, sha256))
    });

    match result {
        Ok((value, sha256)) => {
            log::info!("Loaded {} from {} (sha256 {})", what, display, &sha256[..12]);
            (Some(value), ArtifactStatus::Loaded { path: display, sha256 })
        }
        Err(e) => {
            log::warn!("Failed to load {} from {}: {}", what, display, e);
            (None, ArtifactStatus::Failed { path: display, error: e.to_string() })
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let text = std::fs::read_to_string(path).map_err(|e| ArtifactError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| ArtifactError::Decode {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn invalid(path: &Path, message: impl ToString) -> ArtifactError {
    ArtifactError::Invalid {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}

fn load_schema(path: &Path) -> Result<FeatureSchema, ArtifactError> {
    let doc: SchemaDocument = read_json(path)?;
    FeatureSchema::from_document(doc).map_err(|e| invalid(path, e))
}

fn load_scaler(path: &Path) -> Result<Scaler, ArtifactError> {
    let scaler: Scaler = read_json(path)?;
    scaler.validate().map_err(|e| invalid(path, e))?;
    Ok(scaler)
}

/// JSON classifier shapes, keyed by `kind`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JsonClassifier {
    LogisticRegression(LogisticModel),
    LabelRules(LabelRules),
}

const JSON_CLASSIFIER_KINDS: &[&str] = &["logistic_regression", "label_rules"];

fn load_classifier(path: &Path, schema: &FeatureSchema) -> Result<Box<dyn RiskClassifier>, ArtifactError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let classifier: Box<dyn RiskClassifier> = match extension.as_str() {
        "onnx" => Box::new(OnnxClassifier::from_file(path).map_err(|e| invalid(path, e))?),
        "json" => {
            let value: serde_json::Value = read_json(path)?;
            let kind = value.get("kind").and_then(|k| k.as_str()).unwrap_or("<none>");
            if !JSON_CLASSIFIER_KINDS.contains(&kind) {
                return Err(ArtifactError::Unsupported(format!(
                    "classifier kind '{}' in {}",
                    kind,
                    path.display()
                )));
            }
            let decoded: JsonClassifier = serde_json::from_value(value).map_err(|e| ArtifactError::Decode {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            match decoded {
                JsonClassifier::LogisticRegression(model) => Box::new(model),
                JsonClassifier::LabelRules(rules) => Box::new(rules),
            }
        }
        other => {
            return Err(ArtifactError::Unsupported(format!(
                "classifier file type '{}' ({})",
                other,
                path.display()
            )))
        }
    };

    if let Some(width) = classifier.n_features() {
        if width != schema.len() {
            return Err(invalid(
                path,
                format!("classifier expects {} features, schema has {}", width, schema.len()),
            ));
        }
    }

    Ok(classifier)
}

/// Reference rows, bare or with the column names they were written with
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ReferenceDocument {
    Rows(Vec<Vec<f64>>),
    Named {
        #[serde(default)]
        feature_names: Option<Vec<String>>,
        rows: Vec<Vec<f64>>,
    },
}

fn load_reference(path: &Path, schema: &FeatureSchema) -> Result<ReferenceSample, ArtifactError> {
    let (names, rows) = match read_json::<ReferenceDocument>(path)? {
        ReferenceDocument::Rows(rows) => (None, rows),
        ReferenceDocument::Named { feature_names, rows } => (feature_names, rows),
    };

    // Named columns are re-ordered into schema order
    let rows = match names {
        Some(names) => {
            let positions = schema
                .names()
                .iter()
                .map(|name| {
                    names
                        .iter()
                        .position(|n| n == name)
                        .ok_or_else(|| invalid(path, format!("column '{}' missing", name)))
                })
                .collect::<Result<Vec<usize>, _>>()?;
            rows.into_iter()
                .map(|row| {
                    if row.len() != names.len() {
                        return Err(invalid(path, "row width differs from feature_names"));
                    }
                    Ok(positions.iter().map(|&p| row[p]).collect())
                })
                .collect::<Result<Vec<Vec<f64>>, _>>()?
        }
        None => rows,
    };

    let width = rows.first().map(Vec::len).unwrap_or(0);
    if rows.iter().any(|r| r.len() != width) {
        return Err(invalid(path, "rows have different widths"));
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    let data = Array2::from_shape_vec((rows.len(), width), flat).map_err(|e| invalid(path, e))?;

    ReferenceSample::new(data, schema).map_err(|e| invalid(path, e))
}

/// Compute SHA256 hash of file
fn compute_file_hash(path: &Path) -> Result<String, std::io::Error> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, value: serde_json::Value) {
        std::fs::write(dir.join(name), value.to_string()).unwrap();
    }

    fn logistic_json(width: usize) -> serde_json::Value {
        json!({ "kind": "logistic_regression", "coefficients": vec![0.01; width], "intercept": -1.0 })
    }

    fn reference_rows() -> Vec<Vec<f64>> {
        let schema = FeatureSchema::default_schema();
        (0..6)
            .map(|i| {
                let mut row = vec![0.0; schema.len()];
                row[0] = 30.0 + i as f64 * 8.0;
                row[3] = 90.0 + i as f64 * 20.0;
                row[4] = 22.0 + i as f64 * 2.5;
                row[7] = 1.0;
                row[8] = 1.0;
                row[13] = 1.0;
                row[15 + i % 4] = 1.0;
                row
            })
            .collect()
    }

    #[test]
    fn test_empty_dir_everything_missing() {
        let dir = TempDir::new().unwrap();
        let loaded = load_artifacts(&ArtifactPaths::in_dir(dir.path()));
        assert!(loaded.classifier.is_none());
        assert!(loaded.scaler.is_none());
        assert!(loaded.reference.is_none());
        assert_eq!(loaded.report, LoadReport::default());
        assert_eq!(loaded.schema.layout_hash(), FeatureSchema::default_schema().layout_hash());
    }

    #[test]
    fn test_loads_json_artifacts_with_fingerprints() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "model.json", logistic_json(19));
        write(dir.path(), "scaler.json", json!({ "kind": "standard", "mean": [50.0, 100.0, 28.0], "scale": [20.0, 40.0, 6.0] }));
        write(dir.path(), "reference_sample.json", json!(reference_rows()));

        let loaded = load_artifacts(&ArtifactPaths::in_dir(dir.path()));
        assert_eq!(loaded.classifier.as_ref().map(|c| c.name()), Some("logistic_regression"));
        assert_eq!(loaded.scaler.as_ref().map(Scaler::width), Some(3));
        assert!(loaded.reference.is_some());

        match &loaded.report.model {
            ArtifactStatus::Loaded { sha256, .. } => assert_eq!(sha256.len(), 64),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(loaded.report.schema, ArtifactStatus::Missing);
    }

    #[test]
    fn test_first_existing_dir_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write(second.path(), "model.json", logistic_json(19));
        write(first.path(), "model.json", json!({ "kind": "label_rules", "coefficients": vec![1.0; 19] }));

        let mut paths = ArtifactPaths::in_dir(first.path());
        paths.search_dirs.push(second.path().to_path_buf());

        let loaded = load_artifacts(&paths);
        assert_eq!(loaded.classifier.as_ref().map(|c| c.name()), Some("label_rules"));
    }

    #[test]
    fn test_absolute_path_used_as_is() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "custom-model.json", logistic_json(19));

        let mut paths = ArtifactPaths::in_dir("/nonexistent");
        paths.model_files = vec![dir.path().join("custom-model.json").display().to_string()];
        assert!(paths.resolve(&paths.model_files[0]).is_some());
        assert!(load_artifacts(&paths).classifier.is_some());
    }

    #[test]
    fn test_unknown_kind_is_unsupported() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "model.json", json!({ "kind": "random_forest", "trees": [] }));

        let loaded = load_artifacts(&ArtifactPaths::in_dir(dir.path()));
        assert!(loaded.classifier.is_none());
        match loaded.report.model {
            ArtifactStatus::Failed { error, .. } => assert!(error.contains("unsupported"), "{}", error),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("model.pkl"), b"\x80\x04").unwrap();
        let mut paths = ArtifactPaths::in_dir(dir.path());
        paths.model_files = vec!["model.pkl".to_string()];

        let path = paths.resolve("model.pkl").unwrap();
        assert!(matches!(
            load_classifier(&path, &FeatureSchema::default_schema()),
            Err(ArtifactError::Unsupported(_))
        ));
    }

    #[test]
    fn test_classifier_width_must_match_schema() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "model.json", logistic_json(5));
        let loaded = load_artifacts(&ArtifactPaths::in_dir(dir.path()));
        assert!(loaded.classifier.is_none());
        assert!(matches!(loaded.report.model, ArtifactStatus::Failed { .. }));
    }

    #[test]
    fn test_invalid_schema_falls_back_to_default() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "feature_schema.json", json!({ "feature_names": ["age", "age"] }));
        let loaded = load_artifacts(&ArtifactPaths::in_dir(dir.path()));
        assert!(matches!(loaded.report.schema, ArtifactStatus::Failed { .. }));
        assert_eq!(loaded.schema.len(), 19);
    }

    #[test]
    fn test_named_reference_rows_reordered() {
        let dir = TempDir::new().unwrap();
        let schema = FeatureSchema::default_schema();
        let mut names: Vec<String> = schema.names().to_vec();
        names.reverse();
        let rows: Vec<Vec<f64>> = reference_rows()
            .into_iter()
            .map(|mut r| {
                r.reverse();
                r
            })
            .collect();
        write(dir.path(), "reference_sample.json", json!({ "feature_names": names, "rows": rows }));

        let loaded = load_artifacts(&ArtifactPaths::in_dir(dir.path()));
        let reference = loaded.reference.expect("reference sample");
        assert_eq!(reference.data()[[1, 0]], 38.0);
    }

    #[test]
    fn test_short_reference_rejected() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "reference_sample.json", json!([vec![1.0; 19]]));
        let loaded = load_artifacts(&ArtifactPaths::in_dir(dir.path()));
        assert!(loaded.reference.is_none());
        assert!(matches!(loaded.report.reference_sample, ArtifactStatus::Failed { .. }));
    }
}
