//! Central Configuration Constants
//!
//! Single source of truth for artifact names and lookup locations.
//! Every value can be overridden from the environment.

/// Default classifier artifacts, tried in order
pub const DEFAULT_MODEL_FILES: &[&str] = &["model.onnx", "model.json"];

/// Default scaler artifact
pub const DEFAULT_SCALER_FILE: &str = "scaler.json";

/// Default feature schema artifact
pub const DEFAULT_SCHEMA_FILE: &str = "feature_schema.json";

/// Default explanation reference sample
pub const DEFAULT_REFERENCE_FILE: &str = "reference_sample.json";

/// Directories searched for every artifact, in order
pub const DEFAULT_SEARCH_DIRS: &[&str] = &[".", "./ml-service", "..", "./models", "../models"];

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "NeuroShield";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Classifier file names from `MODEL_PATH` or the defaults
pub fn get_model_files() -> Vec<String> {
    match std::env::var("MODEL_PATH") {
        Ok(path) if !path.trim().is_empty() => vec![path],
        _ => DEFAULT_MODEL_FILES.iter().map(|s| s.to_string()).collect(),
    }
}

/// Scaler file name from `SCALER_PATH` or the default
pub fn get_scaler_file() -> String {
    env_or("SCALER_PATH", DEFAULT_SCALER_FILE)
}

/// Schema file name from `SCHEMA_PATH` or the default
pub fn get_schema_file() -> String {
    env_or("SCHEMA_PATH", DEFAULT_SCHEMA_FILE)
}

/// Reference sample file name from `REFERENCE_SAMPLE_PATH` or the default
pub fn get_reference_file() -> String {
    env_or("REFERENCE_SAMPLE_PATH", DEFAULT_REFERENCE_FILE)
}

/// Search directories, with `ARTIFACT_DIR` appended when set
pub fn get_search_dirs() -> Vec<String> {
    let mut dirs: Vec<String> = DEFAULT_SEARCH_DIRS.iter().map(|s| s.to_string()).collect();
    if let Ok(extra) = std::env::var("ARTIFACT_DIR") {
        if !extra.trim().is_empty() {
            dirs.push(extra);
        }
    }
    dirs
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
