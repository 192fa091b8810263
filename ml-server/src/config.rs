//! Configuration module

use std::env;
use std::path::PathBuf;

/// Server configuration (`.env` is loaded first by `main`)
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Concurrent scoring/explanation jobs
    pub worker_pool_size: usize,

    /// Wall-clock limit for one explanation
    pub explain_timeout_ms: u64,

    /// JSONL prediction log directory; no sink when unset
    pub prediction_log_dir: Option<PathBuf>,

    /// Environment (development, production)
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            port: lookup("ML_SERVICE_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),

            worker_pool_size: lookup("WORKER_POOL_SIZE")
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(4),

            explain_timeout_ms: lookup("EXPLAIN_TIMEOUT_MS")
                .and_then(|ms| ms.parse().ok())
                .unwrap_or(2000),

            prediction_log_dir: lookup("PREDICTION_LOG_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),

            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
