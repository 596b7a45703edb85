//! Engine configuration: where to read, where to write, and the analytic
//! thresholds.
//!
//! Loaded from an optional JSON file; missing fields take their defaults.

use analytics::AnalyticsConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use writer::WriteMode;

use crate::error::{EngineError, Result};

pub const DEFAULT_DATA_DIR: &str = "data/ml-100k";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://movielens_analytics.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding u.user, u.item and u.data
    pub data_dir: PathBuf,
    /// `memory` or a SQLite DSN
    pub database_url: String,
    pub write_mode: WriteMode,
    /// Cancel the run after this many seconds
    pub deadline_secs: Option<u64>,
    pub analytics: AnalyticsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            write_mode: WriteMode::default(),
            deadline_secs: None,
            analytics: AnalyticsConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_error = |reason: String| EngineError::ConfigFile {
            path: path.display().to_string(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| config_error(e.to_string()))
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    pub fn with_deadline_secs(mut self, secs: u64) -> Self {
        self.deadline_secs = Some(secs);
        self
    }

    pub fn with_analytics(mut self, analytics: AnalyticsConfig) -> Self {
        self.analytics = analytics;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics::ScoreMapping;

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(
            &path,
            r#"{
                "database_url": "memory",
                "write_mode": "replace",
                "analytics": { "top_movies": { "min_ratings": 100 }, "similarity": { "scoring": "correlation" } }
            }"#,
        )
        .unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.database_url, "memory");
        assert_eq!(config.write_mode, WriteMode::Replace);
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(config.analytics.top_movies.min_ratings, 100);
        assert_eq!(config.analytics.top_movies.top_k, 20);
        assert_eq!(config.analytics.similarity.scoring, ScoreMapping::Correlation);
    }

    #[test]
    fn test_bad_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(EngineConfig::from_file(&path), Err(EngineError::ConfigFile { .. })));
        assert!(EngineConfig::from_file(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::default()
            .with_data_dir("/tmp/ml")
            .with_database_url("sqlite::memory:")
            .with_deadline_secs(30);

        assert_eq!(config.data_dir, PathBuf::from("/tmp/ml"));
        assert_eq!(config.deadline_secs, Some(30));
        assert_eq!(config.write_mode, WriteMode::Upsert);
    }
}
