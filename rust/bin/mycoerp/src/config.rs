//! Tool configuration.
//!
//! Reads `mycoerp.toml` (or `--config <path>`). Every section is
//! optional; a missing file means all defaults.

use std::path::{Path, PathBuf};

use mycoerp_core::ServiceConfig;
use receiving::{FarmDirectory, ReceivingConfig};
use serde::{Deserialize, Serialize};

/// `[storage]`: where the local store lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,

    /// Explicit database file; defaults to `{data_dir}/receiving.redb`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            db_path: None,
        }
    }
}

/// Whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub receiving: ReceivingConfig,
    pub farms: FarmDirectory,
}

impl AppConfig {
    /// Default config file path: `./mycoerp.toml`.
    pub fn default_path() -> PathBuf {
        PathBuf::from("mycoerp.toml")
    }

    /// Load config from disk, or return defaults if the file doesn't exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Storage paths, with an optional `--data-dir` override.
    pub fn service_config(&self, data_dir: Option<&Path>) -> ServiceConfig {
        ServiceConfig {
            data_dir: Some(
                data_dir
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(&self.storage.data_dir)),
            ),
            db_path: self.storage.db_path.as_ref().map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.receiving.transit_window_secs, 7200);
    }

    #[test]
    fn test_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mycoerp.toml");
        std::fs::write(
            &path,
            r#"
[storage]
data_dir = "/var/lib/mycoerp"

[receiving]
transit_window_secs = 5400

[farms]
known = ["Hilltop Myco", "Cedar Hollow"]
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.storage.data_dir, "/var/lib/mycoerp");
        assert_eq!(config.receiving.transit_window_secs, 5400);
        assert_eq!(config.receiving.success_reset_secs, 3);
        assert!(config.farms.is_known("Cedar Hollow"));
        assert_eq!(config.farms.fallback, "MyceliumNexus Farm");
        assert_eq!(
            config.service_config(None).resolve_db_path(),
            PathBuf::from("/var/lib/mycoerp/receiving.redb")
        );
    }

    #[test]
    fn test_data_dir_override_and_explicit_db() {
        let config = AppConfig {
            storage: StorageConfig {
                data_dir: "./data".into(),
                db_path: Some("/tmp/other.redb".into()),
            },
            ..Default::default()
        };
        let svc = config.service_config(Some(Path::new("/srv/x")));
        assert_eq!(svc.data_dir, Some(PathBuf::from("/srv/x")));
        assert_eq!(svc.resolve_db_path(), PathBuf::from("/tmp/other.redb"));
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[receiving]\ntransit_window_secs = \"soon\"\n").unwrap();
        let err = AppConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("invalid config"));
    }

    #[test]
    fn test_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let back: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(back, config);
    }
}
