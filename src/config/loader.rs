//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::manifest::load_manifest;
use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text. A `manifest` entry is
/// not followed.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file, appending the
/// blueprints of its manifest if one is named.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: AppConfig = toml::from_str(&content)?;

    if let Some(manifest) = &config.manifest {
        let manifest_path = path
            .parent()
            .map(|dir| dir.join(manifest))
            .unwrap_or_else(|| PathBuf::from(manifest));
        let manifest = load_manifest(&manifest_path)?;
        tracing::debug!(
            path = ?manifest_path,
            blueprints = manifest.serves.len(),
            "Loaded serves manifest"
        );
        config.blueprints.extend(manifest.serves);
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("switchyard-{name}-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_with_manifest() {
        let dir = scratch_dir("loader");
        fs::write(
            dir.join("app.toml"),
            r#"
            manifest = "serves.json"

            [[routes]]
            path = "/"
            controller = "Home"
            "#,
        )
        .unwrap();
        fs::write(
            dir.join("serves.json"),
            r#"{"serves": [{"prefix": "/docs", "routes": [{"path": "/", "controller": "Docs@index"}]}]}"#,
        )
        .unwrap();

        let config = load_config(&dir.join("app.toml")).unwrap();
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.blueprints.len(), 1);
        assert_eq!(config.blueprints[0].prefix, "/docs");
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_validation_errors_surface() {
        let err = parse_config(
            r#"
            [timeouts]
            request_secs = 0

            [[routes]]
            path = ""
            controller = "Home"
            "#,
        )
        .unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
