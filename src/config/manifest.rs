//! JSON "serves" manifest.
//!
//! A manifest lists domain-scoped blueprints outside the main config file:
//!
//! ```json
//! {
//!   "serves": [
//!     { "prefix": "/", "domain": "admin.example.com", "namespace": "Admin",
//!       "routes": [ { "path": "/", "controller": "Dashboard@index" } ] }
//!   ]
//! }
//! ```
//!
//! Each entry becomes one child router attached with `Router::group`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::loader::ConfigError;
use crate::config::schema::BlueprintConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Manifest {
    #[serde(default)]
    pub serves: Vec<BlueprintConfig>,
}

pub fn parse_manifest(content: &str) -> Result<Manifest, ConfigError> {
    Ok(serde_json::from_str(content)?)
}

pub fn load_manifest(path: &Path) -> Result<Manifest, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serves() {
        let manifest = parse_manifest(
            r#"{
                "serves": [
                    {"prefix": "/", "domain": ["a.test", "b.test"], "routes": [
                        {"path": "/", "controller": "Home@index", "method": ["GET"], "as": "home"}
                    ]},
                    {"prefix": "/api", "namespace": "Api"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(manifest.serves.len(), 2);
        assert_eq!(manifest.serves[0].routes[0].name.as_deref(), Some("home"));
        assert_eq!(manifest.serves[1].namespace.as_deref(), Some("Api"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(parse_manifest("{"), Err(ConfigError::Manifest(_))));
    }
}
