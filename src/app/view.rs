//! View rendering seam.
//!
//! The router never renders; callbacks do, through whatever `Renderer` the
//! application was given. `Templates` is a small in-memory renderer that
//! replaces `{{ key }}` with top-level string or number fields of the data.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("no renderer configured")]
    NoRenderer,

    #[error("template `{0}` not found")]
    NotFound(String),

    #[error("failed to load templates from {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub trait Renderer: Send + Sync {
    fn render(&self, template: &str, data: &Value) -> Result<String, ViewError>;
}

/// The application's renderer, stored in the service container.
#[derive(Clone)]
pub struct Views(pub Arc<dyn Renderer>);

impl Views {
    pub fn new(renderer: impl Renderer + 'static) -> Self {
        Self(Arc::new(renderer))
    }

    pub fn render(&self, template: &str, data: &Value) -> Result<String, ViewError> {
        self.0.render(template, data)
    }
}

/// Templates held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Templates {
    sources: HashMap<String, String>,
}

impl Templates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.sources.insert(name.into(), source.into());
        self
    }

    /// Load every file of `dir` (not recursive), named by file name.
    pub fn from_dir(dir: &Path) -> Result<Self, ViewError> {
        let load_err = |source| ViewError::Load {
            path: dir.display().to_string(),
            source,
        };
        let mut templates = Self::new();
        for entry in fs::read_dir(dir).map_err(load_err)? {
            let path = entry.map_err(load_err)?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                let source = fs::read_to_string(&path).map_err(load_err)?;
                templates.insert(name, source);
            }
        }
        Ok(templates)
    }
}

impl Renderer for Templates {
    fn render(&self, template: &str, data: &Value) -> Result<String, ViewError> {
        let source = self
            .sources
            .get(template)
            .ok_or_else(|| ViewError::NotFound(template.to_string()))?;

        let mut out = String::with_capacity(source.len());
        let mut rest = source.as_str();
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                out.push_str(&rest[start..]);
                return Ok(out);
            };
            match data.get(after[..end].trim()) {
                Some(Value::String(s)) => out.push_str(s),
                Some(Value::Null) | None => {}
                Some(other) => out.push_str(&other.to_string()),
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}
