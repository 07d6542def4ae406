//! Middleware entries.
//!
//! # Responsibilities
//! - Describe one middleware attachment: target, bound args, optional key
//! - Decide whether a keyed entry applies to the current request
//!
//! # Design Decisions
//! - Positional (unkeyed) entries always run
//! - A key applies when it equals the route name, occurs in the request
//!   path, or matches the request path as a regex
//! - Key regexes are compiled once, when the entry is created

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::http::{Exchange, Response};
use crate::routing::error::DispatchError;

/// What a middleware wants dispatch to do next.
#[derive(Debug)]
pub enum Flow {
    /// Continue with the next middleware.
    Next,
    /// Replace the current response, mark it prepared and stop the batch.
    Replace(Response),
    /// Mark the current response prepared and stop the batch.
    Halt,
}

pub trait Middleware: Send + Sync {
    fn handle(&self, exchange: &mut Exchange, args: &[String]) -> Result<Flow, DispatchError>;
}

impl<F> Middleware for F
where
    F: Fn(&mut Exchange, &[String]) -> Result<Flow, DispatchError> + Send + Sync,
{
    fn handle(&self, exchange: &mut Exchange, args: &[String]) -> Result<Flow, DispatchError> {
        self(exchange, args)
    }
}

#[derive(Clone)]
pub enum MiddlewareTarget {
    /// Resolved through the middleware registry, namespace applied.
    Named(String),
    Instance(Arc<dyn Middleware>),
}

#[derive(Debug, Clone)]
struct Key {
    raw: String,
    regex: Option<Regex>,
}

/// One middleware attachment.
#[derive(Clone)]
pub struct MiddlewareEntry {
    target: MiddlewareTarget,
    args: Vec<String>,
    key: Option<Key>,
}

impl MiddlewareEntry {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            target: MiddlewareTarget::Named(name.into()),
            args: Vec::new(),
            key: None,
        }
    }

    pub fn instance(middleware: impl Middleware + 'static) -> Self {
        Self {
            target: MiddlewareTarget::Instance(Arc::new(middleware)),
            args: Vec::new(),
            key: None,
        }
    }

    pub fn from_fn<F>(func: F) -> Self
    where
        F: Fn(&mut Exchange, &[String]) -> Result<Flow, DispatchError> + Send + Sync + 'static,
    {
        Self::instance(func)
    }

    /// Parse the config form `name` or `name:arg1,arg2`.
    pub fn parse(entry: &str) -> Self {
        match entry.split_once(':') {
            Some((name, args)) => Self::named(name.trim()).with_args(
                args.split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string),
            ),
            None => Self::named(entry.trim()),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict the entry to requests matching `key`.
    pub fn keyed(mut self, key: impl Into<String>) -> Self {
        let raw = key.into();
        let regex = Regex::new(&raw).ok();
        self.key = Some(Key { raw, regex });
        self
    }

    pub fn target(&self) -> &MiddlewareTarget {
        &self.target
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_ref().map(|k| k.raw.as_str())
    }

    pub fn is_keyed(&self) -> bool {
        self.key.is_some()
    }

    /// Whether this entry runs for a request on `path` matched by `route_name`.
    pub fn applies(&self, route_name: Option<&str>, path: &str) -> bool {
        self.applies_to_path(path) || self.key.as_ref().is_some_and(|key| route_name == Some(key.raw.as_str()))
    }

    /// Whether the key (if any) accepts `path` as a substring or regex match.
    /// Unkeyed entries always apply.
    pub fn applies_to_path(&self, path: &str) -> bool {
        let Some(key) = &self.key else {
            return true;
        };
        path.contains(&key.raw) || key.regex.as_ref().is_some_and(|r| r.is_match(path))
    }

    pub fn label(&self) -> String {
        match &self.target {
            MiddlewareTarget::Named(name) => name.clone(),
            MiddlewareTarget::Instance(_) => "<middleware>".to_string(),
        }
    }
}

impl fmt::Debug for MiddlewareEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareEntry")
            .field("target", &self.label())
            .field("args", &self.args)
            .field("key", &self.key())
            .finish()
    }
}

impl From<&str> for MiddlewareEntry {
    fn from(entry: &str) -> Self {
        MiddlewareEntry::parse(entry)
    }
}
