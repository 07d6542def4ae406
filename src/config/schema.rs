//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! application: listener, timeouts, observability, the root router and its
//! declarative route table, router middleware and blueprints.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Root router settings.
    pub app: RouterConfig,

    /// Route table of the root router, in match-priority order.
    pub routes: Vec<RouteDefinition>,

    /// Router-level middleware of the root router.
    pub middleware: Vec<MiddlewareConfig>,

    /// Child routers mounted under path prefixes.
    pub blueprints: Vec<BlueprintConfig>,

    /// Optional JSON manifest with more blueprints, relative to the config
    /// file.
    pub manifest: Option<String>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest request body accepted, in bytes.
    pub max_body_size: usize,

    /// Maximum requests dispatched at once (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
            max_connections: 10_000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Settings of the root router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Namespace prepended to controller and middleware names.
    pub namespace: Option<String>,

    /// Prefix stripped from every request path before matching.
    pub base_path: Option<String>,

    /// Host filter; absent accepts any host.
    pub domain: Option<DomainConfig>,
}

/// Host filter as written in config.
///
/// ```toml
/// domain = "example.com"
/// domain = ["example.com", "www.example.com"]
/// domain = { pattern = '^[a-z]+\.example\.com$' }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DomainConfig {
    Exact(String),
    List(Vec<String>),
    Pattern { pattern: String },
}

/// One entry of the declarative route table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteDefinition {
    /// Path template (e.g., "/users/{id:int}").
    pub path: String,

    /// Callback target, "Controller@action" or "Controller".
    pub controller: String,

    /// Accepted methods; empty means GET and POST.
    #[serde(default, alias = "methods")]
    pub method: MethodList,

    /// Route middleware, "name" or "name:arg1,arg2".
    #[serde(default)]
    pub middleware: Vec<String>,

    /// Route name used for URL generation and keyed middleware.
    #[serde(default, rename = "as")]
    pub name: Option<String>,

    /// Namespace for this route's controller and middleware.
    #[serde(default, rename = "use")]
    pub namespace: Option<String>,

    /// Regex overrides per placeholder name.
    #[serde(default)]
    pub filters: HashMap<String, String>,
}

/// A single method or a list of methods.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum MethodList {
    One(String),
    Many(Vec<String>),
}

impl Default for MethodList {
    fn default() -> Self {
        MethodList::Many(Vec::new())
    }
}

impl MethodList {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            MethodList::One(method) => method
                .split(['|', ','])
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect(),
            MethodList::Many(methods) => methods.clone(),
        }
    }
}

/// Router-level middleware.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MiddlewareConfig {
    /// "name" or "name:arg1,arg2".
    pub name: String,

    /// Route name, path fragment or path regex restricting the entry.
    #[serde(default)]
    pub key: Option<String>,
}

/// A child router mounted under `prefix`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlueprintConfig {
    pub prefix: String,

    #[serde(default)]
    pub domain: Option<DomainConfig>,

    #[serde(default)]
    pub base_path: Option<String>,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub routes: Vec<RouteDefinition>,

    #[serde(default)]
    pub middleware: Vec<MiddlewareConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.timeouts.request_secs, 30);
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_route_table() {
        let config: AppConfig = toml::from_str(
            r#"
            [app]
            namespace = "Site"
            domain = ["example.com", "www.example.com"]

            [[routes]]
            path = "/users/{id:int}"
            controller = "Users@show"
            method = "GET"
            as = "users.show"
            middleware = ["auth", "throttle:60,1"]

            [[routes]]
            path = "/users"
            controller = "Users@store"
            methods = ["post", "put"]
            use = "Admin"
            filters = { id = '\d{3}' }
            "#,
        )
        .unwrap();

        assert_eq!(config.routes.len(), 2);
        let show = &config.routes[0];
        assert_eq!(show.method.to_vec(), ["GET"]);
        assert_eq!(show.name.as_deref(), Some("users.show"));
        assert_eq!(show.middleware.len(), 2);

        let store = &config.routes[1];
        assert_eq!(store.method.to_vec(), ["post", "put"]);
        assert_eq!(store.namespace.as_deref(), Some("Admin"));
        assert_eq!(store.filters.get("id").map(String::as_str), Some(r"\d{3}"));

        assert_eq!(
            config.app.domain,
            Some(DomainConfig::List(vec!["example.com".into(), "www.example.com".into()]))
        );
    }

    #[test]
    fn test_method_string_with_separators() {
        assert_eq!(MethodList::One("GET|post, PUT".into()).to_vec(), ["GET", "post", "PUT"]);
    }

    #[test]
    fn test_blueprints_and_domain_pattern() {
        let config: AppConfig = toml::from_str(
            r#"
            [[blueprints]]
            prefix = "/admin"
            domain = { pattern = '^admin\.' }

            [[blueprints.routes]]
            path = "/"
            controller = "Dashboard"

            [[middleware]]
            name = "auth"
            key = "/admin"
            "#,
        )
        .unwrap();
        assert_eq!(config.blueprints[0].routes.len(), 1);
        assert!(matches!(config.blueprints[0].domain, Some(DomainConfig::Pattern { .. })));
        assert_eq!(config.middleware[0].key.as_deref(), Some("/admin"));
    }
}
