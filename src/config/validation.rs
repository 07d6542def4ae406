//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that route patterns, filters and domain regexes compile
//! - Check callback targets, methods and route name uniqueness
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Controller and middleware names are checked later, at bootstrap, when
//!   the registries are known

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::Method;
use thiserror::Error;

use crate::config::schema::{AppConfig, DomainConfig, MiddlewareConfig, RouteDefinition};
use crate::routing::callback::Callback;
use crate::routing::pattern;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address `{0}`")]
    InvalidBindAddress(String),

    #[error("invalid metrics address `{0}`")]
    InvalidMetricsAddress(String),

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroTimeout,

    #[error("unknown log format `{0}` (expected pretty or json)")]
    InvalidLogFormat(String),

    #[error("{scope}: route with empty path")]
    EmptyPath { scope: String },

    #[error("{scope}: route `{path}` has an invalid pattern: {reason}")]
    InvalidPattern { scope: String, path: String, reason: String },

    #[error("{scope}: route `{path}` has malformed controller `{controller}`")]
    MalformedController { scope: String, path: String, controller: String },

    #[error("{scope}: route `{path}` has invalid method `{method}`")]
    InvalidMethod { scope: String, path: String, method: String },

    #[error("duplicate route name `{0}`")]
    DuplicateName(String),

    #[error("{scope}: invalid domain pattern: {reason}")]
    InvalidDomain { scope: String, reason: String },

    #[error("blueprint prefix `{0}` must start with '/'")]
    InvalidPrefix(String),

    #[error("{scope}: middleware with empty name")]
    EmptyMiddleware { scope: String },
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(config.listener.bind_address.clone()));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    let observability = &config.observability;
    if !matches!(observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::InvalidLogFormat(observability.log_format.clone()));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(observability.metrics_address.clone()));
    }

    let mut names = HashSet::new();
    check_domain("app", config.app.domain.as_ref(), &mut errors);
    check_routes("app", &config.routes, &mut names, &mut errors);
    check_middleware("app", &config.middleware, &mut errors);

    for blueprint in &config.blueprints {
        let scope = format!("blueprint {}", blueprint.prefix);
        if !blueprint.prefix.starts_with('/') {
            errors.push(ValidationError::InvalidPrefix(blueprint.prefix.clone()));
        }
        check_domain(&scope, blueprint.domain.as_ref(), &mut errors);
        check_routes(&scope, &blueprint.routes, &mut names, &mut errors);
        check_middleware(&scope, &blueprint.middleware, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_routes(
    scope: &str,
    routes: &[RouteDefinition],
    names: &mut HashSet<String>,
    errors: &mut Vec<ValidationError>,
) {
    for route in routes {
        if route.path.trim().is_empty() {
            errors.push(ValidationError::EmptyPath { scope: scope.to_string() });
        } else if let Err(e) = pattern::compile(&route.path, &route.filters) {
            errors.push(ValidationError::InvalidPattern {
                scope: scope.to_string(),
                path: route.path.clone(),
                reason: e.to_string(),
            });
        }

        if matches!(Callback::parse(&route.controller), Callback::Target(_)) {
            errors.push(ValidationError::MalformedController {
                scope: scope.to_string(),
                path: route.path.clone(),
                controller: route.controller.clone(),
            });
        }

        for method in route.method.to_vec() {
            if Method::from_bytes(method.to_ascii_uppercase().as_bytes()).is_err() {
                errors.push(ValidationError::InvalidMethod {
                    scope: scope.to_string(),
                    path: route.path.clone(),
                    method,
                });
            }
        }

        if let Some(name) = &route.name {
            if !names.insert(name.clone()) {
                errors.push(ValidationError::DuplicateName(name.clone()));
            }
        }
    }
}

fn check_domain(scope: &str, domain: Option<&DomainConfig>, errors: &mut Vec<ValidationError>) {
    if let Some(DomainConfig::Pattern { pattern }) = domain {
        if let Err(e) = regex::Regex::new(pattern) {
            errors.push(ValidationError::InvalidDomain {
                scope: scope.to_string(),
                reason: e.to_string(),
            });
        }
    }
}

fn check_middleware(scope: &str, middleware: &[MiddlewareConfig], errors: &mut Vec<ValidationError>) {
    for entry in middleware {
        let name = entry.name.split(':').next().unwrap_or_default();
        if name.trim().is_empty() {
            errors.push(ValidationError::EmptyMiddleware { scope: scope.to_string() });
        }
    }
}
