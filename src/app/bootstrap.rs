//! Building routers and applications from configuration.
//!
//! # Data Flow
//! ```text
//! AppConfig
//!     → [app] + [[routes]] + [[middleware]]   → root Router
//!     → [[blueprints]] (config and manifest)  → child Router each
//!                                              → root.group(prefix, child)
//!     → setup hook registers controllers/middleware
//!     → Router::validate against the registries
//!     → Application
//! ```

use std::sync::Arc;

use thiserror::Error;

use crate::app::application::Application;
use crate::config::schema::{AppConfig, BlueprintConfig, DomainConfig, MiddlewareConfig, RouteDefinition};
use crate::routing::error::RouteConfigError;
use crate::routing::matcher::DomainFilter;
use crate::routing::middleware::MiddlewareEntry;
use crate::routing::route::Route;
use crate::routing::router::Router;

#[derive(Debug, Error)]
pub enum BootError {
    #[error("invalid domain pattern `{pattern}`: {source}")]
    Domain {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("route configuration invalid: {}", join(.0))]
    Routes(Vec<RouteConfigError>),
}

fn join(errors: &[RouteConfigError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Registers controllers, middleware and services on a fresh application
/// before its router is validated.
pub type Setup = Arc<dyn Fn(&mut Application) + Send + Sync>;

/// Build an application from `config`, run `setup`, then check that every
/// controller and middleware the routes name is registered.
pub fn build_application(config: AppConfig, setup: &dyn Fn(&mut Application)) -> Result<Application, BootError> {
    let router = build_router(&config)?;
    let mut app = Application::with_config(config);
    setup(&mut app);
    // Code-defined routes from setup come after the configured ones
    let code_routes = std::mem::take(app.router_mut());
    app.set_router(merge(router, code_routes));

    let errors = app.router().validate(&app);
    if !errors.is_empty() {
        return Err(BootError::Routes(errors));
    }

    tracing::info!(
        routes = app.router().routes().len(),
        blueprints = app.router().blueprints().len(),
        "Application built"
    );
    Ok(app)
}

/// Build the root router with its blueprints.
pub fn build_router(config: &AppConfig) -> Result<Router, BootError> {
    let mut router = configure(
        Router::new(),
        config.app.domain.as_ref(),
        config.app.base_path.as_deref(),
        config.app.namespace.as_deref(),
    )?;
    add_routes(&mut router, &config.routes);
    add_middleware(&mut router, &config.middleware);

    for blueprint in &config.blueprints {
        let child = build_blueprint(blueprint)?;
        tracing::debug!(prefix = %blueprint.prefix, routes = child.routes().len(), "Mounted blueprint");
        router.group(&blueprint.prefix, child);
    }
    Ok(router)
}

fn build_blueprint(config: &BlueprintConfig) -> Result<Router, BootError> {
    let mut router = configure(
        Router::new(),
        config.domain.as_ref(),
        config.base_path.as_deref(),
        config.namespace.as_deref(),
    )?;
    add_routes(&mut router, &config.routes);
    add_middleware(&mut router, &config.middleware);
    Ok(router)
}

fn configure(
    mut router: Router,
    domain: Option<&DomainConfig>,
    base_path: Option<&str>,
    namespace: Option<&str>,
) -> Result<Router, BootError> {
    if let Some(domain) = domain {
        router = router.with_domain(domain_filter(domain)?);
    }
    if let Some(base_path) = base_path.filter(|b| !b.is_empty()) {
        router = router.with_base_path(base_path);
    }
    if let Some(namespace) = namespace.filter(|n| !n.is_empty()) {
        router = router.with_namespace(namespace);
    }
    Ok(router)
}

pub fn domain_filter(domain: &DomainConfig) -> Result<DomainFilter, BootError> {
    match domain {
        DomainConfig::Exact(host) if host.is_empty() => Ok(DomainFilter::Any),
        DomainConfig::Exact(host) => Ok(DomainFilter::exact(host.as_str())),
        DomainConfig::List(hosts) => Ok(DomainFilter::list(hosts.iter().map(String::as_str))),
        DomainConfig::Pattern { pattern } => DomainFilter::pattern(pattern).map_err(|source| BootError::Domain {
            pattern: pattern.clone(),
            source,
        }),
    }
}

/// Turn one route table entry into a route.
pub fn route_from_definition(definition: &RouteDefinition) -> Route {
    let mut route = Route::new(definition.method.to_vec(), definition.path.as_str(), definition.controller.as_str());
    if let Some(name) = &definition.name {
        route.name(name.as_str());
    }
    if let Some(namespace) = &definition.namespace {
        route.namespace(namespace.as_str());
    }
    for (placeholder, fragment) in &definition.filters {
        route.filter(placeholder.as_str(), fragment.as_str());
    }
    for middleware in &definition.middleware {
        route.middleware(MiddlewareEntry::parse(middleware));
    }
    route
}

fn add_routes(router: &mut Router, routes: &[RouteDefinition]) {
    for definition in routes {
        router.push(route_from_definition(definition));
    }
}

fn add_middleware(router: &mut Router, middleware: &[MiddlewareConfig]) {
    for entry in middleware {
        let parsed = MiddlewareEntry::parse(&entry.name);
        match &entry.key {
            Some(key) => router.middleware_for(key, parsed),
            None => router.middleware(parsed),
        };
    }
}

/// Append the routes, blueprints, middleware and fallback of `extra` to
/// `base`. Router settings (domain, base path, namespace) stay `base`'s.
fn merge(mut base: Router, extra: Router) -> Router {
    for route in extra.routes() {
        base.push(route.clone());
    }
    for entry in extra.middlewares() {
        base.middleware(entry.clone());
    }
    for blueprint in extra.blueprints() {
        for router in blueprint.routers() {
            base.group(blueprint.prefix(), router.clone());
        }
    }
    if let Some(fallback) = extra.default_route() {
        base.set_fallback(fallback.clone());
    }
    base
}
