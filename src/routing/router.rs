//! Route table, blueprints and the dispatch state machine.
//!
//! # Responsibilities
//! - Hold routes in registration order (first match wins)
//! - Mount child routers under path prefixes (blueprints)
//! - Apply domain and base-path filters
//! - Drive match → middleware → dispatch → respond for one request
//! - Generate URLs from route names
//!
//! # Design Decisions
//! - Immutable once built; `execute` takes `&self` and keeps its state in a
//!   `DispatchContext`
//! - Exactly one blueprint may claim a request; registration order decides
//! - A matched pattern with a rejected method is reported as 400, not 405
//! - `completed` fires on every terminal path except delegation, which the
//!   child router reports itself

use axum::http::{Method, StatusCode};

use crate::app::Application;
use crate::events::lifecycle;
use crate::http::Exchange;
use crate::routing::callback::{Callback, ControllerRef, Outcome};
use crate::routing::context::{DispatchContext, Phase, RouteState, Stage};
use crate::routing::error::{DispatchError, RouteConfigError};
use crate::routing::matcher::DomainFilter;
use crate::routing::middleware::{MiddlewareEntry, MiddlewareTarget};
use crate::routing::params::Params;
use crate::routing::route::Route;

/// Child routers mounted under one path prefix.
#[derive(Debug, Clone)]
pub struct Blueprint {
    prefix: String,
    routers: Vec<Router>,
}

impl Blueprint {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn routers(&self) -> &[Router] {
        &self.routers
    }

    /// Path left after the prefix, if the prefix leads `path`
    /// (ASCII case-insensitive).
    fn strip(&self, path: &str) -> Option<String> {
        let head = path.get(..self.prefix.len())?;
        if !head.eq_ignore_ascii_case(&self.prefix) {
            return None;
        }
        let rest = &path[self.prefix.len()..];
        Some(if rest.starts_with('/') {
            rest.to_string()
        } else {
            format!("/{rest}")
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
    blueprints: Vec<Blueprint>,
    domain: DomainFilter,
    base_path: String,
    namespace: Option<String>,
    default_route: Option<Route>,
    middlewares: Vec<MiddlewareEntry>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Configuration ---

    pub fn with_domain(mut self, domain: DomainFilter) -> Self {
        self.domain = domain;
        self
    }

    /// Prefix every request must carry; stripped before route matching.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into().trim_end_matches('/').to_string();
        self
    }

    /// Namespace used for controller and middleware names on routes that
    /// declare none.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        for route in &mut self.routes {
            route.inherit_namespace(Some(&namespace));
        }
        self.namespace = Some(namespace);
        self
    }

    pub fn domain(&self) -> &DomainFilter {
        &self.domain
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn blueprints(&self) -> &[Blueprint] {
        &self.blueprints
    }

    pub fn default_route(&self) -> Option<&Route> {
        self.default_route.as_ref()
    }

    pub fn middlewares(&self) -> &[MiddlewareEntry] {
        &self.middlewares
    }

    // --- Registration ---

    /// Append a route; it inherits the router namespace if it has none.
    pub fn push(&mut self, mut route: Route) -> &mut Route {
        route.inherit_namespace(self.namespace.as_deref());
        self.routes.push(route);
        let last = self.routes.len() - 1;
        &mut self.routes[last]
    }

    pub fn add<I, S>(&mut self, methods: I, pattern: &str, callback: impl Into<Callback>) -> &mut Route
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.push(Route::new(methods, pattern, callback))
    }

    pub fn get(&mut self, pattern: &str, callback: impl Into<Callback>) -> &mut Route {
        self.add(["GET"], pattern, callback)
    }

    pub fn post(&mut self, pattern: &str, callback: impl Into<Callback>) -> &mut Route {
        self.add(["POST"], pattern, callback)
    }

    pub fn put(&mut self, pattern: &str, callback: impl Into<Callback>) -> &mut Route {
        self.add(["PUT"], pattern, callback)
    }

    pub fn patch(&mut self, pattern: &str, callback: impl Into<Callback>) -> &mut Route {
        self.add(["PATCH"], pattern, callback)
    }

    pub fn delete(&mut self, pattern: &str, callback: impl Into<Callback>) -> &mut Route {
        self.add(["DELETE"], pattern, callback)
    }

    pub fn options(&mut self, pattern: &str, callback: impl Into<Callback>) -> &mut Route {
        self.add(["OPTIONS"], pattern, callback)
    }

    pub fn any(&mut self, pattern: &str, callback: impl Into<Callback>) -> &mut Route {
        self.push(Route::any(pattern, callback))
    }

    /// Mount `router` under `prefix`. Several routers may share a prefix;
    /// their domain filters decide which one claims a request.
    pub fn group(&mut self, prefix: &str, router: Router) -> &mut Self {
        let prefix = prefix.trim_end_matches('/').to_string();
        match self.blueprints.iter_mut().find(|b| b.prefix == prefix) {
            Some(blueprint) => blueprint.routers.push(router),
            None => self.blueprints.push(Blueprint {
                prefix,
                routers: vec![router],
            }),
        }
        self
    }

    /// Route used when nothing matches; its methods are not checked.
    pub fn fallback(&mut self, callback: impl Into<Callback>) -> &mut Route {
        self.set_fallback(Route::any("/", callback))
    }

    pub fn set_fallback(&mut self, mut route: Route) -> &mut Route {
        route.inherit_namespace(self.namespace.as_deref());
        self.default_route.insert(route)
    }

    /// Router middleware that runs for every request reaching this router.
    pub fn middleware(&mut self, entry: impl Into<MiddlewareEntry>) -> &mut Self {
        self.middlewares.push(entry.into());
        self
    }

    /// Router middleware that runs only when `key` names the matched route,
    /// occurs in the request path or matches it as a regex.
    pub fn middleware_for(&mut self, key: &str, entry: impl Into<MiddlewareEntry>) -> &mut Self {
        self.middlewares.push(entry.into().keyed(key));
        self
    }

    // --- Lookup ---

    /// Build the path of the route called `name`, searching blueprints too.
    ///
    /// Blueprint prefixes are matched before the base path is stripped, so
    /// paths into blueprints carry the prefix but not this router's base path.
    pub fn url_for(&self, name: &str, params: &Params) -> Option<String> {
        if let Some(route) = self.routes.iter().find(|r| r.get_name() == Some(name)) {
            return Some(join(&self.base_path, &route.lookup(params)));
        }
        self.blueprints.iter().find_map(|blueprint| {
            blueprint
                .routers
                .iter()
                .find_map(|router| router.url_for(name, params))
                .map(|path| join(&blueprint.prefix, &path))
        })
    }

    /// Every configuration problem in this router and its blueprints.
    pub fn validate(&self, app: &Application) -> Vec<RouteConfigError> {
        let mut errors = Vec::new();
        for route in self.routes.iter().chain(self.default_route.iter()) {
            if let Err(e) = route.compiled() {
                errors.push(e.clone().into());
            }
            match route.callback() {
                Callback::Target(raw) => errors.push(RouteConfigError::MalformedTarget(raw.clone())),
                Callback::Action {
                    controller: ControllerRef::Named(name),
                    ..
                } if !app.controllers().contains(name, route.get_namespace()) => {
                    errors.push(RouteConfigError::UnknownController(name.clone()));
                }
                _ => {}
            }
            errors.extend(unknown_middleware(app, route.middlewares(), route.get_namespace()));
        }
        errors.extend(unknown_middleware(app, &self.middlewares, self.namespace.as_deref()));
        for blueprint in &self.blueprints {
            for router in &blueprint.routers {
                errors.extend(router.validate(app));
            }
        }
        errors
    }

    // --- Dispatch ---

    /// Route the request in `exchange` through this router.
    pub fn execute(&self, app: &Application, exchange: &mut Exchange) -> RouteState {
        let path = exchange.request.path().to_string();
        self.execute_at(app, exchange, &path)
    }

    /// Route using `path` as the working path (blueprint prefixes already
    /// stripped).
    pub fn execute_at(&self, app: &Application, exchange: &mut Exchange, path: &str) -> RouteState {
        let mut ctx = DispatchContext::new(path, &self.middlewares, self.namespace.as_deref());
        app.emit(lifecycle::BEFORE_ROUTE, ctx.snapshot(exchange));

        let state = self.run(app, exchange, &mut ctx);
        if state != RouteState::Delegated {
            ctx.stage = Stage::Completed;
            app.emit(lifecycle::COMPLETED, ctx.snapshot(exchange));
        }
        state
    }

    fn run<'r>(&'r self, app: &Application, exchange: &mut Exchange, ctx: &mut DispatchContext<'r>) -> RouteState {
        match ctx.run_middleware(app, exchange, Phase::Early) {
            Ok(true) => return respond(exchange, ctx),
            Ok(false) => {}
            Err(e) => return self.fail(app, exchange, ctx, Some(e)),
        }

        ctx.stage = Stage::Matching;
        if let Some(state) = self.delegate(app, exchange, ctx) {
            return state;
        }

        if !self.base_path.is_empty() {
            match ctx.path.strip_prefix(&self.base_path) {
                Some(rest) if rest.is_empty() || rest.starts_with('/') => {
                    ctx.path = if rest.is_empty() { "/".to_string() } else { rest.to_string() };
                }
                _ => {
                    tracing::debug!(path = %ctx.path, base_path = %self.base_path, "Outside base path");
                    return self.not_found(app, exchange, ctx);
                }
            }
        }

        if !self.domain.accepts(exchange.request.host()) {
            tracing::debug!(host = ?exchange.request.host(), "Host rejected by domain filter");
            return self.not_found(app, exchange, ctx);
        }

        let method = exchange.request.effective_method();
        let is_options = method == Method::OPTIONS;
        let mut rejected = false;
        let mut matched = None;
        for route in &self.routes {
            let Some(params) = route.matches(&ctx.path) else {
                continue;
            };
            if is_options || route.match_method(method.as_str()) {
                matched = Some((route, params));
                break;
            }
            rejected = true;
        }

        let (route, params) = match matched {
            Some(found) => found,
            None if rejected => return self.bad_request(app, exchange, ctx),
            None => match &self.default_route {
                Some(route) => (route, Params::new()),
                None => return self.not_found(app, exchange, ctx),
            },
        };
        tracing::debug!(
            path = %ctx.path,
            route = %route.pattern(),
            name = ?route.get_name(),
            "Route matched"
        );
        ctx.bind(route, params);

        if is_options || exchange.response.is_prepared() {
            return respond(exchange, ctx);
        }

        self.dispatch(app, exchange, ctx, route)
    }

    /// Hand the request to the first blueprint that claims it.
    fn delegate(&self, app: &Application, exchange: &mut Exchange, ctx: &DispatchContext<'_>) -> Option<RouteState> {
        let host = exchange.request.host().map(str::to_string);
        for blueprint in &self.blueprints {
            let Some(rest) = blueprint.strip(&ctx.path) else {
                continue;
            };
            let Some(router) = blueprint
                .routers
                .iter()
                .find(|r| r.domain.accepts(host.as_deref()))
            else {
                continue;
            };
            tracing::debug!(prefix = %blueprint.prefix, path = %rest, "Delegating to blueprint");
            router.execute_at(app, exchange, &rest);
            return Some(RouteState::Delegated);
        }
        None
    }

    fn dispatch<'r>(
        &self,
        app: &Application,
        exchange: &mut Exchange,
        ctx: &mut DispatchContext<'r>,
        route: &'r Route,
    ) -> RouteState {
        ctx.stage = Stage::Dispatching;
        let explicit = exchange.request.params().clone();
        exchange.request.params_mut().merge_from(&ctx.params);
        app.emit(lifecycle::OBTAIN, ctx.snapshot(exchange));

        route.run_before(exchange);
        match ctx.run_middleware(app, exchange, Phase::Late) {
            Ok(true) => return respond(exchange, ctx),
            Ok(false) => {}
            Err(e) => return self.fail(app, exchange, ctx, Some(e)),
        }
        if exchange.response.is_prepared() {
            return respond(exchange, ctx);
        }

        let outcome = match route.invoke(app, exchange, &ctx.params, &explicit) {
            Ok(Outcome::Fail) => return self.fail(app, exchange, ctx, None),
            Ok(outcome) => outcome,
            Err(e) => return self.fail(app, exchange, ctx, Some(e)),
        };
        route.run_after(exchange);

        ctx.stage = Stage::Responding;
        match outcome {
            Outcome::Body(content) if !content.is_empty() => {
                let content = app.present(ctx.snapshot(exchange), content);
                exchange.response.set_body(content);
                exchange.response.send();
            }
            Outcome::Ready => exchange.response.send(),
            _ => {}
        }
        RouteState::Completed
    }

    fn not_found(&self, app: &Application, exchange: &mut Exchange, ctx: &DispatchContext<'_>) -> RouteState {
        tracing::warn!(path = %exchange.request.path(), "No route matched");
        self.terminate(app, exchange, ctx, StatusCode::NOT_FOUND, lifecycle::NOT_FOUND);
        RouteState::NotFound
    }

    fn bad_request(&self, app: &Application, exchange: &mut Exchange, ctx: &DispatchContext<'_>) -> RouteState {
        tracing::warn!(
            path = %exchange.request.path(),
            method = %exchange.request.effective_method(),
            "Method not accepted by matching route"
        );
        self.terminate(app, exchange, ctx, StatusCode::BAD_REQUEST, lifecycle::BAD_REQUEST);
        RouteState::BadRequest
    }

    fn fail(
        &self,
        app: &Application,
        exchange: &mut Exchange,
        ctx: &mut DispatchContext<'_>,
        error: Option<DispatchError>,
    ) -> RouteState {
        ctx.clear_queue();
        match &error {
            Some(e) => app.report(e),
            None => tracing::error!(path = %exchange.request.path(), "Route callback reported failure"),
        }
        self.terminate(app, exchange, ctx, StatusCode::SERVICE_UNAVAILABLE, lifecycle::UNAVAILABLE);
        RouteState::Failed
    }

    fn terminate(
        &self,
        app: &Application,
        exchange: &mut Exchange,
        ctx: &DispatchContext<'_>,
        status: StatusCode,
        event: &str,
    ) {
        exchange.response.set_status(status);
        if let Some(content) = app.emit_content(event, ctx.snapshot(exchange)) {
            exchange.response.set_body(content);
        }
        exchange.response.send();
    }
}

fn respond(exchange: &mut Exchange, ctx: &mut DispatchContext<'_>) -> RouteState {
    ctx.stage = Stage::Responding;
    exchange.response.send();
    RouteState::Responded
}

fn unknown_middleware(app: &Application, entries: &[MiddlewareEntry], namespace: Option<&str>) -> Vec<RouteConfigError> {
    entries
        .iter()
        .filter_map(|entry| match entry.target() {
            MiddlewareTarget::Named(name)
                if !app.middlewares().contains(name, namespace) =>
            {
                Some(RouteConfigError::UnknownMiddleware(name.clone()))
            }
            _ => None,
        })
        .collect()
}

/// Join two path pieces with exactly one `/` between them.
fn join(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return path.to_string();
    }
    if path == "/" || path.is_empty() {
        return prefix.to_string();
    }
    format!("{prefix}/{}", path.trim_start_matches('/'))
}
