//! Per-dispatch routing state.
//!
//! # Responsibilities
//! - Hold everything a single `Router::execute` call learns while running:
//!   working path, captured params, matched route, middleware queue, stage
//! - Run the middleware queue with short-circuit semantics
//! - Produce lifecycle snapshots for event listeners
//!
//! # Design Decisions
//! - One context per router level; a blueprint gets a fresh one
//! - Routers and routes are only borrowed, never mutated
//! - Keyed router middleware whose key matches the request path runs before
//!   matching, like unkeyed entries; the rest waits until a route is bound,
//!   so its key can be tested against the route name

use std::collections::VecDeque;
use std::sync::Arc;

use crate::app::Application;
use crate::events::lifecycle::{self, Lifecycle};
use crate::http::Exchange;
use crate::routing::error::DispatchError;
use crate::routing::middleware::{Flow, Middleware, MiddlewareEntry, MiddlewareTarget};
use crate::routing::params::Params;
use crate::routing::route::Route;

/// Where a dispatch currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Idle,
    Matching,
    Middleware,
    Dispatching,
    Responding,
    Completed,
}

/// How `Router::execute` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteState {
    /// A callback ran and the response was produced.
    Completed,
    /// Sent without invoking a callback (OPTIONS or a prepared response).
    Responded,
    NotFound,
    BadRequest,
    /// A blueprint router handled the request.
    Delegated,
    /// Middleware or callback failed; 503.
    Failed,
}

impl RouteState {
    /// Status code a terminal state implies, if it forces one.
    pub fn status(self) -> Option<u16> {
        match self {
            RouteState::NotFound => Some(404),
            RouteState::BadRequest => Some(400),
            RouteState::Failed => Some(503),
            _ => None,
        }
    }
}

/// Which part of the middleware queue to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Before matching: unkeyed router middleware and entries whose key
    /// matches the request path.
    Early,
    /// After binding: deferred keyed entries, then route middleware.
    Late,
}

pub struct DispatchContext<'r> {
    /// Path left after blueprint prefixes and the base path are stripped.
    pub path: String,
    pub params: Params,
    pub route: Option<&'r Route>,
    pub namespace: Option<String>,
    pub stage: Stage,
    queue: VecDeque<MiddlewareEntry>,
    deferred: VecDeque<MiddlewareEntry>,
}

impl<'r> DispatchContext<'r> {
    pub fn new(
        path: impl Into<String>,
        middlewares: &[MiddlewareEntry],
        namespace: Option<&str>,
    ) -> Self {
        Self {
            path: path.into(),
            params: Params::new(),
            route: None,
            namespace: namespace.map(str::to_string),
            stage: Stage::Idle,
            queue: middlewares.iter().cloned().collect(),
            deferred: VecDeque::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.route.and_then(Route::get_name)
    }

    /// Entries still waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.len() + self.deferred.len()
    }

    /// Bind the matched route: its captures, namespace and middleware.
    pub fn bind(&mut self, route: &'r Route, params: Params) {
        self.params = params;
        if let Some(namespace) = route.get_namespace() {
            self.namespace = Some(namespace.to_string());
        }
        let mut queue = std::mem::take(&mut self.deferred);
        queue.extend(self.queue.drain(..));
        queue.extend(route.middlewares().iter().cloned());
        self.queue = queue;
        self.route = Some(route);
    }

    /// Drop everything still queued.
    pub fn clear_queue(&mut self) {
        self.queue.clear();
        self.deferred.clear();
    }

    /// Run queued middleware in order.
    ///
    /// Returns `Ok(true)` when the response became prepared and dispatch
    /// must skip to responding. The queue is empty afterwards either way.
    pub fn run_middleware(
        &mut self,
        app: &Application,
        exchange: &mut Exchange,
        phase: Phase,
    ) -> Result<bool, DispatchError> {
        let previous = self.stage;
        self.stage = Stage::Middleware;

        while let Some(entry) = self.queue.pop_front() {
            // Before matching only the path can satisfy a key; entries that
            // could still match the route name wait for bind()
            if phase == Phase::Early && !entry.applies_to_path(exchange.request.path()) {
                self.deferred.push_back(entry);
                continue;
            }
            if !entry.applies(self.name(), exchange.request.path()) {
                tracing::trace!(middleware = %entry.label(), "Keyed middleware skipped");
                continue;
            }

            let mut snapshot = self.snapshot(exchange);
            snapshot.middleware = Some(entry.label());
            app.emit(lifecycle::NEXT, snapshot);

            let flow = match self
                .resolve(app, &entry)
                .and_then(|middleware| middleware.handle(exchange, entry.args()))
            {
                Ok(flow) => flow,
                Err(e) => {
                    self.clear_queue();
                    return Err(e);
                }
            };
            let prepared = match flow {
                Flow::Next => exchange.response.is_prepared(),
                Flow::Replace(response) => {
                    exchange.response = response;
                    exchange.response.prepare();
                    true
                }
                Flow::Halt => {
                    exchange.response.prepare();
                    true
                }
            };
            if prepared {
                tracing::debug!(middleware = %entry.label(), "Middleware prepared the response");
                self.clear_queue();
                self.stage = Stage::Responding;
                return Ok(true);
            }
        }

        // Early runs leave keyed entries in `deferred` for bind()
        self.stage = previous;
        Ok(false)
    }

    fn resolve(&self, app: &Application, entry: &MiddlewareEntry) -> Result<Arc<dyn Middleware>, DispatchError> {
        match entry.target() {
            MiddlewareTarget::Instance(middleware) => Ok(middleware.clone()),
            MiddlewareTarget::Named(name) => Ok(app.middlewares().resolve(name, self.namespace.as_deref())?),
        }
    }

    /// Lifecycle payload describing this dispatch.
    pub fn snapshot(&self, exchange: &Exchange) -> Lifecycle {
        Lifecycle {
            request_id: exchange.request.id().to_string(),
            method: exchange.request.effective_method().to_string(),
            path: self.path.clone(),
            host: exchange.request.host().map(str::to_string),
            route: self.route.map(|r| r.pattern().to_string()),
            middleware: None,
            params: self.params.clone(),
            stage: self.stage,
            status: exchange.response.status().as_u16(),
            content: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Request, Response};
    use crate::routing::callback::{Handler, Outcome};
    use axum::http::{Method, StatusCode};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counter(hits: &Arc<AtomicU32>) -> MiddlewareEntry {
        let hits = hits.clone();
        MiddlewareEntry::from_fn(move |_, _| {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(Flow::Next)
        })
    }

    fn exchange(path: &str) -> Exchange {
        Exchange::new(Request::new(Method::GET, path))
    }

    #[test]
    fn test_replacement_halts_rest_of_batch() {
        let app = Application::new();
        let first = Arc::new(AtomicU32::new(0));
        let later = Arc::new(AtomicU32::new(0));
        let queue = vec![
            counter(&first),
            MiddlewareEntry::from_fn(|_, _| {
                Ok(Flow::Replace(Response::new().with_status(StatusCode::FORBIDDEN).with_body("no")))
            }),
            counter(&later),
        ];
        let mut ctx = DispatchContext::new("/", &queue, None);
        let mut ex = exchange("/");

        assert!(ctx.run_middleware(&app, &mut ex, Phase::Early).unwrap());
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(later.load(Ordering::SeqCst), 0);
        assert_eq!(ex.response.status(), StatusCode::FORBIDDEN);
        assert!(ex.response.is_prepared());
        assert_eq!(ctx.pending(), 0);
    }

    #[test]
    fn test_each_entry_runs_once() {
        let app = Application::new();
        let hits = Arc::new(AtomicU32::new(0));
        let queue = vec![counter(&hits), counter(&hits)];
        let mut ctx = DispatchContext::new("/", &queue, None);
        let mut ex = exchange("/");

        assert!(!ctx.run_middleware(&app, &mut ex, Phase::Early).unwrap());
        assert!(!ctx.run_middleware(&app, &mut ex, Phase::Late).unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_keyed_entries_wait_for_route_name() {
        let app = Application::new();
        let hits = Arc::new(AtomicU32::new(0));
        let queue = vec![counter(&hits).keyed("account.show")];
        let mut ctx = DispatchContext::new("/me", &queue, None);
        let mut ex = exchange("/me");

        ctx.run_middleware(&app, &mut ex, Phase::Early).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.pending(), 1);

        let mut route = Route::new(["GET"], "/me", Handler::new(Vec::<&str>::new(), |_, _| Ok(Outcome::Done)));
        route.name("account.show");
        ctx.bind(&route, Params::new());
        ctx.run_middleware(&app, &mut ex, Phase::Late).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_path_keyed_entries_run_before_matching() {
        let app = Application::new();
        let by_path = Arc::new(AtomicU32::new(0));
        let by_regex = Arc::new(AtomicU32::new(0));
        let by_name = Arc::new(AtomicU32::new(0));
        let queue = vec![
            counter(&by_path).keyed("/admin"),
            counter(&by_regex).keyed(r"^/\w+/users$"),
            counter(&by_name).keyed("users.index"),
        ];
        let mut ctx = DispatchContext::new("/admin/users", &queue, None);
        let mut ex = exchange("/admin/users");

        ctx.run_middleware(&app, &mut ex, Phase::Early).unwrap();
        assert_eq!(by_path.load(Ordering::SeqCst), 1);
        assert_eq!(by_regex.load(Ordering::SeqCst), 1);
        assert_eq!(by_name.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.pending(), 1);
    }

    #[test]
    fn test_unknown_named_middleware_is_error() {
        let app = Application::new();
        let queue = vec![MiddlewareEntry::named("missing")];
        let mut ctx = DispatchContext::new("/", &queue, None);
        let mut ex = exchange("/");
        let err = ctx.run_middleware(&app, &mut ex, Phase::Early).unwrap_err();
        assert!(matches!(err, DispatchError::Config(_)));
        assert_eq!(ctx.pending(), 0);
    }

    #[test]
    fn test_route_state_status() {
        assert_eq!(RouteState::NotFound.status(), Some(404));
        assert_eq!(RouteState::BadRequest.status(), Some(400));
        assert_eq!(RouteState::Failed.status(), Some(503));
        assert_eq!(RouteState::Completed.status(), None);
    }
}
