//! The application shell.
//!
//! # Responsibilities
//! - Own the root router, event bus, service container and registries
//! - Turn one `Request` into one `Response` through the router
//! - Emit lifecycle events and fold listener content back into responses
//! - Report dispatch errors
//!
//! # Design Decisions
//! - No globals: the router receives `&Application` for every dispatch
//! - Built once, then shared read-only (`Arc<Application>`); the bus and
//!   container use interior mutability so listeners and services can still
//!   be added
//! - Lifecycle event names are declared at construction

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::app::container::Container;
use crate::app::registry::{ControllerRegistry, MiddlewareRegistry};
use crate::app::view::{Renderer, ViewError, Views};
use crate::config::schema::AppConfig;
use crate::events::{lifecycle, EventBus, Fired, Lifecycle};
use crate::http::{Exchange, Request, Response};
use crate::observability::metrics;
use crate::routing::callback::Controller;
use crate::routing::context::RouteState;
use crate::routing::error::DispatchError;
use crate::routing::middleware::{Flow, Middleware};
use crate::routing::params::Params;
use crate::routing::router::Router;

pub struct Application {
    config: Arc<AppConfig>,
    router: Router,
    events: EventBus<Lifecycle>,
    container: Container,
    controllers: ControllerRegistry,
    middlewares: MiddlewareRegistry,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// An application with an empty router. See `app::bootstrap` for
    /// building the router from the config's route table.
    pub fn with_config(config: AppConfig) -> Self {
        let events = EventBus::new();
        events.declare(lifecycle::ALL, None);
        Self {
            config: Arc::new(config),
            router: Router::new(),
            events,
            container: Container::new(),
            controllers: ControllerRegistry::new(),
            middlewares: MiddlewareRegistry::new(),
        }
    }

    // --- Accessors ---

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    pub fn set_router(&mut self, router: Router) {
        self.router = router;
    }

    pub fn events(&self) -> &EventBus<Lifecycle> {
        &self.events
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    pub fn middlewares(&self) -> &MiddlewareRegistry {
        &self.middlewares
    }

    // --- Registration ---

    /// Register a controller factory under `name` (`Ns::Name` for
    /// namespaced controllers).
    pub fn register_controller<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Container) -> Arc<dyn Controller> + Send + Sync + 'static,
    {
        self.controllers.register(name, factory);
        self
    }

    /// Register a default-constructed controller type under `name`.
    pub fn controller<C>(&mut self, name: impl Into<String>) -> &mut Self
    where
        C: Controller + Default + 'static,
    {
        self.register_controller(name, |_| Arc::new(C::default()))
    }

    pub fn register_middleware(&mut self, name: impl Into<String>, middleware: impl Middleware + 'static) -> &mut Self {
        self.middlewares.register(name, middleware);
        self
    }

    pub fn middleware_fn<F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(&mut Exchange, &[String]) -> Result<Flow, DispatchError> + Send + Sync + 'static,
    {
        self.middlewares.register_fn(name, func);
        self
    }

    pub fn set_renderer(&self, renderer: impl Renderer + 'static) {
        self.container.provide(Views::new(renderer));
    }

    // --- Dispatch ---

    /// Dispatch one request. Query parameters seed the request param bag.
    pub fn handle(&self, mut request: Request) -> Response {
        let start = Instant::now();
        let query = request.query_params();
        request.params_mut().merge_from(&query);

        let method = request.method().to_string();
        let mut exchange = Exchange::new(request);
        let state = self.dispatch(&mut exchange);
        let response = exchange.into_response();

        metrics::record_request(&method, response.status().as_u16(), outcome_label(state), start);
        response
    }

    /// Route an exchange through the root router.
    pub fn dispatch(&self, exchange: &mut Exchange) -> RouteState {
        let span = tracing::debug_span!(
            "dispatch",
            request_id = %exchange.request.id(),
            method = %exchange.request.method(),
            path = %exchange.request.path(),
        );
        let _guard = span.enter();
        let state = self.router.execute(self, exchange);
        tracing::debug!(state = ?state, status = exchange.response.status().as_u16(), "Dispatch finished");
        state
    }

    pub fn url_for(&self, name: &str, params: &Params) -> Option<String> {
        self.router.url_for(name, params)
    }

    // --- Events ---

    /// Fire a lifecycle event.
    pub fn emit(&self, event: &str, snapshot: Lifecycle) -> Fired<Lifecycle> {
        metrics::record_event(event);
        self.events.fire(event, snapshot)
    }

    /// Fire `event` as a transform chain and return the content the
    /// listeners settled on, if any. Yields without content, or with empty
    /// content, leave the accumulated snapshot as it was.
    pub fn emit_content(&self, event: &str, snapshot: Lifecycle) -> Option<String> {
        metrics::record_event(event);
        let adopt: &dyn Fn(Lifecycle) -> Option<Lifecycle> =
            &|yielded: Lifecycle| yielded.content.as_deref().is_some_and(|c| !c.is_empty()).then_some(yielded);
        self.events.trigger(event, snapshot, Some(adopt)).args.content
    }

    /// Pass callback output through `present` listeners.
    pub fn present(&self, snapshot: Lifecycle, content: String) -> String {
        let snapshot = snapshot.with_content(content.clone());
        self.emit_content(lifecycle::PRESENT, snapshot).unwrap_or(content)
    }

    /// Report a dispatch failure.
    pub fn report(&self, error: &DispatchError) {
        tracing::error!(error = %error, "Dispatch failed");
    }

    // --- Views ---

    pub fn render(&self, template: &str, data: &Value) -> Result<String, ViewError> {
        self.container
            .resolve::<Views>()
            .ok_or(ViewError::NoRenderer)?
            .render(template, data)
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("router", &self.router)
            .field("events", &self.events)
            .field("controllers", &self.controllers)
            .field("middlewares", &self.middlewares)
            .finish_non_exhaustive()
    }
}

fn outcome_label(state: RouteState) -> &'static str {
    match state {
        RouteState::Completed => "completed",
        RouteState::Responded => "responded",
        RouteState::NotFound => "not_found",
        RouteState::BadRequest => "bad_request",
        RouteState::Delegated => "delegated",
        RouteState::Failed => "failed",
    }
}
