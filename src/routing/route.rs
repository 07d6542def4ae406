//! A single routable unit.
//!
//! # Responsibilities
//! - Own pattern, methods, callback, middleware, namespace, name and filters
//! - Keep the compiled pattern in sync with pattern and filters
//! - Resolve and invoke the callback with arranged arguments
//! - Run before/after/error hooks around invocation
//! - Reverse-fill the pattern for URL generation
//!
//! # Design Decisions
//! - Routes hold no per-request state; captures are passed in
//! - Methods are stored upper-cased and compared case-insensitively
//! - An invocation error is handed to the error hooks; with no error hooks
//!   it is returned to the caller

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::app::Application;
use crate::http::Exchange;
use crate::routing::callback::{Callback, ControllerRef, Outcome};
use crate::routing::error::{DispatchError, RouteConfigError};
use crate::routing::middleware::MiddlewareEntry;
use crate::routing::params::Params;
use crate::routing::pattern::{self, CompiledPattern, PatternError};

/// Methods a route accepts when none are given.
pub const DEFAULT_METHODS: [&str; 2] = ["GET", "POST"];

/// Methods accepted by [`Route::any`].
pub const ANY_METHODS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

pub type RouteHook = Arc<dyn Fn(&Route, &mut Exchange) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&Route, &mut Exchange, &DispatchError) + Send + Sync>;

#[derive(Clone)]
pub struct Route {
    pattern: String,
    compiled: Result<CompiledPattern, PatternError>,
    methods: Vec<String>,
    callback: Callback,
    middlewares: Vec<MiddlewareEntry>,
    namespace: Option<String>,
    name: Option<String>,
    filters: HashMap<String, String>,
    before: Vec<RouteHook>,
    after: Vec<RouteHook>,
    errors: Vec<ErrorHook>,
}

impl Route {
    /// Create a route; an empty method list means [`DEFAULT_METHODS`].
    pub fn new<I, S>(methods: I, pattern: impl Into<String>, callback: impl Into<Callback>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pattern = pattern.into();
        let filters = HashMap::new();
        let compiled = CompiledPattern::new(&pattern, &filters);
        if let Err(e) = &compiled {
            tracing::error!(pattern = %pattern, error = %e, "Route pattern does not compile");
        }
        let mut route = Self {
            pattern,
            compiled,
            methods: Vec::new(),
            callback: callback.into(),
            middlewares: Vec::new(),
            namespace: None,
            name: None,
            filters,
            before: Vec::new(),
            after: Vec::new(),
            errors: Vec::new(),
        };
        route.set_methods(methods);
        route
    }

    /// A route accepting every standard method.
    pub fn any(pattern: impl Into<String>, callback: impl Into<Callback>) -> Self {
        Self::new(ANY_METHODS, pattern, callback)
    }

    fn recompile(&mut self) {
        self.compiled = CompiledPattern::new(&self.pattern, &self.filters);
        if let Err(e) = &self.compiled {
            tracing::error!(pattern = %self.pattern, error = %e, "Route pattern does not compile");
        }
    }

    // --- Builder ---

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn namespace(&mut self, namespace: impl Into<String>) -> &mut Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn middleware(&mut self, entry: impl Into<MiddlewareEntry>) -> &mut Self {
        self.middlewares.push(entry.into());
        self
    }

    /// Override the regex fragment for placeholder `name`.
    pub fn filter(&mut self, name: impl Into<String>, fragment: impl Into<String>) -> &mut Self {
        self.filters.insert(name.into(), fragment.into());
        self.recompile();
        self
    }

    pub fn set_pattern(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.pattern = pattern.into();
        self.recompile();
        self
    }

    pub fn set_methods<I, S>(&mut self, methods: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.methods.clear();
        for method in methods {
            let method = method.as_ref().trim().to_ascii_uppercase();
            if !method.is_empty() && !self.methods.contains(&method) {
                self.methods.push(method);
            }
        }
        if self.methods.is_empty() {
            self.methods = DEFAULT_METHODS.iter().map(|m| m.to_string()).collect();
        }
        self
    }

    pub fn before(&mut self, hook: impl Fn(&Route, &mut Exchange) + Send + Sync + 'static) -> &mut Self {
        self.before.push(Arc::new(hook));
        self
    }

    pub fn after(&mut self, hook: impl Fn(&Route, &mut Exchange) + Send + Sync + 'static) -> &mut Self {
        self.after.push(Arc::new(hook));
        self
    }

    pub fn on_error(
        &mut self,
        hook: impl Fn(&Route, &mut Exchange, &DispatchError) + Send + Sync + 'static,
    ) -> &mut Self {
        self.errors.push(Arc::new(hook));
        self
    }

    /// Fill the namespace if the route has none.
    pub(crate) fn inherit_namespace(&mut self, namespace: Option<&str>) {
        if self.namespace.is_none() {
            self.namespace = namespace.map(str::to_string);
        }
    }

    // --- Accessors ---

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn compiled(&self) -> Result<&CompiledPattern, &PatternError> {
        self.compiled.as_ref()
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn callback(&self) -> &Callback {
        &self.callback
    }

    pub fn middlewares(&self) -> &[MiddlewareEntry] {
        &self.middlewares
    }

    pub fn get_namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn filters(&self) -> &HashMap<String, String> {
        &self.filters
    }

    // --- Matching ---

    /// Case-insensitive membership test against the method list.
    pub fn match_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    /// Captured params if `path` matches; a broken pattern never matches.
    pub fn matches(&self, path: &str) -> Option<Params> {
        self.compiled.as_ref().ok()?.captures(path)
    }

    /// Build a concrete path from `params`.
    pub fn lookup(&self, params: &Params) -> String {
        pattern::substitute(&self.pattern, params)
    }

    // --- Invocation ---

    pub fn run_before(&self, exchange: &mut Exchange) {
        for hook in &self.before {
            hook(self, exchange);
        }
    }

    pub fn run_after(&self, exchange: &mut Exchange) {
        for hook in &self.after {
            hook(self, exchange);
        }
    }

    /// Run the error hooks. With none registered the error is handed back.
    pub fn run_error(&self, exchange: &mut Exchange, error: DispatchError) -> Result<(), DispatchError> {
        if self.errors.is_empty() {
            return Err(error);
        }
        for hook in &self.errors {
            hook(self, exchange, &error);
        }
        Ok(())
    }

    /// Invoke the callback with `captured` params ahead of `explicit` ones.
    pub fn invoke(
        &self,
        app: &Application,
        exchange: &mut Exchange,
        captured: &Params,
        explicit: &Params,
    ) -> Result<Outcome, DispatchError> {
        let params = captured.merged_ahead(explicit);
        match self.call(app, exchange, &params) {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                tracing::debug!(route = %self.pattern, error = %error, "Route invocation failed");
                self.run_error(exchange, error)?;
                Ok(Outcome::Fail)
            }
        }
    }

    fn call(&self, app: &Application, exchange: &mut Exchange, params: &Params) -> Result<Outcome, DispatchError> {
        match &self.callback {
            Callback::Handler(handler) => {
                let args = handler.signature().arrange(params)?;
                handler.call(exchange, &args)
            }
            Callback::Action { controller, action } => {
                let (label, instance) = match controller {
                    ControllerRef::Instance(instance) => ("<controller>".to_string(), instance.clone()),
                    ControllerRef::Named(name) => (
                        name.clone(),
                        app.controllers()
                            .instantiate(name, self.namespace.as_deref(), app.container())?,
                    ),
                };
                let signature = instance.signature(action).ok_or_else(|| RouteConfigError::UnknownAction {
                    controller: label,
                    action: action.clone(),
                })?;
                let args = signature.arrange(params)?;
                instance.call(action, exchange, &args)
            }
            Callback::Target(raw) => Err(RouteConfigError::MalformedTarget(raw.clone()).into()),
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("methods", &self.methods)
            .field("callback", &self.callback.label())
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("middlewares", &self.middlewares)
            .finish_non_exhaustive()
    }
}
