//! Name → controller / middleware lookup.
//!
//! # Design Decisions
//! - Controllers are registered as factories and instantiated per
//!   invocation, so a route referencing one by name pays nothing until it
//!   runs
//! - Controller names try the namespace first (`Ns::Name`), then the bare
//!   name; middleware names try the bare name first, then the namespace
//! - A leading `::` marks a name as global: no namespace is applied

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::app::container::Container;
use crate::routing::callback::Controller;
use crate::routing::error::{DispatchError, RouteConfigError};
use crate::routing::middleware::{Flow, Middleware};
use crate::http::Exchange;

pub type ControllerFactory = Arc<dyn Fn(&Container) -> Arc<dyn Controller> + Send + Sync>;

/// Join a namespace and a name with `::`.
pub fn qualify(namespace: &str, name: &str) -> String {
    format!("{}::{}", namespace.trim_end_matches("::"), name)
}

/// Names to try for `name` under `namespace`, in order.
fn candidates(name: &str, namespace: Option<&str>, namespace_first: bool) -> Vec<String> {
    if let Some(global) = name.strip_prefix("::") {
        return vec![global.to_string()];
    }
    match namespace.filter(|ns| !ns.is_empty()) {
        Some(ns) if namespace_first => vec![qualify(ns, name), name.to_string()],
        Some(ns) => vec![name.to_string(), qualify(ns, name)],
        None => vec![name.to_string()],
    }
}

#[derive(Default, Clone)]
pub struct ControllerRegistry {
    factories: HashMap<String, ControllerFactory>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Container) -> Arc<dyn Controller> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    fn find(&self, name: &str, namespace: Option<&str>) -> Option<&ControllerFactory> {
        candidates(name, namespace, true)
            .iter()
            .find_map(|candidate| self.factories.get(candidate))
    }

    pub fn contains(&self, name: &str, namespace: Option<&str>) -> bool {
        self.find(name, namespace).is_some()
    }

    /// Build a fresh controller for `name`.
    pub fn instantiate(
        &self,
        name: &str,
        namespace: Option<&str>,
        container: &Container,
    ) -> Result<Arc<dyn Controller>, RouteConfigError> {
        let factory = self
            .find(name, namespace)
            .ok_or_else(|| RouteConfigError::UnknownController(name.to_string()))?;
        Ok(factory(container))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ControllerRegistry").field("names", &names).finish()
    }
}

#[derive(Default, Clone)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, Arc<dyn Middleware>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, middleware: impl Middleware + 'static) {
        self.entries.insert(name.into(), Arc::new(middleware));
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&mut Exchange, &[String]) -> Result<Flow, DispatchError> + Send + Sync + 'static,
    {
        self.register(name, func);
    }

    fn find(&self, name: &str, namespace: Option<&str>) -> Option<&Arc<dyn Middleware>> {
        candidates(name, namespace, false)
            .iter()
            .find_map(|candidate| self.entries.get(candidate))
    }

    pub fn contains(&self, name: &str, namespace: Option<&str>) -> bool {
        self.find(name, namespace).is_some()
    }

    pub fn resolve(&self, name: &str, namespace: Option<&str>) -> Result<Arc<dyn Middleware>, RouteConfigError> {
        self.find(name, namespace)
            .cloned()
            .ok_or_else(|| RouteConfigError::UnknownMiddleware(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("MiddlewareRegistry").field("names", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::callback::{Arguments, Outcome, Signature};

    struct Named(&'static str);

    impl Controller for Named {
        fn signature(&self, _: &str) -> Option<Signature> {
            Some(Signature::empty())
        }

        fn call(&self, _: &str, _: &mut Exchange, _: &Arguments) -> Result<Outcome, DispatchError> {
            Ok(self.0.into())
        }
    }

    fn registry() -> ControllerRegistry {
        let mut registry = ControllerRegistry::new();
        registry.register("Home", |_| Arc::new(Named("global")));
        registry.register("Admin::Home", |_| Arc::new(Named("admin")));
        registry
    }

    fn label(controller: Arc<dyn Controller>) -> Outcome {
        let mut ex = Exchange::new(crate::http::Request::new(axum::http::Method::GET, "/"));
        controller.call("x", &mut ex, &Arguments::default()).unwrap()
    }

    #[test]
    fn test_namespace_first_for_controllers() {
        let registry = registry();
        let container = Container::new();
        let admin = registry.instantiate("Home", Some("Admin"), &container).unwrap();
        assert_eq!(label(admin), Outcome::body("admin"));
        let fallback = registry.instantiate("Home", Some("Shop"), &container).unwrap();
        assert_eq!(label(fallback), Outcome::body("global"));
        let global = registry.instantiate("::Home", Some("Admin"), &container).unwrap();
        assert_eq!(label(global), Outcome::body("global"));
    }

    #[test]
    fn test_unknown_controller() {
        let err = registry()
            .instantiate("Missing", None, &Container::new())
            .err()
            .unwrap();
        assert!(matches!(err, RouteConfigError::UnknownController(name) if name == "Missing"));
    }

    #[test]
    fn test_middleware_global_first() {
        let mut registry = MiddlewareRegistry::new();
        registry.register_fn("auth", |_, _| Ok(Flow::Next));
        registry.register_fn("Admin::audit", |_, _| Ok(Flow::Halt));
        assert!(registry.contains("auth", Some("Admin")));
        assert!(registry.contains("audit", Some("Admin")));
        assert!(!registry.contains("audit", None));
        assert!(registry.resolve("nope", None).is_err());
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("Admin::", "Home"), "Admin::Home");
        assert_eq!(candidates("Home", Some(""), true), ["Home"]);
    }
}
