//! Switchyard: a micro web framework built around a routing and dispatch
//! engine.
//!
//! Routes compile path templates to anchored regexes, routers mount child
//! routers (blueprints) under prefixes, middleware can short-circuit
//! dispatch, and every step is announced on the application's event bus.

pub mod app;
pub mod config;
pub mod events;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use app::Application;
pub use config::schema::AppConfig;
pub use http::{Exchange, HttpServer, Request, Response};
pub use lifecycle::Shutdown;
pub use routing::{Callback, Controller, Handler, Outcome, Route, Router};
