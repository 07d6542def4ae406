//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Bootstrap:
//!     Route definitions (code or config)
//!     → pattern.rs (compile templates to anchored regexes)
//!     → route.rs (methods, callback, middleware, hooks)
//!     → router.rs (ordered table, blueprints, domain, base path)
//!
//! Per request:
//!     router.rs execute
//!     → context.rs (fresh DispatchContext, early middleware)
//!     → blueprints (first claiming prefix recurses)
//!     → matcher.rs (domain filter) → route.rs (pattern + method)
//!     → context.rs (deferred + route middleware)
//!     → callback.rs (arrange arguments, invoke)
//!     → Outcome → response body / status
//! ```
//!
//! # Design Decisions
//! - Routers and routes are immutable after bootstrap
//! - First match wins, in registration order
//! - All request-scoped state lives in `DispatchContext` and `Exchange`

pub mod callback;
pub mod context;
pub mod error;
pub mod matcher;
pub mod middleware;
pub mod params;
pub mod pattern;
pub mod route;
pub mod router;

pub use callback::{Arguments, Callback, Controller, ControllerRef, Handler, Outcome, ParamSpec, Signature};
pub use context::{DispatchContext, RouteState, Stage};
pub use error::{DispatchError, RouteConfigError};
pub use matcher::DomainFilter;
pub use middleware::{Flow, Middleware, MiddlewareEntry};
pub use params::Params;
pub use pattern::{CompiledPattern, PatternError};
pub use route::Route;
pub use router::{Blueprint, Router};
