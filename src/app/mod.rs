//! Application shell.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     AppConfig → bootstrap.rs (routers, blueprints)
//!     → setup hook (registry.rs: controllers, middleware; container.rs: services)
//!     → application.rs (validated, then shared as Arc<Application>)
//!
//! Per request:
//!     Request → Application::handle
//!     → Router::execute(&app, exchange)
//!     → lifecycle events through the app's EventBus
//!     → Response
//! ```

pub mod application;
pub mod bootstrap;
pub mod container;
pub mod registry;
pub mod view;

pub use application::Application;
pub use bootstrap::{build_application, build_router, BootError, Setup};
pub use container::Container;
pub use registry::{ControllerRegistry, MiddlewareRegistry};
pub use view::{Renderer, Templates, ViewError, Views};
