//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, trace layers)
//!     → request.rs (method, path, host, headers, buffered body)
//!     → exchange.rs (request + response handed to the router)
//!     → [app::Application dispatches on the blocking pool]
//!     → response.rs (status, headers, body → Axum response)
//!     → Send to client
//! ```

pub mod exchange;
pub mod request;
pub mod response;
pub mod server;

pub use exchange::Exchange;
pub use request::{Request, X_HTTP_METHOD_OVERRIDE, X_REQUEST_ID};
pub use response::Response;
pub use server::{AppState, HttpServer, ServerError};
