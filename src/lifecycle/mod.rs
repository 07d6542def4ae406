//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → server stops accepting → drain → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup lives in main: config, logging, application, listener
//! - Ordered shutdown: stop accept, drain in-flight dispatches, close

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
