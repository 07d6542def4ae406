//! Event subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Application declares lifecycle names (lifecycle.rs)
//!     → user code subscribes with on/once (bus.rs)
//!
//! Per request:
//!     Router reaches a lifecycle point
//!     → Application builds a Lifecycle snapshot
//!     → bus.rs runs listeners in order (fold with transform)
//!     → yielded content becomes the response body where applicable
//! ```
//!
//! # Design Decisions
//! - Events must be declared before listeners attach
//! - A listener returning `Signal::Stop` ends the round
//! - The bus is payload-generic; the lifecycle payload is one instance

pub mod bus;
pub mod lifecycle;

pub use bus::{listener, EventBus, Fired, Listener, Signal};
pub use lifecycle::Lifecycle;
