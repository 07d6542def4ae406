//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Router, application and server produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID is attached by the HTTP layer and carried in lifecycle
//!   snapshots
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
