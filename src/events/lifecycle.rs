//! Dispatch lifecycle events.
//!
//! The router emits these through the application's bus. Listeners receive a
//! [`Lifecycle`] snapshot; on `present`, `notFound`, `badRequest` and
//! `unavailable` a listener may yield a snapshot with new `content`, which
//! becomes the response body.

use crate::routing::context::Stage;
use crate::routing::params::Params;

pub const BEFORE_ROUTE: &str = "beforeRoute";
pub const NEXT: &str = "next";
pub const OBTAIN: &str = "obtain";
pub const PRESENT: &str = "present";
pub const COMPLETED: &str = "completed";
pub const NOT_FOUND: &str = "notFound";
pub const BAD_REQUEST: &str = "badRequest";
pub const UNAVAILABLE: &str = "unavailable";

/// Every event the application declares at startup.
pub const ALL: [&str; 8] = [
    BEFORE_ROUTE,
    NEXT,
    OBTAIN,
    PRESENT,
    COMPLETED,
    NOT_FOUND,
    BAD_REQUEST,
    UNAVAILABLE,
];

/// Snapshot of a dispatch handed to lifecycle listeners.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lifecycle {
    pub request_id: String,
    pub method: String,
    /// Path as seen by the router emitting the event.
    pub path: String,
    pub host: Option<String>,
    pub route: Option<String>,
    /// Middleware about to run (`next` only).
    pub middleware: Option<String>,
    pub params: Params,
    /// Dispatch stage when the event fired.
    pub stage: Stage,
    pub status: u16,
    pub content: Option<String>,
}

impl Lifecycle {
    /// Copy of this snapshot carrying `content`.
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..self.clone()
        }
    }
}
