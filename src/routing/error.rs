//! Routing and dispatch error types.

use std::fmt::Display;

use thiserror::Error;

use crate::routing::pattern::PatternError;

/// A route or middleware target that cannot be resolved.
#[derive(Debug, Clone, Error)]
pub enum RouteConfigError {
    #[error("malformed callback target `{0}`")]
    MalformedTarget(String),

    #[error("unknown controller `{0}`")]
    UnknownController(String),

    #[error("controller `{controller}` has no action `{action}`")]
    UnknownAction { controller: String, action: String },

    #[error("unknown middleware `{0}`")]
    UnknownMiddleware(String),

    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// Failure while running middleware or invoking a route callback.
///
/// Every variant ends as a 503 `unavailable` outcome at the router.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("missing argument `{0}`")]
    MissingArgument(String),

    #[error("too many arguments: expected {expected}, got {given}")]
    TooManyArguments { expected: usize, given: usize },

    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error(transparent)]
    Config(#[from] RouteConfigError),

    #[error("{0}")]
    Handler(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl DispatchError {
    /// Failure raised by application code.
    pub fn handler(message: impl Display) -> Self {
        Self::Handler(message.to_string())
    }
}
