//! Response accessor surface.
//!
//! # Responsibilities
//! - Hold status, headers and body written by middleware and callbacks
//! - Track the `prepared` flag that short-circuits dispatch
//! - Track whether the router already sent the response
//!
//! # Design Decisions
//! - `send` only marks the response; the HTTP layer writes it after dispatch
//! - Error statuses carry an empty body unless a listener provides one

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;

/// Outgoing response for one dispatch.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
    prepared: bool,
    sent: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: String::new(),
            prepared: false,
            sent: false,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Set a header, ignoring invalid names or values.
    pub fn set_header(&mut self, name: &str, value: &str) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Ignoring invalid response header"),
        }
    }

    /// Mark the response as fully formed; dispatch will not invoke a callback.
    pub fn prepare(&mut self) {
        self.prepared = true;
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn send(&mut self) {
        if !self.sent {
            tracing::trace!(status = %self.status, bytes = self.body.len(), "Response sent");
        }
        self.sent = true;
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let has_body = !self.body.is_empty();
        let mut response = axum::response::Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        response.headers_mut().extend(self.headers);
        if has_body && !response.headers().contains_key(CONTENT_TYPE) {
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let res = Response::new();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.body().is_empty());
        assert!(!res.is_prepared());
        assert!(!res.is_sent());
    }

    #[test]
    fn test_into_http_response() {
        let res = Response::new()
            .with_status(StatusCode::CREATED)
            .with_header("content-type", "text/plain")
            .with_body("done");
        let http = res.into_response();
        assert_eq!(http.status(), StatusCode::CREATED);
        assert_eq!(http.headers()["content-type"], "text/plain");
    }

    #[test]
    fn test_default_content_type_only_with_body() {
        let http = Response::new().with_body("<p>hi</p>").into_response();
        assert_eq!(http.headers()["content-type"], "text/html; charset=utf-8");
        let http = Response::new().with_status(StatusCode::NOT_FOUND).into_response();
        assert!(http.headers().get("content-type").is_none());
    }
}
