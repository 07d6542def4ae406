//! Request accessor surface.
//!
//! # Responsibilities
//! - Carry method, path, query, headers and body of one inbound request
//! - Resolve the effective method (`X-Http-Method-Override` wins)
//! - Expose the host used by domain filters
//! - Hold the request param bag that dispatch merges captures into
//!
//! # Design Decisions
//! - Request ID taken from `x-request-id` when the HTTP layer set one
//! - Path is kept raw (percent-encoded); captures are decoded on match

use axum::body::Bytes;
use axum::http::{request::Parts, HeaderMap, HeaderName, HeaderValue, Method};
use uuid::Uuid;

use crate::routing::params::Params;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_HTTP_METHOD_OVERRIDE: &str = "x-http-method-override";

/// One inbound request.
#[derive(Debug, Clone)]
pub struct Request {
    id: String,
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    params: Params,
}

impl Request {
    /// Build a request from a method and a request target (`/path?query#frag`).
    pub fn new(method: Method, target: &str) -> Self {
        let target = target.split('#').next().unwrap_or_default();
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };
        Self {
            id: Uuid::new_v4().to_string(),
            method,
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            params: Params::new(),
        }
    }

    /// Convert an HTTP request head and its buffered body.
    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        let target = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        let mut request = Self::new(parts.method, &target);
        if let Some(id) = parts.headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok()) {
            request.id = id.to_string();
        }
        // HTTP/2 carries the host in the authority, not a header
        if !parts.headers.contains_key("host") {
            if let Some(authority) = parts.uri.authority() {
                if let Ok(value) = HeaderValue::from_str(authority.as_str()) {
                    request.headers.insert("host", value);
                }
            }
        }
        request.headers.extend(parts.headers);
        request.body = body;
        request
    }

    /// Add a header, ignoring names or values that are not valid HTTP.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Ignoring invalid header"),
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Method as received.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Method used for route matching.
    pub fn effective_method(&self) -> Method {
        self.header(X_HTTP_METHOD_OVERRIDE)
            .and_then(|m| Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes()).ok())
            .unwrap_or_else(|| self.method.clone())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn query_params(&self) -> Params {
        self.query.as_deref().map(Params::from_query).unwrap_or_default()
    }

    /// Host header without port.
    pub fn host(&self) -> Option<&str> {
        let host = self.header("host")?;
        // Bracketed IPv6 literals keep their colons
        if let Some(end) = host.strip_prefix('[').and_then(|h| h.find(']')) {
            return Some(&host[..end + 2]);
        }
        Some(host.split(':').next().unwrap_or(host))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The request param bag; route captures are merged in during dispatch.
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }
}
