//! The request/response pair owned by one dispatch.

use crate::http::request::Request;
use crate::http::response::Response;

/// Request-scoped state handed to middleware, hooks and callbacks.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub request: Request,
    pub response: Response,
}

impl Exchange {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: Response::new(),
        }
    }

    pub fn into_response(self) -> Response {
        self.response
    }
}
