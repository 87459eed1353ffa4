use anyhow::Error;

use crate::{Body, Header, Method, Request, Response, Version};

/// Application side of an exchange.
///
/// The `on_*` callbacks observe the request while it is being parsed, `respond` is called once
/// with the complete request. The request is only borrowed, implementations that want to keep
/// any of it have to clone it.
pub trait Processor {
    fn on_request_line(&mut self, _method: Method, _target: &str, _version: Version) {}

    fn on_request_header(&mut self, _header: &Header) {}

    fn on_request_body(&mut self, _body: &Body) {}

    /// Build the response to a complete request.
    ///
    /// Errors end the exchange with `500 Internal Server Error`.
    fn respond(&mut self, request: &Request) -> Result<Response, Error>;
}

impl<F> Processor for F
where
    F: FnMut(&Request) -> Result<Response, Error>,
{
    fn respond(&mut self, request: &Request) -> Result<Response, Error> {
        self(request)
    }
}
