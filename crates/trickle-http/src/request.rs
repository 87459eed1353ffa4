use std::fmt;

use crate::{
    body::Body,
    header::{Cookie, Header},
};

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Trace,
    Connect,
}

impl Method {
    pub const ALL: [Method; 9] = [
        Method::Get,
        Method::Head,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
        Method::Options,
        Method::Trace,
        Method::Connect,
    ];

    /// Length of the longest method token.
    pub(crate) const MAX_LEN: usize = 7;

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
        }
    }

    /// Match a complete method token, case-sensitively.
    pub fn from_token(token: &str) -> Option<Method> {
        Self::ALL.into_iter().find(|m| m.as_str() == token)
    }

    /// Check if any method begins with `c`.
    pub(crate) fn starts_any(c: char) -> bool {
        Self::ALL.iter().any(|m| m.as_str().starts_with(c))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub fn as_str(self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully parsed request.
///
/// The target is kept exactly as received, URI semantics are up to the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    target: String,
    version: Version,
    headers: Vec<Header>,
    body: Body,
}

impl Request {
    pub fn new(
        method: Method,
        target: impl Into<String>,
        version: Version,
        headers: Vec<Header>,
        body: Body,
    ) -> Self {
        Self {
            method,
            target: target.into(),
            version,
            headers,
            body,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Headers in the order they appeared on the wire.
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// First header with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&Header> {
        self.headers
            .iter()
            .find(|h| h.name().eq_ignore_ascii_case(name))
    }

    /// Every header with the given name, in wire order.
    pub fn header_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Header> + 'a {
        self.headers
            .iter()
            .filter(move |h| h.name().eq_ignore_ascii_case(name))
    }

    /// Check if the client wants the connection kept open after this exchange.
    ///
    /// HTTP/1.1 connections persist unless `Connection: close` is sent, HTTP/1.0 connections only
    /// persist with `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        let mut close = false;
        let mut keep_alive = false;

        let options = self
            .header_all("connection")
            .flat_map(|h| h.as_str().split(','))
            .map(str::trim);
        for option in options {
            if option.eq_ignore_ascii_case("close") {
                close = true;
            } else if option.eq_ignore_ascii_case("keep-alive") {
                keep_alive = true;
            }
        }

        match self.version {
            _ if close => false,
            Version::Http11 => true,
            Version::Http10 => keep_alive,
        }
    }

    /// Cookies of every `Cookie` header, in wire order.
    pub fn cookies(&self) -> impl Iterator<Item = &Cookie> {
        self.headers.iter().flat_map(|h| h.cookies())
    }

    pub fn body(&self) -> &Body {
        &self.body
    }
}
