//! Request grammar state machine.
//!
//! The grammar reads the request line and headers from the character window of an `Exchange`.
//! Each `Step` runs until it completes a token or runs out of chars. When it runs out, it returns
//! `Transition::NeedInput` with the step to resume at once more input was decoded.
//!
//! Tokens of unbounded length (method, target, header name and value) are appended to owned
//! accumulators as they are read, so suspending never loses or duplicates a char. Fixed-length
//! tokens (the version, CRLF pairs) are only consumed once all of their chars are available.

use std::mem;

use tracing::{event, Level};

use crate::{
    body::{BodyMaterializer, BodyProgress, BodyStrategy},
    header::{is_ows, is_token_char, HeaderName, HeaderParser, HeaderRegistry, Interner},
    request::{Method, Request, Version},
    Body, ByteBuffer, Config, Decoder, Header, Status,
};

/// Number of empty lines tolerated before a request line.
const MAX_LEADING_LINES: usize = 2;

/// Length of `HTTP/x.y` followed by CRLF.
const VERSION_LINE_LEN: usize = 10;

/// Grammar state, one per kind of token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Method,
    Target,
    Version,
    HeaderLine,
    HeaderName,
    SkipOws,
    HeaderValue,
    Body,
    BodyRead,
}

impl Step {
    /// Check if the step reads from the character window.
    ///
    /// Body bytes are taken from the byte buffer directly, without decoding.
    pub fn decodes(self) -> bool {
        self != Step::BodyRead
    }
}

/// Result of executing a single `Step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Next(Step),
    /// Out of input, resume at the given step once more is available.
    NeedInput(Step),
    /// The request line was completed.
    RequestLine(Step),
    /// A header was completed and appended to the header list.
    Header(Step),
    /// The request, including its body, is complete.
    Complete,
    Fail(Status),
}

/// Per-connection parsing context.
///
/// Owns the input pipeline and every partially built token.
pub struct Exchange {
    bytes: ByteBuffer,
    decoder: Decoder,
    interner: Interner,

    token: String,
    leading_lines: usize,
    method: Option<Method>,
    target: String,
    version: Option<Version>,

    header_name: Option<HeaderName>,
    header_parser: Option<Box<dyn HeaderParser>>,
    header_length: usize,
    headers: Vec<Header>,

    body: BodyMaterializer,
    result: Body,
}

impl Exchange {
    pub fn new(config: &Config) -> Self {
        Self {
            bytes: ByteBuffer::new(
                config.buffer_size,
                config.max_buffer_size,
                config.min_read_size,
            ),
            decoder: Decoder::new(config.window_size()),
            interner: Interner::default(),

            token: String::new(),
            leading_lines: 0,
            method: None,
            target: String::new(),
            version: None,

            header_name: None,
            header_parser: None,
            header_length: 0,
            headers: Vec::new(),

            body: BodyMaterializer::default(),
            result: Body::Ignored,
        }
    }

    pub fn bytes(&self) -> &ByteBuffer {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut ByteBuffer {
        &mut self.bytes
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Decode pending bytes into the character window.
    pub fn decode(&mut self) -> Result<usize, crate::EngineError> {
        self.decoder.decode(&mut self.bytes)
    }

    /// Input received but not consumed by the grammar, in chars and bytes.
    pub fn buffered(&self) -> usize {
        self.decoder.remaining().len() + self.bytes.unconsumed().len()
    }

    /// True if nothing of a request was consumed yet.
    ///
    /// Input that is buffered but not parsed yet doesn't count.
    pub fn is_pristine(&self) -> bool {
        self.method.is_none() && self.token.is_empty() && self.leading_lines == 0
    }

    pub fn method(&self) -> Option<Method> {
        self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn version(&self) -> Option<Version> {
        self.version
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Move the completed request out of the exchange.
    pub fn take_request(&mut self) -> Option<Request> {
        let method = self.method.take()?;
        let version = self.version.take()?;

        let request = Request::new(
            method,
            mem::take(&mut self.target),
            version,
            mem::take(&mut self.headers),
            mem::take(&mut self.result),
        );
        Some(request)
    }

    /// Return every field to its initial value.
    pub fn reset(&mut self) {
        self.bytes.reset();
        self.decoder.reset();
        self.interner.clear();
        self.clear_request();
    }

    /// Clear the state of the current request, ready to parse the next one on the same input.
    ///
    /// Input received past the end of the request, the start of a pipelined request, is kept.
    pub fn clear_request(&mut self) {
        self.token.clear();
        self.leading_lines = 0;
        self.method = None;
        self.target.clear();
        self.version = None;

        self.header_name = None;
        self.header_parser = None;
        self.header_length = 0;
        self.headers.clear();

        self.body.reset();
        self.result = Body::Ignored;
    }

    /// Execute a single grammar step.
    pub fn execute(&mut self, step: Step, config: &Config, registry: &HeaderRegistry) -> Transition {
        match step {
            Step::Method => self.execute_method(),
            Step::Target => self.execute_target(config),
            Step::Version => self.execute_version(),
            Step::HeaderLine => self.execute_header_line(config),
            Step::HeaderName => self.execute_header_name(config, registry),
            Step::SkipOws => self.execute_skip_ows(),
            Step::HeaderValue => self.execute_header_value(config),
            Step::Body => self.execute_body(config),
            Step::BodyRead => self.execute_body_read(),
        }
    }

    fn execute_method(&mut self) -> Transition {
        loop {
            let Some(c) = self.decoder.peek() else {
                return Transition::NeedInput(Step::Method);
            };

            // Tolerate a few empty lines ahead of the request line
            if self.token.is_empty() && c == '\r' {
                if !self.decoder.has_remaining(2) {
                    return Transition::NeedInput(Step::Method);
                }
                self.decoder.advance(1);
                if self.decoder.next_char() != Some('\n') {
                    return Transition::Fail(Status::BadRequest);
                }

                self.leading_lines += 1;
                if self.leading_lines > MAX_LEADING_LINES {
                    return Transition::Fail(Status::BadRequest);
                }
                continue;
            }

            self.decoder.advance(1);

            if self.token.is_empty() && !Method::starts_any(c) {
                return Transition::Fail(Status::NotImplemented);
            }

            if c == ' ' {
                let Some(method) = Method::from_token(&self.token) else {
                    event!(Level::DEBUG, token = %self.token, "unknown method");
                    return Transition::Fail(Status::NotImplemented);
                };

                self.method = Some(method);
                self.token.clear();
                return Transition::Next(Step::Target);
            }

            if !is_token_char(c) {
                return Transition::Fail(Status::BadRequest);
            }

            if self.token.len() >= Method::MAX_LEN {
                return Transition::Fail(Status::NotImplemented);
            }

            self.token.push(c);
        }
    }

    fn execute_target(&mut self, config: &Config) -> Transition {
        while let Some(c) = self.decoder.next_char() {
            if c == ' ' {
                if self.target.is_empty() {
                    return Transition::Fail(Status::BadRequest);
                }
                return Transition::Next(Step::Version);
            }

            if c.is_control() {
                return Transition::Fail(Status::BadRequest);
            }

            if self.target.len() >= config.max_target_length {
                return Transition::Fail(Status::UriTooLong);
            }

            self.target.push(c);
        }

        Transition::NeedInput(Step::Target)
    }

    fn execute_version(&mut self) -> Transition {
        if !self.decoder.has_remaining(VERSION_LINE_LEN) {
            return Transition::NeedInput(Step::Version);
        }

        let line = &self.decoder.remaining()[..VERSION_LINE_LEN];
        let prefix_matches = line[..5].iter().copied().eq("HTTP/".chars());
        let (major, dot, minor) = (line[5], line[6], line[7]);

        if !prefix_matches || !major.is_ascii_digit() || dot != '.' || !minor.is_ascii_digit() {
            return Transition::Fail(Status::BadRequest);
        }

        if major != '1' {
            return Transition::Fail(Status::HttpVersionNotSupported);
        }

        let version = match minor {
            '0' => Version::Http10,
            '1' => Version::Http11,
            _ => return Transition::Fail(Status::BadRequest),
        };

        if line[8] != '\r' || line[9] != '\n' {
            return Transition::Fail(Status::BadRequest);
        }

        self.decoder.advance(VERSION_LINE_LEN);
        self.version = Some(version);

        event!(
            Level::DEBUG,
            method = ?self.method,
            request_target = %self.target,
            ?version,
            "parsed request line"
        );

        Transition::RequestLine(Step::HeaderLine)
    }

    fn execute_header_line(&mut self, config: &Config) -> Transition {
        let Some(c) = self.decoder.peek() else {
            return Transition::NeedInput(Step::HeaderLine);
        };

        if c.is_ascii_alphabetic() {
            if self.headers.len() >= config.max_header_count {
                return Transition::Fail(Status::BadRequest);
            }

            self.token.clear();
            return Transition::Next(Step::HeaderName);
        }

        if c != '\r' {
            return Transition::Fail(Status::BadRequest);
        }

        if !self.decoder.has_remaining(2) {
            return Transition::NeedInput(Step::HeaderLine);
        }

        self.decoder.advance(1);
        if self.decoder.next_char() != Some('\n') {
            return Transition::Fail(Status::BadRequest);
        }

        event!(
            Level::DEBUG,
            count = self.headers.len(),
            interned = self.interner.len(),
            "parsed headers"
        );

        Transition::Next(Step::Body)
    }

    fn execute_header_name(&mut self, config: &Config, registry: &HeaderRegistry) -> Transition {
        while let Some(c) = self.decoder.next_char() {
            if c == ':' {
                let (name, parser) = registry.resolve(&self.token, &mut self.interner);
                self.token.clear();

                self.header_name = Some(name);
                self.header_parser = Some(parser);
                self.header_length = 0;
                return Transition::Next(Step::SkipOws);
            }

            if !is_token_char(c) || self.token.len() >= config.max_header_name_length {
                return Transition::Fail(Status::BadRequest);
            }

            self.token.push(c.to_ascii_lowercase());
        }

        Transition::NeedInput(Step::HeaderName)
    }

    fn execute_skip_ows(&mut self) -> Transition {
        while let Some(c) = self.decoder.peek() {
            if !is_ows(c) {
                return Transition::Next(Step::HeaderValue);
            }

            self.decoder.advance(1);
        }

        Transition::NeedInput(Step::SkipOws)
    }

    fn execute_header_value(&mut self, config: &Config) -> Transition {
        let Some(parser) = self.header_parser.as_mut() else {
            event!(Level::ERROR, "header value without a sub-parser");
            return Transition::Fail(Status::InternalServerError);
        };

        // The CRLF ending the line is fed to the parser too
        let limit = config.max_header_value_length + 2;

        while parser.should_consume() {
            let Some(c) = self.decoder.next_char() else {
                return Transition::NeedInput(Step::HeaderValue);
            };

            self.header_length += 1;
            if self.header_length > limit {
                return Transition::Fail(Status::BadRequest);
            }

            parser.consume(c);
        }

        if parser.is_malformed() {
            event!(Level::DEBUG, name = ?self.header_name, "malformed header");
            return Transition::Fail(Status::BadRequest);
        }

        let (Some(name), Some(parser)) = (self.header_name.take(), self.header_parser.take())
        else {
            return Transition::Fail(Status::InternalServerError);
        };

        let header = parser.build(name);
        event!(Level::TRACE, name = %header.name(), "parsed header");
        self.headers.push(header);

        Transition::Header(Step::HeaderLine)
    }

    fn execute_body(&mut self, config: &Config) -> Transition {
        let strategy = match BodyStrategy::negotiate(&self.headers, config) {
            Ok(strategy) => strategy,
            Err(status) => return Transition::Fail(status),
        };

        if strategy == BodyStrategy::Ignored {
            self.result = Body::Ignored;
            return Transition::Complete;
        }

        self.body.start(strategy);
        Transition::Next(Step::BodyRead)
    }

    fn execute_body_read(&mut self) -> Transition {
        match self.body.read(&mut self.decoder, &mut self.bytes) {
            BodyProgress::Complete => match self.body.finish() {
                Ok(body) => {
                    self.result = body;
                    Transition::Complete
                }
                Err(status) => Transition::Fail(status),
            },
            BodyProgress::NeedInput => Transition::NeedInput(Step::BodyRead),
            BodyProgress::Truncated => Transition::Fail(Status::BadRequest),
        }
    }
}
