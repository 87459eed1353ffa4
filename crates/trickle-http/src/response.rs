use std::io::{ErrorKind, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{event, Level};

use crate::{EngineError, Method, Status};

/// Response description returned by a `Processor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: Status,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl Response {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// `200 OK` with a `text/plain` body.
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(Status::Ok)
            .with_header("Content-Type", "text/plain; charset=utf-8")
            .with_body(body.into())
    }

    /// `200 OK` with a `text/html` body.
    pub fn html(body: impl Into<String>) -> Self {
        Self::new(Status::Ok)
            .with_header("Content-Type", "text/html; charset=utf-8")
            .with_body(body.into())
    }

    /// `302 Found` pointing at `location`.
    pub fn redirect(location: &str) -> Self {
        Self::new(Status::Found).with_header("Location", location)
    }

    pub(crate) fn error(status: Status) -> Self {
        Self::new(status)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Progress of writing an encoded response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProgress {
    Done,
    /// The socket can't take more right now, wait for it and write again.
    Pending,
}

/// Encodes a response and writes it out across as many partial writes as the socket needs.
#[derive(Default)]
pub struct ResponseWriter {
    data: BytesMut,
    started: bool,
}

impl ResponseWriter {
    /// Encode a response, replacing anything still pending.
    ///
    /// `Content-Length` and `Connection` are always set by the writer, processor supplied values
    /// for them are dropped.
    pub fn start(&mut self, response: &Response, method: Option<Method>, keep_alive: bool) {
        let data = &mut self.data;
        data.clear();
        self.started = false;

        let status = response.status();
        data.put(&b"HTTP/1.1 "[..]);
        data.put(status.code().to_string().as_bytes());
        data.put_u8(b' ');
        data.put(status.reason().as_bytes());
        data.put(&b"\r\n"[..]);

        for (name, value) in response.headers() {
            if name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("connection")
            {
                continue;
            }

            put_field(data, name);
            data.put(&b": "[..]);
            put_field(data, value);
            data.put(&b"\r\n"[..]);
        }

        let body = response.body();
        data.put(&b"Content-Length: "[..]);
        data.put(body.len().to_string().as_bytes());
        data.put(&b"\r\nConnection: "[..]);
        data.put(if keep_alive { &b"keep-alive"[..] } else { &b"close"[..] });
        data.put(&b"\r\n\r\n"[..]);

        if method != Some(Method::Head) {
            data.put(body.clone());
        }

        event!(Level::DEBUG, %status, bytes = data.len(), "encoded response");
    }

    /// Write as much of the pending response as the socket accepts.
    pub fn write<W>(&mut self, sink: &mut W) -> Result<WriteProgress, EngineError>
    where
        W: Write,
    {
        while self.data.has_remaining() {
            match sink.write(&self.data) {
                Ok(0) => return Err(std::io::Error::from(ErrorKind::WriteZero).into()),
                Ok(count) => {
                    event!(Level::TRACE, count, "wrote bytes");
                    self.started = true;
                    self.data.advance(count);
                }
                Err(error) => match error.kind() {
                    ErrorKind::WouldBlock => return Ok(WriteProgress::Pending),
                    ErrorKind::Interrupted => continue,
                    _ => return Err(error.into()),
                },
            }
        }

        loop {
            match sink.flush() {
                Ok(()) => return Ok(WriteProgress::Done),
                Err(error) => match error.kind() {
                    ErrorKind::WouldBlock => return Ok(WriteProgress::Pending),
                    ErrorKind::Interrupted => continue,
                    _ => return Err(error.into()),
                },
            }
        }
    }

    /// True once any byte of a response reached the socket.
    pub fn has_started(&self) -> bool {
        self.started
    }

    pub fn reset(&mut self) {
        self.data.clear();
        self.started = false;
    }
}

/// Header names and values can't be allowed to break the framing.
fn put_field(data: &mut BytesMut, field: &str) {
    for byte in field.bytes().filter(|b| *b != b'\r' && *b != b'\n') {
        data.put_u8(byte);
    }
}
