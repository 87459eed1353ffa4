use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    io::{self, ErrorKind, Read, Write},
    rc::Rc,
    time::Duration,
};

use anyhow::{bail, Error};
use trickle_http::{Body, Header, Interest, Method, Processor, Request, Response, Socket, Version};

/// A single scripted result of `MockSocket::read`.
#[derive(Debug, Clone)]
pub enum MockRead {
    Data(Vec<u8>),
    WouldBlock,
    /// Would block, and the following wait times out.
    Stall,
}

/// In-memory socket delivering one scripted chunk per read.
///
/// Reads past the end of the script report end-of-stream.
pub struct MockSocket {
    reads: VecDeque<MockRead>,
    stalled: bool,
    partial_writes: bool,
    block_next_write: bool,
    info: SocketInfo,
}

/// Handle to what happened to a `MockSocket`, usable after the connection dropped it.
#[derive(Clone, Default)]
pub struct SocketInfo {
    pub written: Rc<RefCell<Vec<u8>>>,
    pub closed: Rc<Cell<bool>>,
    pub waits: Rc<Cell<usize>>,
}

impl SocketInfo {
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.written.borrow()).into_owned()
    }

    pub fn status_line(&self) -> String {
        let written = self.written();
        written.split("\r\n").next().unwrap_or_default().to_string()
    }
}

impl MockSocket {
    pub fn new(reads: impl IntoIterator<Item = MockRead>) -> (Self, SocketInfo) {
        let info = SocketInfo::default();
        let socket = Self {
            reads: reads.into_iter().collect(),
            stalled: false,
            partial_writes: false,
            block_next_write: false,
            info: info.clone(),
        };

        (socket, info)
    }

    /// Socket delivering `chunks`, one per read.
    pub fn chunks<C>(chunks: impl IntoIterator<Item = C>) -> (Self, SocketInfo)
    where
        C: AsRef<[u8]>,
    {
        Self::new(
            chunks
                .into_iter()
                .map(|chunk| MockRead::Data(chunk.as_ref().to_vec())),
        )
    }

    /// Only accept a few bytes per write, and block on every other write.
    pub fn with_partial_writes(mut self) -> Self {
        self.partial_writes = true;
        self
    }
}

impl Read for MockSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(next) = self.reads.pop_front() else {
            return Ok(0);
        };

        match next {
            MockRead::Data(mut chunk) => {
                let count = buf.len().min(chunk.len());
                buf[..count].copy_from_slice(&chunk[..count]);

                if count < chunk.len() {
                    self.reads.push_front(MockRead::Data(chunk.split_off(count)));
                }

                Ok(count)
            }
            MockRead::WouldBlock => Err(ErrorKind::WouldBlock.into()),
            MockRead::Stall => {
                self.stalled = true;
                Err(ErrorKind::WouldBlock.into())
            }
        }
    }
}

impl Write for MockSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.info.closed.get() {
            return Err(ErrorKind::BrokenPipe.into());
        }

        let mut count = buf.len();

        if self.partial_writes {
            if self.block_next_write {
                self.block_next_write = false;
                return Err(ErrorKind::WouldBlock.into());
            }

            self.block_next_write = true;
            count = count.min(3);
        }

        self.info.written.borrow_mut().extend_from_slice(&buf[..count]);
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Socket for MockSocket {
    fn wait(&mut self, _interest: Interest, _timeout: Option<Duration>) -> io::Result<bool> {
        self.info.waits.set(self.info.waits.get() + 1);
        Ok(!self.stalled)
    }

    fn close(&mut self) -> io::Result<()> {
        self.info.closed.set(true);
        Ok(())
    }
}

/// Processor recording every callback it receives.
pub struct RecordingProcessor {
    pub request_lines: Vec<(Method, String, Version)>,
    pub headers: Vec<Header>,
    pub bodies: Vec<Body>,
    pub requests: Vec<Request>,
    pub response: Response,
    pub fail: bool,
}

impl Default for RecordingProcessor {
    fn default() -> Self {
        Self {
            request_lines: Vec::new(),
            headers: Vec::new(),
            bodies: Vec::new(),
            requests: Vec::new(),
            response: Response::text("hello"),
            fail: false,
        }
    }
}

impl Processor for RecordingProcessor {
    fn on_request_line(&mut self, method: Method, target: &str, version: Version) {
        self.request_lines.push((method, target.to_string(), version));
    }

    fn on_request_header(&mut self, header: &Header) {
        self.headers.push(header.clone());
    }

    fn on_request_body(&mut self, body: &Body) {
        self.bodies.push(body.clone());
    }

    fn respond(&mut self, request: &Request) -> Result<Response, Error> {
        self.requests.push(request.clone());

        if self.fail {
            bail!("mock intentional fail");
        }

        Ok(self.response.clone())
    }
}
