use std::{
    io::{self, ErrorKind, Read, Write},
    net::{Shutdown, SocketAddr},
    time::{Duration, Instant},
};

use mio::{net::TcpStream, Events, Poll, Token};
use tracing::{event, Level};
use trickle_http::{Interest, Socket};

const STREAM: Token = Token(0);

/// Non-blocking TCP stream with its own poll instance to wait on.
///
/// Meant to be driven by a single worker thread, waiting never affects other sockets.
pub struct MioSocket {
    stream: TcpStream,
    poll: Poll,
    events: Events,
}

impl MioSocket {
    pub fn new(mut stream: TcpStream) -> io::Result<Self> {
        let poll = Poll::new()?;
        poll.registry().register(
            &mut stream,
            STREAM,
            mio::Interest::READABLE | mio::Interest::WRITABLE,
        )?;

        Ok(Self {
            stream,
            poll,
            events: Events::with_capacity(8),
        })
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }
}

impl Read for MioSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for MioSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Socket for MioSocket {
    fn wait(&mut self, interest: Interest, timeout: Option<Duration>) -> io::Result<bool> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);

        loop {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            if remaining == Some(Duration::ZERO) {
                event!(Level::TRACE, ?interest, "wait timed out");
                return Ok(false);
            }

            match self.poll.poll(&mut self.events, remaining) {
                Ok(()) => {}
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => return Err(error),
            }

            // Readiness for the other direction doesn't count, keep waiting
            let ready = self.events.iter().any(|event| match interest {
                Interest::Read => event.is_readable() || event.is_read_closed() || event.is_error(),
                Interest::Write => {
                    event.is_writable() || event.is_write_closed() || event.is_error()
                }
            });

            if ready {
                return Ok(true);
            }
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.poll.registry().deregister(&mut self.stream)?;

        match self.stream.shutdown(Shutdown::Both) {
            Err(error) if error.kind() != ErrorKind::NotConnected => Err(error),
            _ => Ok(()),
        }
    }
}
