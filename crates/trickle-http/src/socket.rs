use std::{
    io::{self, Read, Write},
    time::Duration,
};

/// Readiness a `Socket` can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    Write,
}

/// Non-blocking byte stream a `Connection` is driven over.
///
/// Reads and writes are expected to return `ErrorKind::WouldBlock` instead of blocking. The
/// connection then calls `wait` before retrying.
pub trait Socket: Read + Write {
    /// Block until the socket may be ready for `interest`, or until `timeout` elapsed.
    ///
    /// Returns false on timeout. Spurious `true` results are allowed, the connection retries the
    /// operation and waits again if it still would block.
    fn wait(&mut self, interest: Interest, timeout: Option<Duration>) -> io::Result<bool>;

    /// Shut the socket down in both directions.
    fn close(&mut self) -> io::Result<()>;
}
