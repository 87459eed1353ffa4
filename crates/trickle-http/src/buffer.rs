use std::io::{ErrorKind, Read};

use tracing::{event, Level};

use crate::EngineError;

/// Outcome of a single `ByteBuffer::fill`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// This many bytes were appended to the buffer.
    Read(usize),
    /// The source reported end-of-stream.
    Eof,
    /// Nothing is available right now, wait for readiness and try again.
    WouldBlock,
}

/// Raw socket read buffer.
///
/// Bytes in `[read, write)` have been received but not yet consumed. Consumed bytes are dropped
/// by compacting the unconsumed region to the front, which moves it, so offsets into this buffer
/// must never be kept across a `fill`.
pub struct ByteBuffer {
    data: Vec<u8>,
    read: usize,
    write: usize,
    eof: bool,
    total_read: u64,

    initial_capacity: usize,
    max_capacity: usize,
    min_read: usize,
}

impl ByteBuffer {
    pub fn new(capacity: usize, max_capacity: usize, min_read: usize) -> Self {
        let max_capacity = max_capacity.max(capacity);

        Self {
            data: vec![0; capacity],
            read: 0,
            write: 0,
            eof: false,
            total_read: 0,

            initial_capacity: capacity,
            max_capacity,
            min_read: min_read.max(1),
        }
    }

    /// Perform exactly one read from `source` into the writable tail.
    ///
    /// Makes room first, compacting and if necessary growing the buffer.
    pub fn fill<R>(&mut self, source: &mut R) -> Result<Fill, EngineError>
    where
        R: Read,
    {
        self.reserve()?;

        loop {
            match source.read(&mut self.data[self.write..]) {
                Ok(0) => {
                    event!(Level::TRACE, "end of stream");
                    self.eof = true;
                    return Ok(Fill::Eof);
                }
                Ok(count) => {
                    event!(Level::TRACE, count, "read bytes");
                    self.write += count;
                    self.total_read += count as u64;
                    return Ok(Fill::Read(count));
                }
                Err(error) => match error.kind() {
                    ErrorKind::WouldBlock => return Ok(Fill::WouldBlock),
                    ErrorKind::Interrupted => continue,
                    _ => return Err(error.into()),
                },
            }
        }
    }

    /// Move the unconsumed region to offset 0, preserving byte order.
    pub fn compact(&mut self) {
        if self.read == 0 {
            return;
        }

        self.data.copy_within(self.read..self.write, 0);
        self.write -= self.read;
        self.read = 0;
    }

    /// Double the capacity, up to the configured maximum.
    pub fn grow(&mut self) -> Result<(), EngineError> {
        let capacity = self.data.len();
        if capacity >= self.max_capacity {
            return Err(EngineError::BufferLimit {
                limit: self.max_capacity,
            });
        }

        let new_capacity = (capacity * 2)
            .max(capacity + self.min_read)
            .min(self.max_capacity);
        event!(Level::DEBUG, capacity = new_capacity, "growing byte buffer");
        self.data.resize(new_capacity, 0);

        Ok(())
    }

    fn reserve(&mut self) -> Result<(), EngineError> {
        if self.writable() >= self.min_read {
            return Ok(());
        }

        self.compact();

        while self.writable() < self.min_read {
            self.grow()?;

            // A buffer capped below one read still gets to use the room it has
            if self.data.len() == self.max_capacity && self.writable() > 0 {
                break;
            }
        }

        Ok(())
    }

    /// Received bytes that haven't been consumed yet.
    pub fn unconsumed(&self) -> &[u8] {
        &self.data[self.read..self.write]
    }

    pub fn has_unconsumed(&self) -> bool {
        self.read < self.write
    }

    /// Consume up to `max` bytes, returning the consumed bytes.
    pub fn take(&mut self, max: usize) -> &[u8] {
        let start = self.read;
        let end = start + max.min(self.write - start);
        self.read = end;

        &self.data[start..end]
    }

    pub fn writable(&self) -> usize {
        self.data.len() - self.write
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Total bytes received since the last reset.
    pub fn total_read(&self) -> u64 {
        self.total_read
    }

    pub fn reset(&mut self) {
        if self.data.len() != self.initial_capacity {
            self.data = vec![0; self.initial_capacity];
        }

        self.read = 0;
        self.write = 0;
        self.eof = false;
        self.total_read = 0;
    }
}
