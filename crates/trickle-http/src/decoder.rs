use tracing::{event, Level};

use crate::{ByteBuffer, EngineError};

/// Cursors of a connection's input pipeline.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParsePosition {
    /// Source bytes decoded into the character window since the last reset.
    pub bytes_decoded: u64,
    /// Characters of the current window consumed by the grammar.
    pub chars_consumed: usize,
}

/// ISO-8859-1 decoder feeding the character window the grammar reads from.
///
/// Every byte maps to exactly one char, so a decode pass never has to deal with a character
/// split across two reads.
pub struct Decoder {
    window: Vec<char>,
    capacity: usize,
    position: ParsePosition,
}

impl Decoder {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: Vec::with_capacity(capacity),
            capacity,
            position: ParsePosition::default(),
        }
    }

    /// Decode as many unconsumed bytes as fit in the window, returning the chars produced.
    ///
    /// Consumed chars are dropped from the window first, so the grammar must not hold window
    /// offsets across a decode.
    pub fn decode(&mut self, bytes: &mut ByteBuffer) -> Result<usize, EngineError> {
        self.compact();

        let room = self.capacity.saturating_sub(self.window.len());
        let source = bytes.take(room);
        self.window.extend(source.iter().map(|byte| char::from(*byte)));

        let count = source.len();
        self.position.bytes_decoded += count as u64;
        event!(Level::TRACE, count, "decoded chars");

        if self.position.bytes_decoded > bytes.total_read() {
            return Err(EngineError::DecodeOverrun {
                decoded: self.position.bytes_decoded,
                read: bytes.total_read(),
            });
        }

        Ok(count)
    }

    fn compact(&mut self) {
        if self.position.chars_consumed == 0 {
            return;
        }

        self.window.drain(..self.position.chars_consumed);
        self.position.chars_consumed = 0;
    }

    /// Chars decoded but not consumed yet.
    pub fn remaining(&self) -> &[char] {
        &self.window[self.position.chars_consumed..]
    }

    pub fn has_remaining(&self, count: usize) -> bool {
        self.remaining().len() >= count
    }

    pub fn peek(&self) -> Option<char> {
        self.remaining().first().copied()
    }

    pub fn next_char(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position.chars_consumed += 1;
        Some(c)
    }

    /// Consume `count` chars, which must be available.
    pub fn advance(&mut self, count: usize) {
        debug_assert!(self.has_remaining(count));
        self.position.chars_consumed += count.min(self.remaining().len());
    }

    /// Consume up to `max` chars, appending their source bytes to `out`.
    ///
    /// Returns the number of chars consumed.
    pub fn take_bytes<E>(&mut self, max: usize, out: &mut E) -> usize
    where
        E: Extend<u8>,
    {
        let count = max.min(self.remaining().len());
        let start = self.position.chars_consumed;

        // The window only ever holds ISO-8859-1 chars, so this recovers the exact source byte
        out.extend(self.window[start..start + count].iter().map(|c| *c as u8));
        self.position.chars_consumed += count;

        count
    }

    /// True once there is nothing left to decode or consume and the source reported EOF.
    pub fn is_end_of_input(&self, bytes: &ByteBuffer) -> bool {
        bytes.is_eof() && !bytes.has_unconsumed() && self.remaining().is_empty()
    }

    pub fn position(&self) -> ParsePosition {
        self.position
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.position = ParsePosition::default();
    }
}
