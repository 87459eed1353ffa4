use std::time::Duration;

use crate::body::Charset;

/// Limits and timeouts of a `Connection`.
///
/// A single `Config` is typically shared by every connection of a server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Initial capacity of the byte buffer, and the capacity of the character window.
    pub buffer_size: usize,
    /// The byte buffer never grows beyond this.
    pub max_buffer_size: usize,
    /// Smallest writable tail a single read is attempted with.
    pub min_read_size: usize,
    pub max_target_length: usize,
    pub max_header_name_length: usize,
    pub max_header_value_length: usize,
    pub max_header_count: usize,
    pub max_body_length: u64,
    /// Deadline for each individual wait on input.
    pub read_timeout: Option<Duration>,
    /// Deadline for each individual wait on output.
    pub write_timeout: Option<Duration>,
    /// Budget for a whole request, measured from the start of the exchange.
    ///
    /// Disabled by default, so clients that keep making progress are never cut off.
    pub request_timeout: Option<Duration>,
    /// Charset of text bodies that don't declare one.
    pub default_charset: Charset,
    /// Serve further requests on a socket when the client asks for a persistent connection.
    pub keep_alive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            max_buffer_size: 64 * 1024,
            min_read_size: 64,
            max_target_length: 2048,
            max_header_name_length: 256,
            max_header_value_length: 8192,
            max_header_count: 100,
            max_body_length: 1024 * 1024,
            read_timeout: Some(Duration::from_secs(10)),
            write_timeout: Some(Duration::from_secs(10)),
            request_timeout: None,
            default_charset: Charset::Utf8,
            keep_alive: true,
        }
    }
}

impl Config {
    pub fn with_buffer_size(mut self, value: usize) -> Self {
        self.buffer_size = value;
        self
    }

    pub fn with_max_buffer_size(mut self, value: usize) -> Self {
        self.max_buffer_size = value;
        self
    }

    pub fn with_min_read_size(mut self, value: usize) -> Self {
        self.min_read_size = value;
        self
    }

    pub fn with_max_target_length(mut self, value: usize) -> Self {
        self.max_target_length = value;
        self
    }

    pub fn with_max_header_name_length(mut self, value: usize) -> Self {
        self.max_header_name_length = value;
        self
    }

    pub fn with_max_header_value_length(mut self, value: usize) -> Self {
        self.max_header_value_length = value;
        self
    }

    pub fn with_max_header_count(mut self, value: usize) -> Self {
        self.max_header_count = value;
        self
    }

    pub fn with_max_body_length(mut self, value: u64) -> Self {
        self.max_body_length = value;
        self
    }

    pub fn with_read_timeout(mut self, value: Option<Duration>) -> Self {
        self.read_timeout = value;
        self
    }

    pub fn with_write_timeout(mut self, value: Option<Duration>) -> Self {
        self.write_timeout = value;
        self
    }

    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    pub fn with_default_charset(mut self, value: Charset) -> Self {
        self.default_charset = value;
        self
    }

    pub fn with_keep_alive(mut self, value: bool) -> Self {
        self.keep_alive = value;
        self
    }

    /// Character window capacity, never smaller than the longest fixed lookahead of the grammar.
    pub(crate) fn window_size(&self) -> usize {
        self.buffer_size.max(16)
    }
}
