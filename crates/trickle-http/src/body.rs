use bytes::{Bytes, BytesMut};
use tracing::{event, Level};

use crate::{header::Header, ByteBuffer, Config, Decoder, Status};

/// Charsets text bodies can be decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Charset {
    Utf8,
    Iso8859_1,
    UsAscii,
}

impl Charset {
    /// Look up a charset by its case-insensitive label.
    pub fn from_label(label: &str) -> Option<Charset> {
        let label = label.to_ascii_lowercase();
        let charset = match label.as_str() {
            "utf-8" | "utf8" => Charset::Utf8,
            "iso-8859-1" | "iso8859-1" | "latin1" | "l1" => Charset::Iso8859_1,
            "us-ascii" | "ascii" => Charset::UsAscii,
            _ => return None,
        };
        Some(charset)
    }

    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            Charset::Utf8 => String::from_utf8(bytes.to_vec()).ok(),
            Charset::Iso8859_1 => Some(bytes.iter().map(|b| char::from(*b)).collect()),
            Charset::UsAscii => {
                if bytes.is_ascii() {
                    String::from_utf8(bytes.to_vec()).ok()
                } else {
                    None
                }
            }
        }
    }
}

/// Text body, decoded from its declared charset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBody {
    charset: Charset,
    text: String,
}

impl TextBody {
    pub fn new(charset: Charset, text: impl Into<String>) -> Self {
        Self {
            charset,
            text: text.into(),
        }
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Request body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Body {
    /// No body was declared, nothing was read.
    #[default]
    Ignored,
    Text(TextBody),
    /// A declared body of a non-text media type.
    Bytes(Bytes),
}

impl Body {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Body::Ignored)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// How the body of a request is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyStrategy {
    Ignored,
    Text { length: u64, charset: Charset },
    Bytes { length: u64 },
}

impl BodyStrategy {
    /// Decide on a strategy from the parsed request headers.
    pub fn negotiate(headers: &[Header], config: &Config) -> Result<BodyStrategy, Status> {
        if headers.iter().any(|h| h.name() == "transfer-encoding") {
            event!(Level::DEBUG, "transfer-encoding not supported");
            return Err(Status::NotImplemented);
        }

        // Repeated lengths are allowed only if they agree
        let mut length = None;
        for value in headers.iter().filter_map(Header::content_length) {
            match length {
                Some(previous) if previous != value => return Err(Status::BadRequest),
                _ => length = Some(value),
            }
        }

        // A declared empty body is still a body
        let Some(length) = length else {
            return Ok(BodyStrategy::Ignored);
        };

        if length > config.max_body_length {
            return Err(Status::ContentTooLarge);
        }

        let media_type = headers.iter().rev().find_map(Header::media_type);
        let strategy = match media_type {
            None => BodyStrategy::Text {
                length,
                charset: config.default_charset,
            },
            Some(media_type) if media_type.is_text() => {
                let charset = match media_type.charset() {
                    Some(label) => Charset::from_label(label).ok_or(Status::NotImplemented)?,
                    None => config.default_charset,
                };
                BodyStrategy::Text { length, charset }
            }
            Some(_) => BodyStrategy::Bytes { length },
        };

        Ok(strategy)
    }

    pub fn length(self) -> u64 {
        match self {
            BodyStrategy::Ignored => 0,
            BodyStrategy::Text { length, .. } | BodyStrategy::Bytes { length } => length,
        }
    }
}

/// Progress of reading a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyProgress {
    Complete,
    NeedInput,
    /// The stream ended before the declared length was read.
    Truncated,
}

/// Accumulates exactly the declared number of body bytes.
///
/// Bytes following the body are never touched, they belong to whatever the client sends next.
pub struct BodyMaterializer {
    strategy: BodyStrategy,
    remaining: u64,
    data: BytesMut,
}

impl Default for BodyMaterializer {
    fn default() -> Self {
        Self {
            strategy: BodyStrategy::Ignored,
            remaining: 0,
            data: BytesMut::new(),
        }
    }
}

impl BodyMaterializer {
    pub fn start(&mut self, strategy: BodyStrategy) {
        event!(Level::DEBUG, ?strategy, "reading body");

        self.strategy = strategy;
        self.remaining = strategy.length();
        self.data.clear();
        self.data.reserve(self.remaining.min(64 * 1024) as usize);
    }

    /// Take body bytes from the decoded window first, then from the raw byte buffer.
    ///
    /// The window can already hold the start of the body, decoded together with the headers.
    pub fn read(&mut self, decoder: &mut Decoder, bytes: &mut ByteBuffer) -> BodyProgress {
        let max = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        let count = decoder.take_bytes(max, &mut self.data);
        self.remaining -= count as u64;

        let max = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        let taken = bytes.take(max);
        self.data.extend_from_slice(taken);
        self.remaining -= taken.len() as u64;

        if self.remaining == 0 {
            BodyProgress::Complete
        } else if bytes.is_eof() {
            BodyProgress::Truncated
        } else {
            BodyProgress::NeedInput
        }
    }

    /// Bytes still expected.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Turn the accumulated bytes into a body.
    pub fn finish(&mut self) -> Result<Body, Status> {
        let data = std::mem::take(&mut self.data).freeze();

        let body = match self.strategy {
            BodyStrategy::Ignored => Body::Ignored,
            BodyStrategy::Text { charset, .. } => {
                let text = charset.decode(&data).ok_or(Status::BadRequest)?;
                Body::Text(TextBody::new(charset, text))
            }
            BodyStrategy::Bytes { .. } => Body::Bytes(data),
        };

        Ok(body)
    }

    pub fn reset(&mut self) {
        self.strategy = BodyStrategy::Ignored;
        self.remaining = 0;
        self.data.clear();
    }
}
