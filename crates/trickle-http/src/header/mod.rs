//! Header values and the sub-parsers that read them.
//!
//! Every header value is read by a small incremental state machine, a `HeaderParser`, that is fed
//! one char at a time straight from the character window. The `HeaderRegistry` picks the parser
//! by lower-cased header name, falling back to `RawParser` for anything it doesn't know.

mod content_length;
mod content_type;
mod cookie;
mod raw;

use std::{
    borrow::Borrow,
    collections::{HashMap, HashSet},
    fmt,
    ops::Deref,
    sync::Arc,
};

pub use self::{
    content_length::ContentLengthParser,
    content_type::{ContentTypeParser, MediaType},
    cookie::{Cookie, CookieParser},
    raw::RawParser,
};

/// Lower-case, shared header name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeaderName(Arc<str>);

impl HeaderName {
    /// Create a name, lower-casing it.
    pub fn new(name: &str) -> Self {
        Self(name.to_ascii_lowercase().into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if two names share the same allocation.
    pub fn ptr_eq(&self, other: &HeaderName) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for HeaderName {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for HeaderName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for HeaderName {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for HeaderName {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl fmt::Display for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structured value of a header with a dedicated sub-parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Raw,
    Cookie(Vec<Cookie>),
    ContentLength(u64),
    ContentType(MediaType),
}

/// A single header line of a request.
///
/// Repeated names produce separate `Header` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    name: HeaderName,
    raw: String,
    value: HeaderValue,
}

impl Header {
    pub fn new(name: HeaderName, raw: impl Into<String>, value: HeaderValue) -> Self {
        Self {
            name,
            raw: raw.into(),
            value,
        }
    }

    /// Header without a structured value.
    pub fn raw(name: &str, raw: impl Into<String>) -> Self {
        Self::new(HeaderName::new(name), raw, HeaderValue::Raw)
    }

    pub fn name(&self) -> &HeaderName {
        &self.name
    }

    /// The value as received, without surrounding whitespace.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> &HeaderValue {
        &self.value
    }

    pub fn content_length(&self) -> Option<u64> {
        match self.value {
            HeaderValue::ContentLength(length) => Some(length),
            _ => None,
        }
    }

    pub fn media_type(&self) -> Option<&MediaType> {
        match &self.value {
            HeaderValue::ContentType(media_type) => Some(media_type),
            _ => None,
        }
    }

    pub fn cookies(&self) -> &[Cookie] {
        match &self.value {
            HeaderValue::Cookie(cookies) => cookies,
            _ => &[],
        }
    }
}

/// Incremental parser of a single header value.
///
/// The parser is fed every char following the optional leading whitespace, up to and including
/// the LF ending the line. It stops asking for input once the line ended, or once it detected
/// malformed input.
pub trait HeaderParser {
    fn consume(&mut self, c: char);

    fn should_consume(&self) -> bool;

    fn is_malformed(&self) -> bool;

    /// Build the header, only valid once the parser stopped consuming without being malformed.
    fn build(self: Box<Self>, name: HeaderName) -> Header;
}

/// Constructor of a fresh sub-parser.
pub type ParserFactory = fn() -> Box<dyn HeaderParser>;

struct Entry {
    name: HeaderName,
    factory: ParserFactory,
}

/// Map from lower-case header name to the sub-parser reading its value.
///
/// Built once and shared by every connection.
pub struct HeaderRegistry {
    entries: HashMap<String, Entry>,
}

impl HeaderRegistry {
    /// Registry without any entries, every header is read raw.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registry with the structured parsers and well-known names this crate provides.
    pub fn standard() -> Self {
        let mut registry = Self::empty();

        registry.register("cookie", || Box::new(CookieParser::default()));
        registry.register("content-length", || {
            Box::new(ContentLengthParser::default())
        });
        registry.register("content-type", || Box::new(ContentTypeParser::default()));

        for name in STANDARD_NAMES {
            registry.register(name, raw_parser);
        }

        registry
    }

    /// Register a sub-parser, replacing any previous registration of the name.
    pub fn register(&mut self, name: &str, factory: ParserFactory) {
        let name = HeaderName::new(name);
        let entry = Entry {
            name: name.clone(),
            factory,
        };
        self.entries.insert(name.to_string(), entry);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Find the name and a fresh sub-parser for an already lower-cased header name.
    pub fn resolve(
        &self,
        name: &str,
        interner: &mut Interner,
    ) -> (HeaderName, Box<dyn HeaderParser>) {
        match self.entries.get(name) {
            Some(entry) => (entry.name.clone(), (entry.factory)()),
            None => (interner.intern(name), raw_parser()),
        }
    }
}

impl Default for HeaderRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn raw_parser() -> Box<dyn HeaderParser> {
    Box::new(RawParser::default())
}

const STANDARD_NAMES: &[&str] = &[
    "accept",
    "accept-encoding",
    "accept-language",
    "authorization",
    "cache-control",
    "connection",
    "date",
    "expect",
    "host",
    "if-modified-since",
    "if-none-match",
    "origin",
    "pragma",
    "range",
    "referer",
    "transfer-encoding",
    "upgrade",
    "user-agent",
];

/// Deduplicates header names not known to the registry.
#[derive(Default)]
pub struct Interner {
    names: HashSet<HeaderName>,
}

impl Interner {
    pub fn intern(&mut self, name: &str) -> HeaderName {
        if let Some(existing) = self.names.get(name) {
            return existing.clone();
        }

        let name = HeaderName::new(name);
        self.names.insert(name.clone());
        name
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

/// Token characters, as allowed in methods and header names.
pub fn is_token_char(c: char) -> bool {
    matches!(c,
        'a'..='z' | 'A'..='Z' | '0'..='9' |
        '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '.' | '^' | '_' | '`' | '|' | '~'
    )
}

/// Optional whitespace.
pub fn is_ows(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Characters allowed in a field value, including obs-text.
pub(crate) fn is_field_char(c: char) -> bool {
    c == '\t' || (c >= ' ' && c != '\x7f')
}

fn trim_ows_end(value: &str) -> &str {
    value.trim_end_matches(is_ows)
}
