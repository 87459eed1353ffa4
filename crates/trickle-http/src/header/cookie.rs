use crate::header::{
    is_ows, is_token_char, trim_ows_end, Header, HeaderName, HeaderParser, HeaderValue,
};

/// A single `name=value` pair of a `Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value without surrounding quotes.
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Parser of `Cookie: a=b; c="d"`.
///
/// Any name or value containing a character outside of the token or cookie-octet alphabets makes
/// the whole header malformed, no partial cookie list is ever produced.
#[derive(Default)]
pub struct CookieParser {
    raw: String,
    name: String,
    value: String,
    cookies: Vec<Cookie>,
    state: State,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    #[default]
    Name,
    Value,
    Quoted,
    QuotedEnd,
    Trailing,
    Separator,
    Lf,
    Done,
    Malformed,
}

impl CookieParser {
    fn finish_pair(&mut self) {
        let name = std::mem::take(&mut self.name);
        let value = std::mem::take(&mut self.value);
        self.cookies.push(Cookie { name, value });
    }

    fn next_state(&mut self, c: char) -> State {
        match self.state {
            State::Name => match c {
                '=' if !self.name.is_empty() => State::Value,
                c if is_token_char(c) => {
                    self.name.push(c);
                    State::Name
                }
                _ => State::Malformed,
            },
            State::Value => match c {
                '"' if self.value.is_empty() => State::Quoted,
                ';' => {
                    self.finish_pair();
                    State::Separator
                }
                '\r' => {
                    self.finish_pair();
                    State::Lf
                }
                c if is_ows(c) => {
                    self.finish_pair();
                    State::Trailing
                }
                c if is_cookie_octet(c) => {
                    self.value.push(c);
                    State::Value
                }
                _ => State::Malformed,
            },
            State::Quoted => match c {
                '"' => State::QuotedEnd,
                c if is_cookie_octet(c) => {
                    self.value.push(c);
                    State::Quoted
                }
                _ => State::Malformed,
            },
            State::QuotedEnd => match c {
                ';' => {
                    self.finish_pair();
                    State::Separator
                }
                '\r' => {
                    self.finish_pair();
                    State::Lf
                }
                c if is_ows(c) => {
                    self.finish_pair();
                    State::Trailing
                }
                _ => State::Malformed,
            },
            State::Trailing => match c {
                c if is_ows(c) => State::Trailing,
                '\r' => State::Lf,
                _ => State::Malformed,
            },
            State::Separator => match c {
                c if is_ows(c) => State::Separator,
                c if is_token_char(c) => {
                    self.name.push(c);
                    State::Name
                }
                _ => State::Malformed,
            },
            State::Lf => match c {
                '\n' => State::Done,
                _ => State::Malformed,
            },
            State::Done => State::Done,
            State::Malformed => State::Malformed,
        }
    }
}

impl HeaderParser for CookieParser {
    fn consume(&mut self, c: char) {
        if !matches!(c, '\r' | '\n') {
            self.raw.push(c);
        }

        self.state = self.next_state(c);
    }

    fn should_consume(&self) -> bool {
        !matches!(self.state, State::Done | State::Malformed)
    }

    fn is_malformed(&self) -> bool {
        self.state == State::Malformed
    }

    fn build(self: Box<Self>, name: HeaderName) -> Header {
        Header::new(
            name,
            trim_ows_end(&self.raw),
            HeaderValue::Cookie(self.cookies),
        )
    }
}

/// `cookie-octet` of RFC 6265: visible ASCII except DQUOTE, comma, semicolon and backslash.
fn is_cookie_octet(c: char) -> bool {
    matches!(c, '\x21' | '\x23'..='\x2b' | '\x2d'..='\x3a' | '\x3c'..='\x5b' | '\x5d'..='\x7e')
}
