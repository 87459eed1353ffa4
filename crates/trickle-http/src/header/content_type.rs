use std::fmt;

use crate::header::{
    is_ows, is_token_char, trim_ows_end, Header, HeaderName, HeaderParser, HeaderValue,
};

/// Media type of a `Content-Type` header, e.g. `text/plain; charset=utf-8`.
///
/// Type, subtype and parameter names are lower-cased, parameter values are kept as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    kind: String,
    subtype: String,
    parameters: Vec<(String, String)>,
}

impl MediaType {
    pub fn new(kind: &str, subtype: &str) -> Self {
        Self {
            kind: kind.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters
            .push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    /// Top-level type, e.g. `text`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }

    /// Check if bodies of this type are text that should be decoded to a string.
    pub fn is_text(&self) -> bool {
        match self.kind.as_str() {
            "text" => true,
            "application" => matches!(
                self.subtype.as_str(),
                "json" | "xml" | "javascript" | "x-www-form-urlencoded"
            ),
            _ => false,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.subtype)?;
        for (name, value) in &self.parameters {
            write!(f, "; {}={}", name, value)?;
        }
        Ok(())
    }
}

/// Parser of `type "/" subtype *( OWS ";" OWS name "=" ( token / quoted-string ) )`.
#[derive(Default)]
pub struct ContentTypeParser {
    raw: String,
    media_type: MediaTypeBuilder,
    state: State,
}

#[derive(Default)]
struct MediaTypeBuilder {
    kind: String,
    subtype: String,
    name: String,
    value: String,
    parameters: Vec<(String, String)>,
}

impl MediaTypeBuilder {
    fn finish_parameter(&mut self) {
        let name = std::mem::take(&mut self.name);
        let value = std::mem::take(&mut self.value);
        self.parameters.push((name, value));
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    #[default]
    Kind,
    Subtype,
    Ows,
    ParameterStart,
    ParameterName,
    ParameterValue,
    Quoted,
    QuotedEscape,
    Lf,
    Done,
    Malformed,
}

impl ContentTypeParser {
    fn next_state(&mut self, c: char) -> State {
        let builder = &mut self.media_type;

        match self.state {
            State::Kind => match c {
                '/' if !builder.kind.is_empty() => State::Subtype,
                c if is_token_char(c) => {
                    builder.kind.push(c.to_ascii_lowercase());
                    State::Kind
                }
                _ => State::Malformed,
            },
            State::Subtype => match c {
                c if is_token_char(c) => {
                    builder.subtype.push(c.to_ascii_lowercase());
                    State::Subtype
                }
                _ if builder.subtype.is_empty() => State::Malformed,
                ';' => State::ParameterStart,
                '\r' => State::Lf,
                c if is_ows(c) => State::Ows,
                _ => State::Malformed,
            },
            State::Ows => match c {
                c if is_ows(c) => State::Ows,
                ';' => State::ParameterStart,
                '\r' => State::Lf,
                _ => State::Malformed,
            },
            State::ParameterStart => match c {
                c if is_ows(c) => State::ParameterStart,
                ';' => State::ParameterStart,
                '\r' => State::Lf,
                c if is_token_char(c) => {
                    builder.name.push(c.to_ascii_lowercase());
                    State::ParameterName
                }
                _ => State::Malformed,
            },
            State::ParameterName => match c {
                '=' => State::ParameterValue,
                c if is_token_char(c) => {
                    builder.name.push(c.to_ascii_lowercase());
                    State::ParameterName
                }
                _ => State::Malformed,
            },
            State::ParameterValue => match c {
                '"' if builder.value.is_empty() => State::Quoted,
                c if is_token_char(c) => {
                    builder.value.push(c);
                    State::ParameterValue
                }
                _ if builder.value.is_empty() => State::Malformed,
                ';' => {
                    builder.finish_parameter();
                    State::ParameterStart
                }
                '\r' => {
                    builder.finish_parameter();
                    State::Lf
                }
                c if is_ows(c) => {
                    builder.finish_parameter();
                    State::Ows
                }
                _ => State::Malformed,
            },
            State::Quoted => match c {
                '"' => {
                    builder.finish_parameter();
                    State::Ows
                }
                '\\' => State::QuotedEscape,
                '\r' | '\n' => State::Malformed,
                c => {
                    builder.value.push(c);
                    State::Quoted
                }
            },
            State::QuotedEscape => match c {
                '\r' | '\n' => State::Malformed,
                c => {
                    builder.value.push(c);
                    State::Quoted
                }
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

impl HeaderParser for ContentTypeParser {
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
        let builder = self.media_type;
        let media_type = MediaType {
            kind: builder.kind,
            subtype: builder.subtype,
            parameters: builder.parameters,
        };

        Header::new(
            name,
            trim_ows_end(&self.raw),
            HeaderValue::ContentType(media_type),
        )
    }
}
