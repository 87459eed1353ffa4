use crate::header::{
    is_field_char, trim_ows_end, Header, HeaderName, HeaderParser, HeaderValue,
};

/// Pass-through parser capturing the value text up to CRLF.
#[derive(Default)]
pub struct RawParser {
    value: String,
    state: State,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    #[default]
    Value,
    Lf,
    Done,
    Malformed,
}

impl HeaderParser for RawParser {
    fn consume(&mut self, c: char) {
        self.state = match self.state {
            State::Value if c == '\r' => State::Lf,
            State::Value if is_field_char(c) => {
                self.value.push(c);
                State::Value
            }
            State::Lf if c == '\n' => State::Done,
            State::Done => State::Done,
            _ => State::Malformed,
        };
    }

    fn should_consume(&self) -> bool {
        matches!(self.state, State::Value | State::Lf)
    }

    fn is_malformed(&self) -> bool {
        self.state == State::Malformed
    }

    fn build(self: Box<Self>, name: HeaderName) -> Header {
        Header::new(name, trim_ows_end(&self.value), HeaderValue::Raw)
    }
}
