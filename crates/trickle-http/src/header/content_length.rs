use crate::header::{is_ows, Header, HeaderName, HeaderParser, HeaderValue};

/// Digit-only accumulator for `Content-Length`.
#[derive(Default)]
pub struct ContentLengthParser {
    raw: String,
    length: u64,
    state: State,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    #[default]
    First,
    Digits,
    TrailingOws,
    Lf,
    Done,
    Malformed,
}

impl HeaderParser for ContentLengthParser {
    fn consume(&mut self, c: char) {
        self.state = match (self.state, c) {
            (State::First | State::Digits, '0'..='9') => {
                let digit = u64::from(c as u8 - b'0');
                let length = self
                    .length
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(digit));

                match length {
                    Some(length) => {
                        self.raw.push(c);
                        self.length = length;
                        State::Digits
                    }
                    None => State::Malformed,
                }
            }
            (State::Digits | State::TrailingOws, c) if is_ows(c) => State::TrailingOws,
            (State::Digits | State::TrailingOws, '\r') => State::Lf,
            (State::Lf, '\n') => State::Done,
            (State::Done, _) => State::Done,
            _ => State::Malformed,
        };
    }

    fn should_consume(&self) -> bool {
        !matches!(self.state, State::Done | State::Malformed)
    }

    fn is_malformed(&self) -> bool {
        self.state == State::Malformed
    }

    fn build(self: Box<Self>, name: HeaderName) -> Header {
        Header::new(name, self.raw, HeaderValue::ContentLength(self.length))
    }
}
