use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{event, span, Level, Span};
use uuid::Uuid;

use crate::{
    grammar::{Exchange, Step, Transition},
    response::{ResponseWriter, WriteProgress},
    socket::{Interest, Socket},
    Config, EngineError, Fill, HeaderRegistry, Processor, Request, Response, Status,
};

/// Engine state, a single unit of work each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Begin a new exchange, on a new socket or one kept alive.
    Start,
    /// Decode pending bytes, then resume parsing at the step.
    Decode(Step),
    /// Perform exactly one read, then resume at the step.
    IoRead(Step),
    /// The last read would block, wait for input.
    IoWait(Step),
    Parse(Step),
    /// Hand the complete request to the processor.
    Process,
    Respond,
    /// The last write would block, wait for the socket.
    RespondWait,
    /// The exchange failed, tell the client if still possible.
    Error(Status),
    /// Close the socket and clear everything.
    Finally,
    /// Nothing left to do until a new socket is set.
    Stop,
}

/// HTTP/1.1 connection engine.
///
/// Drives exchanges over a non-blocking `Socket`, one `execute_one` at a time. The caller decides
/// how the engine is scheduled, the only blocking operation is `Socket::wait`. Once a response was
/// written to a client that asked for a persistent connection, the next request is parsed from the
/// same socket, starting with any input already received past the previous one.
pub struct Connection<S, P> {
    id: Uuid,
    span: Span,
    config: Arc<Config>,
    registry: Arc<HeaderRegistry>,
    processor: P,

    socket: Option<S>,
    state: State,
    exchange: Exchange,
    request: Option<Request>,
    writer: ResponseWriter,
    outcome: Option<Status>,
    started: Option<Instant>,
    keep_alive: bool,
}

impl<S, P> Connection<S, P>
where
    S: Socket,
    P: Processor,
{
    /// Create a stopped connection, set a socket to start serving it.
    pub fn new(config: Arc<Config>, registry: Arc<HeaderRegistry>, processor: P) -> Self {
        let id = Uuid::new_v4();
        let span = span!(Level::INFO, "connection", %id);
        let exchange = Exchange::new(&config);

        Self {
            id,
            span,
            config,
            registry,
            processor,

            socket: None,
            state: State::Stop,
            exchange,
            request: None,
            writer: ResponseWriter::default(),
            outcome: None,
            started: None,
            keep_alive: false,
        }
    }

    /// Start a new exchange on `socket`.
    ///
    /// A socket still held from a previous exchange is closed first.
    pub fn set_socket(&mut self, socket: S) {
        self.close_socket();
        self.socket = Some(socket);
        self.reset();

        let _entered = self.span.enter();
        event!(Level::DEBUG, "socket set");
    }

    /// Return every exchange field to its initial value, keeping the socket.
    pub fn reset(&mut self) {
        self.exchange.reset();
        self.request = None;
        self.writer.reset();
        self.outcome = None;
        self.started = None;
        self.keep_alive = false;

        self.state = if self.socket.is_some() {
            State::Start
        } else {
            State::Stop
        };
    }

    pub fn is_active(&self) -> bool {
        self.state != State::Stop
    }

    /// Drive the engine until it stops.
    pub fn run(&mut self) {
        while self.is_active() {
            self.execute_one();
        }
    }

    /// Perform a single unit of work, returning the new state.
    pub fn execute_one(&mut self) -> State {
        let span = self.span.clone();
        let _entered = span.enter();

        self.state = match self.state {
            State::Start => self.execute_start(),
            State::Decode(step) => self.execute_decode(step),
            State::IoRead(step) => self.execute_io_read(step),
            State::IoWait(step) => self.execute_io_wait(step),
            State::Parse(step) => self.execute_parse(step),
            State::Process => self.execute_process(),
            State::Respond => self.execute_respond(),
            State::RespondWait => self.execute_respond_wait(),
            State::Error(status) => self.execute_error(status),
            State::Finally => self.execute_finally(),
            State::Stop => State::Stop,
        };

        self.state
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Status the last exchange failed with, `None` if it succeeded or is still running.
    pub fn outcome(&self) -> Option<Status> {
        self.outcome
    }

    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    pub fn socket(&self) -> Option<&S> {
        self.socket.as_ref()
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn processor_mut(&mut self) -> &mut P {
        &mut self.processor
    }

    fn execute_start(&mut self) -> State {
        event!(Level::DEBUG, "starting exchange");
        State::Parse(Step::Method)
    }

    fn execute_decode(&mut self, step: Step) -> State {
        match self.exchange.decode() {
            Ok(_) => State::Parse(step),
            Err(error) => self.fail_internal(error),
        }
    }

    fn execute_io_read(&mut self, step: Step) -> State {
        if let Err(error) = self.check_request_deadline() {
            return self.fail_internal(error);
        }

        let Some(socket) = self.socket.as_mut() else {
            return self.fail_internal(EngineError::NoSocket);
        };

        match self.exchange.bytes_mut().fill(socket) {
            Ok(Fill::Read(_)) => {
                self.started.get_or_insert_with(Instant::now);

                if step.decodes() {
                    State::Decode(step)
                } else {
                    State::Parse(step)
                }
            }
            Ok(Fill::Eof) => self.end_of_input(step),
            Ok(Fill::WouldBlock) => State::IoWait(step),
            Err(error) => self.fail_internal(error),
        }
    }

    fn execute_io_wait(&mut self, step: Step) -> State {
        let budget = match self.check_request_deadline() {
            Ok(budget) => budget,
            Err(error) => return self.fail_internal(error),
        };

        let timeout = match (self.config.read_timeout, budget) {
            (Some(read), Some(budget)) => Some(read.min(budget)),
            (read, budget) => read.or(budget),
        };

        let Some(socket) = self.socket.as_mut() else {
            return self.fail_internal(EngineError::NoSocket);
        };

        match socket.wait(Interest::Read, timeout) {
            Ok(true) => State::IoRead(step),
            Ok(false) if step == Step::Method && self.is_idle() => {
                event!(Level::DEBUG, "idle connection timed out");
                State::Finally
            }
            Ok(false) => {
                let error = if budget.is_some() && budget == timeout {
                    EngineError::RequestTimeout
                } else {
                    EngineError::Timeout
                };
                self.fail_internal(error)
            }
            Err(error) => self.fail_internal(error.into()),
        }
    }

    fn execute_parse(&mut self, step: Step) -> State {
        let transition = self
            .exchange
            .execute(step, &self.config, &self.registry);

        match transition {
            Transition::Next(next) => State::Parse(next),
            Transition::NeedInput(next) => self.need_input(next),
            Transition::RequestLine(next) => {
                let exchange = &self.exchange;
                if let (Some(method), Some(version)) = (exchange.method(), exchange.version()) {
                    self.processor
                        .on_request_line(method, exchange.target(), version);
                }
                State::Parse(next)
            }
            Transition::Header(next) => {
                if let Some(header) = self.exchange.headers().last() {
                    self.processor.on_request_header(header);
                }
                State::Parse(next)
            }
            Transition::Complete => match self.exchange.take_request() {
                Some(request) => {
                    self.processor.on_request_body(request.body());
                    self.request = Some(request);
                    State::Process
                }
                None => {
                    event!(Level::ERROR, "request completed without a request line");
                    State::Error(Status::InternalServerError)
                }
            },
            Transition::Fail(status) => State::Error(status),
        }
    }

    /// Pick the cheapest way to get more input for `step`.
    fn need_input(&mut self, step: Step) -> State {
        let bytes = self.exchange.bytes();

        if step.decodes() && bytes.has_unconsumed() {
            return State::Decode(step);
        }

        if bytes.is_eof() {
            return self.end_of_input(step);
        }

        State::IoRead(step)
    }

    /// True if no part of a request was received since the last exchange ended.
    fn is_idle(&self) -> bool {
        let exchange = &self.exchange;
        exchange.is_pristine() && exchange.buffered() == 0
    }

    fn end_of_input(&mut self, step: Step) -> State {
        let exchange = &self.exchange;
        let input_ended = exchange.decoder().is_end_of_input(exchange.bytes());

        // A client leaving between requests isn't an error
        if step == Step::Method && input_ended && exchange.is_pristine() {
            event!(Level::DEBUG, "closed before a request was sent");
            return State::Finally;
        }

        event!(Level::WARN, ?step, "input ended mid-request");
        State::Error(Status::BadRequest)
    }

    fn execute_process(&mut self) -> State {
        let Some(request) = self.request.as_ref() else {
            event!(Level::ERROR, "no request to process");
            return State::Error(Status::InternalServerError);
        };

        match self.processor.respond(request) {
            Ok(response) => {
                self.keep_alive = self.config.keep_alive
                    && request.keep_alive()
                    && !response.status().is_error();
                self.writer
                    .start(&response, Some(request.method()), self.keep_alive);
                State::Respond
            }
            Err(error) => {
                event!(Level::ERROR, ?error, "processor failed");
                State::Error(Status::InternalServerError)
            }
        }
    }

    fn execute_respond(&mut self) -> State {
        let Some(socket) = self.socket.as_mut() else {
            event!(Level::DEBUG, "no socket to respond to");
            return State::Finally;
        };

        match self.writer.write(socket) {
            Ok(WriteProgress::Done) => {
                event!(Level::DEBUG, keep_alive = self.keep_alive, "response written");
                if self.keep_alive {
                    self.next_exchange()
                } else {
                    State::Finally
                }
            }
            Ok(WriteProgress::Pending) => State::RespondWait,
            Err(error) => {
                event!(Level::WARN, ?error, "failed to write response");
                State::Finally
            }
        }
    }

    fn execute_respond_wait(&mut self) -> State {
        let Some(socket) = self.socket.as_mut() else {
            return State::Finally;
        };

        match socket.wait(Interest::Write, self.config.write_timeout) {
            Ok(true) => State::Respond,
            Ok(false) => {
                event!(Level::WARN, "timed out writing response");
                State::Finally
            }
            Err(error) => {
                event!(Level::WARN, ?error, "failed waiting to write response");
                State::Finally
            }
        }
    }

    fn execute_error(&mut self, status: Status) -> State {
        self.outcome = Some(status);
        self.keep_alive = false;

        if self.writer.has_started() {
            event!(Level::WARN, %status, "exchange failed after responding");
            return State::Finally;
        }

        event!(Level::WARN, %status, "exchange failed");
        let method = self
            .request
            .as_ref()
            .map(Request::method)
            .or(self.exchange.method());
        self.writer.start(&Response::error(status), method, false);

        State::Respond
    }

    fn execute_finally(&mut self) -> State {
        self.close_socket();

        self.exchange.reset();
        self.request = None;
        self.writer.reset();
        self.started = None;
        self.keep_alive = false;

        event!(Level::DEBUG, outcome = ?self.outcome, "exchange finished");
        State::Stop
    }

    /// Keep the socket and its pending input for the next request.
    fn next_exchange(&mut self) -> State {
        self.exchange.clear_request();
        self.request = None;
        self.writer.reset();
        self.started = None;
        self.keep_alive = false;

        event!(
            Level::DEBUG,
            buffered = self.exchange.buffered(),
            "keeping connection alive"
        );
        State::Start
    }

    fn fail_internal(&mut self, error: EngineError) -> State {
        match error {
            EngineError::Timeout | EngineError::RequestTimeout => {
                event!(Level::WARN, %error, "exchange timed out")
            }
            _ => event!(Level::ERROR, %error, "engine failure"),
        }

        State::Error(Status::InternalServerError)
    }

    /// Remaining request budget, failing if it ran out.
    fn check_request_deadline(&self) -> Result<Option<Duration>, EngineError> {
        let (Some(timeout), Some(started)) = (self.config.request_timeout, self.started) else {
            return Ok(None);
        };

        let budget = timeout.saturating_sub(started.elapsed());
        if budget.is_zero() {
            return Err(EngineError::RequestTimeout);
        }

        Ok(Some(budget))
    }

    fn close_socket(&mut self) {
        let Some(mut socket) = self.socket.take() else {
            return;
        };

        if let Err(error) = socket.close() {
            event!(Level::DEBUG, ?error, "failed to close socket");
        }
    }
}

impl<S, P> Drop for Connection<S, P> {
    fn drop(&mut self) {
        let _entered = self.span.enter();
        event!(Level::TRACE, "dropping connection");
    }
}
