//! Incremental, resumable HTTP/1.1 request engine.
//!
//! A `Connection` parses a request out of a non-blocking `Socket` one unit of work at a time,
//! suspending whenever input runs out and resuming at exactly the same point once more arrived.
//! Requests are handed to a `Processor`, which supplies the `Response` written back.
//!
//! The engine doesn't do any I/O scheduling itself. See `trickle-mio` for a TCP server driving it.

mod body;
mod buffer;
mod config;
mod connection;
mod decoder;
mod error;
pub mod grammar;
pub mod header;
mod processor;
mod request;
mod response;
mod socket;
mod status;

pub use self::{
    body::{Body, BodyMaterializer, BodyProgress, BodyStrategy, Charset, TextBody},
    buffer::{ByteBuffer, Fill},
    config::Config,
    connection::{Connection, State},
    decoder::{Decoder, ParsePosition},
    error::EngineError,
    header::{Header, HeaderName, HeaderRegistry},
    processor::Processor,
    request::{Method, Request, Version},
    response::{Response, ResponseWriter, WriteProgress},
    socket::{Interest, Socket},
    status::Status,
};
