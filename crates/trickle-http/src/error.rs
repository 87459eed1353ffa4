use std::io;

use thiserror::Error;

/// Internal engine failure.
///
/// None of these are the client's fault, and all of them end the exchange with
/// `500 Internal Server Error`.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("socket i/o failed")]
    Io(#[from] io::Error),
    #[error("timed out waiting for the socket")]
    Timeout,
    #[error("request exceeded its time budget")]
    RequestTimeout,
    #[error("byte buffer can't grow beyond {limit} bytes")]
    BufferLimit { limit: usize },
    #[error("decoded {decoded} bytes but only {read} were read")]
    DecodeOverrun { decoded: u64, read: u64 },
    #[error("connection has no socket")]
    NoSocket,
}
