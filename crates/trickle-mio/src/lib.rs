//! TCP server driving `trickle-http` connections.
//!
//! A single acceptor thread waits on a mio listener and hands accepted streams to a pool of
//! worker threads. Each worker owns one `Connection` and serves one stream at a time.

mod server;
mod socket;

pub use self::{
    server::{serve, ServerConfig, ServerError, ServerHandle},
    socket::MioSocket,
};
