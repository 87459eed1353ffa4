#![allow(dead_code)]

mod mock;

use std::sync::Arc;

use anyhow::{bail, Error};
use trickle_http::{
    Config, Connection, HeaderRegistry, ParsePosition, Request, State, Status,
};

pub use self::mock::{MockRead, MockSocket, RecordingProcessor, SocketInfo};

pub type MockConnection = Connection<MockSocket, RecordingProcessor>;

/// Upper bound on units of work for a single exchange, to catch engines that never stop.
const MAX_STEPS: usize = 100_000;

pub fn given_connection(config: Config) -> MockConnection {
    Connection::new(
        Arc::new(config),
        Arc::new(HeaderRegistry::standard()),
        RecordingProcessor::default(),
    )
}

pub fn when_served(connection: &mut MockConnection, socket: MockSocket) -> Result<(), Error> {
    connection.set_socket(socket);

    for _ in 0..MAX_STEPS {
        if !connection.is_active() {
            return Ok(());
        }

        connection.execute_one();
    }

    bail!("connection still active in state {:?}", connection.state())
}

/// Serve `chunks` on a fresh connection with a default config.
pub fn when_served_chunks<C>(
    chunks: impl IntoIterator<Item = C>,
) -> Result<(MockConnection, SocketInfo), Error>
where
    C: AsRef<[u8]>,
{
    let mut connection = given_connection(Config::default());
    let (socket, info) = MockSocket::chunks(chunks);
    when_served(&mut connection, socket)?;

    Ok((connection, info))
}

/// The request the processor received, failing if there wasn't exactly one.
pub fn then_request(connection: &MockConnection) -> Result<Request, Error> {
    match connection.processor().requests.as_slice() {
        [request] => Ok(request.clone()),
        requests => bail!("expected one request, got {}", requests.len()),
    }
}

pub fn then_failed_with(connection: &MockConnection, info: &SocketInfo, status: Status) {
    assert_eq!(connection.outcome(), Some(status));
    assert_eq!(
        info.status_line(),
        format!("HTTP/1.1 {} {}", status.code(), status.reason())
    );
    assert!(info.closed.get(), "socket not closed");
    assert!(connection.processor().requests.is_empty());
}

pub fn then_pristine(connection: &MockConnection, config: &Config) {
    assert_eq!(connection.state(), State::Stop);
    assert!(!connection.is_active());
    assert_eq!(connection.outcome(), None);
    assert!(connection.socket().is_none());

    let exchange = connection.exchange();
    assert!(exchange.is_pristine());
    assert_eq!(exchange.buffered(), 0);
    assert_eq!(exchange.method(), None);
    assert_eq!(exchange.target(), "");
    assert_eq!(exchange.version(), None);
    assert!(exchange.headers().is_empty());
    assert_eq!(exchange.decoder().position(), ParsePosition::default());
    assert_eq!(exchange.bytes().capacity(), config.buffer_size);
    assert!(!exchange.bytes().is_eof());
}
