use std::{
    io::{Read, Write},
    net::{Shutdown, SocketAddr, TcpListener, TcpStream},
    time::Duration,
};

use anyhow::Error;
use trickle_http::{Config, Request, Response};
use trickle_mio::{serve, MioSocket, ServerConfig, ServerHandle};

pub fn given_server() -> Result<ServerHandle, Error> {
    let config = ServerConfig {
        addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        workers: 2,
        engine: Config::default().with_read_timeout(Some(Duration::from_secs(5))),
        ..ServerConfig::default()
    };

    let handle = serve(config, || {
        |request: &Request| -> Result<Response, Error> {
            let body = format!("{} {}", request.method(), request.target());
            Ok(Response::text(body))
        }
    })?;

    Ok(handle)
}

/// Send `request` on a fresh client stream, returning everything the server answered.
pub fn when_requested(addr: SocketAddr, request: &[u8]) -> Result<String, Error> {
    let mut stream = TcpStream::connect(addr)?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;

    stream.write_all(request)?;
    stream.shutdown(Shutdown::Write)?;

    let mut response = String::new();
    stream.read_to_string(&mut response)?;

    Ok(response)
}

/// A connected pair of a client stream and a server side `MioSocket`.
pub fn given_socket_pair() -> Result<(TcpStream, MioSocket), Error> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let client = TcpStream::connect(listener.local_addr()?)?;

    let (server, _) = listener.accept()?;
    server.set_nonblocking(true)?;
    let socket = MioSocket::new(mio::net::TcpStream::from_std(server))?;

    Ok((client, socket))
}
