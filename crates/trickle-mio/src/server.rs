use std::{
    io::{self, ErrorKind},
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, Sender},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
};

use mio::{
    net::{TcpListener, TcpStream},
    Events, Poll, Token, Waker,
};
use thiserror::Error;
use tracing::{event, instrument, Level};
use trickle_http::{Config, Connection, HeaderRegistry, Processor};

use crate::MioSocket;

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);

/// Configuration of a `serve` call.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Capacity of the listener's event buffer.
    pub event_capacity: usize,
    /// Worker threads, each serving one connection at a time.
    pub workers: usize,
    pub engine: Config,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            event_capacity: 128,
            workers: 4,
            engine: Config::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("server i/o failed")]
    Io(#[from] io::Error),
    #[error("server thread \"{name}\" panicked")]
    ThreadPanicked { name: String },
}

/// Handle to a running server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    stop: Arc<AtomicBool>,
    waker: Arc<Waker>,
    threads: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections, and wait for in-flight exchanges to finish.
    pub fn shutdown(self) -> Result<(), ServerError> {
        event!(Level::DEBUG, "shutting down");

        self.stop.store(true, Ordering::SeqCst);
        self.waker.wake()?;

        self.join()
    }

    /// Block until every server thread exited.
    pub fn join(mut self) -> Result<(), ServerError> {
        for thread in self.threads.drain(..) {
            let name = thread.thread().name().unwrap_or_default().to_string();
            thread
                .join()
                .map_err(|_| ServerError::ThreadPanicked { name })?;
        }

        Ok(())
    }
}

/// Start serving HTTP on `config.addr`.
///
/// Every worker creates its own processor with `factory`, and reuses a single `Connection` for
/// every socket it's handed.
#[instrument("trickle-mio::serve", skip_all)]
pub fn serve<P, F>(config: ServerConfig, factory: F) -> Result<ServerHandle, ServerError>
where
    P: Processor + 'static,
    F: Fn() -> P + Send + Sync + 'static,
{
    event!(Level::DEBUG, addr = ?config.addr, "binding");

    let poll = Poll::new()?;
    let mut listener = TcpListener::bind(config.addr)?;
    let local_addr = listener.local_addr()?;

    poll.registry()
        .register(&mut listener, LISTENER, mio::Interest::READABLE)?;
    let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);
    let stop = Arc::new(AtomicBool::new(false));

    let engine = Arc::new(config.engine);
    let registry = Arc::new(HeaderRegistry::standard());
    let factory = Arc::new(factory);
    let (sender, receiver) = mpsc::channel();
    let receiver = Arc::new(Mutex::new(receiver));

    let mut threads = Vec::new();
    for index in 0..config.workers.max(1) {
        let engine = engine.clone();
        let registry = registry.clone();
        let factory = factory.clone();
        let receiver = receiver.clone();

        let thread = thread::Builder::new()
            .name(format!("trickle-worker-{}", index))
            .spawn(move || {
                let connection = Connection::new(engine, registry, (*factory)());
                run_worker(connection, &receiver);
            })?;
        threads.push(thread);
    }

    let acceptor = Acceptor {
        poll,
        listener,
        events: Events::with_capacity(config.event_capacity),
        stop: stop.clone(),
        streams: sender,
    };
    let thread = thread::Builder::new()
        .name("trickle-acceptor".to_string())
        .spawn(move || acceptor.run())?;
    threads.push(thread);

    event!(Level::INFO, addr = ?local_addr, "listening");

    Ok(ServerHandle {
        local_addr,
        stop,
        waker,
        threads,
    })
}

struct Acceptor {
    poll: Poll,
    listener: TcpListener,
    events: Events,
    stop: Arc<AtomicBool>,
    streams: Sender<TcpStream>,
}

impl Acceptor {
    fn run(mut self) {
        if let Err(error) = self.run_loop() {
            event!(Level::ERROR, ?error, "acceptor failed");
        }

        event!(Level::DEBUG, "acceptor stopped");
    }

    fn run_loop(&mut self) -> Result<(), ServerError> {
        loop {
            match self.poll.poll(&mut self.events, None) {
                Ok(()) => {}
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => return Err(error.into()),
            }

            if self.stop.load(Ordering::SeqCst) {
                return Ok(());
            }

            let listener_ready = self.events.iter().any(|e| e.token() == LISTENER);
            if listener_ready {
                self.accept_pending();
            }
        }
    }

    fn accept_pending(&mut self) {
        loop {
            let (stream, remote_addr) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(error) if error.kind() == ErrorKind::WouldBlock => return,
                Err(error) => {
                    event!(Level::WARN, ?error, "failed to accept stream");
                    return;
                }
            };

            event!(Level::DEBUG, ?remote_addr, "stream accepted");
            if self.streams.send(stream).is_err() {
                event!(Level::ERROR, "no workers left to accept streams");
                return;
            }
        }
    }
}

fn run_worker<P>(mut connection: Connection<MioSocket, P>, streams: &Mutex<Receiver<TcpStream>>)
where
    P: Processor,
{
    loop {
        // The acceptor dropping its sender ends the worker
        let stream = match streams.lock() {
            Ok(receiver) => receiver.recv(),
            Err(_) => return,
        };
        let Ok(stream) = stream else {
            return;
        };

        let socket = match MioSocket::new(stream) {
            Ok(socket) => socket,
            Err(error) => {
                event!(Level::WARN, ?error, "failed to register stream");
                continue;
            }
        };

        connection.set_socket(socket);
        connection.run();
    }
}
