use anyhow::Error;
use tracing::{event, Level};
use trickle_http::{Body, Header, Method, Processor, Request, Response, Version};
use trickle_mio::ServerConfig;

fn main() -> Result<(), Error> {
    devutils::init_logging();

    let config = ServerConfig {
        addr: "127.0.0.1:1234".parse()?,
        ..ServerConfig::default()
    };
    let server = trickle_mio::serve(config, HelloProcessor::default)?;
    event!(Level::INFO, addr = ?server.local_addr(), "serving");

    server.join()?;

    Ok(())
}

#[derive(Default)]
struct HelloProcessor {
    served: usize,
}

impl Processor for HelloProcessor {
    fn on_request_line(&mut self, method: Method, target: &str, version: Version) {
        event!(Level::INFO, %method, uri = target, %version, "received request");
    }

    fn on_request_header(&mut self, header: &Header) {
        event!(Level::DEBUG, name = %header.name(), value = header.as_str(), "header");
    }

    fn on_request_body(&mut self, body: &Body) {
        if let Some(text) = body.as_text() {
            event!(Level::DEBUG, length = text.len(), "text body");
        }
    }

    fn respond(&mut self, request: &Request) -> Result<Response, Error> {
        self.served += 1;

        let response = match request.target() {
            "/" => Response::html(RESPONSE),
            "/home" => Response::redirect("/"),
            _ => Response::text(format!("served {} requests", self.served)),
        };

        Ok(response)
    }
}

const RESPONSE: &str = "<!DOCTYPE html><html><body><h1>Hello, World!</h1></body></html>";
