//! Status endpoint.
//!
//! Serves the session record read-only on `GET /state` with an open CORS
//! header — meant for same-machine developer tooling, not a trust
//! boundary. There is no write path from the network side.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use crossbeam::channel;
use serde_json::json;
use tiny_http::{Header, Method, Request, Response, Server};

use crate::ports::STATUS_PORT;
use crate::session::SharedSession;

/// Bound status server ready to accept requests.
///
/// Binding happens before any bundler starts (the port was preflighted);
/// the request loop runs on the main thread until shutdown unblocks it.
pub struct StatusServer {
    server: Arc<Server>,
    addr: SocketAddr,
}

/// Bind the status server and register it for graceful shutdown.
///
/// Returns the shutdown receiver for the orchestrator task set.
pub fn bind() -> Result<(StatusServer, channel::Receiver<()>)> {
    let addr: SocketAddr = ([127, 0, 0, 1], STATUS_PORT).into();
    let server = Server::http(addr)
        .map_err(|e| anyhow::anyhow!("failed to bind status server on {addr}: {e}"))?;
    let server = Arc::new(server);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    crate::core::register_server(Arc::clone(&server), shutdown_tx);

    crate::log!("state"; "http://{}/state", addr);

    Ok((StatusServer { server, addr }, shutdown_rx))
}

impl StatusServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Run the request loop (blocking) until shutdown.
    pub fn run(self, session: SharedSession) {
        for request in self.server.incoming_requests() {
            if crate::core::is_shutdown() {
                break;
            }
            if let Err(e) = handle_request(request, &session) {
                crate::debug!("state"; "request error: {}", e);
            }
        }
    }
}

fn handle_request(request: Request, session: &SharedSession) -> Result<()> {
    if request.method() != &Method::Get {
        return respond_json(request, 405, &json!({"error": "method not allowed"}));
    }

    let path = request.url().split(['?', '#']).next().unwrap_or("");
    match path {
        "/state" => {
            let state = session.read().state_json();
            respond_json(request, 200, &state)
        }
        _ => respond_json(request, 404, &json!({"error": "not found"})),
    }
}

fn respond_json(request: Request, status: u16, body: &serde_json::Value) -> Result<()> {
    let response = Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(make_header("Content-Type", "application/json"))
        .with_header(make_header("Access-Control-Allow-Origin", "*"));
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &'static str, value: &'static str) -> Header {
    Header::from_bytes(key, value).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VisualConfig;
    use crate::session::{Session, Target};
    use std::path::PathBuf;

    #[test]
    fn test_state_json_is_servable() {
        let session = Session {
            visual: "acme/spring".into(),
            visual_path: PathBuf::from("src/acme/spring"),
            git_status: "main@abc1234".into(),
            config: VisualConfig::default(),
            config_raw: json!({"client": "acme"}),
            fill: json!({}),
            targets: vec![
                Target::new(0, "300x300".into(), "300x300/index.html".into(), 1200),
                Target::new(1, "728x90".into(), "728x90/index.html".into(), 1200),
            ],
        }
        .shared();

        let state = session.read().state_json();
        let text = state.to_string();
        assert!(text.contains("\"gitStatus\""));
        assert!(text.contains("\"bundlers\""));
        assert_eq!(state["bundlers"]["1"]["port"], 1201);
    }
}
