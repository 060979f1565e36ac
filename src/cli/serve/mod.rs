//! Reverse proxy with live backend reload.

mod forward;
mod lifecycle;
mod proxy;
mod response;


pub use proxy::ProxyFront;

use crate::{actor::WatchSource, backend::Orchestrator, log};
use anyhow::{Context, Result};
use crossbeam::channel;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tiny_http::Server;

/// Bound server ready to accept requests
pub struct BoundServer {
    server: Arc<Server>,
    shutdown_rx: channel::Receiver<()>,
}

/// Bind the HTTP server without starting the request loop
///
/// Binding happens before the first build, so requests arriving while the
/// initial image builds are answered with a 503 rather than refused.
pub fn bind_server(interface: IpAddr, port: u16) -> Result<BoundServer> {
    let addr = SocketAddr::new(interface, port);
    let server =
        Server::http(addr).map_err(|e| anyhow::anyhow!("Failed to bind {addr}: {e}"))?;
    let server = Arc::new(server);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    crate::core::register_server(Arc::clone(&server), shutdown_tx);

    log!("serve"; "http://{}", addr);

    Ok(BoundServer {
        server,
        shutdown_rx,
    })
}

impl BoundServer {
    /// Start the actor system and the request loop (blocking).
    ///
    /// Returns once shutdown has been requested and the actors have stopped.
    pub fn run(
        self,
        proxy: Arc<ProxyFront>,
        source: WatchSource,
        orchestrator: Arc<Orchestrator>,
        workers: usize,
    ) -> Result<()> {
        let actor_handle = lifecycle::spawn_actors(source, orchestrator, self.shutdown_rx)?;
        let result = run_request_loop(&self.server, proxy, workers);
        if result.is_err() {
            crate::core::request_shutdown(1);
        }
        lifecycle::wait_for_shutdown(actor_handle);
        result
    }
}

fn run_request_loop(server: &Server, proxy: Arc<ProxyFront>, workers: usize) -> Result<()> {
    // Use thread pool to handle requests concurrently
    // A slow backend response only occupies one worker
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("proxy-{i}"))
        .build()
        .context("Failed to create request thread pool")?;

    for request in server.incoming_requests() {
        let proxy = Arc::clone(&proxy);
        pool.spawn(move || {
            if let Err(e) = proxy.handle(request) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}
