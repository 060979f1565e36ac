//! Process-wide shutdown state.
//!
//! Two ways in:
//! - Ctrl+C, via the handler installed by `setup_shutdown_handler()`
//! - a fatal rebuild error, via `request_shutdown()` with a non-zero code
//!
//! Both unblock the HTTP server and notify the actor system; `main` then
//! tears the backends down and exits with `exit_code()`.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, OnceLock};

use tiny_http::Server;

/// Shutdown has been requested
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Process exit status once shut down
static EXIT_CODE: AtomicI32 = AtomicI32::new(0);

/// HTTP server reference for graceful shutdown
static SERVER: OnceLock<Arc<Server>> = OnceLock::new();

/// Shutdown signal sender for actor system
static SHUTDOWN_TX: OnceLock<crossbeam::channel::Sender<()>> = OnceLock::new();

/// Setup the global Ctrl+C handler. Call once at program start
///
/// - Before `register_server()`: exits immediately, nothing to tear down
/// - After `register_server()`: graceful shutdown (unblock server, notify actors)
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        if SERVER.get().is_none() {
            std::process::exit(130);
        }
        crate::log!("serve"; "shutting down...");
        request_shutdown(0);
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Register the HTTP server for graceful shutdown
///
/// Call this after binding the server, before entering the request loop
pub fn register_server(server: Arc<Server>, shutdown_tx: crossbeam::channel::Sender<()>) {
    let _ = SERVER.set(server);
    let _ = SHUTDOWN_TX.set(shutdown_tx);
}

/// Begin shutdown. The first non-zero `code` wins.
pub fn request_shutdown(code: i32) {
    if code != 0 {
        let _ = EXIT_CODE.compare_exchange(0, code, Ordering::SeqCst, Ordering::SeqCst);
    }
    if SHUTDOWN.swap(true, Ordering::SeqCst) {
        return;
    }

    if let Some(tx) = SHUTDOWN_TX.get() {
        let _ = tx.send(());
    }
    if let Some(server) = SERVER.get() {
        server.unblock();
    }
}

/// Check if shutdown has been requested
///
/// Relaxed: a request racing the flag is still answered, just with a
/// target that is about to go away.
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Exit status to report once shutdown completes.
pub fn exit_code() -> i32 {
    EXIT_CODE.load(Ordering::SeqCst)
}
