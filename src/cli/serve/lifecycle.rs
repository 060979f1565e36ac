//! Server lifecycle management.

use crate::{
    actor::{Coordinator, WatchSource},
    backend::Orchestrator,
    debug, log,
};
use anyhow::{Context, Result};
use crossbeam::channel::Receiver;
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

/// How long to wait for the actor thread after shutdown is requested.
const ACTOR_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Spawn the actor system for file watching and rebuilds.
pub fn spawn_actors(
    source: WatchSource,
    orchestrator: Arc<Orchestrator>,
    shutdown_rx: Receiver<()>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("actors".into())
        .spawn(move || run_actor_system(source, orchestrator, shutdown_rx))
        .context("Failed to spawn actor thread")
}

fn run_actor_system(source: WatchSource, orchestrator: Arc<Orchestrator>, shutdown_rx: Receiver<()>) {
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log!("actor"; "failed to create tokio runtime: {e}");
            crate::core::request_shutdown(1);
            return;
        }
    };

    rt.block_on(async {
        let coordinator = Coordinator::new(source, orchestrator).with_shutdown_signal(shutdown_rx);
        if let Err(e) = coordinator.run().await {
            log!("actor"; "error: {}", e);
        }
    });

    // An in-flight rebuild on the blocking pool is left to Orchestrator::shutdown.
    rt.shutdown_timeout(Duration::from_millis(100));
    debug!("actor"; "runtime stopped");
}

/// Wait for actor system to shutdown gracefully (bounded).
pub fn wait_for_shutdown(handle: JoinHandle<()>) {
    let deadline = std::time::Instant::now() + ACTOR_STOP_TIMEOUT;
    while std::time::Instant::now() < deadline {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    debug!("actor"; "still running after {:?}, continuing shutdown", ACTOR_STOP_TIMEOUT);
}
