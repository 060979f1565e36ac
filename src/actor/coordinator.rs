//! Actor Coordinator - Wires up the Reload Actor System
//!
//! The Coordinator is a **thin orchestrator** that:
//! - Creates the channel between the actors
//! - Queues the initial build
//! - Runs both actors until shutdown
//!
//! ```text
//! FsActor --ReloadMsg--> ReloadActor --rebuild()--> Orchestrator
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossbeam::channel::Receiver;
use tokio::sync::mpsc;

use super::fs::{FsActor, WatchSource, request_rebuild};
use super::messages::ReloadMsg;
use super::reload::ReloadActor;
use crate::backend::Orchestrator;
use crate::debug;

/// At most one rebuild waits behind the running one.
const REBUILD_BUFFER: usize = 1;

/// Shutdown signal poll interval
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Coordinator - wires up and runs the actor system
pub struct Coordinator {
    source: WatchSource,
    orchestrator: Arc<Orchestrator>,
    /// Optional shutdown signal receiver
    shutdown_rx: Option<Receiver<()>>,
}

impl Coordinator {
    pub fn new(source: WatchSource, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            source,
            orchestrator,
            shutdown_rx: None,
        }
    }

    /// Set shutdown signal receiver
    pub fn with_shutdown_signal(mut self, rx: Receiver<()>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    /// Run the actor system
    pub async fn run(self) -> Result<()> {
        let (reload_tx, reload_rx) = mpsc::channel::<ReloadMsg>(REBUILD_BUFFER);
        request_rebuild(&reload_tx, ReloadMsg::Initial);

        let fs_actor = FsActor::new(self.source, reload_tx);
        let reload_actor = ReloadActor::new(reload_rx, self.orchestrator);

        debug!("actor"; "start");
        let fs_handle = tokio::spawn(fs_actor.run());
        let mut reload_handle = tokio::spawn(reload_actor.run());

        // Poll-based since the shutdown signal is a crossbeam channel
        loop {
            tokio::select! {
                outcome = &mut reload_handle => {
                    debug!("actor"; "reload actor finished: {:?}", outcome);
                    break;
                }
                () = tokio::time::sleep(SHUTDOWN_POLL), if self.shutdown_rx.is_some() => {
                    if let Some(rx) = &self.shutdown_rx
                        && rx.try_recv().is_ok()
                    {
                        debug!("actor"; "shutdown signal received");
                        break;
                    }
                }
            }
        }

        // An in-flight rebuild keeps running on the blocking pool;
        // Orchestrator::shutdown waits for it.
        fs_handle.abort();
        let _ = fs_handle.await;
        reload_handle.abort();

        debug!("actor"; "stopped");
        Ok(())
    }
}
