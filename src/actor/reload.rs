//! Reload Actor
//!
//! Runs `Orchestrator::rebuild` for each request, one at a time, on the
//! blocking pool (builds shell out and can take minutes).

use std::sync::Arc;

use tokio::sync::mpsc;

use super::messages::ReloadMsg;
use crate::backend::Orchestrator;
use crate::logger::{status_error, status_success};
use crate::{debug, log};

/// How a rebuild request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Reloaded,
    Failed,
    /// Teardown of the superseded backend failed; the process must exit.
    Fatal,
}

pub struct ReloadActor {
    rx: mpsc::Receiver<ReloadMsg>,
    orchestrator: Arc<Orchestrator>,
}

impl ReloadActor {
    pub fn new(rx: mpsc::Receiver<ReloadMsg>, orchestrator: Arc<Orchestrator>) -> Self {
        Self { rx, orchestrator }
    }

    /// Run until `Shutdown`, channel close, or a fatal teardown error.
    pub async fn run(mut self) -> ReloadOutcome {
        let mut last = ReloadOutcome::Reloaded;

        while let Some(msg) = self.rx.recv().await {
            if matches!(msg, ReloadMsg::Shutdown) {
                break;
            }
            debug!("reload"; "rebuilding: {}", msg.reason());

            last = self.rebuild().await;
            if last == ReloadOutcome::Fatal {
                crate::core::request_shutdown(1);
                break;
            }
        }

        debug!("reload"; "stopped");
        last
    }

    async fn rebuild(&self) -> ReloadOutcome {
        let orchestrator = Arc::clone(&self.orchestrator);
        let result = tokio::task::spawn_blocking(move || orchestrator.rebuild()).await;

        match result {
            Ok(Ok(true)) => {
                log!("reload"; "successfully reloaded");
                status_success(&format!(
                    "backend #{} live",
                    self.orchestrator.generation()
                ));
                ReloadOutcome::Reloaded
            }
            Ok(Ok(false)) => {
                let detail = if self.orchestrator.generation() == 0 {
                    "no backend running yet; fix the build and save again"
                } else {
                    "previous backend still serving"
                };
                status_error("rebuild failed", detail);
                ReloadOutcome::Failed
            }
            Ok(Err(e)) => {
                log!("error"; "{e}");
                ReloadOutcome::Fatal
            }
            Err(e) => {
                log!("error"; "rebuild task failed: {e}");
                ReloadOutcome::Fatal
            }
        }
    }
}
