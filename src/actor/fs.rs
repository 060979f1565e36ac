//! FileSystem Actor
//!
//! Turns debounced watch events into rebuild requests.
//! Implements the "Watcher-First" pattern: the watcher is registered in
//! `WatchSource::open` before the initial build, so no change is missed.
//!
//! Architecture:
//! ```text
//! RecursiveWatcher → debounce (filter + quiet period) → ReloadMsg::Rebuild
//! ```

use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};

use super::messages::ReloadMsg;
use crate::config::WatchConfig;
use crate::watch::{EventFilter, RecursiveWatcher, WatchError, WatchStreams, debounce};
use crate::{debug, log};

/// A registered watcher plus the settings to debounce its stream.
pub struct WatchSource {
    watcher: RecursiveWatcher,
    streams: WatchStreams,
    interval: Option<Duration>,
    filter: EventFilter,
}

impl WatchSource {
    /// Register every directory under `config.root`.
    pub fn open(config: &WatchConfig) -> Result<Self, WatchError> {
        let (mut watcher, streams) = RecursiveWatcher::new()?;
        watcher.add(&config.root)?;

        Ok(Self {
            watcher,
            streams,
            interval: config.debounce(),
            filter: EventFilter::new()
                .with_root(&config.root)
                .with_ignored(&config.ignore),
        })
    }

    /// Number of registered directories.
    pub fn watched_count(&self) -> usize {
        self.watcher.watched().len()
    }
}

/// FileSystem Actor - forwards debounced changes to ReloadActor
pub struct FsActor {
    source: WatchSource,
    /// Channel to send messages to ReloadActor
    reload_tx: mpsc::Sender<ReloadMsg>,
}

impl FsActor {
    pub fn new(source: WatchSource, reload_tx: mpsc::Sender<ReloadMsg>) -> Self {
        Self { source, reload_tx }
    }

    /// Run the actor event loop
    ///
    /// Ends when ReloadActor is gone.
    pub async fn run(self) {
        let WatchSource {
            mut watcher,
            streams,
            interval,
            filter,
        } = self.source;
        let WatchStreams { events, mut errors } = streams;
        let mut events = debounce(events, interval, filter);
        let mut errors_open = true;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    log!("watch"; "got {event}");
                    if !request_rebuild(&self.reload_tx, ReloadMsg::Rebuild { trigger: event }) {
                        break;
                    }
                }
                error = errors.recv(), if errors_open => match error {
                    Some(e) => log!("watch"; "error watching: {e}"),
                    None => errors_open = false,
                },
            }
        }

        watcher.close();
        debug!("watch"; "stopped");
    }
}

/// Queue a rebuild unless one is already queued.
///
/// A queued rebuild has not started yet, so it will see this change too.
/// Returns `false` once ReloadActor has shut down.
pub(super) fn request_rebuild(tx: &mpsc::Sender<ReloadMsg>, msg: ReloadMsg) -> bool {
    match tx.try_send(msg) {
        Ok(()) => true,
        Err(TrySendError::Full(msg)) => {
            debug!("watch"; "rebuild already queued, coalescing {}", msg.reason());
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}
