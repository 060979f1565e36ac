//! Debounce stage between the raw watcher and the reload loop.
//!
//! ```text
//! raw events → filter (hidden / VCS / ignored) → single-slot window → output
//! ```
//!
//! The window holds at most one event. Each qualifying event replaces it and
//! re-arms the deadline; the event is emitted once the deadline passes without
//! another replacement. Without an interval, events pass straight through.

use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::types::WatchEvent;

/// Version-control metadata directories. Events below them never trigger.
const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn"];

const OUTPUT_BUFFER: usize = 1;

/// Sleep used while the window is empty.
const IDLE_SLEEP: Duration = Duration::from_secs(86400);

/// Decides which events are noise.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Watch root; ignore segments are matched below it only.
    root: Option<PathBuf>,
    /// Extra path segments to ignore (e.g. `target`, `node_modules`).
    ignore: Vec<OsString>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_ignored<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.ignore.extend(segments.into_iter().map(Into::into));
        self
    }

    /// Hidden base name, a VCS directory anywhere in the path, or an ignored segment.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if hidden {
            return true;
        }

        let relative = self
            .root
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path);

        relative.components().any(|component| {
            let Component::Normal(segment) = component else {
                return false;
            };
            VCS_DIRS.iter().any(|vcs| segment == OsStr::new(vcs))
                || self.ignore.iter().any(|ignored| segment == ignored.as_os_str())
        })
    }
}

/// Single pending event plus its deadline.
#[derive(Debug)]
pub struct DebounceWindow {
    interval: Option<Duration>,
    pending: Option<WatchEvent>,
    deadline: Option<Instant>,
}

impl DebounceWindow {
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            pending: None,
            deadline: None,
        }
    }

    /// Offer an event. Returns it back immediately when debouncing is off.
    pub fn offer(&mut self, event: WatchEvent) -> Option<WatchEvent> {
        let Some(interval) = self.interval else {
            return Some(event);
        };
        self.pending = Some(event);
        self.deadline = Some(Instant::now() + interval);
        None
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending event if its deadline has passed.
    pub fn take_if_ready(&mut self) -> Option<WatchEvent> {
        let deadline = self.deadline?;
        if Instant::now() < deadline {
            return None;
        }
        self.flush()
    }

    /// Take the pending event regardless of the deadline.
    pub fn flush(&mut self) -> Option<WatchEvent> {
        self.deadline = None;
        self.pending.take()
    }

    /// Time until the pending event is due.
    pub fn sleep_duration(&self) -> Duration {
        match self.deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => IDLE_SLEEP,
        }
    }
}

/// Debounce `input`, returning the filtered and coalesced stream.
///
/// Must be called inside a tokio runtime. The output ends when `input` ends
/// (after flushing any pending event) or when the output receiver is dropped.
pub fn debounce(
    mut input: mpsc::UnboundedReceiver<WatchEvent>,
    interval: Option<Duration>,
    filter: EventFilter,
) -> mpsc::Receiver<WatchEvent> {
    let (output, rx) = mpsc::channel(OUTPUT_BUFFER);

    tokio::spawn(async move {
        let mut window = DebounceWindow::new(interval);

        loop {
            tokio::select! {
                biased;
                received = input.recv() => {
                    let Some(event) = received else {
                        if let Some(event) = window.flush() {
                            let _ = output.send(event).await;
                        }
                        break;
                    };
                    if filter.is_ignored(&event.path) {
                        crate::debug!("watch"; "ignored {}", event);
                        continue;
                    }
                    crate::debug!("watch"; "raw {}", event);
                    if let Some(ready) = window.offer(event)
                        && output.send(ready).await.is_err()
                    {
                        break;
                    }
                }
                () = tokio::time::sleep(window.sleep_duration()), if window.is_pending() => {
                    if let Some(ready) = window.take_if_ready()
                        && output.send(ready).await.is_err()
                    {
                        break;
                    }
                }
            }
        }
    });

    rx
}
