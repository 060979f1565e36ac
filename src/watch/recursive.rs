//! User-space recursive watching on top of single-directory watches.
//!
//! Native recursive modes differ between platforms, so every directory is
//! registered on its own with `RecursiveMode::NonRecursive`. The directory
//! walk happens once per `add()`: directories created afterwards are not
//! picked up.

use std::fs;
use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use thiserror::Error;
use tokio::sync::mpsc;

use super::types::WatchEvent;

/// Errors raised while setting up watches.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to create file watcher")]
    Init(#[source] notify::Error),

    #[error("cannot watch `{}`", .0.display())]
    Path(PathBuf, #[source] std::io::Error),

    #[error("cannot list directories under `{}`", .0.display())]
    Walk(PathBuf, #[source] jwalk::Error),

    #[error("failed to register watch on `{}`", .0.display())]
    Register(PathBuf, #[source] notify::Error),
}

/// Event and error streams of a [`RecursiveWatcher`].
///
/// Handed out once at construction; they yield for as long as the watcher lives.
pub struct WatchStreams {
    pub events: mpsc::UnboundedReceiver<WatchEvent>,
    pub errors: mpsc::UnboundedReceiver<notify::Error>,
}

pub struct RecursiveWatcher {
    watcher: RecommendedWatcher,
    /// Directories (or single files) currently registered with the OS.
    tree: FxHashSet<PathBuf>,
}

impl RecursiveWatcher {
    pub fn new() -> Result<(Self, WatchStreams), WatchError> {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    for event in WatchEvent::from_notify(event) {
                        let _ = event_tx.send(event);
                    }
                }
                Err(e) => {
                    let _ = error_tx.send(e);
                }
            }
        })
        .map_err(WatchError::Init)?;

        let streams = WatchStreams { events, errors };
        Ok((
            Self {
                watcher,
                tree: FxHashSet::default(),
            },
            streams,
        ))
    }

    /// Register `root` and, if it is a directory, every directory below it.
    ///
    /// Returns the number of newly registered paths.
    pub fn add(&mut self, root: impl AsRef<Path>) -> Result<usize, WatchError> {
        let root = root.as_ref();
        let root = std::path::absolute(root).map_err(|e| WatchError::Path(root.to_path_buf(), e))?;

        let metadata = fs::metadata(&root).map_err(|e| WatchError::Path(root.clone(), e))?;
        if !metadata.is_dir() {
            return Ok(usize::from(self.register(&root)?));
        }

        // jwalk reports an unreadable root as an entry error; stat-and-list first
        // so that case surfaces as a path error like a missing root does.
        fs::read_dir(&root).map_err(|e| WatchError::Path(root.clone(), e))?;

        let mut added = 0;
        let walk = WalkDir::new(&root).skip_hidden(false).sort(true);
        for entry in walk {
            let entry = entry.map_err(|e| WatchError::Walk(root.clone(), e))?;
            if !entry.file_type().is_dir() {
                continue;
            }
            if self.register(&entry.path())? {
                added += 1;
            }
        }

        crate::debug!("watch"; "registered {} directories under {}", added, root.display());
        Ok(added)
    }

    fn register(&mut self, path: &Path) -> Result<bool, WatchError> {
        if self.tree.contains(path) {
            return Ok(false);
        }
        self.watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::Register(path.to_path_buf(), e))?;
        self.tree.insert(path.to_path_buf());
        Ok(true)
    }

    pub fn watched(&self) -> &FxHashSet<PathBuf> {
        &self.tree
    }

    #[cfg(test)]
    pub fn is_watched(&self, path: &Path) -> bool {
        self.tree.contains(path)
    }

    /// Release every registered watch.
    pub fn close(&mut self) {
        for path in self.tree.drain() {
            // Directories removed since registration were already dropped by the OS.
            if let Err(e) = self.watcher.unwatch(&path) {
                crate::debug!("watch"; "unwatch {}: {}", path.display(), e);
            }
        }
    }
}
