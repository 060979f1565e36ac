//! Filesystem watching for the reload loop.
//!
//! ```text
//! RecursiveWatcher (one OS watch per directory) → debounce() → WatchEvent
//! ```

mod debounce;
mod recursive;
mod types;


pub use debounce::{DebounceWindow, EventFilter, debounce};
pub use recursive::{RecursiveWatcher, WatchError, WatchStreams};
pub use types::{WatchEvent, WatchEventKind};
