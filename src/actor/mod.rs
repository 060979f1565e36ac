//! Actor System for Live Reload
//!
//! Message-passing concurrency for watch mode:
//!
//! ```text
//! FsActor --> ReloadActor --> Orchestrator
//! (watch)     (rebuild)       (build, run, swap)
//! ```
//!
//! # Module Structure
//!
//! - `messages` - Message types for inter-actor communication
//! - `fs` - File system watcher with debouncing
//! - `reload` - Serialized rebuilds on the blocking pool
//! - `coordinator` - Wires up and runs actors

pub mod coordinator;
pub mod fs;
pub mod messages;
pub mod reload;

#[cfg(test)]
mod tests;

pub use coordinator::Coordinator;
pub use fs::WatchSource;
