//! Backend instances and their lifecycle.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use url::Url;

use super::image::ImageId;
use super::runtime::{ProcessHandle, RunSpec, RuntimeError};
use crate::log;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    /// Process spawned, endpoint not yet published.
    Starting,
    /// Endpoint published; receiving traffic.
    Live,
    /// Superseded and signalled; in-flight requests may still complete.
    Draining,
    /// Process has exited.
    Terminated,
}

impl fmt::Display for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Starting => "starting",
            Self::Live => "live",
            Self::Draining => "draining",
            Self::Terminated => "terminated",
        })
    }
}

/// Shared, observable [`BackendState`].
#[derive(Debug)]
pub struct Lifecycle {
    state: Mutex<BackendState>,
    changed: Condvar,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BackendState::Starting),
            changed: Condvar::new(),
        }
    }

    pub fn state(&self) -> BackendState {
        *self.state.lock()
    }

    pub fn set(&self, state: BackendState) {
        *self.state.lock() = state;
        self.changed.notify_all();
    }

    /// Block until `Terminated` or `deadline`. Returns whether it terminated.
    pub fn wait_terminated(&self, deadline: Instant) -> bool {
        let mut state = self.state.lock();
        while *state != BackendState::Terminated {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return *state == BackendState::Terminated;
            }
        }
        true
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// One running backend container.
pub struct BackendInstance {
    generation: u64,
    spec: RunSpec,
    endpoint: Arc<Url>,
    handle: Box<dyn ProcessHandle>,
    lifecycle: Arc<Lifecycle>,
}

impl BackendInstance {
    pub fn new(
        generation: u64,
        spec: RunSpec,
        endpoint: Arc<Url>,
        handle: Box<dyn ProcessHandle>,
    ) -> Self {
        Self {
            generation,
            spec,
            endpoint,
            handle,
            lifecycle: Arc::new(Lifecycle::new()),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn image(&self) -> &ImageId {
        &self.spec.image
    }

    pub fn endpoint(&self) -> &Arc<Url> {
        &self.endpoint
    }

    pub fn pid(&self) -> u32 {
        self.handle.id()
    }

    pub fn state(&self) -> BackendState {
        self.lifecycle.state()
    }

    pub(super) fn mark_live(&self) {
        self.lifecycle.set(BackendState::Live);
    }

    /// Signal the process and hand it to a reaper thread.
    ///
    /// Returns the lifecycle so callers can wait for `Terminated`. On a
    /// signalling failure the instance is returned alongside the error.
    pub fn retire(mut self) -> Result<Arc<Lifecycle>, (Self, RuntimeError)> {
        if let Err(e) = self.handle.terminate() {
            return Err((self, e));
        }
        self.lifecycle.set(BackendState::Draining);

        let Self {
            generation,
            spec,
            mut handle,
            lifecycle,
            ..
        } = self;
        let reaped = Arc::clone(&lifecycle);
        std::thread::spawn(move || {
            if let Err(e) = handle.wait() {
                log!("reload"; "backend #{generation} ({}): {e}", spec.image);
            }
            reaped.set(BackendState::Terminated);
        });
        Ok(lifecycle)
    }
}

impl fmt::Debug for BackendInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendInstance")
            .field("generation", &self.generation)
            .field("image", &self.spec.image)
            .field("endpoint", &self.endpoint.as_str())
            .field("pid", &self.handle.id())
            .field("state", &self.state())
            .finish()
    }
}
