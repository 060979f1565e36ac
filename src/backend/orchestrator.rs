//! Build → run → publish, one rebuild at a time.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use url::Url;

use super::image::{BuildOutputError, parse_image_id};
use super::instance::{BackendInstance, BackendState, Lifecycle};
use super::port::acquire_free_port;
use super::runtime::{ContainerRuntime, RunSpec, RuntimeError};
use super::target::{TargetProvider, TargetSlot};
use crate::{debug, log};

/// Why a rebuild attempt produced no new backend. Never fatal.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("build failed: {0}")]
    Build(#[source] RuntimeError),

    #[error(transparent)]
    Output(#[from] BuildOutputError),

    #[error("failed to acquire a free port: {0}")]
    Port(#[source] io::Error),

    #[error("invalid backend endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("failed to start container: {0}")]
    Run(#[source] RuntimeError),
}

/// The superseded backend could not be signalled. The caller should exit.
#[derive(Debug, Error)]
#[error("failed to stop backend #{generation} (pid {pid}): {source}")]
pub struct TeardownError {
    pub generation: u64,
    pub pid: u32,
    #[source]
    pub source: RuntimeError,
}

/// Fixed inputs of every rebuild.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Build context handed to the build collaborator.
    pub context: PathBuf,
    pub container_port: u16,
    pub env_file: Option<PathBuf>,
}

pub struct Orchestrator {
    runtime: Box<dyn ContainerRuntime>,
    settings: BackendSettings,
    /// Held for the whole build → run → publish sequence.
    rebuild: Mutex<()>,
    /// The live instance. Only held briefly, never across a build.
    live: Mutex<Option<BackendInstance>>,
    draining: Mutex<Vec<Arc<Lifecycle>>>,
    target: Arc<TargetSlot>,
    generation: AtomicU64,
    closed: AtomicBool,
}

impl Orchestrator {
    pub fn new(runtime: Box<dyn ContainerRuntime>, settings: BackendSettings) -> Self {
        Self {
            runtime,
            settings,
            rebuild: Mutex::new(()),
            live: Mutex::new(None),
            draining: Mutex::new(Vec::new()),
            target: Arc::new(TargetSlot::new()),
            generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Read side of the target slot, for the proxy.
    pub fn targets(&self) -> Arc<TargetSlot> {
        Arc::clone(&self.target)
    }

    /// Number of successful publishes so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Build, run and publish a new backend, then retire the previous one.
    ///
    /// Concurrent callers queue on the rebuild lock. `Ok(false)` means the
    /// attempt failed and the previous target (if any) is still published.
    pub fn rebuild(&self) -> Result<bool, TeardownError> {
        let _rebuild = self.rebuild.lock();
        if self.closed.load(Ordering::Acquire) {
            return Ok(false);
        }

        let generation = self.generation() + 1;
        let instance = match self.launch(generation) {
            Ok(instance) => instance,
            Err(e) => {
                log!("reload"; "rebuild failed: {e}");
                return Ok(false);
            }
        };

        let mut live = self.live.lock();
        // Shutdown started during the build: stop this one unpublished.
        if self.closed.load(Ordering::Acquire) {
            drop(live);
            log!("reload"; "shutting down, stopping backend #{generation} before publish");
            self.retire(instance)?;
            return Ok(false);
        }

        self.target.publish(Arc::clone(instance.endpoint()));
        instance.mark_live();
        self.generation.store(generation, Ordering::Release);
        log!(
            "reload";
            "backend #{generation} live at {} (image {}, pid {})",
            instance.endpoint(),
            instance.image(),
            instance.pid()
        );

        let previous = live.replace(instance);
        drop(live);
        if let Some(previous) = previous {
            self.retire(previous)?;
        }
        Ok(true)
    }

    fn launch(&self, generation: u64) -> Result<BackendInstance, LaunchError> {
        let output = self
            .runtime
            .build(&self.settings.context)
            .map_err(LaunchError::Build)?;
        let image = parse_image_id(&output.stdout)?;
        debug!("reload"; "built image {image}");

        let host_port = acquire_free_port().map_err(LaunchError::Port)?;
        let endpoint = Arc::new(Url::parse(&format!("http://127.0.0.1:{host_port}/"))?);

        let spec = RunSpec {
            image,
            host_port,
            container_port: self.settings.container_port,
            env_file: self.settings.env_file.clone(),
        };
        let handle = self.runtime.run(&spec).map_err(LaunchError::Run)?;
        Ok(BackendInstance::new(generation, spec, endpoint, handle))
    }

    fn retire(&self, instance: BackendInstance) -> Result<(), TeardownError> {
        let generation = instance.generation();
        let pid = instance.pid();
        match instance.retire() {
            Ok(lifecycle) => {
                debug!("reload"; "backend #{generation} (pid {pid}) draining");
                let mut draining = self.draining.lock();
                draining.retain(|l| l.state() != BackendState::Terminated);
                draining.push(lifecycle);
                Ok(())
            }
            Err((_, source)) => Err(TeardownError {
                generation,
                pid,
                source,
            }),
        }
    }

    /// Stop accepting rebuilds, unpublish the target, and stop every backend.
    ///
    /// The live backend is signalled right away, even while a rebuild is
    /// still running; a rebuild that finishes after this point stops its own
    /// container instead of publishing it. Waits at most `timeout` and
    /// returns whether every instance reached `Terminated` in time.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.closed.store(true, Ordering::Release);

        let live = {
            let mut live = self.live.lock();
            self.target.clear();
            live.take()
        };
        if let Some(instance) = live
            && let Err(e) = self.retire(instance)
        {
            log!("error"; "{e}");
        }

        let finished = match self.rebuild.try_lock_until(deadline) {
            Some(_rebuild) => true,
            None => {
                log!("reload"; "rebuild still running at shutdown");
                false
            }
        };

        let draining = std::mem::take(&mut *self.draining.lock());
        let terminated = draining.iter().all(|l| l.wait_terminated(deadline));
        finished && terminated
    }
}

impl TargetProvider for Orchestrator {
    fn current_target(&self) -> Option<Arc<Url>> {
        self.target.current_target()
    }
}
