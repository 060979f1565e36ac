use super::*;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

// ============================================================================
// Fakes
// ============================================================================

/// Shared record of what the fake runtime was asked to do.
#[derive(Default)]
struct Journal {
    builds: AtomicUsize,
    runs: Mutex<Vec<RunSpec>>,
    terminations: Mutex<Vec<u32>>,
    in_build: AtomicBool,
}

/// What the next build returns.
#[derive(Clone)]
enum BuildScript {
    Ok(String),
    Fail,
}

struct FakeRuntime {
    journal: Arc<Journal>,
    script: Arc<Mutex<BuildScript>>,
    build_delay: Duration,
    fail_signal: bool,
    next_pid: AtomicUsize,
}

impl FakeRuntime {
    fn new(journal: Arc<Journal>, script: Arc<Mutex<BuildScript>>) -> Self {
        Self {
            journal,
            script,
            build_delay: Duration::ZERO,
            fail_signal: false,
            next_pid: AtomicUsize::new(100),
        }
    }
}

impl ContainerRuntime for FakeRuntime {
    fn build(&self, _context: &Path) -> Result<BuildOutput, RuntimeError> {
        // Overlapping builds mean the rebuild lock is broken.
        assert!(
            !self.journal.in_build.swap(true, Ordering::SeqCst),
            "build entered concurrently"
        );
        thread::sleep(self.build_delay);
        self.journal.builds.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().clone();
        self.journal.in_build.store(false, Ordering::SeqCst);

        match script {
            BuildScript::Ok(stdout) => Ok(BuildOutput { stdout }),
            BuildScript::Fail => Err(RuntimeError::Exec(anyhow::anyhow!("exit status: 1"))),
        }
    }

    fn run(&self, spec: &RunSpec) -> Result<Box<dyn ProcessHandle>, RuntimeError> {
        self.journal.runs.lock().push(spec.clone());
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst) as u32;
        Ok(Box::new(FakeProcess {
            pid,
            journal: Arc::clone(&self.journal),
            fail_signal: self.fail_signal,
        }))
    }
}

struct FakeProcess {
    pid: u32,
    journal: Arc<Journal>,
    fail_signal: bool,
}

impl ProcessHandle for FakeProcess {
    fn id(&self) -> u32 {
        self.pid
    }

    fn terminate(&mut self) -> Result<(), RuntimeError> {
        if self.fail_signal {
            return Err(RuntimeError::Signal {
                pid: self.pid,
                source: std::io::Error::from_raw_os_error(1),
            });
        }
        self.journal.terminations.lock().push(self.pid);
        Ok(())
    }

    fn wait(&mut self) -> Result<(), RuntimeError> {
        Ok(())
    }
}

fn settings() -> BackendSettings {
    BackendSettings {
        context: PathBuf::from("."),
        container_port: 80,
        env_file: Some(PathBuf::from(".env")),
    }
}

fn setup(script: BuildScript) -> (Orchestrator, Arc<Journal>, Arc<Mutex<BuildScript>>) {
    let journal = Arc::new(Journal::default());
    let script = Arc::new(Mutex::new(script));
    let runtime = FakeRuntime::new(Arc::clone(&journal), Arc::clone(&script));
    (
        Orchestrator::new(Box::new(runtime), settings()),
        journal,
        script,
    )
}

fn ok_build(id: &str) -> BuildScript {
    BuildScript::Ok(format!("Step 1/2...\nSuccessfully built {id}\n"))
}

// ============================================================================
// Rebuild
// ============================================================================

#[test]
fn test_first_rebuild_publishes_target() {
    let (orchestrator, journal, _) = setup(ok_build("abc123"));
    assert!(orchestrator.current_target().is_none());

    assert!(orchestrator.rebuild().unwrap());

    let target = orchestrator.current_target().unwrap();
    let runs = journal.runs.lock();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].image.as_str(), "abc123");
    assert_eq!(runs[0].container_port, 80);
    assert_eq!(runs[0].env_file.as_deref(), Some(Path::new(".env")));
    assert_eq!(
        target.as_str(),
        format!("http://127.0.0.1:{}/", runs[0].host_port)
    );
    assert_eq!(orchestrator.generation(), 1);
    assert!(journal.terminations.lock().is_empty());
}

#[test]
fn test_successful_rebuild_swaps_then_kills_previous() {
    let (orchestrator, journal, script) = setup(ok_build("abc123"));
    assert!(orchestrator.rebuild().unwrap());
    let first = orchestrator.current_target().unwrap();

    *script.lock() = ok_build("def456");
    assert!(orchestrator.rebuild().unwrap());
    let second = orchestrator.current_target().unwrap();

    assert_ne!(first, second);
    assert_eq!(journal.runs.lock()[1].image.as_str(), "def456");
    // The first process (pid 100) is signalled exactly once.
    assert_eq!(*journal.terminations.lock(), vec![100]);
    assert_eq!(orchestrator.generation(), 2);
}

#[test]
fn test_failed_build_keeps_previous_target() {
    let (orchestrator, journal, script) = setup(ok_build("abc123"));
    assert!(orchestrator.rebuild().unwrap());
    let before = orchestrator.current_target().unwrap();

    *script.lock() = BuildScript::Fail;
    assert!(!orchestrator.rebuild().unwrap());

    assert_eq!(orchestrator.current_target().unwrap(), before);
    assert_eq!(journal.runs.lock().len(), 1);
    assert!(journal.terminations.lock().is_empty());
    assert_eq!(orchestrator.generation(), 1);
}

#[test]
fn test_failed_first_build_leaves_no_target() {
    let (orchestrator, journal, _) = setup(BuildScript::Fail);
    assert!(!orchestrator.rebuild().unwrap());
    assert!(orchestrator.current_target().is_none());
    assert!(journal.runs.lock().is_empty());
}

#[test]
fn test_malformed_build_output_fails_rebuild() {
    let (orchestrator, journal, script) = setup(ok_build("abc123"));
    assert!(orchestrator.rebuild().unwrap());
    let before = orchestrator.current_target().unwrap();

    *script.lock() = BuildScript::Ok(String::new());
    assert!(!orchestrator.rebuild().unwrap());
    *script.lock() = BuildScript::Ok("error: (exit 2)\n".to_string());
    assert!(!orchestrator.rebuild().unwrap());

    assert_eq!(orchestrator.current_target().unwrap(), before);
    assert_eq!(journal.runs.lock().len(), 1);
}

#[test]
fn test_concurrent_rebuilds_are_serialized() {
    const CALLERS: usize = 8;

    let journal = Arc::new(Journal::default());
    let script = Arc::new(Mutex::new(ok_build("abc123")));
    let mut runtime = FakeRuntime::new(Arc::clone(&journal), script);
    runtime.build_delay = Duration::from_millis(5);
    let orchestrator = Arc::new(Orchestrator::new(Box::new(runtime), settings()));

    let threads: Vec<_> = (0..CALLERS)
        .map(|_| {
            let orchestrator = Arc::clone(&orchestrator);
            thread::spawn(move || orchestrator.rebuild().unwrap())
        })
        .collect();
    for thread in threads {
        assert!(thread.join().unwrap());
    }

    assert_eq!(journal.builds.load(Ordering::SeqCst), CALLERS);
    assert_eq!(journal.runs.lock().len(), CALLERS);
    // Every instance except the live one was retired once.
    assert_eq!(journal.terminations.lock().len(), CALLERS - 1);
    assert_eq!(orchestrator.generation(), CALLERS as u64);
}

#[test]
fn test_readers_see_only_published_targets() {
    let (orchestrator, journal, _) = setup(ok_build("abc123"));
    let orchestrator = Arc::new(orchestrator);
    let stop = Arc::new(AtomicBool::new(false));

    let reader = {
        let orchestrator = Arc::clone(&orchestrator);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut seen = Vec::new();
            while !stop.load(Ordering::SeqCst) {
                if let Some(target) = orchestrator.current_target() {
                    seen.push(target.port().unwrap());
                }
            }
            seen
        })
    };

    for _ in 0..5 {
        assert!(orchestrator.rebuild().unwrap());
    }
    stop.store(true, Ordering::SeqCst);
    let seen = reader.join().unwrap();

    let published: Vec<u16> = journal.runs.lock().iter().map(|r| r.host_port).collect();
    assert!(seen.iter().all(|port| published.contains(port)));
}

#[test]
fn test_signal_failure_is_teardown_error() {
    let journal = Arc::new(Journal::default());
    let script = Arc::new(Mutex::new(ok_build("abc123")));
    let mut runtime = FakeRuntime::new(Arc::clone(&journal), script);
    runtime.fail_signal = true;
    let orchestrator = Orchestrator::new(Box::new(runtime), settings());

    assert!(orchestrator.rebuild().unwrap());
    let err = orchestrator.rebuild().unwrap_err();

    assert_eq!(err.generation, 1);
    assert_eq!(err.pid, 100);
    // The new backend was already published before the old one was signalled.
    assert_eq!(orchestrator.generation(), 2);
}

// ============================================================================
// Shutdown
// ============================================================================

#[test]
fn test_shutdown_terminates_every_backend() {
    let (orchestrator, journal, _) = setup(ok_build("abc123"));
    assert!(orchestrator.rebuild().unwrap());
    assert!(orchestrator.rebuild().unwrap());

    assert!(orchestrator.shutdown(Duration::from_secs(5)));

    assert!(orchestrator.current_target().is_none());
    let mut terminated = journal.terminations.lock().clone();
    terminated.sort_unstable();
    assert_eq!(terminated, vec![100, 101]);

    // No rebuilds after shutdown.
    assert!(!orchestrator.rebuild().unwrap());
    assert_eq!(journal.builds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_shutdown_without_backend() {
    let (orchestrator, _, _) = setup(BuildScript::Fail);
    assert!(orchestrator.shutdown(Duration::from_millis(50)));
}

#[test]
fn test_shutdown_stops_live_backend_during_rebuild() {
    let journal = Arc::new(Journal::default());
    let script = Arc::new(Mutex::new(ok_build("abc123")));
    let mut runtime = FakeRuntime::new(Arc::clone(&journal), script);
    runtime.build_delay = Duration::from_millis(300);
    let orchestrator = Arc::new(Orchestrator::new(Box::new(runtime), settings()));
    assert!(orchestrator.rebuild().unwrap());

    let pending = {
        let orchestrator = Arc::clone(&orchestrator);
        thread::spawn(move || orchestrator.rebuild().unwrap())
    };
    thread::sleep(Duration::from_millis(100));

    // The rebuild outlives the timeout, but the live backend is stopped anyway.
    assert!(!orchestrator.shutdown(Duration::from_millis(20)));
    assert_eq!(*journal.terminations.lock(), vec![100]);
    assert!(orchestrator.current_target().is_none());

    // The late container is stopped instead of published.
    assert!(!pending.join().unwrap());
    assert_eq!(*journal.terminations.lock(), vec![100, 101]);
    assert!(orchestrator.current_target().is_none());
    assert_eq!(orchestrator.generation(), 1);
}

#[test]
fn test_retired_instance_reaches_terminated() {
    let journal = Arc::new(Journal::default());
    let process = FakeProcess {
        pid: 7,
        journal: Arc::clone(&journal),
        fail_signal: false,
    };
    let spec = RunSpec {
        image: parse_image_id("abc123").unwrap(),
        host_port: 40000,
        container_port: 80,
        env_file: None,
    };
    let endpoint = Arc::new(url::Url::parse("http://127.0.0.1:40000/").unwrap());
    let instance = BackendInstance::new(1, spec, endpoint, Box::new(process));
    assert_eq!(instance.state(), BackendState::Starting);

    let lifecycle = instance.retire().unwrap();
    assert!(lifecycle.wait_terminated(std::time::Instant::now() + Duration::from_secs(5)));
    assert_eq!(lifecycle.state(), BackendState::Terminated);
    assert_eq!(*journal.terminations.lock(), vec![7]);
}
