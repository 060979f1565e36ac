use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;

use super::fs::{FsActor, WatchSource, request_rebuild};
use super::messages::ReloadMsg;
use super::reload::{ReloadActor, ReloadOutcome};
use crate::backend::{
    BackendSettings, BuildOutput, ContainerRuntime, Orchestrator, ProcessHandle, RunSpec,
    RuntimeError,
};
use crate::config::WatchConfig;
use crate::watch::{WatchEvent, WatchEventKind};

// ============================================================================
// Fakes
// ============================================================================

struct CountingRuntime {
    builds: Arc<AtomicUsize>,
    fail: bool,
}

struct IdleProcess;

impl ProcessHandle for IdleProcess {
    fn id(&self) -> u32 {
        1
    }

    fn terminate(&mut self) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn wait(&mut self) -> Result<(), RuntimeError> {
        Ok(())
    }
}

impl ContainerRuntime for CountingRuntime {
    fn build(&self, _context: &Path) -> Result<BuildOutput, RuntimeError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RuntimeError::Exec(anyhow::anyhow!("exit status: 1")));
        }
        Ok(BuildOutput {
            stdout: "Successfully built abc123\n".to_string(),
        })
    }

    fn run(&self, _spec: &RunSpec) -> Result<Box<dyn ProcessHandle>, RuntimeError> {
        Ok(Box::new(IdleProcess))
    }
}

fn orchestrator(fail: bool) -> (Arc<Orchestrator>, Arc<AtomicUsize>) {
    let builds = Arc::new(AtomicUsize::new(0));
    let runtime = CountingRuntime {
        builds: Arc::clone(&builds),
        fail,
    };
    let settings = BackendSettings {
        context: ".".into(),
        container_port: 80,
        env_file: None,
    };
    (
        Arc::new(Orchestrator::new(Box::new(runtime), settings)),
        builds,
    )
}

fn change(path: &str) -> ReloadMsg {
    ReloadMsg::Rebuild {
        trigger: WatchEvent::new(path, WatchEventKind::Write),
    }
}

// ============================================================================
// Rebuild requests
// ============================================================================

#[test]
fn test_request_rebuild_coalesces_when_queued() {
    let (tx, mut rx) = mpsc::channel(1);

    assert!(request_rebuild(&tx, change("/app/a.go")));
    assert!(request_rebuild(&tx, change("/app/b.go")));

    let queued = rx.try_recv().unwrap();
    assert_eq!(queued.reason(), "write event for /app/a.go");
    assert!(rx.try_recv().is_err());

    drop(rx);
    assert!(!request_rebuild(&tx, change("/app/c.go")));
}

#[test]
fn test_reason_labels() {
    assert_eq!(ReloadMsg::Initial.reason(), "initial build");
    assert_eq!(ReloadMsg::Shutdown.reason(), "shutdown");
}

// ============================================================================
// ReloadActor
// ============================================================================

#[tokio::test]
async fn test_reload_actor_rebuilds_until_shutdown() {
    let (orchestrator, builds) = orchestrator(false);
    let (tx, rx) = mpsc::channel(4);
    tx.send(ReloadMsg::Initial).await.unwrap();
    tx.send(change("/app/main.go")).await.unwrap();
    tx.send(ReloadMsg::Shutdown).await.unwrap();
    tx.send(change("/app/never.go")).await.unwrap();

    let outcome = ReloadActor::new(rx, Arc::clone(&orchestrator)).run().await;

    assert_eq!(outcome, ReloadOutcome::Reloaded);
    assert_eq!(builds.load(Ordering::SeqCst), 2);
    assert_eq!(orchestrator.generation(), 2);
}

#[tokio::test]
async fn test_reload_actor_survives_failed_build() {
    let (orchestrator, builds) = orchestrator(true);
    let (tx, rx) = mpsc::channel(4);
    tx.send(ReloadMsg::Initial).await.unwrap();
    tx.send(change("/app/main.go")).await.unwrap();
    drop(tx);

    let outcome = ReloadActor::new(rx, Arc::clone(&orchestrator)).run().await;

    assert_eq!(outcome, ReloadOutcome::Failed);
    assert_eq!(builds.load(Ordering::SeqCst), 2);
    assert_eq!(orchestrator.generation(), 0);
}

// ============================================================================
// FsActor
// ============================================================================

fn watch_config(root: &Path, debounce_ms: u64) -> WatchConfig {
    WatchConfig {
        root: root.to_path_buf(),
        debounce_ms,
        ignore: vec!["target".to_string()],
    }
}

#[test]
fn test_watch_source_registers_tree() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src/handlers")).unwrap();

    let source = WatchSource::open(&watch_config(dir.path(), 0)).unwrap();
    assert_eq!(source.watched_count(), 3);
}

#[test]
fn test_watch_source_missing_root_fails() {
    let dir = TempDir::new().unwrap();
    let config = watch_config(&dir.path().join("missing"), 0);
    assert!(WatchSource::open(&config).is_err());
}

#[tokio::test]
async fn test_fs_actor_requests_rebuild_on_change() {
    let dir = TempDir::new().unwrap();
    let root = std::path::absolute(dir.path()).unwrap();
    fs::create_dir_all(root.join("src")).unwrap();

    let source = WatchSource::open(&watch_config(&root, 50)).unwrap();
    let (tx, mut rx) = mpsc::channel(1);
    let handle = tokio::spawn(FsActor::new(source, tx).run());

    fs::write(root.join("src/main.go"), "package main").unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no rebuild requested")
        .unwrap();
    let ReloadMsg::Rebuild { trigger } = msg else {
        panic!("expected a rebuild request");
    };
    assert_eq!(trigger.path, root.join("src/main.go"));

    drop(rx);
    handle.abort();
}
