//! docker-reload - rebuild and hot-swap a container on every source change.

mod actor;
mod backend;
mod cli;
mod config;
mod core;
mod logger;
mod utils;
mod watch;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use cli::Cli;
use config::ReloadConfig;

use crate::actor::WatchSource;
use crate::backend::{BackendSettings, DockerRuntime, Orchestrator};
use crate::cli::serve::ProxyFront;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = ReloadConfig::load(&cli)?;
    match &config.config_path {
        Some(path) => debug!("config"; "loaded {}", path.display()),
        None => debug!("config"; "no {} found, paths relative to {}",
            Cli::CONFIG_NAME, config.root.display()),
    }
    let publish = config
        .publish()
        .context("No port binding configured")?;

    // Watcher-first: register the tree before the initial build so no
    // change made during it is missed.
    let source = WatchSource::open(&config.watch).context("Failed to watch source tree")?;
    log!("watch"; "watching {} directories under {}",
        source.watched_count(), config.watch.root.display());

    let runtime = DockerRuntime::new(
        &config.backend.program,
        config.backend.build_args.clone(),
        config.backend.run_args.clone(),
    )?;
    debug!("backend"; "using {}", runtime.program().display());

    let orchestrator = Arc::new(Orchestrator::new(
        Box::new(runtime),
        BackendSettings {
            context: config.backend.context.clone(),
            container_port: publish.container,
            env_file: config.backend.env_file.clone(),
        },
    ));

    let bound = cli::serve::bind_server(config.serve.interface, publish.host)?;
    let proxy = Arc::new(ProxyFront::new(
        orchestrator.targets(),
        config.serve.upstream_timeout(),
    )?);
    let served = bound.run(
        proxy,
        source,
        Arc::clone(&orchestrator),
        config.serve.workers,
    );

    // Tear down containers even when the request loop failed.
    if !orchestrator.shutdown(config.backend.shutdown_timeout()) {
        log!("backend"; "some containers did not exit within {:?}",
            config.backend.shutdown_timeout());
    }
    served?;

    match core::exit_code() {
        0 => Ok(()),
        code => std::process::exit(code),
    }
}
