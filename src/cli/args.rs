//! Command-line interface definitions.

use clap::{ColorChoice, Parser};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::backend::PortBinding;

/// Rebuild and hot-swap a container whenever its source tree changes
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, default_value = "auto")]
    pub color: ColorChoice,

    /// Port bindings as HOST:CONTAINER (e.g. 8080:80)
    #[arg(short = 'p', long = "publish", value_name = "HOST:CONTAINER")]
    pub publish: Option<PortBinding>,

    /// Env file passed to every container run
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub env_file: Option<PathBuf>,

    /// Config file path (default: reload.toml, searched upward)
    #[arg(short = 'C', long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Quiet period in milliseconds before a change triggers a rebuild (0 disables)
    #[arg(short, long, value_name = "MS")]
    pub debounce: Option<u64>,

    /// Directory to watch for changes
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub watch: Option<PathBuf>,

    /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
    #[arg(short, long)]
    pub interface: Option<IpAddr>,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long)]
    pub verbose: bool,
}

impl Cli {
    /// Default config file name.
    pub const CONFIG_NAME: &'static str = "reload.toml";
}
