//! Backend orchestration.
//!
//! ```text
//! rebuild()
//!   ├── ContainerRuntime::build ── parse_image_id
//!   ├── acquire_free_port
//!   ├── ContainerRuntime::run  ──→ BackendInstance (Starting)
//!   ├── TargetSlot::publish     ──→ Live          (swap point)
//!   └── previous.retire()       ──→ Draining ──→ Terminated
//! ```

mod image;
mod instance;
mod orchestrator;
mod port;
mod runtime;
mod target;

#[cfg(test)]
mod tests;

pub use image::{BuildOutputError, ImageId, parse_image_id};
pub use instance::{BackendInstance, BackendState, Lifecycle};
pub use orchestrator::{BackendSettings, LaunchError, Orchestrator, TeardownError};
pub use port::{PortBinding, PortError, acquire_free_port};
pub use runtime::{
    BuildOutput, ChildProcess, ContainerRuntime, DockerRuntime, ProcessHandle, RunSpec,
    RuntimeError,
};
pub use target::{TargetProvider, TargetSlot};
