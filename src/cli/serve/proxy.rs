//! HTTP front that forwards each request to the current backend.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::blocking::Client;
use tiny_http::Request;

use super::{forward, response};
use crate::backend::TargetProvider;

/// Forwards requests to whatever target the provider publishes.
///
/// The target is loaded once per request; forwarding happens without any
/// lock held, so a swap never blocks in-flight requests.
pub struct ProxyFront {
    targets: Arc<dyn TargetProvider>,
    client: Client,
}

impl ProxyFront {
    /// `upstream_timeout` bounds each forwarded exchange; `None` means no limit.
    pub fn new(targets: Arc<dyn TargetProvider>, upstream_timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            targets,
            client: forward::build_client(upstream_timeout)?,
        })
    }

    /// Handle a single HTTP request
    pub fn handle(&self, request: Request) -> Result<()> {
        if crate::core::is_shutdown() {
            return response::respond_unavailable(request, "shutting down");
        }

        let Some(target) = self.targets.current_target() else {
            return response::respond_unavailable(request, "no backend yet");
        };

        forward::forward(&self.client, &target, request)
    }
}
