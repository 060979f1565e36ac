//! The published proxy target.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use url::Url;

/// Read access to the endpoint requests should be forwarded to.
pub trait TargetProvider: Send + Sync {
    /// `None` until the first successful rebuild.
    fn current_target(&self) -> Option<Arc<Url>>;
}

/// Single-writer, multi-reader cell holding the current target.
///
/// Loads never block and never observe a partially written value. Only the
/// orchestrator writes, and only while holding its rebuild lock.
#[derive(Debug, Default)]
pub struct TargetSlot(ArcSwapOption<Url>);

impl TargetSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn publish(&self, target: Arc<Url>) {
        self.0.store(Some(target));
    }

    pub(super) fn clear(&self) {
        self.0.store(None);
    }
}

impl TargetProvider for TargetSlot {
    fn current_target(&self) -> Option<Arc<Url>> {
        self.0.load_full()
    }
}
