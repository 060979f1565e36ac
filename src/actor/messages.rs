//! Actor Message Definitions
//!
//! ```text
//! FsActor --Rebuild--> ReloadActor
//! ```

use crate::watch::WatchEvent;

/// Messages to ReloadActor
#[derive(Debug)]
pub enum ReloadMsg {
    /// First build at startup
    Initial,
    /// Debounced change in the watched tree
    Rebuild { trigger: WatchEvent },
    /// Stop after the current rebuild
    Shutdown,
}

impl ReloadMsg {
    /// Short description for logs.
    pub fn reason(&self) -> String {
        match self {
            Self::Initial => "initial build".to_string(),
            Self::Rebuild { trigger } => trigger.to_string(),
            Self::Shutdown => "shutdown".to_string(),
        }
    }
}
