//! Configuration section definitions.
//!
//! Each module corresponds to a section in `reload.toml`:
//!
//! | Module    | TOML Section | Purpose                               |
//! |-----------|--------------|---------------------------------------|
//! | `backend` | `[backend]`  | Container build/run, port binding     |
//! | `serve`   | `[serve]`    | Proxy front                           |
//! | `watch`   | `[watch]`    | Watched tree, debounce, ignore list   |

mod backend;
mod serve;
mod watch;

pub use backend::BackendConfig;
pub use serve::ServeConfig;
pub use watch::WatchConfig;
