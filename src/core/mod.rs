//! Process state shared across the codebase.

mod state;

pub use state::{
    exit_code, is_shutdown, register_server, request_shutdown, setup_shutdown_handler,
};
