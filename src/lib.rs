pub mod activity;
mod app;
pub mod config;
pub mod error;
pub mod indicator;
pub mod patterns;
pub mod pty_session;
pub mod telemetry;
pub mod terminal_restore;
pub mod transcript;

pub use app::{
    crash_log_path, init_logging, log_debug, log_debug_content, log_file_path, log_panic,
};
