use std::env;

pub const DEFAULT_MIN_DWELL_MS: u64 = 200;
pub const DEFAULT_TICK_MS: u64 = 100;
pub const DEFAULT_BYTE_WINDOW: usize = 1024;
pub const DEFAULT_PROMPT_LINES: usize = 10;
pub const DEFAULT_IDLE_THRESHOLD_MS: u64 = 500;

pub(super) const MAX_MIN_DWELL_MS: u64 = 10_000;
pub(super) const MIN_SILENCE_MS: u64 = 50;
pub(super) const MAX_SILENCE_MS: u64 = 60_000;
pub(super) const MIN_TICK_MS: u64 = 10;
pub(super) const MAX_TICK_MS: u64 = 1_000;
pub(super) const MIN_BYTE_WINDOW: usize = 64;
pub(super) const MAX_BYTE_WINDOW: usize = 64 * 1024;
pub(super) const MAX_PROMPT_LINES: usize = 200;

/// Built-in patterns used when no profile document is found.
pub(super) const FALLBACK_WAITING_PATTERNS: &[&str] = &["wait", "Wait", r"\(y/n\)"];
pub(super) const FALLBACK_THINKING_PATTERNS: &[&str] =
    &["Imagining", "imagining", "Running", "running"];

pub(super) const DEFAULT_PROFILE_NAME: &str = "default";
pub(super) const PROFILE_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];
pub(super) const CONFIG_DIR_NAME: &str = "configs";
pub(super) const DEFAULT_INDICATOR_PROGRAM: &str = "led";

pub(super) fn default_term() -> String {
    env::var("TERM").unwrap_or_else(|_| "xterm-256color".to_string())
}
