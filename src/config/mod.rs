//! Command-line parsing, validation, and pattern profile loading.

mod defaults;
mod profile;
mod validation;

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use defaults::default_term;
pub use defaults::{
    DEFAULT_BYTE_WINDOW, DEFAULT_IDLE_THRESHOLD_MS, DEFAULT_MIN_DWELL_MS, DEFAULT_PROMPT_LINES,
    DEFAULT_TICK_MS,
};
pub use profile::{
    load_profile, profile_candidates, IndicatorColors, PatternLists, PatternProfile,
    ProfileSource, ResolvedProfile, Rgb,
};

/// CLI options for the status light wrapper.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "statuslight",
    about = "StatusLight: run a command in a PTY and mirror its idle/thinking/waiting state on an indicator",
    author,
    version
)]
pub struct AppConfig {
    /// Command to wrap, followed by its arguments (passed through untouched)
    #[arg(value_name = "COMMAND", required = true, trailing_var_arg = true)]
    pub command: Vec<String>,

    /// Profile name used for pattern lookup (defaults to the command's file name)
    #[arg(long = "tool")]
    pub tool: Option<String>,

    /// Directory holding `<tool>.json|yaml` and `default.json|yaml` profiles
    #[arg(long = "config-dir", env = "SL_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Minimum time a state is held before another transition is accepted (ms)
    #[arg(long = "min-dwell-ms", default_value_t = DEFAULT_MIN_DWELL_MS)]
    pub min_dwell_ms: u64,

    /// Output silence required before re-evaluating idle/waiting (ms, overrides the profile)
    #[arg(long = "silence-ms")]
    pub silence_ms: Option<u64>,

    /// Timer heartbeat driving silence detection (ms)
    #[arg(long = "tick-ms", default_value_t = DEFAULT_TICK_MS)]
    pub tick_ms: u64,

    /// Bytes of recent output searched for thinking patterns
    #[arg(long = "byte-window", default_value_t = DEFAULT_BYTE_WINDOW)]
    pub byte_window: usize,

    /// Recent lines searched for waiting patterns
    #[arg(long = "prompt-lines", default_value_t = DEFAULT_PROMPT_LINES)]
    pub prompt_lines: usize,

    /// Let a waiting state fall back to idle after silence
    #[arg(long = "waiting-timeout", default_value_t = false)]
    pub waiting_timeout: bool,

    /// Indicator command; receives `a R G B` for a state and `o` for off
    #[arg(long = "led", env = "SL_LED")]
    pub led: Option<String>,

    /// Do not drive an indicator; state changes only go to the logs
    #[arg(long = "no-led", env = "SL_NO_LED", default_value_t = false)]
    pub no_led: bool,

    /// TERM value exported to the wrapped command
    #[arg(long = "term", default_value_t = default_term())]
    pub term_value: String,

    /// Enable the decision trace (implies --logs)
    #[arg(long = "debug", env = "DEBUG_SL", default_value_t = false)]
    pub debug: bool,

    /// Enable file logging
    #[arg(long = "logs", env = "SL_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs, --debug and log env vars)
    #[arg(long = "no-logs", env = "SL_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging snippets of the wrapped command's output
    #[arg(long = "log-content", env = "SL_LOG_CONTENT", default_value_t = false)]
    pub log_content: bool,
}

impl AppConfig {
    /// Program name of the wrapped command.
    pub fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or_default()
    }

    /// Arguments following the program name.
    pub fn program_args(&self) -> &[String] {
        self.command.get(1..).unwrap_or(&[])
    }

    pub fn logging_enabled(&self) -> bool {
        (self.logs || self.debug) && !self.no_logs
    }

    /// Name used for profile lookup: `--tool`, else the command's file name.
    pub fn tool_name(&self) -> String {
        if let Some(tool) = self.tool.as_deref().map(str::trim) {
            if !tool.is_empty() {
                return tool.to_string();
            }
        }
        let program = self.program();
        std::path::Path::new(program)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(program)
            .to_string()
    }

    pub fn min_dwell(&self) -> Duration {
        Duration::from_millis(self.min_dwell_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// CLI override first, then the profile threshold.
    ///
    /// A profile threshold that does not outlast a tick is replaced by the default
    /// (or two ticks, if that is longer), since silence could never be measured.
    pub fn silence_threshold(&self, profile: &PatternProfile) -> Duration {
        if let Some(ms) = self.silence_ms {
            return Duration::from_millis(ms);
        }
        let ms = if self.profile_threshold_usable(profile) {
            profile.idle_threshold_ms
        } else {
            defaults::DEFAULT_IDLE_THRESHOLD_MS.max(self.tick_ms.saturating_mul(2))
        };
        Duration::from_millis(ms)
    }

    pub(crate) fn profile_threshold_usable(&self, profile: &PatternProfile) -> bool {
        profile.idle_threshold_ms > self.tick_ms
    }
}
