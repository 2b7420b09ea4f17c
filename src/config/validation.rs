use super::defaults::{
    CONFIG_DIR_NAME, DEFAULT_INDICATOR_PROGRAM, MAX_BYTE_WINDOW, MAX_MIN_DWELL_MS,
    MAX_PROMPT_LINES, MAX_SILENCE_MS, MAX_TICK_MS, MIN_BYTE_WINDOW, MIN_SILENCE_MS, MIN_TICK_MS,
};
use super::{AppConfig, PatternProfile};
use crate::log_debug;
use anyhow::{bail, Result};
use clap::Parser;
use std::{
    env,
    path::{Path, PathBuf},
};

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values that do not depend on the loaded profile.
    pub fn validate(&mut self) -> Result<()> {
        if self.program().trim().is_empty() {
            bail!("a command to wrap is required");
        }
        if self.command.iter().any(|part| part.contains('\0')) {
            bail!("command and arguments must not contain NUL bytes");
        }
        if self.min_dwell_ms > MAX_MIN_DWELL_MS {
            bail!(
                "--min-dwell-ms must be between 0 and {MAX_MIN_DWELL_MS}, got {}",
                self.min_dwell_ms
            );
        }
        if !(MIN_TICK_MS..=MAX_TICK_MS).contains(&self.tick_ms) {
            bail!(
                "--tick-ms must be between {MIN_TICK_MS} and {MAX_TICK_MS}, got {}",
                self.tick_ms
            );
        }
        if let Some(silence_ms) = self.silence_ms {
            if !(MIN_SILENCE_MS..=MAX_SILENCE_MS).contains(&silence_ms) {
                bail!(
                    "--silence-ms must be between {MIN_SILENCE_MS} and {MAX_SILENCE_MS}, got {silence_ms}"
                );
            }
        }
        if !(MIN_BYTE_WINDOW..=MAX_BYTE_WINDOW).contains(&self.byte_window) {
            bail!(
                "--byte-window must be between {MIN_BYTE_WINDOW} and {MAX_BYTE_WINDOW}, got {}",
                self.byte_window
            );
        }
        if !(1..=MAX_PROMPT_LINES).contains(&self.prompt_lines) {
            bail!(
                "--prompt-lines must be between 1 and {MAX_PROMPT_LINES}, got {}",
                self.prompt_lines
            );
        }
        if let Some(led) = &self.led {
            if led.trim().is_empty() {
                bail!("--led must not be empty (use --no-led to disable the indicator)");
            }
        }
        if self.term_value.trim().is_empty() || self.term_value.contains('\0') {
            self.term_value = "xterm-256color".to_string();
        }
        Ok(())
    }

    /// Check the silence threshold once the profile is known; it must outlast a tick.
    ///
    /// Only `--silence-ms` can fail here. A bad profile value is replaced with a warning.
    pub fn validate_timing(&self, profile: &PatternProfile) -> Result<()> {
        if let Some(silence_ms) = self.silence_ms {
            if silence_ms <= self.tick_ms {
                bail!(
                    "--silence-ms ({silence_ms} ms) must be longer than --tick-ms ({} ms)",
                    self.tick_ms
                );
            }
        } else if !self.profile_threshold_usable(profile) {
            let used = self.silence_threshold(profile).as_millis();
            log_debug(&format!(
                "profile idle_threshold_ms {} does not exceed --tick-ms {}; using {used} ms",
                profile.idle_threshold_ms, self.tick_ms
            ));
            tracing::warn!(
                idle_threshold_ms = profile.idle_threshold_ms,
                tick_ms = self.tick_ms,
                used_ms = used as u64,
                "profile silence threshold replaced"
            );
        }
        Ok(())
    }

    /// Profile directory: `--config-dir`, else `configs/` next to the executable, else `./configs`.
    pub fn resolve_config_dir(&self) -> PathBuf {
        if let Some(dir) = &self.config_dir {
            return dir.clone();
        }
        if let Some(dir) = executable_dir().map(|dir| dir.join(CONFIG_DIR_NAME)) {
            if dir.is_dir() {
                return dir;
            }
        }
        PathBuf::from(CONFIG_DIR_NAME)
    }

    /// Indicator command line, or `None` when the indicator is disabled or absent.
    ///
    /// An explicit `--led` is used as given. The implicit default only applies when a
    /// `led` executable actually sits next to this binary.
    pub fn resolve_indicator_command(&self) -> Option<(String, Vec<String>)> {
        if self.no_led {
            return None;
        }
        if let Some(raw) = &self.led {
            let (program, args) = split_command(raw);
            return (!program.is_empty()).then_some((program, args));
        }
        let candidate = executable_dir()?.join(DEFAULT_INDICATOR_PROGRAM);
        candidate
            .is_file()
            .then(|| (candidate.to_string_lossy().to_string(), Vec::new()))
    }
}

fn executable_dir() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

pub(super) fn split_command(raw: &str) -> (String, Vec<String>) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return (String::new(), Vec::new());
    }
    let parts = shell_words::split(trimmed)
        .unwrap_or_else(|_| trimmed.split_whitespace().map(|s| s.to_string()).collect());
    let mut parts = parts.into_iter();
    let Some(program) = parts.next() else {
        return (String::new(), Vec::new());
    };
    (program, parts.collect())
}
