//! JSON decision trace. Separate from the debug log so it can be replayed or
//! filtered with ordinary JSON tooling.

use crate::config::AppConfig;
use std::env;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::fmt::time::UtcTime;

static INSTALL: Once = Once::new();

pub fn tracing_log_path() -> PathBuf {
    match env::var_os("SL_TRACE_LOG") {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => env::temp_dir().join("statuslight_trace.jsonl"),
    }
}

/// Most verbose level the trace records, or `None` when tracing stays off.
/// Per-decision events are DEBUG, so they only appear with `--debug`.
pub fn trace_level(config: &AppConfig) -> Option<Level> {
    if !config.logging_enabled() {
        None
    } else if config.debug {
        Some(Level::DEBUG)
    } else {
        Some(Level::INFO)
    }
}

fn open_trace_file() -> Option<File> {
    let path = tracing_log_path();
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => Some(file),
        Err(err) => {
            crate::log_debug(&format!("trace disabled, cannot open {}: {err}", path.display()));
            None
        }
    }
}

/// Install the process-wide subscriber. Later calls are no-ops.
pub fn init_tracing(config: &AppConfig) {
    let Some(level) = trace_level(config) else {
        return;
    };
    INSTALL.call_once(|| {
        let Some(file) = open_trace_file() else {
            return;
        };
        let subscriber = tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_max_level(level)
            .with_timer(UtcTime::rfc_3339())
            .with_target(false)
            .with_current_span(false)
            .with_span_list(false)
            .with_writer(file)
            .finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            crate::log_debug("a tracing subscriber was already installed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn config(args: &[&str]) -> AppConfig {
        let mut argv = vec!["statuslight"];
        argv.extend_from_slice(args);
        argv.push("true");
        AppConfig::parse_from(argv)
    }

    #[test]
    fn trace_level_follows_logging_flags() {
        assert_eq!(trace_level(&config(&[])), None);
        assert_eq!(trace_level(&config(&["--logs"])), Some(Level::INFO));
        assert_eq!(trace_level(&config(&["--debug"])), Some(Level::DEBUG));
        assert_eq!(trace_level(&config(&["--debug", "--no-logs"])), None);
    }
}
