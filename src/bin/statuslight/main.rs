//! StatusLight entrypoint: runs a command in a PTY and mirrors what it is doing
//! (idle, thinking, waiting for input) on an external indicator.
//!
//! # Architecture
//!
//! - Input thread: reads stdin and forwards raw bytes to the child
//! - PTY reader: forwards child output to the event loop
//! - Indicator worker: runs the indicator command off the relay path
//! - Event loop: relays bytes, feeds the activity monitor, watches for exit

mod event_loop;
mod event_state;
mod input;
mod terminal;

use anyhow::{Context, Result};
use crossbeam_channel::bounded;
use statuslight::activity::{ActivityMonitor, MonitorSettings};
use statuslight::config::{load_profile, AppConfig, ResolvedProfile};
use statuslight::error::SpawnError;
use statuslight::indicator::{CommandIndicator, Indicator, IndicatorWorker, LogIndicator};
use statuslight::patterns::PatternSet;
use statuslight::pty_session::{exit_code, PtyRelaySession};
use statuslight::telemetry::init_tracing;
use statuslight::terminal_restore::TerminalRestoreGuard;
use statuslight::{init_logging, log_debug, log_file_path};
use std::io::{self, IsTerminal};
use std::process;
use std::time::{Duration, Instant};

use crate::event_loop::run_event_loop;
use crate::event_state::{EventLoopDeps, EventLoopState};
use crate::input::spawn_input_thread;
use crate::terminal::{current_winsize, install_sigwinch_handler, install_termination_handlers};

const EXIT_FAILURE: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_SPAWN_FAILED: i32 = 127;
const INPUT_CHANNEL_CAPACITY: usize = 64;
/// How long to wait for a child that is still alive after the loop ended.
const FINAL_WAIT: Duration = Duration::from_secs(1);

fn main() {
    let config = match AppConfig::parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("statuslight: {err:#}");
            process::exit(EXIT_USAGE);
        }
    };
    init_logging(&config);
    init_tracing(&config);
    log_debug("=== StatusLight Started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));

    let config_dir = config.resolve_config_dir();
    let resolved = load_profile(&config_dir, &config.tool_name());
    log_debug(&format!(
        "profile for `{}`: {} (config dir {})",
        config.tool_name(),
        resolved.source,
        config_dir.display()
    ));
    if let Err(err) = config.validate_timing(&resolved.profile) {
        eprintln!("statuslight: {err:#}");
        process::exit(EXIT_USAGE);
    }

    let code = match run(&config, resolved) {
        Ok(code) => code,
        Err(err) => match err.downcast_ref::<SpawnError>() {
            Some(spawn_err) => {
                eprintln!("statuslight: {spawn_err}");
                log_debug(&format!("spawn failed: {spawn_err}"));
                EXIT_SPAWN_FAILED
            }
            None => {
                eprintln!("statuslight: {err:#}");
                log_debug(&format!("fatal: {err:#}"));
                EXIT_FAILURE
            }
        },
    };
    log_debug(&format!("=== StatusLight exiting with {code} ==="));
    process::exit(code);
}

fn build_indicator(config: &AppConfig, resolved: &ResolvedProfile) -> Box<dyn Indicator> {
    match config.resolve_indicator_command() {
        Some((program, args)) => Box::new(CommandIndicator::new(
            program,
            args,
            resolved.profile.colors,
        )),
        None => Box::new(LogIndicator),
    }
}

/// Everything between profile resolution and exit. Returns the wrapper's exit code.
///
/// Guards are declared so that on every return path the indicator receives
/// `Off` and the terminal leaves raw mode before `main` exits.
fn run(config: &AppConfig, resolved: ResolvedProfile) -> Result<i32> {
    install_sigwinch_handler()?;
    install_termination_handlers()?;

    let (patterns, pattern_errors) = PatternSet::compile(&resolved.profile.patterns);
    if !pattern_errors.is_empty() {
        log_debug(&format!(
            "{} pattern(s) skipped; continuing with the rest",
            pattern_errors.len()
        ));
    }

    let indicator = build_indicator(config, &resolved);
    log_debug(&format!("indicator: {}", indicator.describe()));
    let indicator = IndicatorWorker::spawn(indicator);

    let winsize = current_winsize();
    let session = PtyRelaySession::spawn(
        config.program(),
        config.program_args(),
        &config.term_value,
        winsize,
    )?;

    let interactive = io::stdin().is_terminal();
    if !interactive {
        log_debug("stdin is not a terminal; leaving its mode alone");
    }
    let terminal_guard = TerminalRestoreGuard::acquire(interactive)
        .context("failed to put the terminal in raw mode")?;

    let now = Instant::now();
    let monitor = ActivityMonitor::new(
        patterns,
        MonitorSettings {
            byte_window: config.byte_window,
            prompt_lines: config.prompt_lines,
            min_dwell: config.min_dwell(),
            silence_threshold: config.silence_threshold(&resolved.profile),
            waiting_timeout: config.waiting_timeout,
        },
        now,
    );
    indicator.set(monitor.state());

    let (input_tx, input_rx) = bounded(INPUT_CHANNEL_CAPACITY);
    let _input_handle =
        spawn_input_thread(input_tx).context("failed to start the stdin relay thread")?;

    let mut state = EventLoopState::new(monitor, winsize);
    state.forward_stdin_eof = !interactive;
    let mut deps = EventLoopDeps {
        session,
        input_rx,
        indicator,
        stdout: Box::new(io::stdout()),
        tick_interval: config.tick_interval(),
    };

    let status = run_event_loop(&mut state, &mut deps)
        .or_else(|| deps.session.wait_timeout(FINAL_WAIT));

    state.monitor.shutdown(Instant::now());
    deps.indicator.shutdown();
    terminal_guard.restore();

    Ok(match status {
        Some(status) => {
            log_debug(&format!("child status: {status}"));
            exit_code(status)
        }
        None => {
            log_debug("child status unavailable; reporting failure");
            EXIT_FAILURE
        }
    })
}
