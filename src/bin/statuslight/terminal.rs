use anyhow::{anyhow, Result};
use crossterm::terminal::size as terminal_size;
use statuslight::log_debug;
use statuslight::pty_session::PtyRelaySession;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Flag set by SIGWINCH handler to trigger terminal resize.
static SIGWINCH_RECEIVED: AtomicBool = AtomicBool::new(false);
/// Last termination signal delivered to the wrapper (0 when none is pending).
static TERMINATION_SIGNAL: AtomicI32 = AtomicI32::new(0);

/// Signals the wrapper forwards to the child instead of dying on them.
const FORWARDED_SIGNALS: [libc::c_int; 3] = [libc::SIGTERM, libc::SIGHUP, libc::SIGINT];

/// Signal handler for terminal resize events.
///
/// Only uses atomic operations (async-signal-safe).
extern "C" fn handle_sigwinch(_: libc::c_int) {
    SIGWINCH_RECEIVED.store(true, Ordering::SeqCst);
}

extern "C" fn handle_termination(signal: libc::c_int) {
    TERMINATION_SIGNAL.store(signal, Ordering::SeqCst);
}

fn install_handler(signal: libc::c_int, handler: extern "C" fn(libc::c_int)) -> Result<()> {
    unsafe {
        // SAFETY: the handlers only store into atomics, which is async-signal-safe.
        let handler = handler as *const () as libc::sighandler_t;
        if libc::signal(signal, handler) == libc::SIG_ERR {
            log_debug(&format!("failed to install handler for signal {signal}"));
            return Err(anyhow!("failed to install handler for signal {signal}"));
        }
    }
    Ok(())
}

pub(crate) fn install_sigwinch_handler() -> Result<()> {
    install_handler(libc::SIGWINCH, handle_sigwinch)
}

/// Catch SIGTERM/SIGHUP/SIGINT so they can be forwarded and cleanup still runs.
pub(crate) fn install_termination_handlers() -> Result<()> {
    for signal in FORWARDED_SIGNALS {
        install_handler(signal, handle_termination)?;
    }
    Ok(())
}

pub(crate) fn take_sigwinch() -> bool {
    SIGWINCH_RECEIVED.swap(false, Ordering::SeqCst)
}

pub(crate) fn take_termination_signal() -> Option<libc::c_int> {
    match TERMINATION_SIGNAL.swap(0, Ordering::SeqCst) {
        0 => None,
        signal => Some(signal),
    }
}

/// Current size of the real terminal as (rows, cols), if stdout is a terminal.
pub(crate) fn current_winsize() -> Option<(u16, u16)> {
    terminal_size()
        .ok()
        .filter(|(cols, rows)| *cols > 0 && *rows > 0)
        .map(|(cols, rows)| (rows, cols))
}

pub(crate) fn apply_pty_winsize(session: &PtyRelaySession, rows: u16, cols: u16) {
    if rows == 0 || cols == 0 {
        return;
    }
    if let Err(err) = session.set_winsize(rows, cols) {
        log_debug(&format!("failed to resize PTY to {cols}x{rows}: {err}"));
    }
}
