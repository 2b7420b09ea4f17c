//! Scoped raw mode for the wrapper's own terminal.

use crossterm::{
    cursor::Show,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::{
    io::{self, Write},
    panic,
    sync::{
        atomic::{AtomicBool, Ordering},
        Once,
    },
};

/// Set only while this process holds the terminal in raw mode.
static RAW_HELD: AtomicBool = AtomicBool::new(false);
static HOOK: Once = Once::new();

/// Holds the terminal mode for the lifetime of a relay session.
///
/// Dropping the guard (or panicking while it is alive) puts the terminal back
/// the way it was found. A guard created with `raw = false` only installs the
/// panic hook, which is what a non-interactive stdin needs.
pub struct TerminalRestoreGuard {
    _private: (),
}

impl TerminalRestoreGuard {
    pub fn acquire(raw: bool) -> io::Result<Self> {
        install_terminal_panic_hook();
        if raw {
            enable_raw_mode()?;
            RAW_HELD.store(true, Ordering::SeqCst);
        }
        Ok(Self { _private: () })
    }

    /// Restore early; the drop afterwards is then a no-op.
    pub fn restore(&self) {
        restore_terminal();
    }
}

impl Drop for TerminalRestoreGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

/// Leave raw mode if we entered it. Idempotent.
pub fn restore_terminal() {
    if !RAW_HELD.swap(false, Ordering::SeqCst) {
        return;
    }
    if let Err(err) = disable_raw_mode() {
        crate::log_debug(&format!("could not leave raw mode: {err}"));
    }
    let mut stdout = io::stdout();
    if execute!(stdout, Show).and_then(|()| stdout.flush()).is_err() {
        crate::log_debug("could not re-show the cursor");
    }
}

/// Chain a hook that restores the terminal before the default panic output.
pub fn install_terminal_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            restore_terminal();
            crate::log_panic(info);
            previous(info);
        }));
    });
}
