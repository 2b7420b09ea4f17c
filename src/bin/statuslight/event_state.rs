use std::collections::VecDeque;
use std::io::Write;
use std::time::Duration;

use crossbeam_channel::Receiver;
use statuslight::activity::ActivityMonitor;
use statuslight::indicator::IndicatorWorker;
use statuslight::pty_session::PtyRelaySession;

use crate::input::InputEvent;

/// Everything the loop mutates. Only the loop thread touches it.
pub(crate) struct EventLoopState {
    pub(crate) monitor: ActivityMonitor,
    pub(crate) pending_pty_input: VecDeque<Vec<u8>>,
    pub(crate) pending_pty_input_offset: usize,
    pub(crate) pending_pty_input_bytes: usize,
    pub(crate) stdin_closed: bool,
    /// Pass stdin EOF on to the child as VEOF. Only for non-terminal stdin; a
    /// real terminal sends its own ^D.
    pub(crate) forward_stdin_eof: bool,
    /// Whether the last byte forwarded to the child ended a line.
    pub(crate) input_at_line_start: bool,
    /// The PTY reader hung up; only exit polling remains.
    pub(crate) output_closed: bool,
    pub(crate) stdout_failed: bool,
    pub(crate) terminal_rows: u16,
    pub(crate) terminal_cols: u16,
}

impl EventLoopState {
    pub(crate) fn new(monitor: ActivityMonitor, winsize: Option<(u16, u16)>) -> Self {
        let (terminal_rows, terminal_cols) = winsize.unwrap_or((0, 0));
        Self {
            monitor,
            pending_pty_input: VecDeque::new(),
            pending_pty_input_offset: 0,
            pending_pty_input_bytes: 0,
            stdin_closed: false,
            forward_stdin_eof: false,
            input_at_line_start: true,
            output_closed: false,
            stdout_failed: false,
            terminal_rows,
            terminal_cols,
        }
    }
}

/// Resources the loop owns exclusively for the run.
pub(crate) struct EventLoopDeps {
    pub(crate) session: PtyRelaySession,
    pub(crate) input_rx: Receiver<InputEvent>,
    pub(crate) indicator: IndicatorWorker,
    /// Where child output is mirrored (the real stdout outside tests).
    pub(crate) stdout: Box<dyn Write>,
    pub(crate) tick_interval: Duration,
}
