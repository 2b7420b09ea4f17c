//! Core runtime loop: relays PTY output and keyboard input, drives the activity
//! monitor on output and on the timer, and watches for child exit.

use std::io::Write;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use crossbeam_channel::{never, select, tick, RecvTimeoutError};
use statuslight::activity::Decision;
use statuslight::log_debug;

use crate::event_state::{EventLoopDeps, EventLoopState};
use crate::input::InputEvent;
use crate::terminal::{apply_pty_winsize, current_winsize, take_sigwinch, take_termination_signal};

const PTY_INPUT_FLUSH_ATTEMPTS: usize = 16;
const PTY_INPUT_MAX_BUFFER_BYTES: usize = 256 * 1024;
/// After exit, keep reading until output has been quiet this long.
const DRAIN_QUIET: Duration = Duration::from_millis(50);
/// Upper bound on the post-exit drain.
const DRAIN_MAX: Duration = Duration::from_millis(500);
/// VEOF under the default termios settings.
const EOF_BYTE: u8 = 0x04;

fn apply_decision(deps: &EventLoopDeps, decision: Decision) {
    if let Some(state) = decision.transition() {
        log_debug(&format!("state -> {state} ({})", decision.trigger.label()));
        deps.indicator.set(state);
    }
}

fn handle_output(state: &mut EventLoopState, deps: &mut EventLoopDeps, bytes: Vec<u8>) {
    if !state.stdout_failed {
        let written = deps
            .stdout
            .write_all(&bytes)
            .and_then(|()| deps.stdout.flush());
        if let Err(err) = written {
            log_debug(&format!("stdout write failed; output is no longer mirrored: {err}"));
            state.stdout_failed = true;
        }
    }
    let decision = state.monitor.on_output(&bytes, Instant::now());
    apply_decision(deps, decision);
}

fn flush_pending_pty_input(state: &mut EventLoopState, deps: &mut EventLoopDeps) -> bool {
    for _ in 0..PTY_INPUT_FLUSH_ATTEMPTS {
        let Some(front) = state.pending_pty_input.front() else {
            state.pending_pty_input_offset = 0;
            state.pending_pty_input_bytes = 0;
            return true;
        };
        let front_len = front.len();
        if state.pending_pty_input_offset >= front_len {
            state.pending_pty_input.pop_front();
            state.pending_pty_input_offset = 0;
            continue;
        }
        match deps
            .session
            .try_send_bytes(&front[state.pending_pty_input_offset..])
        {
            Ok(0) => break,
            Ok(written) => {
                state.pending_pty_input_bytes =
                    state.pending_pty_input_bytes.saturating_sub(written);
                state.pending_pty_input_offset += written;
                if state.pending_pty_input_offset >= front_len {
                    state.pending_pty_input.pop_front();
                    state.pending_pty_input_offset = 0;
                }
            }
            Err(err) => {
                log_debug(&format!("failed to flush PTY input queue: {err}"));
                return false;
            }
        }
    }
    true
}

fn write_or_queue_pty_input(
    state: &mut EventLoopState,
    deps: &mut EventLoopDeps,
    bytes: Vec<u8>,
) -> bool {
    if bytes.is_empty() {
        return true;
    }
    if let Some(&last) = bytes.last() {
        state.input_at_line_start = matches!(last, b'\n' | b'\r');
    }
    if state.pending_pty_input.is_empty() {
        match deps.session.try_send_bytes(&bytes) {
            Ok(written) if written >= bytes.len() => return true,
            Ok(written) => {
                state.pending_pty_input_bytes = state
                    .pending_pty_input_bytes
                    .saturating_add(bytes.len() - written);
                state.pending_pty_input.push_back(bytes[written..].to_vec());
            }
            Err(err) => {
                log_debug(&format!("failed to write to PTY: {err}"));
                return false;
            }
        }
    } else {
        state.pending_pty_input_bytes = state.pending_pty_input_bytes.saturating_add(bytes.len());
        state.pending_pty_input.push_back(bytes);
    }
    flush_pending_pty_input(state, deps)
}

fn run_periodic_tasks(state: &mut EventLoopState, deps: &mut EventLoopDeps, now: Instant) {
    if take_sigwinch() {
        if let Some((rows, cols)) = current_winsize() {
            if (rows, cols) != (state.terminal_rows, state.terminal_cols) {
                log_debug(&format!(
                    "terminal resized {}x{} -> {cols}x{rows}",
                    state.terminal_cols, state.terminal_rows
                ));
                state.terminal_rows = rows;
                state.terminal_cols = cols;
                apply_pty_winsize(&deps.session, rows, cols);
            }
        }
    }
    if let Some(signal) = take_termination_signal() {
        log_debug(&format!("forwarding signal {signal} to child"));
        if let Err(err) = deps.session.signal(signal) {
            log_debug(&format!("failed to forward signal {signal}: {err}"));
        }
    }
    if let Some(decision) = state.monitor.on_tick(now) {
        apply_decision(deps, decision);
    }
}

/// Stdin hit EOF. In canonical mode one VEOF flushes a pending partial line and
/// a second one reads as end of file, so send two unless we are at a line start.
fn handle_stdin_eof(state: &mut EventLoopState, deps: &mut EventLoopDeps) -> bool {
    state.stdin_closed = true;
    if !state.forward_stdin_eof {
        return true;
    }
    let eof = if state.input_at_line_start {
        vec![EOF_BYTE]
    } else {
        vec![EOF_BYTE, EOF_BYTE]
    };
    log_debug("stdin closed; sending EOF to the child");
    write_or_queue_pty_input(state, deps, eof)
}

/// The PTY rejected input: treat it as the child going away.
fn end_after_relay_failure(
    state: &mut EventLoopState,
    deps: &mut EventLoopDeps,
) -> Option<ExitStatus> {
    log_debug("PTY input failed; ending the session");
    drain_output(state, deps);
    deps.session.try_wait()
}

/// Read whatever the child left in the PTY after it exited.
fn drain_output(state: &mut EventLoopState, deps: &mut EventLoopDeps) {
    if state.output_closed {
        return;
    }
    let deadline = Instant::now() + DRAIN_MAX;
    while Instant::now() < deadline {
        match deps.session.output_rx.recv_timeout(DRAIN_QUIET) {
            Ok(bytes) => handle_output(state, deps, bytes),
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => {
                state.output_closed = true;
                break;
            }
        }
    }
}

/// Run until the child exits (or the relay fails). Returns the child's status
/// when it was observed.
pub(crate) fn run_event_loop(
    state: &mut EventLoopState,
    deps: &mut EventLoopDeps,
) -> Option<ExitStatus> {
    let ticker = tick(deps.tick_interval);
    let closed_input = never::<InputEvent>();
    let closed_output = never::<Vec<u8>>();
    loop {
        if !flush_pending_pty_input(state, deps) {
            return end_after_relay_failure(state, deps);
        }
        let input_rx = if state.stdin_closed
            || state.pending_pty_input_bytes >= PTY_INPUT_MAX_BUFFER_BYTES
        {
            closed_input.clone()
        } else {
            deps.input_rx.clone()
        };
        let output_rx = if state.output_closed {
            closed_output.clone()
        } else {
            deps.session.output_rx.clone()
        };
        select! {
            recv(output_rx) -> chunk => match chunk {
                Ok(bytes) => handle_output(state, deps, bytes),
                Err(_) => {
                    log_debug("PTY output closed");
                    state.output_closed = true;
                }
            },
            recv(input_rx) -> event => {
                let written = match event {
                    Ok(InputEvent::Bytes(bytes)) => write_or_queue_pty_input(state, deps, bytes),
                    Err(_) => handle_stdin_eof(state, deps),
                };
                if !written {
                    return end_after_relay_failure(state, deps);
                }
            },
            recv(ticker) -> _ => {
                run_periodic_tasks(state, deps, Instant::now());
                if let Some(status) = deps.session.try_wait() {
                    log_debug(&format!("child exited: {status}"));
                    drain_output(state, deps);
                    return Some(status);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use statuslight::activity::{ActivityMonitor, IndicatorState, MonitorSettings};
    use statuslight::config::PatternLists;
    use statuslight::error::EmitterError;
    use statuslight::indicator::{Indicator, IndicatorWorker, Signal};
    use statuslight::patterns::PatternSet;
    use statuslight::pty_session::{exit_code, PtyRelaySession};
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Recording(Arc<Mutex<Vec<Signal>>>);

    impl Indicator for Recording {
        fn emit(&mut self, signal: Signal) -> Result<(), EmitterError> {
            self.0.lock().unwrap().push(signal);
            Ok(())
        }

        fn describe(&self) -> String {
            "recording".to_string()
        }
    }

    fn harness(script: &str) -> (EventLoopState, EventLoopDeps, SharedBuf, Recording) {
        harness_with_input(script, &[])
    }

    /// Like `harness`, but stdin yields `input` and then reaches EOF.
    fn harness_with_input(
        script: &str,
        input: &[&[u8]],
    ) -> (EventLoopState, EventLoopDeps, SharedBuf, Recording) {
        let lists = PatternLists {
            waiting: vec![r"\(y/n\)".to_string()],
            thinking: vec!["Building".to_string()],
        };
        let (patterns, _) = PatternSet::compile(&lists);
        let monitor = ActivityMonitor::new(
            patterns,
            MonitorSettings {
                byte_window: 1024,
                prompt_lines: 10,
                min_dwell: Duration::from_millis(50),
                silence_threshold: Duration::from_millis(300),
                waiting_timeout: false,
            },
            Instant::now(),
        );
        let session = PtyRelaySession::spawn(
            "sh",
            &["-c".to_string(), script.to_string()],
            "xterm-256color",
            Some((24, 80)),
        )
        .expect("spawn sh");
        let (input_tx, input_rx) = bounded(input.len().max(1));
        for chunk in input {
            input_tx
                .send(InputEvent::Bytes(chunk.to_vec()))
                .expect("queue input");
        }
        drop(input_tx);
        let out = SharedBuf::default();
        let recording = Recording::default();
        let deps = EventLoopDeps {
            session,
            input_rx,
            indicator: IndicatorWorker::spawn(Box::new(recording.clone())),
            stdout: Box::new(out.clone()),
            tick_interval: Duration::from_millis(20),
        };
        (EventLoopState::new(monitor, None), deps, out, recording)
    }

    #[test]
    fn relays_output_and_reports_exit_status() {
        let (mut state, mut deps, out, _) = harness("printf 'one\\ntwo\\n'; exit 5");
        let status = run_event_loop(&mut state, &mut deps).expect("exit status");
        assert_eq!(exit_code(status), 5);
        let relayed = String::from_utf8_lossy(&out.0.lock().unwrap()).into_owned();
        assert!(relayed.contains("one\r\ntwo\r\n"));
    }

    #[test]
    fn drives_indicator_through_thinking_and_waiting() {
        let (mut state, mut deps, _, recording) =
            harness("printf 'Building\\n'; sleep 1; printf 'Continue? (y/n)'; sleep 1");
        let status = run_event_loop(&mut state, &mut deps).expect("exit status");
        assert_eq!(exit_code(status), 0);
        deps.indicator.shutdown();

        let signals = recording.0.lock().unwrap().clone();
        let thinking = signals
            .iter()
            .position(|s| *s == Signal::State(IndicatorState::Thinking))
            .expect("thinking emitted");
        let waiting = signals
            .iter()
            .position(|s| *s == Signal::State(IndicatorState::Waiting))
            .expect("waiting emitted");
        assert!(thinking < waiting);
        assert_eq!(signals.last(), Some(&Signal::Off));
    }

    #[test]
    fn large_input_is_queued_not_dropped() {
        let (mut state, mut deps, _, _) = harness("sleep 30");
        let chunk = vec![b'x'; 512 * 1024];
        assert!(write_or_queue_pty_input(&mut state, &mut deps, chunk));
        // The tty cannot swallow 512 KiB without a reader; the rest waits in the queue.
        assert!(state.pending_pty_input_bytes > 0);
        assert_eq!(
            state.pending_pty_input_bytes,
            state
                .pending_pty_input
                .iter()
                .map(Vec::len)
                .sum::<usize>()
                - state.pending_pty_input_offset
        );
    }

    #[test]
    fn stdin_eof_reaches_the_child() {
        let (mut state, mut deps, out, _) = harness_with_input("cat; exit 7", &[b"hello\n"]);
        state.forward_stdin_eof = true;
        let status = run_event_loop(&mut state, &mut deps).expect("exit status");
        assert_eq!(exit_code(status), 7);
        assert!(String::from_utf8_lossy(&out.0.lock().unwrap()).contains("hello"));
    }

    #[test]
    fn partial_line_gets_a_second_eof() {
        let (mut state, mut deps, out, _) =
            harness_with_input("cat; printf '<done>'", &[b"no newline"]);
        state.forward_stdin_eof = true;
        let status = run_event_loop(&mut state, &mut deps).expect("exit status");
        assert_eq!(exit_code(status), 0);
        assert!(String::from_utf8_lossy(&out.0.lock().unwrap()).contains("<done>"));
    }

    #[test]
    fn write_failure_drains_output_and_reports_status() {
        let (mut state, mut deps, out, _) = harness("printf 'last words'; exit 6");
        deps.session
            .wait_timeout(Duration::from_secs(5))
            .expect("child exits");
        // Every slave fd is closed now, so the master refuses writes.
        assert!(!write_or_queue_pty_input(&mut state, &mut deps, b"x".to_vec()));
        let status = end_after_relay_failure(&mut state, &mut deps).expect("exit status");
        assert_eq!(exit_code(status), 6);
        assert!(String::from_utf8_lossy(&out.0.lock().unwrap()).contains("last words"));
    }
}
