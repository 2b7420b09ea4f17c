//! Pseudo-terminal (PTY) session management.
//!
//! Spawns the wrapped command on a PTY so it behaves as if running in an
//! interactive terminal. Handles I/O forwarding, window size propagation,
//! exit status reporting, and process cleanup.

use crate::error::{RelayError, SpawnError};
use crate::log_debug;
use crossbeam_channel::{bounded, Receiver};
use std::ffi::CString;
use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::ptr;
use std::thread;
use std::time::{Duration, Instant};

use super::io::{spawn_reader_thread, try_write};

/// Output chunks buffered between the reader thread and the event loop.
const OUTPUT_QUEUE_CAPACITY: usize = 100;
const FALLBACK_ROWS: u16 = 24;
const FALLBACK_COLS: u16 = 80;

/// The wrapped command running on a PTY, relaying raw bytes both ways.
pub struct PtyRelaySession {
    pub(super) master_fd: RawFd,
    pub(super) child_pid: i32,
    exit_status: Option<ExitStatus>,
    /// Stream of raw PTY output chunks from the child process. Disconnects at hangup.
    pub output_rx: Receiver<Vec<u8>>,
    _output_thread: thread::JoinHandle<()>,
}

impl PtyRelaySession {
    /// Start `program` with `args` on a fresh PTY sized `winsize` (rows, cols).
    ///
    /// Fails with [`SpawnError::Exec`] when the command cannot be executed, so the
    /// caller can report it before any relay work starts.
    pub fn spawn(
        program: &str,
        args: &[String],
        term_value: &str,
        winsize: Option<(u16, u16)>,
    ) -> Result<Self, SpawnError> {
        let mut argv: Vec<CString> = Vec::with_capacity(args.len() + 1);
        for part in std::iter::once(program).chain(args.iter().map(String::as_str)) {
            argv.push(
                CString::new(part).map_err(|_| SpawnError::InvalidArgument(part.to_string()))?,
            );
        }
        let term_value = CString::new(term_value)
            .or_else(|_| CString::new("xterm-256color"))
            .map_err(|_| SpawnError::InvalidArgument(term_value.to_string()))?;
        let (rows, cols) = winsize.unwrap_or((FALLBACK_ROWS, FALLBACK_COLS));

        // SAFETY: argv and TERM are valid CStrings; spawn_pty_child returns a valid master fd.
        // set_nonblocking only touches the returned master fd.
        let (master_fd, child_pid) = unsafe {
            let (master_fd, child_pid) = spawn_pty_child(program, &argv, &term_value, rows, cols)?;
            if let Err(err) = set_nonblocking(master_fd) {
                log_debug(&format!("failed to make PTY master non-blocking: {err}"));
            }
            (master_fd, child_pid)
        };

        let (tx, rx) = bounded(OUTPUT_QUEUE_CAPACITY);
        let output_thread = spawn_reader_thread(master_fd, tx);
        log_debug(&format!("spawned `{program}` (pid {child_pid}) on a {cols}x{rows} PTY"));

        Ok(Self {
            master_fd,
            child_pid,
            exit_status: None,
            output_rx: rx,
            _output_thread: output_thread,
        })
    }

    /// Offer bytes to the child without blocking; returns how many were accepted.
    pub fn try_send_bytes(&mut self, bytes: &[u8]) -> Result<usize, RelayError> {
        try_write(self.master_fd, bytes)
    }

    /// Update the PTY window size and notify the child.
    pub fn set_winsize(&self, rows: u16, cols: u16) -> io::Result<()> {
        let ws = winsize(rows, cols);
        // SAFETY: ioctl reads ws and master_fd; ws is initialized.
        let result = unsafe { libc::ioctl(self.master_fd, libc::TIOCSWINSZ, &ws) };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }
        if self.exit_status.is_none() {
            // SAFETY: SIGWINCH is sent to the child pid owned by this session.
            let _ = unsafe { libc::kill(self.child_pid, libc::SIGWINCH) };
        }
        Ok(())
    }

    /// Current PTY window size as (rows, cols).
    #[cfg(test)]
    pub(super) fn winsize(&self) -> io::Result<(u16, u16)> {
        // SAFETY: libc::winsize is a plain C struct; zeroed is a valid baseline.
        let mut ws: libc::winsize = unsafe { mem::zeroed() };
        // SAFETY: ioctl writes into ws, which outlives the call.
        let result = unsafe { libc::ioctl(self.master_fd, libc::TIOCGWINSZ, &mut ws) };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok((ws.ws_row, ws.ws_col))
    }

    /// Forward a signal to the child. No-op once the child has been reaped.
    pub fn signal(&self, signal: libc::c_int) -> io::Result<()> {
        if self.exit_status.is_some() {
            return Ok(());
        }
        // SAFETY: child_pid is owned by this session and has not been reaped yet.
        if unsafe { libc::kill(self.child_pid, signal) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Non-blocking check for child exit; reaps the child on completion.
    pub fn try_wait(&mut self) -> Option<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Some(status);
        }
        let mut status = 0;
        // SAFETY: child_pid is owned by this session; WNOHANG never blocks.
        let ret = unsafe { libc::waitpid(self.child_pid, &mut status, libc::WNOHANG) };
        if ret == self.child_pid {
            let status = ExitStatus::from_raw(status);
            self.exit_status = Some(status);
            return Some(status);
        }
        if ret < 0 {
            log_debug(&format!(
                "waitpid({}) failed: {}",
                self.child_pid,
                io::Error::last_os_error()
            ));
        }
        None
    }

    /// Poll for exit until `timeout` elapses.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<ExitStatus> {
        let start = Instant::now();
        loop {
            if let Some(status) = self.try_wait() {
                return Some(status);
            }
            if start.elapsed() >= timeout {
                return None;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for PtyRelaySession {
    fn drop(&mut self) {
        if self.try_wait().is_none() {
            // SAFETY: child_pid comes from spawn_pty_child and has not been reaped.
            unsafe {
                if libc::kill(self.child_pid, libc::SIGTERM) != 0 {
                    log_debug(&format!(
                        "SIGTERM to child failed: {}",
                        io::Error::last_os_error()
                    ));
                }
            }
            if self.wait_timeout(Duration::from_millis(500)).is_none() {
                // SAFETY: as above; a blocking waitpid reaps the killed child.
                unsafe {
                    if libc::kill(self.child_pid, libc::SIGKILL) != 0 {
                        log_debug(&format!(
                            "SIGKILL to child failed: {}",
                            io::Error::last_os_error()
                        ));
                    }
                    let mut status = 0;
                    if libc::waitpid(self.child_pid, &mut status, 0) < 0 {
                        log_debug(&format!(
                            "waitpid after SIGKILL failed: {}",
                            io::Error::last_os_error()
                        ));
                    }
                }
            }
        }
        // SAFETY: master_fd was opened by spawn_pty_child and is closed exactly once here.
        unsafe { close_fd(self.master_fd) };
    }
}

/// Exit code the wrapper should report for the child's status: the child's own
/// code, or 128 + N when it was killed by signal N.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    status.signal().map_or(1, |signal| 128 + signal)
}

fn winsize(rows: u16, cols: u16) -> libc::winsize {
    // SAFETY: libc::winsize is a plain C struct; zeroed is a valid baseline.
    let mut ws: libc::winsize = unsafe { mem::zeroed() };
    ws.ws_row = rows.max(1);
    ws.ws_col = cols.max(1);
    ws
}

/// Forks and execs a child process under a new PTY.
///
/// A close-on-exec pipe carries the child's errno back if setup or `execvp`
/// fails; a clean EOF on it means the exec succeeded.
///
/// # Safety
///
/// `argv` must be non-empty. The returned master fd must eventually be closed.
unsafe fn spawn_pty_child(
    program: &str,
    argv: &[CString],
    term_value: &CString,
    rows: u16,
    cols: u16,
) -> Result<(RawFd, i32), SpawnError> {
    let mut master_fd: RawFd = -1;
    let mut slave_fd: RawFd = -1;
    let mut ws = winsize(rows, cols);

    #[allow(clippy::unnecessary_mut_passed)]
    // SAFETY: openpty expects valid pointers for master/slave/winsize; we pass stack locals.
    if libc::openpty(
        &mut master_fd,
        &mut slave_fd,
        ptr::null_mut(),
        ptr::null_mut(),
        &mut ws,
    ) != 0
    {
        return Err(SpawnError::OpenPty(io::Error::last_os_error()));
    }

    let (status_read, status_write) = match cloexec_pipe() {
        Ok(pair) => pair,
        Err(err) => {
            close_fd(master_fd);
            close_fd(slave_fd);
            return Err(SpawnError::Fork(err));
        }
    };

    // Everything the child touches is prepared before fork.
    let term_key = c"TERM";
    let mut argv_ptrs: Vec<*const libc::c_char> = argv.iter().map(|s| s.as_ptr()).collect();
    argv_ptrs.push(ptr::null());

    let pid = libc::fork();
    if pid < 0 {
        let err = io::Error::last_os_error();
        close_fd(master_fd);
        close_fd(slave_fd);
        close_fd(status_read);
        close_fd(status_write);
        return Err(SpawnError::Fork(err));
    }

    if pid == 0 {
        close_fd(status_read);
        close_fd(master_fd);
        child_exec(slave_fd, status_write, &argv_ptrs, term_key.as_ptr(), term_value);
    }

    close_fd(slave_fd);
    close_fd(status_write);
    let exec_errno = read_exec_status(status_read);
    close_fd(status_read);

    if let Some(errno) = exec_errno {
        let mut status = 0;
        let _ = libc::waitpid(pid, &mut status, 0);
        close_fd(master_fd);
        return Err(SpawnError::Exec {
            command: program.to_string(),
            source: io::Error::from_raw_os_error(errno),
        });
    }
    Ok((master_fd, pid))
}

/// Child process setup after fork: configures the PTY and execs the target.
///
/// # Safety
///
/// Must only be called in the child process after `fork()`. Never returns: it
/// either replaces the process image or reports errno on `status_fd` and `_exit`s.
unsafe fn child_exec(
    slave_fd: RawFd,
    status_fd: RawFd,
    argv: &[*const libc::c_char],
    term_key: *const libc::c_char,
    term_value: &CString,
) -> ! {
    let fail = || -> ! {
        let errno = io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO);
        let bytes = errno.to_ne_bytes();
        // SAFETY: write is async-signal-safe; status_fd is the pipe's write end.
        let _ = libc::write(
            status_fd,
            bytes.as_ptr() as *const libc::c_void,
            bytes.len(),
        );
        libc::_exit(127);
    };

    if libc::setsid() == -1 {
        fail();
    }
    if libc::ioctl(slave_fd, libc::TIOCSCTTY as libc::c_ulong, 0) == -1 {
        fail();
    }
    if libc::dup2(slave_fd, libc::STDIN_FILENO) < 0
        || libc::dup2(slave_fd, libc::STDOUT_FILENO) < 0
        || libc::dup2(slave_fd, libc::STDERR_FILENO) < 0
    {
        fail();
    }
    if slave_fd > libc::STDERR_FILENO {
        close_fd(slave_fd);
    }
    if libc::setenv(term_key, term_value.as_ptr(), 1) != 0 {
        fail();
    }

    libc::execvp(argv[0], argv.as_ptr());
    fail();
}

/// Pipe with both ends marked close-on-exec.
unsafe fn cloexec_pipe() -> io::Result<(RawFd, RawFd)> {
    let mut fds: [RawFd; 2] = [-1; 2];
    if libc::pipe(fds.as_mut_ptr()) != 0 {
        return Err(io::Error::last_os_error());
    }
    for fd in fds {
        if libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) < 0 {
            let err = io::Error::last_os_error();
            close_fd(fds[0]);
            close_fd(fds[1]);
            return Err(err);
        }
    }
    Ok((fds[0], fds[1]))
}

/// Blocks until the child execs (EOF, returns `None`) or reports an errno.
unsafe fn read_exec_status(fd: RawFd) -> Option<i32> {
    let mut bytes = [0u8; 4];
    let mut filled = 0;
    while filled < bytes.len() {
        let n = libc::read(
            fd,
            bytes[filled..].as_mut_ptr() as *mut libc::c_void,
            bytes.len() - filled,
        );
        if n > 0 {
            filled += n as usize;
            continue;
        }
        if n < 0 && io::Error::last_os_error().kind() == io::ErrorKind::Interrupted {
            continue;
        }
        break;
    }
    (filled == bytes.len()).then(|| i32::from_ne_bytes(bytes))
}

/// Configure the PTY master for non-blocking reads and writes.
///
/// # Safety
///
/// `fd` must be a valid, open file descriptor.
pub(super) unsafe fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = libc::fcntl(fd, libc::F_GETFL, 0);
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Close a file descriptor while ignoring errors.
///
/// # Safety
///
/// `fd` must be a valid, open file descriptor (or -1 to ignore).
pub(super) unsafe fn close_fd(fd: RawFd) {
    if fd >= 0 {
        let _ = libc::close(fd);
    }
}
