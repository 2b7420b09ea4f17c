use crate::error::RelayError;
use crate::log_debug;
use crossbeam_channel::Sender;
use std::io::{self, ErrorKind};
use std::os::unix::io::RawFd;
use std::thread;
use std::time::Duration;

const READ_CHUNK_BYTES: usize = 4096;
const READ_IDLE_BACKOFF: Duration = Duration::from_millis(10);

enum ReadOutcome {
    Data(usize),
    Again,
    /// EOF, or EIO once the last slave fd is gone (how Linux reports a hangup).
    HungUp,
    Failed(io::Error),
}

fn is_transient(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock)
}

fn read_chunk(fd: RawFd, buf: &mut [u8]) -> ReadOutcome {
    // SAFETY: buf is a valid writable region of buf.len() bytes.
    let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
    match n {
        n if n > 0 => ReadOutcome::Data(n as usize),
        0 => ReadOutcome::HungUp,
        _ => {
            let err = io::Error::last_os_error();
            if is_transient(&err) {
                ReadOutcome::Again
            } else if err.raw_os_error() == Some(libc::EIO) {
                ReadOutcome::HungUp
            } else {
                ReadOutcome::Failed(err)
            }
        }
    }
}

/// Pump the master into `tx` until hangup, a read error, or the receiver goes away.
/// Dropping `tx` on the way out is how the event loop learns the output closed.
pub(super) fn spawn_reader_thread(master_fd: RawFd, tx: Sender<Vec<u8>>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0u8; READ_CHUNK_BYTES];
        loop {
            match read_chunk(master_fd, &mut buf) {
                ReadOutcome::Data(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        return;
                    }
                }
                ReadOutcome::Again => thread::sleep(READ_IDLE_BACKOFF),
                ReadOutcome::HungUp => return,
                ReadOutcome::Failed(err) => {
                    log_debug(&RelayError::Read(err).to_string());
                    return;
                }
            }
        }
    })
}

/// Single non-blocking write. `Ok(0)` means the master is full right now.
pub(super) fn try_write(fd: RawFd, data: &[u8]) -> Result<usize, RelayError> {
    if data.is_empty() {
        return Ok(0);
    }
    // SAFETY: data points to data.len() readable bytes.
    let written = unsafe { libc::write(fd, data.as_ptr().cast(), data.len()) };
    if written >= 0 {
        return Ok(written as usize);
    }
    let err = io::Error::last_os_error();
    if is_transient(&err) {
        Ok(0)
    } else {
        Err(RelayError::Write(err))
    }
}
