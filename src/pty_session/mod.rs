//! Process relay: runs the wrapped command on a pseudo-terminal and moves raw
//! bytes between it and the real terminal.

mod io;
mod pty;


pub use pty::{exit_code, PtyRelaySession};
