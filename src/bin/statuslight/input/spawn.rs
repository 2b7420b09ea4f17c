use crossbeam_channel::Sender;
use statuslight::log_debug;
use std::io::{self, Read};
use std::thread;

use crate::input::event::InputEvent;

const STDIN_CHUNK_BYTES: usize = 1024;

/// Forward stdin to the loop as raw chunks. The thread ends at EOF or when the
/// loop stops listening; either way the sender drops.
pub(crate) fn spawn_input_thread(tx: Sender<InputEvent>) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin-relay".to_string())
        .spawn(move || {
            let mut stdin = io::stdin().lock();
            let mut buf = [0u8; STDIN_CHUNK_BYTES];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => {
                        log_debug("stdin reached EOF");
                        return;
                    }
                    Ok(n) => {
                        if tx.send(InputEvent::Bytes(buf[..n].to_vec())).is_err() {
                            return;
                        }
                    }
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                    Err(err) => {
                        log_debug(&format!("stdin read failed: {err}"));
                        return;
                    }
                }
            }
        })
}
