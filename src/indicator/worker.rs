use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use super::{Indicator, Signal};
use crate::activity::IndicatorState;
use crate::log_debug;

/// Wake-ups in flight. One is enough since the worker always reads the latest state.
const WAKE_QUEUE_CAPACITY: usize = 2;
/// How long shutdown waits for the final `Off` to be delivered.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

enum IndicatorMessage {
    Wake,
    Stop,
}

/// Latest state not yet handed to the indicator. Newer states overwrite older ones.
type PendingState = Arc<Mutex<Option<IndicatorState>>>;

fn lock_pending(pending: &PendingState) -> MutexGuard<'_, Option<IndicatorState>> {
    pending
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns the indicator thread. Dropping it sends `Off` and waits (bounded) for delivery.
///
/// While the indicator is busy, updates coalesce: only the most recent state is
/// emitted once it frees up, so a slow light catches up instead of going stale.
pub struct IndicatorWorker {
    tx: Sender<IndicatorMessage>,
    pending: PendingState,
    done_rx: Receiver<()>,
    handle: Option<thread::JoinHandle<()>>,
    finished: bool,
}

impl IndicatorWorker {
    pub fn spawn(mut indicator: Box<dyn Indicator>) -> Self {
        let (tx, rx) = bounded::<IndicatorMessage>(WAKE_QUEUE_CAPACITY);
        let (done_tx, done_rx) = bounded::<()>(1);
        let pending = PendingState::default();
        let worker_pending = Arc::clone(&pending);
        let handle = thread::spawn(move || {
            let name = indicator.describe();
            let mut emit = |signal: Signal| {
                if let Err(err) = indicator.emit(signal) {
                    log_debug(&format!("indicator {name} failed on {signal}: {err}"));
                    tracing::warn!(indicator = %name, signal = %signal, error = %err, "indicator emit failed");
                }
            };
            while let Ok(IndicatorMessage::Wake) = rx.recv() {
                let next = lock_pending(&worker_pending).take();
                if let Some(state) = next {
                    emit(Signal::State(state));
                }
            }
            emit(Signal::Off);
            let _ = done_tx.send(());
        });
        Self {
            tx,
            pending,
            done_rx,
            handle: Some(handle),
            finished: false,
        }
    }

    /// Record `state` as the one to show next. Returns false once the worker is gone.
    pub fn set(&self, state: IndicatorState) -> bool {
        if let Some(replaced) = lock_pending(&self.pending).replace(state) {
            log_debug(&format!("indicator busy; {replaced} superseded by {state}"));
        }
        match self.tx.try_send(IndicatorMessage::Wake) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Stop the thread, which emits `Off` last, and wait up to two seconds for it.
    pub fn shutdown(&mut self) {
        if std::mem::replace(&mut self.finished, true) {
            return;
        }
        let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
        let remaining = || deadline.saturating_duration_since(Instant::now());
        let _ = self.tx.send_timeout(IndicatorMessage::Stop, remaining());
        if self.done_rx.recv_timeout(remaining()).is_ok() {
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        } else {
            log_debug("indicator did not finish within the shutdown timeout");
        }
    }
}

impl Drop for IndicatorWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
