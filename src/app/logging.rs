//! Debug and crash logs. Both live in the temp dir because stdout and stderr
//! belong to the wrapped program.

use crate::config::AppConfig;
use std::{
    env, fs,
    io::{self, Write},
    panic,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
    time::{SystemTime, UNIX_EPOCH},
};

const DEBUG_LOG_CAP: u64 = 5 * 1024 * 1024;
const CRASH_LOG_CAP: u64 = 256 * 1024;

static DEBUG_ON: AtomicBool = AtomicBool::new(false);
static CONTENT_ON: AtomicBool = AtomicBool::new(false);
static DEBUG_LOG: Mutex<Option<CappedLog>> = Mutex::new(None);

pub fn log_file_path() -> PathBuf {
    env::temp_dir().join("statuslight.log")
}

/// Panic records land here; the payload is kept only with `--log-content`.
pub fn crash_log_path() -> PathBuf {
    env::temp_dir().join("statuslight_crash.log")
}

/// Append-only file that starts over once it would grow past `cap` bytes.
struct CappedLog {
    path: PathBuf,
    file: fs::File,
    cap: u64,
    len: u64,
}

impl CappedLog {
    fn open(path: &Path, cap: u64) -> io::Result<Self> {
        let existing = fs::metadata(path).map(|meta| meta.len()).unwrap_or(0);
        let stale = existing > cap;
        let file = fs::OpenOptions::new()
            .create(true)
            .append(!stale)
            .write(true)
            .truncate(stale)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            cap,
            len: if stale { 0 } else { existing },
        })
    }

    fn append(&mut self, line: &str) {
        let incoming = line.len() as u64;
        if self.len.saturating_add(incoming) > self.cap {
            match fs::File::create(&self.path) {
                Ok(file) => {
                    self.file = file;
                    self.len = 0;
                }
                Err(_) => return,
            }
        }
        if self.file.write_all(line.as_bytes()).is_ok() {
            self.len = self.len.saturating_add(incoming);
        }
    }
}

fn lock_debug_log() -> std::sync::MutexGuard<'static, Option<CappedLog>> {
    DEBUG_LOG
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn set_switches(enabled: bool, content: bool) {
    DEBUG_ON.store(enabled, Ordering::Relaxed);
    CONTENT_ON.store(enabled && content, Ordering::Relaxed);
    *lock_debug_log() = if enabled {
        CappedLog::open(&log_file_path(), DEBUG_LOG_CAP).ok()
    } else {
        None
    };
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// Turn the debug log on or off from the parsed flags. Call once at startup.
pub fn init_logging(config: &AppConfig) {
    set_switches(config.logging_enabled(), config.log_content);
}

pub fn log_debug(msg: &str) {
    if !DEBUG_ON.load(Ordering::Relaxed) {
        return;
    }
    let line = format!("[{}] {msg}\n", unix_millis());
    if let Some(log) = lock_debug_log().as_mut() {
        log.append(&line);
    }
}

/// Like [`log_debug`], for lines that quote the child's output.
pub fn log_debug_content(msg: &str) {
    if CONTENT_ON.load(Ordering::Relaxed) {
        log_debug(msg);
    }
}

fn panic_payload(info: &panic::PanicHookInfo<'_>) -> String {
    if !CONTENT_ON.load(Ordering::Relaxed) {
        return "payload omitted (log-content disabled)".to_string();
    }
    let payload = info.payload();
    payload
        .downcast_ref::<&str>()
        .map(|text| (*text).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// Record a panic in the crash log. Runs from the panic hook, so it never panics itself.
pub fn log_panic(info: &panic::PanicHookInfo<'_>) {
    if !DEBUG_ON.load(Ordering::Relaxed) {
        return;
    }
    let location = info
        .location()
        .map(|loc| format!("{}:{}", loc.file(), loc.line()))
        .unwrap_or_else(|| "unknown location".to_string());
    let line = format!(
        "[{}] statuslight {} panicked at {location}: {}\n",
        unix_millis(),
        env!("CARGO_PKG_VERSION"),
        panic_payload(info)
    );
    if let Ok(mut log) = CappedLog::open(&crash_log_path(), CRASH_LOG_CAP) {
        log.append(&line);
    }
}
