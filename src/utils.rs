use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{Level, LevelFilter, Metadata, Record};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rand::Rng;
use sha2::{Digest, Sha256};

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);
static LOGGER_GUARD: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256_bytes(data))
}

/// Hash a sequence of string parts into one hex digest. Each part is
/// length-prefixed so `["ab","c"]` and `["a","bc"]` cannot collide.
pub fn h_join<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        let bytes = part.as_ref().as_bytes();
        hasher.update((bytes.len() as u64).to_be_bytes());
        hasher.update(bytes);
    }
    hex::encode(hasher.finalize())
}

struct SimpleLogger;

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= Level::Trace
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            println!("{} - {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: SimpleLogger = SimpleLogger;

pub fn init_logging() {
    if LOGGER_INITIALIZED.load(Ordering::SeqCst) {
        return;
    }
    let _guard = LOGGER_GUARD.lock();
    if !LOGGER_INITIALIZED.load(Ordering::SeqCst) {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Debug);
        }
        LOGGER_INITIALIZED.store(true, Ordering::SeqCst);
    }
}

fn to_level(level: &str) -> Level {
    match level.to_ascii_uppercase().as_str() {
        "DEBUG" => Level::Debug,
        "WARN" | "WARNING" => Level::Warn,
        "ERROR" => Level::Error,
        "TRACE" => Level::Trace,
        _ => Level::Info,
    }
}

pub fn log_msg(level: &str, actor_type: &str, actor_id: impl Into<Option<String>>, msg: &str) {
    init_logging();
    let who = if let Some(id) = actor_id.into() {
        format!("{}({})", actor_type, id)
    } else {
        actor_type.to_string()
    };
    log::log!(to_level(level), "{}: {}", who, msg);
}

/// Uniform draw from `[lo, hi)` seconds, the jitter applied between
/// polling passes and retry attempts.
pub fn jitter_secs(lo: u64, hi: u64) -> Duration {
    if hi <= lo {
        return Duration::from_secs(lo);
    }
    Duration::from_secs(rand::thread_rng().gen_range(lo..hi))
}

/// Sleep in short slices so a raised stop flag interrupts the wait.
/// Returns false when interrupted.
pub fn sleep_interruptible(stop: &AtomicBool, total: Duration) -> bool {
    let slice = Duration::from_millis(100);
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let step = remaining.min(slice);
        std::thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    !stop.load(Ordering::SeqCst)
}
