use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

static INIT_ONCE: std::sync::Once = std::sync::Once::new();

/// Install a `tracing` subscriber honouring `RUST_LOG` (default `info`). Idempotent.
pub fn init_tracing_once() {
    INIT_ONCE.call_once(|| {
        let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
    });
}

// -------- robust file ops with backoff --------

/// Return true for transient/retriable I/O errors (sharing violations, AV/backup
/// filter drivers, flaky USB/NAS volumes). Dumps often live on external drives.
fn is_retriable_io_error(e: &io::Error) -> bool {
    matches!(
        e.raw_os_error(),
        // 5 access denied, 32 sharing violation, 33 lock violation, 21 device not ready,
        // 225 AV blocked, 1006 volume altered, 1117 device error, 1224 user-mapped section
        Some(5) | Some(32) | Some(33) | Some(21) | Some(225) | Some(1006) | Some(1117) | Some(1224)
    )
}

/// Run `op` up to `tries` times, sleeping `delay_ms * attempt` between transient failures.
fn with_backoff<T>(tries: usize, delay_ms: u64, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let mut last_err: Option<io::Error> = None;
    for i in 0..tries.max(1) {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if is_retriable_io_error(&e) => {
                last_err = Some(e);
                sleep(Duration::from_millis(delay_ms.saturating_mul((i + 1) as u64)));
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::other("retries exhausted")))
}

pub fn open_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<File> {
    with_backoff(tries, delay_ms, || File::open(path))
}

pub fn create_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<File> {
    with_backoff(tries, delay_ms, || File::create(path))
}

/// Open an existing file for read + write without truncating it.
pub fn open_rw_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<File> {
    with_backoff(tries, delay_ms, || OpenOptions::new().read(true).write(true).open(path))
}

/// Remove a file; succeeds if it doesn't exist.
pub fn remove_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> Result<()> {
    let res = with_backoff(tries, delay_ms, || match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    });
    res.with_context(|| format!("remove {}", path.display()))
}

/// Move `src` over `dest`. Falls back to copy + remove when rename fails
/// (e.g. across volumes or while another process holds `dest`).
pub fn replace_file_atomic_backoff(src: &Path, dest: &Path) -> Result<()> {
    let tries = 20usize;
    let delay_ms = 50u64;
    if dest.exists() {
        remove_with_backoff(dest, tries, delay_ms)?;
    }
    if with_backoff(tries, delay_ms, || fs::rename(src, dest)).is_ok() {
        return Ok(());
    }
    with_backoff(tries, delay_ms, || fs::copy(src, dest))
        .with_context(|| format!("copy {} -> {}", src.display(), dest.display()))?;
    remove_with_backoff(src, tries, delay_ms)
}

/// Render a file size the way operators read it ("1.50 GiB").
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut v = bytes as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}
