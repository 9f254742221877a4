use sysinfo::{System, SystemExt};

/// Bytes of memory currently available to the process, or `None` if the platform
/// doesn't report it.
pub fn available_memory_bytes() -> Option<u64> {
    let mut sys = System::new();
    sys.refresh_memory();
    match sys.available_memory() {
        0 => None,
        n => Some(n),
    }
}

/// A parsed JSON array of raw records costs a few times its size on disk
/// (raw text plus per-record boxes and day groups).
pub const BULK_MEMORY_FACTOR: u64 = 3;

/// Would loading `file_bytes` in one go leave the machine comfortable?
pub fn fits_in_memory(file_bytes: u64, available: Option<u64>) -> bool {
    match available {
        Some(avail) => file_bytes.saturating_mul(BULK_MEMORY_FACTOR) < avail / 2,
        None => true,
    }
}
