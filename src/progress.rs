//! Progress reporting: byte-based bar over compressed input, count bar for verification.

use crate::paths::Archive;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::time::Duration;

const BAR_CHARS: &str = "█▉▊▋▌▍▎▏  ";

fn styled(pb: ProgressBar, template: &str, label: Option<&str>) -> ProgressBar {
    if let Ok(style) = ProgressStyle::with_template(template) {
        pb.set_style(style.progress_chars(BAR_CHARS));
    }
    if let Some(msg) = label {
        pb.set_message(msg.to_string());
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn make_progress_bar_labeled(total_bytes: u64, label: Option<&str>) -> ProgressBar {
    styled(
        ProgressBar::new(total_bytes),
        "{spinner:.green} {msg} {bytes:>10}/{total_bytes:<10} [{bar:.cyan/blue}] {percent:>3}%  \
         {bytes_per_sec}  elapsed: {elapsed_precise}  eta: {eta_precise}",
        label,
    )
}

/// Count-style progress bar (items processed out of total).
pub fn make_count_progress(total: u64, label: &str) -> ProgressBar {
    styled(
        ProgressBar::new(total),
        "{spinner:.green} {msg} {pos}/{len} [{bar:.cyan/blue}] {percent:>3}%  \
         it/s: {per_sec}  elapsed: {elapsed_precise}",
        (!label.is_empty()).then_some(label),
    )
}

/// Sum of on-disk sizes; missing archives count as zero.
pub fn total_compressed_size(archives: &[Archive]) -> u64 {
    archives
        .iter()
        .map(|a| fs::metadata(&a.path).map(|m| m.len()).unwrap_or(0))
        .sum()
}
