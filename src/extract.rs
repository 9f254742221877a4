//! Archive extraction: decompress → reconstruct lines → filter by subreddit → JSON array.

use crate::array_writer::{display_name, JsonArrayWriter};
use crate::codec::open_decoder;
use crate::config::ExtractOptions;
use crate::date::{format_elapsed, YearMonth};
use crate::filters::{classify, FilterTally, LineVerdict};
use crate::lines::LineReconstructor;
use crate::paths::{archives_for, period_file_path, Archive, ArchiveKind};
use crate::progress::{make_progress_bar_labeled, total_compressed_size};
use crate::util::remove_with_backoff;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Result of extracting one period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// Output already existed and `force` was off.
    Skipped { path: PathBuf },
    Written { path: PathBuf, records: u64 },
    /// Archives were read but nothing matched; no output file exists.
    Empty,
    /// None of the period's archives are on disk.
    MissingInput,
}

/// Extract every record of the configured subreddit from the `(kind, ym)` archives
/// into one ExtractedPeriodFile.
pub fn extract_period(opts: &ExtractOptions, kind: ArchiveKind, ym: YearMonth) -> Result<ExtractOutcome> {
    let subreddit = opts.subreddit.as_deref().ok_or_else(|| anyhow!("subreddit is required"))?;
    let out_path = period_file_path(&opts.extracted_dir, kind, subreddit, ym);

    if !opts.force && out_path.is_file() {
        tracing::info!(
            "Skipping {} extraction to {} because the file already exists (force to override)",
            kind.noun(),
            out_path.display()
        );
        return Ok(ExtractOutcome::Skipped { path: out_path });
    }

    let (present, missing): (Vec<Archive>, Vec<Archive>) =
        archives_for(kind, ym, &opts.compressed_dir).into_iter().partition(|a| a.path.is_file());
    for a in &missing {
        tracing::warn!("File {} not found for extraction", a.path.display());
    }
    if present.is_empty() {
        return Ok(ExtractOutcome::MissingInput);
    }

    if let Some(dir) = out_path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }

    let started = Instant::now();
    let mut writer = JsonArrayWriter::create(&out_path, opts.write_buffer_bytes)?
        .with_progress_every(opts.progress_every);

    let pb = opts.progress.then(|| {
        let label = format!("{} {} {}", kind.prefix(), subreddit, ym);
        make_progress_bar_labeled(total_compressed_size(&present), Some(&label))
    });

    let mut tally = FilterTally::default();
    let mut done_bytes = 0u64;
    for archive in &present {
        tracing::info!(
            "Extracting {} for subreddit '{}' from {} to {}",
            kind.noun(),
            subreddit,
            archive.file_name(),
            display_name(&out_path)
        );
        let before = tally;
        let counter = Arc::new(AtomicU64::new(0));
        let reader = match open_decoder(&archive.path, archive.codec, Some(counter.clone())) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Skipping {}: {:#}", archive.path.display(), e);
                continue;
            }
        };

        let mut lines = LineReconstructor::with_config(reader, opts.chunk_bytes, opts.decode_retries)
            .labeled(archive.file_name());
        for line in &mut lines {
            let verdict = classify(&line, subreddit);
            tally.record(&verdict);
            if verdict == LineVerdict::Keep {
                writer.push(line.trim())?;
            }
            if let Some(pb) = &pb {
                pb.set_position(done_bytes + counter.load(Ordering::Relaxed));
            }
        }
        done_bytes += counter.load(Ordering::Relaxed);

        let st = lines.stats();
        let this = tally.since(&before);
        tracing::info!(
            "{}: {} lines scanned ({} malformed, {} undecodable, {} repaired)",
            archive.file_name(),
            st.lines,
            this.malformed,
            st.dropped_lines,
            st.repaired_lines
        );
    }
    if let Some(pb) = pb {
        pb.finish_with_message("done");
    }

    let records = writer.written();
    let outcome = match writer.finish()? {
        Some(path) => {
            tracing::info!("Saved {} {} to {}", records, kind.noun(), path.display());
            ExtractOutcome::Written { path, records }
        }
        None => {
            // Only reachable with `force`: a previous run's output no longer matches.
            if out_path.is_file() {
                remove_with_backoff(&out_path, 16, 50)?;
                tracing::info!("Removed {} from an earlier run", out_path.display());
            }
            tracing::info!("No {} found for subreddit '{}' in {}", kind.noun(), subreddit, ym);
            ExtractOutcome::Empty
        }
    };
    tracing::info!("Extraction process completed after {}", format_elapsed(started.elapsed()));
    Ok(outcome)
}
