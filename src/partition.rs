//! Day partitioning: split one extracted period file into one JSON array per UTC day.
//!
//! Two strategies produce the same grouping:
//!   - `Bulk` parses the whole array at once and writes each day in one go.
//!   - `Streaming` walks the file line by line (one record per line, as written by
//!     `JsonArrayWriter`) and keeps a single day file open at a time.
//!
//! A record belongs to `day_of(created_utc)`. Records without a usable `created_utc`
//! are logged and left out by both strategies.
//!
//! Days are first written to a staging directory and moved into place only once the
//! whole period file has been read. A day can receive records from two periods (a
//! monthly dump may hold records stamped just past the month end), so an existing day
//! file is merged into rather than replaced. A marker file records a finished split.

use crate::array_writer::{display_name, in_progress_path, JsonArrayWriter};
use crate::config::ExtractOptions;
use crate::date::{day_of, format_elapsed, YearMonth};
use crate::mem::{available_memory_bytes, fits_in_memory};
use crate::paths::{
    daily_file_name, daily_file_path, period_file_path, split_marker_path, split_staging_dir, ArchiveKind,
};
use crate::record::parse_created;
use crate::util::{open_with_backoff, remove_with_backoff, replace_file_atomic_backoff};
use ahash::AHashSet;
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use serde_json::value::RawValue;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;
use time::Date;

const READ_BUF_BYTES: usize = 256 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitStrategy {
    Bulk,
    Streaming,
}

/// Bulk for files up to `threshold` bytes that also fit in available memory.
pub fn choose_strategy(input_bytes: u64, threshold: u64, available: Option<u64>) -> SplitStrategy {
    if input_bytes <= threshold && fits_in_memory(input_bytes, available) {
        SplitStrategy::Bulk
    } else {
        SplitStrategy::Streaming
    }
}

/// One written DailyFile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DaySplit {
    pub day: Date,
    pub path: PathBuf,
    /// Records this split added to the file.
    pub records: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SplitOutcome {
    /// The period was split before and `force` was off. `existing` is the number of
    /// daily files that split wrote to.
    Skipped { existing: usize },
    Split { strategy: SplitStrategy, days: Vec<DaySplit> },
    /// The period file isn't there; nothing to do.
    MissingInput,
}

/// Contents of the split marker: records written per day.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SplitMarker {
    days: BTreeMap<String, u64>,
}

/// Split the `(kind, ym)` ExtractedPeriodFile of the configured subreddit into DailyFiles.
pub fn split_period(opts: &ExtractOptions, kind: ArchiveKind, ym: YearMonth) -> Result<SplitOutcome> {
    let subreddit = opts.subreddit.as_deref().ok_or_else(|| anyhow!("subreddit is required"))?;
    let in_path = period_file_path(&opts.extracted_dir, kind, subreddit, ym);
    let marker_path = split_marker_path(&opts.extracted_dir, kind, subreddit, ym);

    if !opts.force {
        if let Some(marker) = read_marker(&marker_path) {
            tracing::info!(
                "Skipping split of {}: already split into {} daily files (force to override)",
                display_name(&in_path),
                marker.days.len()
            );
            return Ok(SplitOutcome::Skipped { existing: marker.days.len() });
        }
    }
    if !in_path.is_file() {
        tracing::error!("Unable to find file {} for splitting", in_path.display());
        return Ok(SplitOutcome::MissingInput);
    }

    let started = Instant::now();
    let size = in_path.metadata().with_context(|| format!("stat {}", in_path.display()))?.len();
    let strategy = choose_strategy(size, opts.split_threshold_bytes, available_memory_bytes());
    tracing::info!("Splitting '{}' into daily files ({:?})", in_path.display(), strategy);

    let staging = StagingDir::create(split_staging_dir(&opts.extracted_dir, kind, subreddit, ym))?;
    let out_for = |day: Date| staging.path().join(daily_file_name(kind, subreddit, day));
    let staged = split_file(&in_path, strategy, out_for, opts.write_buffer_bytes, opts.progress_every)?;

    let mut days = Vec::with_capacity(staged.len());
    for s in &staged {
        let target = daily_file_path(&opts.extracted_dir, kind, subreddit, s.day);
        let records = promote_day(s, &target, opts.write_buffer_bytes)?;
        days.push(DaySplit { day: s.day, path: target, records });
    }
    drop(staging);
    write_marker(&marker_path, &days)?;

    let total: u64 = days.iter().map(|d| d.records).sum();
    tracing::info!("Wrote {} records into {} daily files", total, days.len());

    if opts.delete_source_after_split {
        remove_with_backoff(&in_path, 16, 50)?;
        tracing::info!("Deleted {} after splitting into smaller daily files", in_path.display());
    }
    tracing::info!("Splitting process completed after {}", format_elapsed(started.elapsed()));
    Ok(SplitOutcome::Split { strategy, days })
}

/// Scratch directory removed on drop, whether or not the split succeeded.
struct StagingDir(PathBuf);

impl StagingDir {
    fn create(path: PathBuf) -> Result<Self> {
        // Leftovers of an interrupted run.
        if path.exists() {
            fs::remove_dir_all(&path).with_context(|| format!("remove {}", path.display()))?;
        }
        fs::create_dir_all(&path).with_context(|| format!("create {}", path.display()))?;
        Ok(Self(path))
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.0) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.0.display(), error = %e, "failed to remove staging directory")
            }
            _ => {}
        }
    }
}

/// Move one staged day into place. An existing file for that day keeps its records and
/// gains only the staged records it does not already hold. Returns the records added.
fn promote_day(staged: &DaySplit, target: &Path, write_buf: usize) -> Result<u64> {
    if !target.is_file() {
        replace_file_atomic_backoff(&staged.path, target)?;
        return Ok(staged.records);
    }

    let old_text = read_text(target)?;
    let new_text = read_text(&staged.path)?;
    let old: Vec<&RawValue> =
        serde_json::from_str(&old_text).with_context(|| format!("parse {} as JSON array", target.display()))?;
    let new: Vec<&RawValue> = serde_json::from_str(&new_text)
        .with_context(|| format!("parse {} as JSON array", staged.path.display()))?;

    let present: AHashSet<&str> = old.iter().map(|r| r.get()).collect();
    let fresh: Vec<&RawValue> = new.into_iter().filter(|r| !present.contains(r.get())).collect();
    if fresh.is_empty() {
        tracing::debug!("{} already holds every record for its day", target.display());
        return Ok(0);
    }

    tracing::info!("Merging {} records into existing {}", fresh.len(), target.display());
    let mut w = JsonArrayWriter::create(target, write_buf)?.with_progress_every(0);
    for raw in old.iter().chain(fresh.iter()) {
        w.push(raw.get())?;
    }
    w.finish()?;
    Ok(fresh.len() as u64)
}

fn read_text(path: &Path) -> Result<String> {
    let mut text = String::new();
    open_with_backoff(path, 16, 50)
        .with_context(|| format!("open {}", path.display()))?
        .read_to_string(&mut text)
        .with_context(|| format!("read {}", path.display()))?;
    Ok(text)
}

/// An unreadable marker counts as absent, so the period is split again.
fn read_marker(path: &Path) -> Option<SplitMarker> {
    let text = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!("ignoring unreadable split marker {}: {}", path.display(), e);
            None
        }
    }
}

fn write_marker(path: &Path, days: &[DaySplit]) -> Result<()> {
    let marker = SplitMarker { days: days.iter().map(|d| (d.day.to_string(), d.records)).collect() };
    let tmp = in_progress_path(path);
    fs::write(&tmp, serde_json::to_string_pretty(&marker)?).with_context(|| format!("write {}", tmp.display()))?;
    replace_file_atomic_backoff(&tmp, path)
}

/// Split `input` (a JSON array of records) using `strategy`; `out_for` names each day's file.
pub fn split_file(
    input: &Path,
    strategy: SplitStrategy,
    out_for: impl Fn(Date) -> PathBuf,
    write_buf: usize,
    progress_every: u64,
) -> Result<Vec<DaySplit>> {
    match strategy {
        SplitStrategy::Bulk => split_bulk(input, out_for, write_buf, progress_every),
        SplitStrategy::Streaming => split_streaming(input, out_for, write_buf, progress_every),
    }
}

/// Day of one record's JSON text. `Ok(None)` means "valid JSON, but no usable timestamp".
fn record_day(raw: &str) -> Result<Option<Date>> {
    let view = match parse_created(raw) {
        Ok(p) => p,
        Err(e) if e.classify() == Category::Data => {
            tracing::warn!(error = %e, "skipping record that is not an object");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    let Some(ts) = view.created_utc else {
        tracing::warn!("skipping record without created_utc");
        return Ok(None);
    };
    match day_of(ts) {
        Ok(day) => Ok(Some(day)),
        Err(e) => {
            tracing::warn!("skipping record: {e}");
            Ok(None)
        }
    }
}

fn split_bulk(
    input: &Path,
    out_for: impl Fn(Date) -> PathBuf,
    write_buf: usize,
    progress_every: u64,
) -> Result<Vec<DaySplit>> {
    let text = read_text(input)?;
    let records: Vec<&RawValue> =
        serde_json::from_str(&text).with_context(|| format!("parse {} as JSON array", input.display()))?;

    let mut groups: BTreeMap<Date, Vec<&RawValue>> = BTreeMap::new();
    for raw in records {
        if let Some(day) = record_day(raw.get())? {
            groups.entry(day).or_default().push(raw);
        }
    }

    let mut out = Vec::with_capacity(groups.len());
    for (day, recs) in groups {
        let path = out_for(day);
        tracing::info!("Splitting records to {}", path.display());
        let mut w = JsonArrayWriter::create(&path, write_buf)?.with_progress_every(progress_every);
        for raw in recs {
            w.push(raw.get())?;
        }
        let records = w.written();
        if let Some(path) = w.finish()? {
            out.push(DaySplit { day, path, records });
        }
    }
    Ok(out)
}

/// Strip JSON-array punctuation around a one-record line: `[`, `]`, and separating commas.
pub fn strip_array_boilerplate(line: &str) -> &str {
    let s = line.trim();
    let s = s.strip_prefix('[').unwrap_or(s).trim_start();
    let s = s.strip_suffix(']').unwrap_or(s).trim_end();
    let s = s.strip_prefix(',').unwrap_or(s).trim_start();
    s.strip_suffix(',').unwrap_or(s).trim_end()
}

fn split_streaming(
    input: &Path,
    out_for: impl Fn(Date) -> PathBuf,
    write_buf: usize,
    progress_every: u64,
) -> Result<Vec<DaySplit>> {
    let f = open_with_backoff(input, 16, 50).with_context(|| format!("open {}", input.display()))?;
    let mut reader = BufReader::with_capacity(READ_BUF_BYTES, f);

    let mut counts: BTreeMap<Date, u64> = BTreeMap::new();
    let mut closed: AHashSet<Date> = AHashSet::new();
    let mut open: Option<(Date, JsonArrayWriter)> = None;

    let mut buf = String::with_capacity(16 * 1024);
    let mut line_no = 0u64;
    loop {
        buf.clear();
        if reader.read_line(&mut buf).with_context(|| format!("read {}", input.display()))? == 0 {
            break;
        }
        line_no += 1;
        let rec = strip_array_boilerplate(&buf);
        if rec.is_empty() {
            continue;
        }
        let day = match record_day(rec).with_context(|| format!("{}:{}", input.display(), line_no))? {
            Some(d) => d,
            None => continue,
        };

        let current = open.as_ref().map(|(d, _)| *d);
        if current != Some(day) {
            if let Some((prev, w)) = open.take() {
                close_day(prev, w, &mut counts, &mut closed)?;
            }
            let path = out_for(day);
            let w = if closed.contains(&day) {
                tracing::debug!("Reopening {} for out-of-order records", path.display());
                JsonArrayWriter::reopen(&path, write_buf)?
            } else {
                tracing::info!("Splitting records to {}", path.display());
                JsonArrayWriter::create(&path, write_buf)?
            };
            open = Some((day, w.with_progress_every(progress_every)));
        }
        if let Some((_, w)) = open.as_mut() {
            w.push(rec)?;
        }
    }
    if let Some((day, w)) = open.take() {
        close_day(day, w, &mut counts, &mut closed)?;
    }

    Ok(counts
        .into_iter()
        .map(|(day, records)| DaySplit { day, path: out_for(day), records })
        .collect())
}

fn close_day(
    day: Date,
    w: JsonArrayWriter,
    counts: &mut BTreeMap<Date, u64>,
    closed: &mut AHashSet<Date>,
) -> Result<()> {
    let n = w.written();
    if w.finish()?.is_none() {
        bail!("day {day} produced an empty array");
    }
    *counts.entry(day).or_insert(0) += n;
    closed.insert(day);
    Ok(())
}
