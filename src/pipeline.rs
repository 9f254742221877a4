use crate::config::{ExtractOptions, LocalConfig, Sources};
use crate::date::{format_elapsed, iter_year_months, YearMonth};
use crate::extract::{extract_period, ExtractOutcome};
use crate::partition::{split_period, SplitOutcome};
use crate::paths::ArchiveKind;
use crate::util::init_tracing_once;
use anyhow::{anyhow, Result};
use std::path::Path;
use std::time::Instant;

/// Builder-style entry point over a local dump folder.
#[derive(Clone, Debug, Default)]
pub struct RedditDumps {
    pub(crate) opts: ExtractOptions,
}

/// Per-period results of a batch run. Failed periods don't stop the batch.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub done: Vec<(ArchiveKind, YearMonth, T)>,
    pub failed: Vec<(ArchiveKind, YearMonth, anyhow::Error)>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self { done: Vec::new(), failed: Vec::new() }
    }
}

impl<T> BatchReport<T> {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

impl RedditDumps {
    pub fn new() -> Self {
        Self { opts: ExtractOptions::default() }
    }

    /// Start from `local_config.json` if present, defaults otherwise.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let mut opts = ExtractOptions::default();
        if let Some(cfg) = LocalConfig::load(path)? {
            opts = opts.with_local_config(&cfg);
        }
        Ok(Self { opts })
    }

    pub fn with_options(opts: ExtractOptions) -> Self {
        Self { opts }
    }

    // -------- Builder methods --------
    pub fn data_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_data_dir(dir); self }
    pub fn subreddit(mut self, sub: impl AsRef<str>) -> Self { self.opts = self.opts.with_subreddit(sub); self }
    pub fn sources(mut self, sources: Sources) -> Self { self.opts = self.opts.with_sources(sources); self }
    pub fn date_range(mut self, start: Option<YearMonth>, end: Option<YearMonth>) -> Self { self.opts = self.opts.with_date_range(start, end); self }
    pub fn force(mut self, yes: bool) -> Self { self.opts = self.opts.with_force(yes); self }
    pub fn delete_source_after_split(mut self, yes: bool) -> Self { self.opts = self.opts.with_delete_source_after_split(yes); self }
    pub fn chunk_bytes(mut self, bytes: usize) -> Self { self.opts = self.opts.with_chunk_bytes(bytes); self }
    pub fn decode_retries(mut self, n: usize) -> Self { self.opts = self.opts.with_decode_retries(n); self }
    pub fn split_threshold_bytes(mut self, bytes: u64) -> Self { self.opts = self.opts.with_split_threshold_bytes(bytes); self }
    pub fn split_threshold_mib(mut self, mib: u64) -> Self { self.opts = self.opts.with_split_threshold_mib(mib); self }
    pub fn progress_every(mut self, n: u64) -> Self { self.opts = self.opts.with_progress_every(n); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn file_concurrency(mut self, n: usize) -> Self { self.opts = self.opts.with_file_concurrency(n); self }
    pub fn write_buffer_bytes(mut self, bytes: usize) -> Self { self.opts = self.opts.with_write_buffer_bytes(bytes); self }

    pub fn options(&self) -> &ExtractOptions {
        &self.opts
    }

    // -------- Single period --------

    pub fn extract(&self, kind: ArchiveKind, ym: YearMonth) -> Result<ExtractOutcome> {
        init_tracing_once();
        self.opts.ensure_dirs()?;
        extract_period(&self.opts, kind, ym)
    }

    pub fn split(&self, kind: ArchiveKind, ym: YearMonth) -> Result<SplitOutcome> {
        init_tracing_once();
        split_period(&self.opts, kind, ym)
    }

    // -------- Batches over the configured sources and date range --------

    pub fn extract_range(&self) -> Result<BatchReport<ExtractOutcome>> {
        let sub = self.require_subreddit()?;
        tracing::info!("Extracting downloaded {} for subreddit '{}' from {}", self.sources_noun(), sub, self.range_str());
        self.opts.ensure_dirs()?;
        self.run_batch("Extraction", |kind, ym| extract_period(&self.opts, kind, ym))
    }

    pub fn split_range(&self) -> Result<BatchReport<SplitOutcome>> {
        let sub = self.require_subreddit()?;
        tracing::info!("Splitting monthly '{}' {} files from {} into daily files", sub, self.sources_noun(), self.range_str());
        self.run_batch("Splitting", |kind, ym| split_period(&self.opts, kind, ym))
    }

    fn run_batch<T>(&self, what: &str, mut f: impl FnMut(ArchiveKind, YearMonth) -> Result<T>) -> Result<BatchReport<T>> {
        init_tracing_once();
        let (start, end) = self.range()?;
        let started = Instant::now();
        let mut report = BatchReport::default();
        for &kind in self.opts.sources.kinds() {
            for ym in iter_year_months(start, end) {
                if !ym.is_available() {
                    tracing::warn!("No data available for {}", ym);
                    continue;
                }
                match f(kind, ym) {
                    Ok(v) => report.done.push((kind, ym, v)),
                    Err(e) => {
                        tracing::error!("{} {} {} failed: {:#}", what, kind.prefix(), ym, e);
                        report.failed.push((kind, ym, e));
                    }
                }
            }
        }
        tracing::info!("Batch {} completed after {}", what.to_lowercase(), format_elapsed(started.elapsed()));
        Ok(report)
    }

    fn require_subreddit(&self) -> Result<&str> {
        self.opts.subreddit.as_deref().ok_or_else(|| anyhow!("subreddit is required"))
    }

    fn range(&self) -> Result<(YearMonth, YearMonth)> {
        let start = self.opts.start.ok_or_else(|| anyhow!("date range start is required"))?;
        Ok((start, self.opts.end.unwrap_or(start)))
    }

    fn range_str(&self) -> String {
        match (self.opts.start, self.opts.end) {
            (Some(s), Some(e)) if s != e => format!("{s} to {e}"),
            (Some(s), _) => s.to_string(),
            _ => "<no range>".to_string(),
        }
    }

    fn sources_noun(&self) -> &'static str {
        match self.opts.sources {
            Sources::Comments => "comments",
            Sources::Submissions => "submissions",
            Sources::Both => "comments and submissions",
        }
    }
}
