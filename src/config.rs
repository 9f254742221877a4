use crate::array_writer::DEFAULT_PROGRESS_EVERY;
use crate::date::YearMonth;
use crate::filters::normalize_subreddit;
use crate::lines::{DEFAULT_CHUNK_BYTES, DEFAULT_DECODE_RETRIES};
use crate::paths::ArchiveKind;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const MIB: u64 = 1024 * 1024;
pub const DEFAULT_SPLIT_THRESHOLD_BYTES: u64 = 500 * MIB;

/// Data source toggle (comments, submissions, both).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sources {
    Comments,
    Submissions,
    Both,
}

impl Sources {
    pub fn kinds(self) -> &'static [ArchiveKind] {
        match self {
            Sources::Comments => &[ArchiveKind::Comment],
            Sources::Submissions => &[ArchiveKind::Submission],
            Sources::Both => &[ArchiveKind::Comment, ArchiveKind::Submission],
        }
    }
}

/// Everything an extraction or split invocation needs, passed in explicitly.
#[derive(Clone, Debug)]
pub struct ExtractOptions {
    pub data_dir: PathBuf,
    pub compressed_dir: PathBuf,      // <data_dir>/compressed
    pub extracted_dir: PathBuf,       // <data_dir>/extracted
    pub subreddit: Option<String>,    // normalized lowercase, no "r/"
    pub sources: Sources,
    pub start: Option<YearMonth>,     // inclusive
    pub end: Option<YearMonth>,       // inclusive
    pub force: bool,                  // overwrite existing outputs
    pub delete_source_after_split: bool,

    // line reconstruction
    pub chunk_bytes: usize,
    pub decode_retries: usize,

    // day splitting
    pub split_threshold_bytes: u64,   // above this, stream instead of loading

    pub progress_every: u64,          // log every N accepted records
    pub progress: bool,               // byte progress bar over compressed input
    pub file_concurrency: usize,      // parallel archives during verification

    pub write_buffer_bytes: usize,    // per output file
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ps_reddit_tool")
}

impl Default for ExtractOptions {
    fn default() -> Self {
        let base = default_data_dir();
        Self {
            compressed_dir: base.join("compressed"),
            extracted_dir: base.join("extracted"),
            data_dir: base,
            subreddit: None,
            sources: Sources::Comments,
            start: None,
            end: None,
            force: false,
            delete_source_after_split: false,

            chunk_bytes: DEFAULT_CHUNK_BYTES,
            decode_retries: DEFAULT_DECODE_RETRIES,

            split_threshold_bytes: DEFAULT_SPLIT_THRESHOLD_BYTES,

            progress_every: DEFAULT_PROGRESS_EVERY,
            progress: false,
            file_concurrency: 1,

            write_buffer_bytes: 256 * 1024,
        }
    }
}

impl ExtractOptions {
    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let base = dir.as_ref().to_path_buf();
        self.compressed_dir = base.join("compressed");
        self.extracted_dir = base.join("extracted");
        self.data_dir = base;
        self
    }
    pub fn with_subreddit(mut self, sub: impl AsRef<str>) -> Self {
        self.subreddit = Some(normalize_subreddit(sub.as_ref()));
        self
    }
    pub fn with_sources(mut self, sources: Sources) -> Self {
        self.sources = sources;
        self
    }
    pub fn with_date_range(mut self, start: Option<YearMonth>, end: Option<YearMonth>) -> Self {
        self.start = start;
        self.end = end;
        self
    }
    pub fn with_force(mut self, yes: bool) -> Self {
        self.force = yes;
        self
    }
    pub fn with_delete_source_after_split(mut self, yes: bool) -> Self {
        self.delete_source_after_split = yes;
        self
    }
    pub fn with_chunk_bytes(mut self, bytes: usize) -> Self {
        self.chunk_bytes = bytes.max(1);
        self
    }
    pub fn with_decode_retries(mut self, n: usize) -> Self {
        self.decode_retries = n;
        self
    }
    pub fn with_split_threshold_bytes(mut self, bytes: u64) -> Self {
        self.split_threshold_bytes = bytes;
        self
    }
    pub fn with_split_threshold_mib(mut self, mib: u64) -> Self {
        self.split_threshold_bytes = mib.saturating_mul(MIB);
        self
    }
    pub fn with_progress_every(mut self, n: u64) -> Self {
        self.progress_every = n;
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_file_concurrency(mut self, n: usize) -> Self {
        self.file_concurrency = n.max(1);
        self
    }
    pub fn with_write_buffer_bytes(mut self, bytes: usize) -> Self {
        self.write_buffer_bytes = bytes.max(8 * 1024);
        self
    }

    /// Apply a `local_config.json` on top of these options.
    pub fn with_local_config(mut self, cfg: &LocalConfig) -> Self {
        self = self.with_data_dir(&cfg.data_folder);
        if let Some(mib) = cfg.chunk_size_mib {
            self = self.with_chunk_bytes((mib as usize).saturating_mul(MIB as usize));
        }
        if let Some(mib) = cfg.split_threshold_mib {
            self = self.with_split_threshold_mib(mib);
        }
        if let Some(n) = cfg.decode_retries {
            self = self.with_decode_retries(n);
        }
        self
    }

    /// Create `compressed/` and `extracted/` under the data dir.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.compressed_dir, &self.extracted_dir] {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        Ok(())
    }
}

/// On-disk settings file (`local_config.json`).
///
/// ```json
/// { "dataFolder": "/mnt/dumps", "splitThresholdMiB": 500 }
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalConfig {
    pub data_folder: PathBuf,
    #[serde(default, rename = "chunkSizeMiB")]
    pub chunk_size_mib: Option<u64>,
    #[serde(default, rename = "splitThresholdMiB")]
    pub split_threshold_mib: Option<u64>,
    #[serde(default)]
    pub decode_retries: Option<usize>,
}

impl LocalConfig {
    /// Load the config file; `Ok(None)` when it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg = serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
        Ok(Some(cfg))
    }
}
