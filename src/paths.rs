//! Archive identity and on-disk naming for compressed dumps and extracted outputs.

use crate::codec::{resolve, Codec};
use crate::date::YearMonth;
use regex::Regex;
use std::path::{Path, PathBuf};
use time::Date;
use walkdir::WalkDir;

/// Type of dump.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    Comment,    // RC_*
    Submission, // RS_*
}

impl ArchiveKind {
    pub fn prefix(self) -> &'static str {
        match self {
            ArchiveKind::Comment => "RC",
            ArchiveKind::Submission => "RS",
        }
    }

    pub fn noun(self) -> &'static str {
        match self {
            ArchiveKind::Comment => "comments",
            ArchiveKind::Submission => "submissions",
        }
    }
}

/// From 2020 on the provider publishes one archive per day instead of per month.
pub const DAILY_ARCHIVES_FROM: u16 = 2020;

/// One compressed source file.
#[derive(Clone, Debug)]
pub struct Archive {
    pub kind: ArchiveKind,
    pub ym: YearMonth,
    pub day: Option<Date>,
    pub codec: Codec,
    pub path: PathBuf,
}

impl Archive {
    pub fn file_name(&self) -> String {
        archive_file_name(self.kind, self.ym, self.day, self.codec)
    }
}

pub fn archive_file_name(kind: ArchiveKind, ym: YearMonth, day: Option<Date>, codec: Codec) -> String {
    match day {
        Some(d) => format!("{}_{}.{}", kind.prefix(), d, codec.extension()),
        None => format!("{}_{}.{}", kind.prefix(), ym, codec.extension()),
    }
}

/// All archives making up one month, whether or not they are present on disk.
pub fn archives_for(kind: ArchiveKind, ym: YearMonth, compressed_dir: &Path) -> Vec<Archive> {
    let codec = resolve(kind, ym.year, ym.month);
    let make = |day: Option<Date>| {
        let path = compressed_dir.join(archive_file_name(kind, ym, day, codec));
        Archive { kind, ym, day, codec, path }
    };
    if ym.year < DAILY_ARCHIVES_FROM {
        vec![make(None)]
    } else {
        ym.days().map(|d| make(Some(d))).collect()
    }
}

/// `<extracted>/<sub>/RC_<sub>_YYYY-MM.json`
pub fn period_file_path(extracted_dir: &Path, kind: ArchiveKind, subreddit: &str, ym: YearMonth) -> PathBuf {
    extracted_dir
        .join(subreddit)
        .join(format!("{}_{}_{}.json", kind.prefix(), subreddit, ym))
}

/// `RC_<sub>_YYYY-MM-DD.json`
pub fn daily_file_name(kind: ArchiveKind, subreddit: &str, day: Date) -> String {
    format!("{}_{}_{}.json", kind.prefix(), subreddit, day)
}

/// `<extracted>/<sub>/RC_<sub>_YYYY-MM-DD.json`
pub fn daily_file_path(extracted_dir: &Path, kind: ArchiveKind, subreddit: &str, day: Date) -> PathBuf {
    extracted_dir.join(subreddit).join(daily_file_name(kind, subreddit, day))
}

/// `<extracted>/<sub>/.RC_<sub>_YYYY-MM.split.json`, written once a period has been split.
pub fn split_marker_path(extracted_dir: &Path, kind: ArchiveKind, subreddit: &str, ym: YearMonth) -> PathBuf {
    extracted_dir
        .join(subreddit)
        .join(format!(".{}_{}_{}.split.json", kind.prefix(), subreddit, ym))
}

/// `<extracted>/<sub>/.RC_<sub>_YYYY-MM.staging/`, scratch space for a split in progress.
pub fn split_staging_dir(extracted_dir: &Path, kind: ArchiveKind, subreddit: &str, ym: YearMonth) -> PathBuf {
    extracted_dir
        .join(subreddit)
        .join(format!(".{}_{}_{}.staging", kind.prefix(), subreddit, ym))
}

/// Compressed archives found on disk for a kind, any codec, monthly or daily.
pub fn discover_archives(compressed_dir: &Path, kind: ArchiveKind) -> Vec<PathBuf> {
    let pattern = format!(r"^{}_\d{{4}}-\d{{2}}(-\d{{2}})?\.(bz2|xz|zst)$", kind.prefix());
    scan_dir(compressed_dir, &pattern)
}

/// Extracted period and daily files for a kind, across all subreddits.
pub fn discover_extracted(extracted_dir: &Path, kind: ArchiveKind) -> Vec<PathBuf> {
    let pattern = format!(r"^{}_.+_\d{{4}}-\d{{2}}(-\d{{2}})?\.json$", kind.prefix());
    let Ok(re) = Regex::new(&pattern) else { return Vec::new() };
    if !extracted_dir.exists() {
        return Vec::new();
    }
    let mut out: Vec<PathBuf> = WalkDir::new(extracted_dir)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_str().map(|n| re.is_match(n)).unwrap_or(false))
        .map(|e| e.path().to_path_buf())
        .collect();
    out.sort();
    out
}

fn scan_dir(dir: &Path, pattern: &str) -> Vec<PathBuf> {
    let Ok(re) = Regex::new(pattern) else { return Vec::new() };
    if !dir.exists() {
        return Vec::new();
    }
    let mut out: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_str().map(|n| re.is_match(n)).unwrap_or(false))
        .map(|e| e.path().to_path_buf())
        .collect();
    out.sort();
    out
}
