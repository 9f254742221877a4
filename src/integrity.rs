//! Local archive verification: decode checks, SHA-256 checksum files, listings.

use crate::codec::{validate_archive, Codec};
use crate::date::iter_year_months;
use crate::paths::{archives_for, discover_archives, discover_extracted};
use crate::progress::make_count_progress;
use crate::util::{human_size, init_tracing_once, open_with_backoff, remove_with_backoff};
use crate::RedditDumps;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Mode for integrity checks.
#[derive(Clone, Copy, Debug)]
pub enum IntegrityMode {
    /// Decode only the first `sample_bytes` (decompressed) per file.
    /// Fast, but cannot detect late/trailing corruption.
    Quick { sample_bytes: u64 },
    /// Decode the entire stream (validates checksums embedded in the format).
    Full,
}

/// Outcome of comparing one archive against the published checksum list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChecksumStatus {
    Verified,
    Mismatch { expected: String, actual: String },
    NoChecksum,
}

/// One file in a listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileListing {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Parse a `sha256sum`-style file: `<hex digest>  <file name>` per line.
/// Returns file name -> lowercase digest.
pub fn parse_checksum_file(path: &Path) -> Result<HashMap<String, String>> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(parse_checksums(&text))
}

pub fn parse_checksums(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|ln| {
            let mut parts = ln.split_whitespace();
            let digest = parts.next()?;
            let name = parts.next()?.trim_start_matches('*');
            Some((name.to_string(), digest.to_lowercase()))
        })
        .collect()
}

/// Hex SHA-256 of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut f = open_with_backoff(path, 16, 50).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = f.read(&mut buf).with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

impl RedditDumps {
    /// Archives on disk for the configured sources, restricted to the date range if one is set.
    fn local_archives(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        for &kind in self.opts.sources.kinds() {
            match self.opts.start {
                Some(start) => {
                    let end = self.opts.end.unwrap_or(start);
                    for ym in iter_year_months(start, end) {
                        out.extend(
                            archives_for(kind, ym, &self.opts.compressed_dir)
                                .into_iter()
                                .map(|a| a.path)
                                .filter(|p| p.is_file()),
                        );
                    }
                }
                None => out.extend(discover_archives(&self.opts.compressed_dir, kind)),
            }
        }
        out
    }

    /// Decode-check local archives. Returns `(path, error)` for every file that failed.
    pub fn check_archive_integrity(&self, mode: IntegrityMode) -> Result<Vec<(PathBuf, String)>> {
        init_tracing_once();
        let files = self.local_archives();
        let label = match mode {
            IntegrityMode::Quick { .. } => "Integrity (quick)",
            IntegrityMode::Full => "Integrity (full)",
        };
        let pb = self.opts.progress.then(|| make_count_progress(files.len() as u64, label));
        let errors = Mutex::new(Vec::<(PathBuf, String)>::new());

        let check = |path: &PathBuf| {
            let limit = match mode {
                IntegrityMode::Quick { sample_bytes } => Some(sample_bytes),
                IntegrityMode::Full => None,
            };
            let res = match Codec::from_path(path) {
                Some(codec) => validate_archive(path, codec, limit).map(|_| ()),
                None => Err(anyhow::anyhow!("unknown archive extension")),
            };
            if let Err(e) = res {
                tracing::warn!("{} failed integrity check: {:#}", path.display(), e);
                errors.lock().push((path.clone(), format!("{e:#}")));
            }
            if let Some(pb) = &pb {
                pb.inc(1);
            }
        };

        if self.opts.file_concurrency <= 1 {
            files.iter().for_each(&check);
        } else {
            for chunk in files.chunks(self.opts.file_concurrency) {
                chunk.par_iter().for_each(&check);
            }
        }
        if let Some(pb) = pb {
            pb.finish_with_message("done");
        }
        let mut errors = errors.into_inner();
        errors.sort();
        Ok(errors)
    }

    /// Compare local archives against a checksum file; optionally delete mismatches.
    pub fn verify_checksums(&self, checksum_file: &Path, delete_mismatched: bool) -> Result<Vec<(PathBuf, ChecksumStatus)>> {
        init_tracing_once();
        let expected = parse_checksum_file(checksum_file)?;
        let mut out = Vec::new();
        for path in self.local_archives() {
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let status = match expected.get(&name) {
                None => ChecksumStatus::NoChecksum,
                Some(want) => {
                    let got = sha256_file(&path)?;
                    if &got == want {
                        ChecksumStatus::Verified
                    } else {
                        ChecksumStatus::Mismatch { expected: want.clone(), actual: got }
                    }
                }
            };
            match &status {
                ChecksumStatus::Verified => tracing::info!("{} (Checksum verified)", path.display()),
                ChecksumStatus::NoChecksum => tracing::info!("{} (No checksum found, unable to verify)", path.display()),
                ChecksumStatus::Mismatch { expected, actual } => {
                    tracing::warn!("{} (Checksum mismatch: expected {}, got {})", path.display(), expected, actual);
                    if delete_mismatched {
                        remove_with_backoff(&path, 16, 50)?;
                        tracing::warn!("Deleted file with invalid checksum: {}", path.display());
                    }
                }
            }
            out.push((path, status));
        }
        Ok(out)
    }

    /// Downloaded archives with their sizes.
    pub fn list_archives(&self) -> Vec<FileListing> {
        let files = self.local_archives();
        log_listing("Downloaded dumps", files)
    }

    /// Extracted period and daily files with their sizes.
    pub fn list_extracted(&self) -> Vec<FileListing> {
        let mut files = Vec::new();
        for &kind in self.opts.sources.kinds() {
            files.extend(discover_extracted(&self.opts.extracted_dir, kind));
        }
        log_listing("Extracted files", files)
    }

    /// Remove zero-byte archives (failed downloads). Returns what was deleted.
    pub fn delete_empty_archives(&self) -> Result<Vec<PathBuf>> {
        let mut deleted = Vec::new();
        for path in self.local_archives() {
            if fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(false) {
                remove_with_backoff(&path, 16, 50)?;
                tracing::warn!("Deleted 0 byte file: {}", path.display());
                deleted.push(path);
            }
        }
        Ok(deleted)
    }
}

fn log_listing(title: &str, files: Vec<PathBuf>) -> Vec<FileListing> {
    tracing::info!("{}:", title);
    files
        .into_iter()
        .enumerate()
        .map(|(i, path)| {
            let bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            tracing::info!("{} {} ({})", i, path.display(), human_size(bytes));
            FileListing { path, bytes }
        })
        .collect()
}
