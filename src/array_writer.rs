//! JSON array emission from already-serialized records.
//!
//! Lines are concatenated verbatim with `[\n`, `,\n` and `\n]` boilerplate; nothing is
//! re-parsed. Output goes to `<path>.inprogress` and is promoted by rename on `finish()`.
//! An array that received no elements is never promoted: its in-progress file is removed.

use crate::util::{create_with_backoff, open_rw_with_backoff, remove_with_backoff, replace_file_atomic_backoff};
use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_PROGRESS_EVERY: u64 = 10_000;

pub struct JsonArrayWriter {
    final_path: PathBuf,
    tmp_path: PathBuf,
    w: Option<BufWriter<File>>,
    has_elements: bool,
    written: u64,
    progress_every: u64,
}

/// `<path>.inprogress`
pub fn in_progress_path(path: &Path) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push(".inprogress");
    PathBuf::from(s)
}

impl JsonArrayWriter {
    /// Start a new, empty array destined for `path`. Fails if the destination
    /// directory is missing or not writable.
    pub fn create(path: &Path, write_buf: usize) -> Result<Self> {
        let tmp_path = in_progress_path(path);
        let f = create_with_backoff(&tmp_path, 16, 50)
            .with_context(|| format!("create {}", tmp_path.display()))?;
        Ok(Self {
            final_path: path.to_path_buf(),
            tmp_path,
            w: Some(BufWriter::with_capacity(write_buf.max(8 * 1024), f)),
            has_elements: false,
            written: 0,
            progress_every: DEFAULT_PROGRESS_EVERY,
        })
    }

    /// Continue a finished array at `path`: its closing bracket is removed and
    /// further elements are appended after the existing ones.
    pub fn reopen(path: &Path, write_buf: usize) -> Result<Self> {
        let tmp_path = in_progress_path(path);
        replace_file_atomic_backoff(path, &tmp_path)?;
        let mut f = open_rw_with_backoff(&tmp_path, 16, 50)
            .with_context(|| format!("open {}", tmp_path.display()))?;

        let len = f.metadata()?.len();
        let tail_len = len.min(256);
        let mut tail = vec![0u8; tail_len as usize];
        f.seek(SeekFrom::Start(len - tail_len))?;
        f.read_exact(&mut tail)?;

        let Some(close) = tail.iter().rposition(|b| !b.is_ascii_whitespace()) else {
            bail!("{} is empty, cannot reopen as JSON array", path.display());
        };
        if tail[close] != b']' {
            bail!("{} does not end with a JSON array", path.display());
        }
        let before = tail[..close].iter().rposition(|b| !b.is_ascii_whitespace());
        let (keep, has_elements) = match before {
            Some(i) if tail[i] == b'[' => (0, false),
            Some(i) => (len - tail_len + i as u64 + 1, true),
            None if len > tail_len => bail!("{} has an unexpected tail", path.display()),
            None => (0, false),
        };
        f.set_len(keep)?;
        f.seek(SeekFrom::End(0))?;

        Ok(Self {
            final_path: path.to_path_buf(),
            tmp_path,
            w: Some(BufWriter::with_capacity(write_buf.max(8 * 1024), f)),
            has_elements,
            written: 0,
            progress_every: DEFAULT_PROGRESS_EVERY,
        })
    }

    /// Log a progress line every `n` pushes (0 disables).
    pub fn with_progress_every(mut self, n: u64) -> Self {
        self.progress_every = n;
        self
    }

    /// Append one record given as JSON text (no trailing newline).
    pub fn push(&mut self, raw: &str) -> Result<()> {
        let Some(w) = self.w.as_mut() else {
            bail!("write after finish: {}", self.final_path.display());
        };
        w.write_all(if self.has_elements { b",\n" } else { b"[\n" })?;
        w.write_all(raw.as_bytes())?;
        self.has_elements = true;
        self.written += 1;
        if self.progress_every > 0 && self.written % self.progress_every == 0 {
            tracing::info!("{}: {} records written", display_name(&self.final_path), self.written);
        }
        Ok(())
    }

    /// Records pushed through this writer (not counting those present before `reopen`).
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.final_path
    }

    /// Close the array. Returns the final path, or `None` if there was nothing to write.
    pub fn finish(mut self) -> Result<Option<PathBuf>> {
        let Some(mut w) = self.w.take() else { return Ok(None) };
        if !self.has_elements {
            drop(w);
            remove_with_backoff(&self.tmp_path, 16, 50)?;
            return Ok(None);
        }
        w.write_all(b"\n]")?;
        w.flush().with_context(|| format!("flush {}", self.tmp_path.display()))?;
        drop(w);
        replace_file_atomic_backoff(&self.tmp_path, &self.final_path)?;
        Ok(Some(self.final_path.clone()))
    }
}

impl Drop for JsonArrayWriter {
    fn drop(&mut self) {
        if let Some(w) = self.w.take() {
            drop(w);
            if let Err(e) = remove_with_backoff(&self.tmp_path, 4, 25) {
                tracing::warn!(path = %self.tmp_path.display(), error = %e, "failed to remove abandoned output");
            } else {
                tracing::debug!(path = %self.tmp_path.display(), "abandoned unfinished output");
            }
        }
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
