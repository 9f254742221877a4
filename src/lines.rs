//! Line reconstruction over a decompressed byte stream read in fixed-size chunks.
//!
//! A record may span any number of chunks, and a chunk may end in the middle of a
//! multi-byte UTF-8 sequence. Bytes are therefore split on `\n` first (a newline byte
//! never occurs inside a UTF-8 sequence) and each completed line is decoded on its own,
//! which makes the output independent of where chunk boundaries fall.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::io::{self, Read};

pub const DEFAULT_CHUNK_BYTES: usize = 8 * 1024 * 1024;
pub const DEFAULT_DECODE_RETRIES: usize = 1;

/// Counters for one reconstruction pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineStats {
    pub bytes_read: u64,
    pub lines: u64,
    pub repaired_lines: u64,
    pub dropped_lines: u64,
    /// Size of a trailing fragment with no final newline (discarded).
    pub dangling_bytes: u64,
    /// Set when the underlying reader failed and the stream was cut short.
    pub read_error: bool,
}

/// Lazy, finite, non-restartable iterator of complete text lines (without `\r?\n`).
pub struct LineReconstructor<R: Read> {
    reader: R,
    chunk: Vec<u8>,
    carry: Vec<u8>,
    ready: VecDeque<String>,
    decode_retries: usize,
    label: String,
    done: bool,
    stats: LineStats,
}

impl<R: Read> LineReconstructor<R> {
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, DEFAULT_CHUNK_BYTES, DEFAULT_DECODE_RETRIES)
    }

    pub fn with_config(reader: R, chunk_bytes: usize, decode_retries: usize) -> Self {
        Self {
            reader,
            chunk: vec![0u8; chunk_bytes.max(1)],
            carry: Vec::new(),
            ready: VecDeque::new(),
            decode_retries,
            label: String::from("<stream>"),
            done: false,
            stats: LineStats::default(),
        }
    }

    /// Name used in log lines (usually the archive file name).
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn stats(&self) -> LineStats {
        self.stats
    }

    fn fill(&mut self) {
        let mut chunk = std::mem::take(&mut self.chunk);
        match self.reader.read(&mut chunk) {
            Ok(0) => self.finish(),
            Ok(n) => {
                self.stats.bytes_read += n as u64;
                self.split_chunk(&chunk[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                tracing::warn!(
                    source = %self.label,
                    offset = self.stats.bytes_read,
                    error = %e,
                    "decompression failed; keeping lines read so far and skipping the rest of the stream"
                );
                self.stats.read_error = true;
                self.finish();
            }
        }
        self.chunk = chunk;
    }

    fn split_chunk(&mut self, data: &[u8]) {
        let mut start = 0;
        while let Some(i) = data[start..].iter().position(|&b| b == b'\n') {
            let seg = &data[start..start + i];
            if self.carry.is_empty() {
                self.emit(seg);
            } else {
                let mut line = std::mem::take(&mut self.carry);
                line.extend_from_slice(seg);
                self.emit(&line);
                line.clear();
                self.carry = line;
            }
            start += i + 1;
        }
        self.carry.extend_from_slice(&data[start..]);
    }

    fn emit(&mut self, raw: &[u8]) {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line_no = self.stats.lines + self.stats.dropped_lines + 1;
        match decode_line(raw, self.decode_retries) {
            Decoded::Clean(s) => {
                self.stats.lines += 1;
                self.ready.push_back(s);
            }
            Decoded::Repaired { text, excised } => {
                tracing::debug!(source = %self.label, line_no, excised, "removed invalid UTF-8 bytes from line");
                self.stats.lines += 1;
                self.stats.repaired_lines += 1;
                self.ready.push_back(text);
            }
            Decoded::Failed => {
                tracing::warn!(
                    source = %self.label,
                    line_no,
                    bytes = raw.len(),
                    content = %truncate_for_log(&String::from_utf8_lossy(raw)),
                    "dropping line that is not valid UTF-8"
                );
                self.stats.dropped_lines += 1;
            }
        }
    }

    fn finish(&mut self) {
        if !self.carry.is_empty() {
            // A final record without trailing newline is discarded, never emitted half-read.
            tracing::warn!(
                source = %self.label,
                bytes = self.carry.len(),
                "dropping trailing fragment without newline at end of stream"
            );
            self.stats.dangling_bytes += self.carry.len() as u64;
            self.carry.clear();
        }
        self.done = true;
    }
}

impl<R: Read> Iterator for LineReconstructor<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Some(line);
            }
            if self.done {
                return None;
            }
            self.fill();
        }
    }
}

enum Decoded {
    Clean(String),
    Repaired { text: String, excised: usize },
    Failed,
}

/// Decode one line, cutting out at most `retries` invalid byte spans.
fn decode_line(raw: &[u8], retries: usize) -> Decoded {
    let mut buf: Cow<[u8]> = Cow::Borrowed(raw);
    let mut excised = 0usize;
    loop {
        let err = match std::str::from_utf8(&buf) {
            Ok(s) if excised == 0 => return Decoded::Clean(s.to_owned()),
            Ok(s) => return Decoded::Repaired { text: s.to_owned(), excised },
            Err(e) => e,
        };
        if excised >= retries {
            return Decoded::Failed;
        }
        let at = err.valid_up_to();
        // `None` means the line ends inside a sequence: drop the tail.
        let len = err.error_len().unwrap_or(buf.len() - at);
        let mut owned = buf.into_owned();
        owned.drain(at..at + len);
        buf = Cow::Owned(owned);
        excised += 1;
    }
}

const LOG_PREVIEW_CHARS: usize = 512;

/// Cap log payloads: a single dump line can be hundreds of KiB.
pub(crate) fn truncate_for_log(s: &str) -> Cow<'_, str> {
    match s.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((idx, _)) => Cow::Owned(format!("{}…", &s[..idx])),
        None => Cow::Borrowed(s),
    }
}
