//! Format resolution: which compression a dump uses, and decoders for each.

use crate::paths::ArchiveKind;
use crate::util::open_with_backoff;
use anyhow::{Context, Result};
use std::io::{self, Read};
use std::path::Path;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Compression format of a dump file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Codec {
    Bz2,
    Xz,
    Zst,
}

impl Codec {
    pub fn extension(self) -> &'static str {
        match self {
            Codec::Bz2 => "bz2",
            Codec::Xz => "xz",
            Codec::Zst => "zst",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "bz2" => Some(Codec::Bz2),
            "xz" => Some(Codec::Xz),
            "zst" => Some(Codec::Zst),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension().and_then(|e| e.to_str()).and_then(Self::from_extension)
    }
}

/// Codec the provider used for a given month.
///
/// Comments moved bz2 -> xz at 2017-12 and xz -> zst at 2018-10.
/// Submissions are always zst.
pub fn resolve(kind: ArchiveKind, year: u16, month: u8) -> Codec {
    match kind {
        ArchiveKind::Submission => Codec::Zst,
        ArchiveKind::Comment => {
            if (year == 2017 && month == 12) || (year == 2018 && month < 10) {
                Codec::Xz
            } else if year < 2017 || (year == 2017 && month < 12) {
                Codec::Bz2
            } else {
                Codec::Zst
            }
        }
    }
}

/// A `Read` wrapper that counts compressed bytes read (for byte progress bars).
pub struct CountingReader<R: Read> {
    inner: R,
    counter: Arc<AtomicU64>,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R, counter: Arc<AtomicU64>) -> Self {
        Self { inner, counter }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Wrap a compressed stream in the decoder for `codec`.
///
/// bz2 and xz dumps can be concatenations of several streams, so both use
/// multi-stream decoders. zstd frames may need a 2 GiB window (`window_log_max(31)`).
pub fn decoder_for<R: Read + 'static>(inner: R, codec: Codec) -> io::Result<Box<dyn Read>> {
    Ok(match codec {
        Codec::Bz2 => Box::new(bzip2::read::MultiBzDecoder::new(inner)),
        Codec::Xz => Box::new(xz2::read::XzDecoder::new_multi_decoder(inner)),
        Codec::Zst => {
            let mut dec = zstd::stream::read::Decoder::new(inner)?;
            dec.window_log_max(31)?;
            Box::new(dec)
        }
    })
}

/// Open a dump file and return a decompressed reader. When `counter` is set it
/// receives the number of compressed bytes consumed.
pub fn open_decoder(path: &Path, codec: Codec, counter: Option<Arc<AtomicU64>>) -> Result<Box<dyn Read>> {
    let file = open_with_backoff(path, 16, 50).with_context(|| format!("open {}", path.display()))?;
    let dec = match counter {
        Some(c) => decoder_for(CountingReader::new(file, c), codec),
        None => decoder_for(file, codec),
    };
    dec.with_context(|| format!("init {} decoder for {}", codec.extension(), path.display()))
}

/// Decode up to `limit` decompressed bytes (or everything when `None`) and discard them.
/// Any corruption surfaces as an error.
pub fn validate_archive(path: &Path, codec: Codec, limit: Option<u64>) -> Result<u64> {
    let dec = open_decoder(path, codec, None)?;
    let n = match limit {
        Some(max) => io::copy(&mut dec.take(max), &mut io::sink()),
        None => {
            let mut dec = dec;
            io::copy(&mut dec, &mut io::sink())
        }
    };
    n.with_context(|| format!("decode {}", path.display()))
}
