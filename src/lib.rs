mod config;
mod date;
mod paths;
mod codec;
mod record;

mod lines;
mod filters;
mod array_writer;
mod extract;
mod partition;

mod progress;
mod util;
mod mem;
mod pipeline;
mod integrity;

pub use crate::config::{ExtractOptions, LocalConfig, Sources, DEFAULT_SPLIT_THRESHOLD_BYTES, MIB};
pub use crate::date::{day_of, format_elapsed, iter_year_months, YearMonth, FIRST_AVAILABLE};
pub use crate::paths::{
    archive_file_name, archives_for, daily_file_name, daily_file_path, period_file_path, split_marker_path,
    split_staging_dir, Archive, ArchiveKind, DAILY_ARCHIVES_FROM,
};
pub use crate::pipeline::{BatchReport, RedditDumps};

// Format resolver and decoders.
pub use crate::codec::{decoder_for, open_decoder, resolve, validate_archive, Codec};

// Typed records and the subreddit filter.
pub use crate::record::{parse_record, HasSubreddit, Record};
pub use crate::filters::{classify, is_relevant, normalize_subreddit, FilterTally, LineVerdict, SkipReason};

// Streaming building blocks.
pub use crate::lines::{LineReconstructor, LineStats, DEFAULT_CHUNK_BYTES, DEFAULT_DECODE_RETRIES};
pub use crate::array_writer::{in_progress_path, JsonArrayWriter, DEFAULT_PROGRESS_EVERY};

// Period extraction and day splitting.
pub use crate::extract::{extract_period, ExtractOutcome};
pub use crate::partition::{
    choose_strategy, split_file, split_period, strip_array_boilerplate, DaySplit, SplitOutcome, SplitStrategy,
};

// Verification.
pub use crate::integrity::{parse_checksums, sha256_file, ChecksumStatus, FileListing, IntegrityMode};

pub use crate::util::init_tracing_once;
