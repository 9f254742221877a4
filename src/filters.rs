//! Subreddit filter over raw dump lines.

use crate::lines::truncate_for_log;
use crate::record::{parse_subreddit_view, HasSubreddit};

/// Why a line was not kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Blank,
    Malformed(String),
    MissingSubreddit,
    OtherSubreddit,
}

/// Per-line outcome of the filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineVerdict {
    Keep,
    Skip(SkipReason),
}

/// Lowercase, trim, and drop a leading `r/`.
#[inline]
pub fn normalize_subreddit(s: &str) -> String {
    let s = s.trim().to_lowercase();
    match s.strip_prefix("r/") {
        Some(rest) => rest.trim().to_string(),
        None => s,
    }
}

/// Decide whether `line` belongs to `target` (already normalized).
/// Never fails: malformed JSON is logged and reported as a skip.
pub fn classify(line: &str, target: &str) -> LineVerdict {
    if line.trim().is_empty() {
        return LineVerdict::Skip(SkipReason::Blank);
    }
    let view = match parse_subreddit_view(line) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, line = %truncate_for_log(line), "skipping malformed line");
            return LineVerdict::Skip(SkipReason::Malformed(e.to_string()));
        }
    };
    match view.subreddit() {
        None => LineVerdict::Skip(SkipReason::MissingSubreddit),
        Some(_) if view.in_subreddit(target) => LineVerdict::Keep,
        Some(_) => LineVerdict::Skip(SkipReason::OtherSubreddit),
    }
}

#[inline]
pub fn is_relevant(line: &str, target: &str) -> bool {
    classify(line, target) == LineVerdict::Keep
}

/// Running tallies of filter outcomes for the end-of-run summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterTally {
    pub kept: u64,
    pub blank: u64,
    pub malformed: u64,
    pub missing_subreddit: u64,
    pub other: u64,
}

impl FilterTally {
    pub fn record(&mut self, verdict: &LineVerdict) {
        match verdict {
            LineVerdict::Keep => self.kept += 1,
            LineVerdict::Skip(SkipReason::Blank) => self.blank += 1,
            LineVerdict::Skip(SkipReason::Malformed(_)) => self.malformed += 1,
            LineVerdict::Skip(SkipReason::MissingSubreddit) => self.missing_subreddit += 1,
            LineVerdict::Skip(SkipReason::OtherSubreddit) => self.other += 1,
        }
    }

    /// Outcomes recorded after `earlier` was taken.
    pub fn since(&self, earlier: &FilterTally) -> FilterTally {
        FilterTally {
            kept: self.kept - earlier.kept,
            blank: self.blank - earlier.blank,
            malformed: self.malformed - earlier.malformed,
            missing_subreddit: self.missing_subreddit - earlier.missing_subreddit,
            other: self.other - earlier.other,
        }
    }

    pub fn seen(&self) -> u64 {
        self.kept + self.blank + self.malformed + self.missing_subreddit + self.other
    }
}
