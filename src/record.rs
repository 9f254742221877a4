//! Typed views over one dump line.
//!
//! `Record` is the full, owned form. The views are the minimal line-level schemas
//! used on hot paths: extra fields are ignored by serde and strings are borrowed
//! from the line when possible.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Anything that may carry a `subreddit` field.
pub trait HasSubreddit {
    fn subreddit(&self) -> Option<&str>;

    /// Case-insensitive match against an already-normalized target.
    /// Subreddit names are ASCII, so no allocation is needed per line.
    fn in_subreddit(&self, target: &str) -> bool {
        self.subreddit().map(|s| s.eq_ignore_ascii_case(target)).unwrap_or(false)
    }
}

/// One Reddit comment or submission. Required fields are typed; the rest is kept verbatim.
///
/// This is the form handed to library callers reading extracted files. The extraction
/// and split paths never build it: they only need one field per line and use the
/// borrowing views below, writing the original text through untouched.
#[derive(Clone, Debug, Deserialize)]
pub struct Record {
    pub subreddit: String,
    #[serde(deserialize_with = "de_epoch")]
    pub created_utc: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HasSubreddit for Record {
    fn subreddit(&self) -> Option<&str> {
        Some(&self.subreddit)
    }
}

/// Fast-path schema for the subreddit filter.
#[derive(Debug, Deserialize)]
pub struct SubredditView<'a> {
    #[serde(borrow, default)]
    pub subreddit: Option<Cow<'a, str>>,
}

impl HasSubreddit for SubredditView<'_> {
    fn subreddit(&self) -> Option<&str> {
        self.subreddit.as_deref()
    }
}

/// Fast-path schema for day partitioning.
#[derive(Debug, Deserialize)]
pub struct CreatedView {
    #[serde(default, deserialize_with = "de_epoch_opt")]
    pub created_utc: Option<i64>,
}

#[inline]
pub fn parse_subreddit_view(line: &str) -> serde_json::Result<SubredditView<'_>> {
    serde_json::from_str(line)
}

#[inline]
pub fn parse_created(line: &str) -> serde_json::Result<CreatedView> {
    serde_json::from_str(line)
}

pub fn parse_record(line: &str) -> serde_json::Result<Record> {
    serde_json::from_str(line)
}

// Early dumps store `created_utc` as a string ("1136073600") and some as floats.
#[derive(Deserialize)]
#[serde(untagged)]
enum Epoch {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Epoch {
    fn seconds(self) -> Option<i64> {
        match self {
            Epoch::Int(n) => Some(n),
            Epoch::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Epoch::Float(_) => None,
            Epoch::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            }
        }
    }
}

fn de_epoch<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Epoch::deserialize(d)?
        .seconds()
        .ok_or_else(|| serde::de::Error::custom("created_utc is not an epoch timestamp"))
}

fn de_epoch_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(Option::<Epoch>::deserialize(d).ok().flatten().and_then(Epoch::seconds))
}
