use anyhow::{anyhow, Result};
use std::fmt;
use std::str::FromStr;
use time::{Date, Month, OffsetDateTime};

/// Simple "YYYY-MM" period with safe arithmetic and ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: u16,
    pub month: u8, // 1..=12
}

/// First month for which dumps exist.
pub const FIRST_AVAILABLE: YearMonth = YearMonth { year: 2005, month: 12 };

impl YearMonth {
    pub fn new(year: u16, month: u8) -> Self {
        assert!((1..=12).contains(&month), "Month must be 1..=12");
        Self { year, month }
    }

    pub fn next(self) -> Option<Self> {
        if self.month < 12 {
            Some(Self { year: self.year, month: self.month + 1 })
        } else if self.year < u16::MAX {
            Some(Self { year: self.year + 1, month: 1 })
        } else {
            None
        }
    }

    fn time_month(self) -> Month {
        // `month` is validated on construction
        Month::try_from(self.month).unwrap_or(Month::January)
    }

    /// Every calendar day of the month, in order.
    pub fn days(self) -> impl Iterator<Item = Date> {
        let month = self.time_month();
        let year = self.year as i32;
        let n = time::util::days_in_year_month(year, month);
        (1..=n).filter_map(move |d| Date::from_calendar_date(year, month, d).ok())
    }

    /// True if dumps can exist for this month at all.
    pub fn is_available(self) -> bool {
        self >= FIRST_AVAILABLE
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<_> = s.trim().split('-').collect();
        if parts.len() != 2 {
            return Err("expected YYYY-MM".into());
        }
        let year: u16 = parts[0].parse().map_err(|_| "invalid year")?;
        let month: u8 = parts[1].parse().map_err(|_| "invalid month")?;
        if !(1..=12).contains(&month) {
            return Err("month must be 01..12".into());
        }
        Ok(Self { year, month })
    }
}

/// Inclusive iteration from `start` to `end`. A reversed range is swapped.
pub fn iter_year_months(start: YearMonth, end: YearMonth) -> impl Iterator<Item = YearMonth> {
    let (start, end) = if start <= end { (start, end) } else { (end, start) };
    let mut curr = Some(start);
    std::iter::from_fn(move || {
        let ret = curr?;
        curr = ret.next().filter(|n| *n <= end);
        Some(ret)
    })
}

/// UTC calendar day of an epoch-seconds timestamp. Midnight belongs to the day it starts.
pub fn day_of(created_utc: i64) -> Result<Date> {
    OffsetDateTime::from_unix_timestamp(created_utc)
        .map(|dt| dt.date())
        .map_err(|e| anyhow!("created_utc {created_utc} out of range: {e}"))
}

/// Format a duration as zero-padded `HH:MM:SS` for operator logs.
pub fn format_elapsed(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
