//! Canonical earth date used both as the upstream `earth_date` query value
//! and as the name of the on-disk directory holding that date's photos.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const CANONICAL_FORMAT: &str = "%Y-%m-%d";

/// Date layouts accepted in addition to RFC 3339 timestamps.
const ACCEPTED_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%B %d, %Y"];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("`{0}` is not a valid earth date")]
pub struct InvalidDate(pub String);

/// A validated UTC calendar date.
///
/// Always renders as zero-padded `YYYY-MM-DD`, so one key maps to exactly
/// one storage directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey(NaiveDate);

impl RequestKey {
    /// Parse a raw, user-supplied date.
    ///
    /// Timestamps carrying an offset are normalised to UTC before the
    /// calendar date is taken.
    pub fn parse(raw: &str) -> Result<Self, InvalidDate> {
        let trimmed = raw.trim();
        let invalid = || InvalidDate(raw.to_string());
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let date = ACCEPTED_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
            .or_else(|| {
                DateTime::parse_from_rfc3339(trimmed)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc).date_naive())
            })
            .ok_or_else(invalid)?;

        Self::from_date(date).ok_or_else(invalid)
    }

    /// Wrap an already-known date. Years that cannot be written as four
    /// digits are rejected.
    pub fn from_date(date: NaiveDate) -> Option<Self> {
        (0..=9999).contains(&date.year()).then_some(Self(date))
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CANONICAL_FORMAT))
    }
}

impl Serialize for RequestKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
