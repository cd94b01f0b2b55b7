//! IMSI range expansion.
//!
//! Turns a start IMSI plus either a count or an end IMSI into an ordered,
//! zero-padded sequence of identifiers, optionally paired with a sequential
//! MSISDN at the same offset.
//!
//! ## Bounds
//!
//! - A range holds between 1 and [`MAX_BATCH_SIZE`] identifiers.
//! - With an end IMSI, `end` must be strictly greater than `start`.
//! - The range may not run past `999999999999999`.
//!
//! All arithmetic is integer arithmetic on the numeric value; every IMSI is
//! re-rendered at 15 digits so leading zeros survive.
//!
//! ## Example
//!
//! ```
//! use hss_provision::{Imsi, RangeBound, expand_range};
//!
//! let start: Imsi = "001010000000001".parse().unwrap();
//! let range = expand_range(start, RangeBound::Count(3), None).unwrap();
//! let imsis: Vec<String> = range.imsis().iter().map(Imsi::to_string).collect();
//! assert_eq!(imsis, ["001010000000001", "001010000000002", "001010000000003"]);
//! ```

use crate::error::{Error, Result};
use crate::identity::{Imsi, Msisdn};
use core::iter::FusedIterator;
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

/// Hard ceiling on the number of identifiers in one range.
pub const MAX_BATCH_SIZE: u64 = 1000;

/// Number of entries materialized by [`ImsiRange::preview`].
pub const PREVIEW_LEN: usize = 10;

/// How far a range extends from its start.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RangeBound {
    /// Number of identifiers, including the start. Signed so that zero and
    /// negative counts from callers are reported rather than wrapped.
    Count(i64),
    /// Last identifier, inclusive.
    End(Imsi),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct MsisdnBase {
    value: u128,
    width: usize,
}

/// One allocated position of a range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeEntry {
    pub offset: u64,
    pub imsi: Imsi,
    pub msisdn: Option<Msisdn>,
}

/// A validated, lazily expanded IMSI range.
///
/// Iterating yields entries in increasing IMSI order. The range is `Clone`
/// and [`restart`](Self::restart)able; nothing beyond the current position is
/// computed until asked for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImsiRange {
    start: Imsi,
    total: u64,
    msisdn: Option<MsisdnBase>,
    cursor: u64,
}

/// Expands `start` by `bound`, pairing MSISDNs from `start_msisdn` when given.
///
/// # Errors
///
/// Returns [`Error::Validation`] naming `count`, `imsi_end` or `msisdn_start`
/// when the range is empty, exceeds [`MAX_BATCH_SIZE`], runs out of the 15
/// digit space, or the MSISDN is too long for range arithmetic.
pub fn expand_range(start: Imsi, bound: RangeBound, start_msisdn: Option<&Msisdn>) -> Result<ImsiRange> {
    let total = match bound {
        RangeBound::Count(count) => {
            if count <= 0 {
                return Err(Error::validation(
                    "count",
                    format!("count must be at least 1 (got {count})"),
                ));
            }
            let count = count as u64;
            if count > MAX_BATCH_SIZE {
                return Err(Error::validation(
                    "count",
                    format!("count {count} exceeds maximum allowed ({MAX_BATCH_SIZE})"),
                ));
            }
            if start.checked_add(count - 1).is_none() {
                return Err(Error::validation(
                    "count",
                    format!("range of {count} starting at {start} overflows 15 digits"),
                ));
            }
            count
        }
        RangeBound::End(end) => {
            if end <= start {
                return Err(Error::validation(
                    "imsi_end",
                    format!("imsi_end {end} must be greater than imsi_start {start}"),
                ));
            }
            let total = end.value() - start.value() + 1;
            if total > MAX_BATCH_SIZE {
                return Err(Error::validation(
                    "imsi_end",
                    format!("range of {total} exceeds maximum allowed ({MAX_BATCH_SIZE})"),
                ));
            }
            total
        }
    };

    let msisdn = start_msisdn
        .map(|m| {
            let value = m
                .numeric()
                .and_then(|v| v.checked_add(u128::from(total - 1)).map(|_| v))
                .ok_or_else(|| {
                    Error::validation(
                        "msisdn_start",
                        "MSISDN is too long to allocate a range from",
                    )
                })?;
            Ok::<_, Error>(MsisdnBase {
                value,
                width: m.as_str().len(),
            })
        })
        .transpose()?;

    tracing::trace!(%start, total, paired = msisdn.is_some(), "expanded range");

    Ok(ImsiRange {
        start,
        total,
        msisdn,
        cursor: 0,
    })
}

impl ImsiRange {
    pub const fn start(&self) -> Imsi {
        self.start
    }

    /// Last IMSI of the range (inclusive).
    pub fn end(&self) -> Imsi {
        self.imsi_at(self.total - 1)
    }

    /// Number of identifiers in the whole range, regardless of position.
    pub const fn total(&self) -> u64 {
        self.total
    }

    pub const fn has_msisdn(&self) -> bool {
        self.msisdn.is_some()
    }

    /// A copy positioned back at the first entry.
    #[must_use]
    pub fn restart(&self) -> Self {
        Self {
            cursor: 0,
            ..self.clone()
        }
    }

    /// Entry at `offset`, or `None` past the end.
    pub fn get(&self, offset: u64) -> Option<RangeEntry> {
        (offset < self.total).then(|| RangeEntry {
            offset,
            imsi: self.imsi_at(offset),
            msisdn: self
                .msisdn
                .map(|base| Msisdn::from_numeric(base.value + u128::from(offset), base.width)),
        })
    }

    fn imsi_at(&self, offset: u64) -> Imsi {
        // Bounds were checked when the range was built.
        self.start
            .checked_add(offset)
            .unwrap_or_else(|| unreachable!("offset {offset} escaped range of {}", self.total))
    }

    /// Every entry of the range, from the start.
    pub fn collect_all(&self) -> Vec<RangeEntry> {
        self.restart().collect()
    }

    /// Every IMSI of the range, from the start.
    pub fn imsis(&self) -> Vec<Imsi> {
        (0..self.total).map(|offset| self.imsi_at(offset)).collect()
    }

    /// Every MSISDN of the range when the range is paired.
    pub fn msisdns(&self) -> Option<Vec<Msisdn>> {
        self.msisdn.map(|_| {
            self.restart()
                .filter_map(|entry| entry.msisdn)
                .collect()
        })
    }

    /// First `min(total, PREVIEW_LEN)` entries plus the range summary.
    pub fn preview(&self) -> RangePreview {
        let head: Vec<RangeEntry> = self.restart().take(PREVIEW_LEN).collect();
        RangePreview {
            count: self.total,
            imsi_start: self.start,
            imsi_end: self.end(),
            imsis: head.iter().map(|e| e.imsi).collect(),
            msisdns: self
                .msisdn
                .map(|_| head.into_iter().filter_map(|e| e.msisdn).collect()),
        }
    }
}

impl Iterator for ImsiRange {
    type Item = RangeEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.get(self.cursor)?;
        self.cursor += 1;
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.total - self.cursor) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for ImsiRange {}

impl FusedIterator for ImsiRange {}

/// Summary of a range with its first entries materialized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangePreview {
    pub count: u64,
    pub imsi_start: Imsi,
    pub imsi_end: Imsi,
    pub imsis: Vec<Imsi>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msisdns: Option<Vec<Msisdn>>,
}

/// Raw range parameters as they arrive from a caller.
///
/// Exactly one of `count` and `imsi_end` must be present.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRequest {
    pub imsi_start: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imsi_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msisdn_start: Option<String>,
}

impl RangeRequest {
    pub fn with_count(imsi_start: impl Into<String>, count: i64) -> Self {
        Self {
            imsi_start: imsi_start.into(),
            count: Some(count),
            ..Default::default()
        }
    }

    pub fn with_end(imsi_start: impl Into<String>, imsi_end: impl Into<String>) -> Self {
        Self {
            imsi_start: imsi_start.into(),
            imsi_end: Some(imsi_end.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn msisdn_start(mut self, msisdn: impl Into<String>) -> Self {
        self.msisdn_start = Some(msisdn.into());
        self
    }

    /// Parses every field and expands the range.
    pub fn expand(&self) -> Result<ImsiRange> {
        let start = Imsi::parse_as("imsi_start", &self.imsi_start)?;
        let bound = match (self.count, self.imsi_end.as_deref()) {
            (Some(count), None) => RangeBound::Count(count),
            (None, Some(end)) => RangeBound::End(Imsi::parse_as("imsi_end", end)?),
            (Some(_), Some(_)) => {
                return Err(Error::validation(
                    "count",
                    "provide either count or imsi_end, not both",
                ));
            }
            (None, None) => {
                return Err(Error::validation(
                    "count",
                    "either count or imsi_end is required",
                ));
            }
        };
        let msisdn = self
            .msisdn_start
            .as_deref()
            .map(|raw| Msisdn::parse_as("msisdn_start", raw))
            .transpose()?;
        expand_range(start, bound, msisdn.as_ref())
    }
}
