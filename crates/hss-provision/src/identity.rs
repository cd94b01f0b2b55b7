//! Subscriber identifiers.
//!
//! - [`Imsi`] - fixed-width 15 digit identifier, numeric ordering, leading
//!   zeros preserved on every render.
//! - [`Msisdn`] - variable-width digit string (the subscriber's number).
//! - [`SubscriberId`] - surrogate key assigned by the store.
//! - [`SubscriberKey`] - either of the above, as accepted by lookups.

use crate::error::{Error, Result};
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// Number of digits in an IMSI.
pub const IMSI_LEN: usize = 15;

/// Largest MSISDN (in digits) the range arithmetic can represent.
pub const MSISDN_MAX_LEN: usize = 38;

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// International Mobile Subscriber Identity.
///
/// Held as its numeric value. Every 15 digit string maps to a distinct value
/// below `10^15`, so the fixed-width rendering is lossless and `Ord` on the
/// value matches both numeric and lexicographic order of the strings.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Imsi(u64);

impl Imsi {
    /// `999999999999999`
    pub const MAX: Self = Self(999_999_999_999_999);

    /// Parses `raw`, attributing failures to `field`.
    pub fn parse_as(field: &str, raw: &str) -> Result<Self> {
        if raw.len() != IMSI_LEN {
            return Err(Error::validation(
                field,
                format!("IMSI must be exactly {IMSI_LEN} digits (got {})", raw.len()),
            ));
        }
        if !all_digits(raw) {
            return Err(Error::validation(field, "IMSI must contain only digits"));
        }
        // 15 ASCII digits always fit in a u64.
        let value = raw
            .parse::<u64>()
            .unwrap_or_else(|e| unreachable!("15 digits overflowed u64: {e}"));
        Ok(Self(value))
    }

    /// Builds an IMSI from its numeric value, if it fits in 15 digits.
    pub const fn from_value(value: u64) -> Option<Self> {
        if value <= Self::MAX.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns `self + offset`, or `None` when the result leaves the 15 digit
    /// space.
    pub fn checked_add(self, offset: u64) -> Option<Self> {
        self.0.checked_add(offset).and_then(Self::from_value)
    }

    /// Mobile country code (first three digits).
    pub fn mcc(&self) -> String {
        self.to_string()[..3].to_string()
    }
}

impl fmt::Display for Imsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:015}", self.0)
    }
}

impl FromStr for Imsi {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_as("imsi", s)
    }
}

impl TryFrom<String> for Imsi {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Imsi> for String {
    fn from(imsi: Imsi) -> Self {
        imsi.to_string()
    }
}

/// Subscriber telephone number: one or more decimal digits.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Msisdn(String);

impl Msisdn {
    /// Parses `raw`, attributing failures to `field`.
    pub fn parse_as(field: &str, raw: &str) -> Result<Self> {
        if !all_digits(raw) {
            return Err(Error::validation(
                field,
                "MSISDN must be a non-empty string of digits",
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value for range arithmetic, or `None` when the number has
    /// more digits than [`MSISDN_MAX_LEN`].
    pub(crate) fn numeric(&self) -> Option<u128> {
        if self.0.len() > MSISDN_MAX_LEN {
            return None;
        }
        self.0.parse().ok()
    }

    /// Renders `value` with at least `width` digits.
    pub(crate) fn from_numeric(value: u128, width: usize) -> Self {
        Self(format!("{value:0width$}"))
    }
}

impl fmt::Display for Msisdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Msisdn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_as("msisdn", s)
    }
}

impl TryFrom<String> for Msisdn {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Msisdn> for String {
    fn from(msisdn: Msisdn) -> Self {
        msisdn.0
    }
}

/// Surrogate key assigned by the store when a subscriber is first persisted.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lookup key accepted by read, update and delete paths.
///
/// Callers may pass either the surrogate id or the IMSI. Ids are 24 hex
/// characters and IMSIs are 15 digits, so a raw key is never ambiguous.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SubscriberKey {
    Id(SubscriberId),
    Imsi(Imsi),
}

impl SubscriberKey {
    pub fn parse(raw: &str) -> Self {
        match Imsi::parse_as("key", raw) {
            Ok(imsi) => Self::Imsi(imsi),
            Err(_) => Self::Id(SubscriberId::new(raw)),
        }
    }
}

impl fmt::Display for SubscriberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Imsi(imsi) => write!(f, "{imsi}"),
        }
    }
}

impl From<Imsi> for SubscriberKey {
    fn from(imsi: Imsi) -> Self {
        Self::Imsi(imsi)
    }
}

impl From<SubscriberId> for SubscriberKey {
    fn from(id: SubscriberId) -> Self {
        Self::Id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imsi_keeps_leading_zeros() {
        let imsi: Imsi = "001010000000001".parse().unwrap();
        assert_eq!(imsi.value(), 1_010_000_000_001);
        assert_eq!(imsi.to_string(), "001010000000001");
        assert_eq!(imsi.mcc(), "001");
    }

    #[test]
    fn imsi_rejects_bad_input() {
        for raw in ["", "00101000000000", "0010100000000011", "00101000000000a", "+01010000000001"] {
            let err = Imsi::parse_as("imsi_start", raw).unwrap_err();
            assert_eq!(err.field(), Some("imsi_start"), "input {raw:?}");
        }
    }

    #[test]
    fn imsi_checked_add_stops_at_fifteen_digits() {
        let top: Imsi = "999999999999998".parse().unwrap();
        assert_eq!(top.checked_add(1), Some(Imsi::MAX));
        assert_eq!(top.checked_add(2), None);
    }

    #[test]
    fn imsi_serde_uses_padded_string() {
        let imsi: Imsi = "000000000000042".parse().unwrap();
        let json = serde_json::to_string(&imsi).unwrap();
        assert_eq!(json, "\"000000000000042\"");
        assert!(serde_json::from_str::<Imsi>("42").is_err());
        assert!(serde_json::from_str::<Imsi>("\"42\"").is_err());
    }

    #[test]
    fn msisdn_requires_digits() {
        assert!("4915112345678".parse::<Msisdn>().is_ok());
        assert!("".parse::<Msisdn>().is_err());
        assert!("+4915112345678".parse::<Msisdn>().is_err());
    }

    #[test]
    fn key_parses_imsi_or_id() {
        assert_eq!(
            SubscriberKey::parse("001010000000001"),
            SubscriberKey::Imsi("001010000000001".parse().unwrap())
        );
        assert_eq!(
            SubscriberKey::parse("65f1c0de0000000000000001"),
            SubscriberKey::Id(SubscriberId::new("65f1c0de0000000000000001"))
        );
    }
}
