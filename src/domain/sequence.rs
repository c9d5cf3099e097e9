use crate::error::{PayoutError, Result};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Distinguishes the independent numbering streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequencePrefix {
    /// Receipt numbers: `RCP-YY-MM-NNNN`.
    Receipt,
    /// Payout numbers: `PAY-YY-MM-NNNN`.
    Payout,
}

impl SequencePrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receipt => "RCP",
            Self::Payout => "PAY",
        }
    }
}

impl fmt::Display for SequencePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `YY-MM` period a counter is scoped to. Counters for different
/// periods are independent and each starts at 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodKey(String);

impl PeriodKey {
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(format!("{:02}-{:02}", at.year() % 100, at.month()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A formatted human-readable identifier, e.g. `RCP-25-05-0001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceNumber(String);

impl SequenceNumber {
    /// Formats an allocated counter value. `NNNN` is zero-padded to four
    /// digits and grows naturally past 9999.
    pub fn format(prefix: SequencePrefix, period: &PeriodKey, seq: u32) -> Self {
        Self(format!("{}-{}-{:04}", prefix.as_str(), period.as_str(), seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SequenceNumber {
    type Err = PayoutError;

    /// Validates the `PREFIX-YY-MM-NNNN` shape without re-deriving any part.
    fn from_str(s: &str) -> Result<Self> {
        let malformed = || PayoutError::InvalidInput(format!("malformed sequence number: {s}"));

        let (prefix, rest) = s.split_once('-').ok_or_else(malformed)?;
        if prefix != SequencePrefix::Receipt.as_str() && prefix != SequencePrefix::Payout.as_str() {
            return Err(malformed());
        }
        let parts: Vec<&str> = rest.splitn(3, '-').collect();
        let &[yy, mm, seq] = parts.as_slice() else {
            return Err(malformed());
        };
        if yy.len() != 2 || mm.len() != 2 || seq.len() < 4 {
            return Err(malformed());
        }
        yy.parse::<u8>().map_err(|_| malformed())?;
        let month = mm.parse::<u8>().map_err(|_| malformed())?;
        if !(1..=12).contains(&month) {
            return Err(malformed());
        }
        seq.parse::<u32>().map_err(|_| malformed())?;

        Ok(Self(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_period_key_format() {
        let at = Utc.with_ymd_and_hms(2025, 5, 17, 12, 0, 0).unwrap();
        assert_eq!(PeriodKey::from_datetime(at).as_str(), "25-05");

        let at = Utc.with_ymd_and_hms(2031, 11, 1, 0, 0, 0).unwrap();
        assert_eq!(PeriodKey::from_datetime(at).as_str(), "31-11");
    }

    #[test]
    fn test_number_format() {
        let period = PeriodKey::from_datetime(Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap());
        let n = SequenceNumber::format(SequencePrefix::Receipt, &period, 1);
        assert_eq!(n.as_str(), "RCP-25-05-0001");

        let n = SequenceNumber::format(SequencePrefix::Payout, &period, 12345);
        assert_eq!(n.as_str(), "PAY-25-05-12345");
    }

    #[test]
    fn test_parse_round_trip() {
        for raw in ["RCP-25-05-0001", "PAY-31-12-10000"] {
            let parsed: SequenceNumber = raw.parse().unwrap();
            assert_eq!(parsed.as_str(), raw);
        }
        for bad in ["RCP-25-05", "XXX-25-05-0001", "RCP-25-13-0001", "RCP-25-05-01"] {
            assert!(bad.parse::<SequenceNumber>().is_err(), "{bad}");
        }
    }
}
