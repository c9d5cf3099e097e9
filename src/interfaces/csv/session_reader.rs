use crate::domain::session::SessionKind;
use crate::error::{PayoutError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One session row from a batch-entry CSV file.
///
/// `mentor` is a caller-chosen label; the CLI maps labels to mentor ids.
/// Timestamps are RFC 3339.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionRecord {
    pub mentor: String,
    pub kind: SessionKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub rate: Decimal,
    pub adjusted_rate: Option<Decimal>,
    pub notes: Option<String>,
}

/// Reads session records from a CSV source.
///
/// Wraps `csv::Reader` and provides an iterator over `Result<SessionRecord>`,
/// trimming whitespace and tolerating flexible record lengths so one bad row
/// doesn't abort the stream.
pub struct SessionReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> SessionReader<R> {
    /// Creates a new `SessionReader` from any `Read` source (e.g. File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes records.
    pub fn records(self) -> impl Iterator<Item = Result<SessionRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PayoutError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "\
mentor, kind, start_time, end_time, rate, adjusted_rate, notes
ada, live, 2025-05-10T09:00:00Z, 2025-05-10T10:30:00Z, 1000, , intro call
ada, evaluation, 2025-05-11T09:00:00Z, 2025-05-11T09:45:00Z, 1000, 1200, ";
        let reader = SessionReader::new(data.as_bytes());
        let records: Vec<Result<SessionRecord>> = reader.records().collect();

        assert_eq!(records.len(), 2);
        let first = records[0].as_ref().unwrap();
        assert_eq!(first.mentor, "ada");
        assert_eq!(first.kind, SessionKind::Live);
        assert_eq!(first.rate, dec!(1000));
        assert_eq!(first.adjusted_rate, None);
        assert_eq!(first.notes.as_deref(), Some("intro call"));

        let second = records[1].as_ref().unwrap();
        assert_eq!(second.kind, SessionKind::Evaluation);
        assert_eq!(second.adjusted_rate, Some(dec!(1200)));
    }

    #[test]
    fn test_reader_malformed_row() {
        let data = "\
mentor, kind, start_time, end_time, rate, adjusted_rate, notes
ada, live, not-a-date, 2025-05-10T10:30:00Z, 1000, , ";
        let reader = SessionReader::new(data.as_bytes());
        let records: Vec<Result<SessionRecord>> = reader.records().collect();

        assert!(records[0].is_err());
    }
}
