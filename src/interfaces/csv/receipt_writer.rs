use crate::domain::receipt::{Receipt, ReceiptStatus};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// One receipt summary row for CSV output.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptRow {
    pub receipt_number: String,
    pub mentor: String,
    pub sessions: u32,
    pub duration_minutes: i64,
    pub base_payout: Decimal,
    pub platform_fee: Decimal,
    pub taxes: Decimal,
    pub final_payout: Decimal,
    pub status: ReceiptStatus,
}

impl ReceiptRow {
    /// Flattens a receipt for output, labelling the mentor with a
    /// caller-chosen name.
    pub fn from_receipt(receipt: &Receipt, mentor: impl Into<String>) -> Self {
        let breakdown = receipt.totals.breakdown;
        Self {
            receipt_number: receipt.number.to_string(),
            mentor: mentor.into(),
            sessions: receipt.totals.total_sessions,
            duration_minutes: receipt.totals.total_duration_minutes,
            base_payout: breakdown.base_payout.amount(),
            platform_fee: breakdown.platform_fee.amount(),
            taxes: breakdown.taxes.amount(),
            final_payout: breakdown.final_payout.amount(),
            status: receipt.status,
        }
    }
}

/// Writes receipt summaries as CSV to any `Write` sink.
pub struct ReceiptWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReceiptWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_rows(&mut self, rows: &[ReceiptRow]) -> Result<()> {
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
