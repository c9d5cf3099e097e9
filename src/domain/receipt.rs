use crate::domain::payout::PayoutBreakdown;
use crate::domain::sequence::SequenceNumber;
use crate::domain::session::{MentorId, SessionId};
use crate::error::{PayoutError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ReceiptId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Draft,
    Sent,
    Paid,
}

/// Aggregate figures for a receipt, summed component-wise from the member
/// sessions' stored breakdowns at generation time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReceiptTotals {
    pub total_sessions: u32,
    pub total_duration_minutes: i64,
    pub breakdown: PayoutBreakdown,
}

/// An aggregation of one mentor's approved sessions over a date range.
///
/// Lifecycle is one-way: `draft -> sent -> paid`. Only a draft may be
/// edited or deleted; once sent, the data is frozen for rendering and the
/// only remaining mutation is the payment transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub number: SequenceNumber,
    pub mentor: MentorId,
    /// Member sessions, by reference, in aggregation order.
    pub sessions: Vec<SessionId>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub totals: ReceiptTotals,
    pub status: ReceiptStatus,
    pub notes: Option<String>,
    pub payment_reference: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub issued_at: DateTime<Utc>,
    /// Optimistic-concurrency counter, bumped on every committed write.
    pub version: u64,
}

/// Whitelist of fields editable while the receipt is still a draft.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptPatch {
    pub notes: Option<String>,
}

impl Receipt {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        number: SequenceNumber,
        mentor: MentorId,
        sessions: Vec<SessionId>,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        totals: ReceiptTotals,
        notes: Option<String>,
        issued_at: DateTime<Utc>,
    ) -> Result<Self> {
        if end_date < start_date {
            return Err(PayoutError::InvalidInput(format!(
                "receipt end date {end_date} precedes start date {start_date}"
            )));
        }
        if sessions.is_empty() {
            return Err(PayoutError::InvalidInput(
                "a receipt must reference at least one session".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            number,
            mentor,
            sessions,
            start_date,
            end_date,
            totals,
            status: ReceiptStatus::Draft,
            notes,
            payment_reference: None,
            payment_date: None,
            issued_at,
            version: 0,
        })
    }

    pub fn is_editable(&self) -> bool {
        self.status == ReceiptStatus::Draft
    }

    /// `draft -> sent`.
    pub fn send(&mut self) -> Result<()> {
        if self.status != ReceiptStatus::Draft {
            return Err(PayoutError::InvalidTransition(format!(
                "receipt {} is {:?}, only drafts can be sent",
                self.number, self.status
            )));
        }
        self.status = ReceiptStatus::Sent;
        Ok(())
    }

    /// `sent -> paid`, recording the external payment acknowledgment.
    pub fn mark_paid(&mut self, reference: &str, payment_date: DateTime<Utc>) -> Result<()> {
        if self.status != ReceiptStatus::Sent {
            return Err(PayoutError::InvalidTransition(format!(
                "receipt {} is {:?}, only sent receipts can be marked paid",
                self.number, self.status
            )));
        }
        if reference.trim().is_empty() {
            return Err(PayoutError::InvalidInput(
                "a payment reference is required".to_string(),
            ));
        }
        self.status = ReceiptStatus::Paid;
        self.payment_reference = Some(reference.trim().to_string());
        self.payment_date = Some(payment_date);
        Ok(())
    }

    pub fn apply(&mut self, patch: ReceiptPatch) -> Result<()> {
        if !self.is_editable() {
            return Err(PayoutError::InvalidState(format!(
                "receipt {} is {:?} and can no longer be edited",
                self.number, self.status
            )));
        }
        if let Some(notes) = patch.notes {
            self.notes = Some(notes);
        }
        Ok(())
    }
}
