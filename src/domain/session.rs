use crate::domain::actor::ActorId;
use crate::domain::money::Money;
use crate::domain::payout::PayoutBreakdown;
use crate::domain::receipt::ReceiptId;
use crate::error::{PayoutError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type SessionId = Uuid;
pub type MentorId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Approved,
    Rejected,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Live,
    Evaluation,
    RecordingReview,
}

/// A unit of billable mentoring work.
///
/// Created in `pending` by a mentor; an admin approves or rejects it.
/// Approval locks in the payout breakdown at the rate in force at that
/// moment. `paid` is reachable only through the owning receipt's payment
/// cascade. A rejected session stays editable but never returns to
/// `pending`; resubmission means creating a new session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub mentor: MentorId,
    pub kind: SessionKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Derived from the time window, in whole minutes.
    pub duration_minutes: i64,
    /// Copied from the mentor's profile at creation; never changed afterwards.
    pub base_rate: Money,
    pub adjusted_rate: Option<Money>,
    pub status: SessionStatus,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub approved_by: Option<ActorId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    /// Populated on approval; reset only by an explicit re-approval flow.
    pub payout: Option<PayoutBreakdown>,
    /// The receipt currently claiming this session, if any.
    pub receipt: Option<ReceiptId>,
    /// Optimistic-concurrency counter, bumped on every committed write.
    pub version: u64,
}

/// Whitelist of fields a mentor may change while the session is editable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionPatch {
    pub kind: Option<SessionKind>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub adjusted_rate: Option<Money>,
    pub notes: Option<String>,
}

impl Session {
    pub fn new(
        mentor: MentorId,
        kind: SessionKind,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        base_rate: Money,
        adjusted_rate: Option<Money>,
        notes: Option<String>,
    ) -> Result<Self> {
        let duration_minutes = duration_between(start_time, end_time)?;
        if !base_rate.is_positive() {
            return Err(PayoutError::InvalidInput(format!(
                "base rate must be positive, got {base_rate}"
            )));
        }
        if let Some(rate) = adjusted_rate {
            validate_adjusted_rate(rate, base_rate)?;
        }

        Ok(Self {
            id: Uuid::new_v4(),
            mentor,
            kind,
            start_time,
            end_time,
            duration_minutes,
            base_rate,
            adjusted_rate,
            status: SessionStatus::Pending,
            notes,
            rejection_reason: None,
            approved_by: None,
            approved_at: None,
            paid_at: None,
            payment_reference: None,
            payout: None,
            receipt: None,
            version: 0,
        })
    }

    /// The rate payouts are computed from: the override when present,
    /// otherwise the rate locked in at creation.
    pub fn effective_rate(&self) -> Money {
        self.adjusted_rate.unwrap_or(self.base_rate)
    }

    /// Sessions stay editable while `pending` or `rejected` and freeze once
    /// they enter the payout pipeline.
    pub fn can_edit(&self) -> bool {
        matches!(self.status, SessionStatus::Pending | SessionStatus::Rejected)
    }

    /// Applies a whitelisted patch, recomputing the duration when the time
    /// window moves.
    pub fn apply(&mut self, patch: SessionPatch) -> Result<()> {
        if !self.can_edit() {
            return Err(PayoutError::InvalidState(format!(
                "session {} is {:?} and can no longer be edited",
                self.id, self.status
            )));
        }

        let start_time = patch.start_time.unwrap_or(self.start_time);
        let end_time = patch.end_time.unwrap_or(self.end_time);
        let duration_minutes = duration_between(start_time, end_time)?;

        if let Some(rate) = patch.adjusted_rate {
            validate_adjusted_rate(rate, self.base_rate)?;
            self.adjusted_rate = Some(rate);
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(notes) = patch.notes {
            self.notes = Some(notes);
        }
        self.start_time = start_time;
        self.end_time = end_time;
        self.duration_minutes = duration_minutes;
        Ok(())
    }

    /// `pending -> approved`, locking in the computed breakdown.
    pub fn approve(
        &mut self,
        approver: ActorId,
        payout: PayoutBreakdown,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.status != SessionStatus::Pending {
            return Err(PayoutError::InvalidTransition(format!(
                "session {} is {:?}, only pending sessions can be approved",
                self.id, self.status
            )));
        }
        self.status = SessionStatus::Approved;
        self.payout = Some(payout);
        self.approved_by = Some(approver);
        self.approved_at = Some(now);
        Ok(())
    }

    /// `pending -> rejected`. The reason is mandatory and kept for audit.
    pub fn reject(&mut self, reason: &str) -> Result<()> {
        if self.status != SessionStatus::Pending {
            return Err(PayoutError::InvalidTransition(format!(
                "session {} is {:?}, only pending sessions can be rejected",
                self.id, self.status
            )));
        }
        if reason.trim().is_empty() {
            return Err(PayoutError::InvalidInput(
                "a rejection reason is required".to_string(),
            ));
        }
        self.status = SessionStatus::Rejected;
        self.rejection_reason = Some(reason.trim().to_string());
        Ok(())
    }

    /// Attaches this session to a receipt. Only approved, unclaimed sessions
    /// can be claimed; a second claim is a conflict, not a transition error.
    pub(crate) fn claim(&mut self, receipt: ReceiptId) -> Result<()> {
        if self.status != SessionStatus::Approved {
            return Err(PayoutError::InvalidTransition(format!(
                "session {} is {:?} and cannot be attached to a receipt",
                self.id, self.status
            )));
        }
        if let Some(existing) = self.receipt {
            return Err(PayoutError::Conflict(format!(
                "session {} is already claimed by receipt {existing}",
                self.id
            )));
        }
        self.receipt = Some(receipt);
        Ok(())
    }

    /// Detaches this session when its draft receipt is deleted.
    pub(crate) fn release(&mut self, receipt: ReceiptId) -> Result<()> {
        if self.receipt != Some(receipt) {
            return Err(PayoutError::Conflict(format!(
                "session {} is not claimed by receipt {receipt}",
                self.id
            )));
        }
        self.receipt = None;
        Ok(())
    }

    /// `approved -> paid`. Crate-private: reachable only through the owning
    /// receipt's payment cascade, never as a direct external call.
    pub(crate) fn mark_paid(&mut self, reference: &str, now: DateTime<Utc>) -> Result<()> {
        if self.status != SessionStatus::Approved {
            return Err(PayoutError::InvalidTransition(format!(
                "session {} is {:?}, only approved sessions can be paid",
                self.id, self.status
            )));
        }
        self.status = SessionStatus::Paid;
        self.payment_reference = Some(reference.to_string());
        self.paid_at = Some(now);
        Ok(())
    }
}

fn duration_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64> {
    if end <= start {
        return Err(PayoutError::InvalidInput(format!(
            "session end {end} must be after start {start}"
        )));
    }
    let minutes = (end - start).num_minutes();
    if minutes < 1 {
        return Err(PayoutError::InvalidInput(
            "session must span at least one minute".to_string(),
        ));
    }
    Ok(minutes)
}

fn validate_adjusted_rate(rate: Money, base_rate: Money) -> Result<()> {
    if !rate.is_positive() {
        return Err(PayoutError::InvalidInput(format!(
            "adjusted rate must be positive, got {rate}"
        )));
    }
    if rate.currency() != base_rate.currency() {
        return Err(PayoutError::InvalidInput(format!(
            "adjusted rate currency {} does not match base rate currency {}",
            rate.currency(),
            base_rate.currency()
        )));
    }
    Ok(())
}
