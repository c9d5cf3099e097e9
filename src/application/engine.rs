use crate::domain::actor::Actor;
use crate::domain::audit::{AuditAction, AuditLogEntry, EntityKind, FieldChange};
use crate::domain::money::{Currency, Money};
use crate::domain::payout::{PayoutBreakdown, PayoutPolicy};
use crate::domain::ports::{
    NoopNotifier, NotifierBox, PayoutStoreBox, ReceiptFilter, SessionFilter, WriteBatch,
};
use crate::domain::receipt::{Receipt, ReceiptId, ReceiptPatch, ReceiptStatus, ReceiptTotals};
use crate::domain::sequence::{PeriodKey, SequenceNumber, SequencePrefix};
use crate::domain::session::{
    MentorId, Session, SessionId, SessionKind, SessionPatch, SessionStatus,
};
use crate::error::{PayoutError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

/// Engine-wide settings: the fee/tax policy and the single currency all
/// rates and payouts are denominated in.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayoutConfig {
    pub policy: PayoutPolicy,
    pub currency: Currency,
}

/// Input for session creation. The hourly rate is the mentor's current
/// profile rate, supplied by the caller; it is copied onto the session and
/// frozen there so later profile changes never rewrite history.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub mentor: MentorId,
    pub kind: SessionKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub hourly_rate: Decimal,
    pub adjusted_rate: Option<Decimal>,
    pub notes: Option<String>,
}

/// Read-only preview of what a receipt over the range would contain.
#[derive(Debug, Clone, Serialize)]
pub struct PayoutPreview {
    pub total_sessions: u32,
    pub total_duration_minutes: i64,
    pub breakdown: PayoutBreakdown,
    pub sessions: Vec<SessionId>,
}

/// Rolled-up figures across paid receipts.
#[derive(Debug, Clone, Serialize)]
pub struct PayoutSummary {
    pub total_receipts: u32,
    pub total_sessions: u32,
    pub total_duration_minutes: i64,
    pub breakdown: PayoutBreakdown,
}

/// Filter for [`PayoutEngine::payout_summary`].
#[derive(Debug, Clone, Default)]
pub struct SummaryFilter {
    pub mentor: Option<MentorId>,
    pub paid_from: Option<DateTime<Utc>>,
    pub paid_to: Option<DateTime<Utc>>,
}

/// The payout & receipt lifecycle engine.
///
/// Owns the storage backend and drives every mutation through a single
/// transactional commit that carries the matching audit entries, so no
/// state change can land without its history record.
pub struct PayoutEngine {
    store: PayoutStoreBox,
    notifier: NotifierBox,
    config: PayoutConfig,
}

impl PayoutEngine {
    pub fn new(store: PayoutStoreBox, config: PayoutConfig) -> Self {
        Self::with_notifier(store, Box::new(NoopNotifier), config)
    }

    pub fn with_notifier(store: PayoutStoreBox, notifier: NotifierBox, config: PayoutConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &PayoutConfig {
        &self.config
    }

    // ----- sessions -------------------------------------------------------

    /// Records a new session in `pending`. Mentors may only log their own
    /// work; admins may log on behalf of any mentor.
    pub async fn create_session(&self, actor: &Actor, new: NewSession) -> Result<Session> {
        actor.require_self_or_admin(new.mentor)?;

        let base_rate = Money::new(new.hourly_rate, self.config.currency);
        let adjusted_rate = new
            .adjusted_rate
            .map(|rate| Money::new(rate, self.config.currency));
        let session = Session::new(
            new.mentor,
            new.kind,
            new.start_time,
            new.end_time,
            base_rate,
            adjusted_rate,
            new.notes,
        )?;

        let mut batch = WriteBatch::new();
        batch.insert_session(&session);
        batch.audit(AuditLogEntry::transition(
            EntityKind::Session,
            session.id,
            AuditAction::Created,
            actor.id,
            "session logged in pending",
        ));
        self.store.commit(batch).await?;

        info!(session = %session.id, mentor = %session.mentor, "session created");
        Ok(session)
    }

    /// Applies a whitelisted patch to an editable session.
    pub async fn update_session(
        &self,
        actor: &Actor,
        id: SessionId,
        patch: SessionPatch,
    ) -> Result<Session> {
        let mut session = self.load_session(id).await?;
        actor.require_self_or_admin(session.mentor)?;

        let before = session.clone();
        session.apply(patch)?;
        let changes = session_changes(&before, &session);
        if changes.is_empty() {
            return Ok(session);
        }

        let mut batch = WriteBatch::new();
        batch.update_session(&mut session);
        batch.audit(AuditLogEntry::field_update(
            EntityKind::Session,
            session.id,
            actor.id,
            changes,
        ));
        self.store.commit(batch).await?;

        info!(session = %session.id, "session updated");
        Ok(session)
    }

    /// Deletes a session that has not entered the payout pipeline.
    pub async fn delete_session(&self, actor: &Actor, id: SessionId) -> Result<()> {
        let session = self.load_session(id).await?;
        actor.require_self_or_admin(session.mentor)?;
        if !session.can_edit() {
            return Err(PayoutError::InvalidState(format!(
                "session {} is {:?} and can no longer be deleted",
                session.id, session.status
            )));
        }

        let mut batch = WriteBatch::new();
        batch.delete_session(&session);
        batch.audit(AuditLogEntry::transition(
            EntityKind::Session,
            session.id,
            AuditAction::Deleted,
            actor.id,
            format!("session deleted while {:?}", session.status),
        ));
        self.store.commit(batch).await?;

        info!(session = %session.id, "session deleted");
        Ok(())
    }

    /// Approves a pending session, locking in the payout breakdown computed
    /// from the rate in force right now.
    pub async fn approve_session(&self, actor: &Actor, id: SessionId) -> Result<Session> {
        actor.require_admin()?;
        let mut session = self.load_session(id).await?;

        let payout = self
            .config
            .policy
            .compute_session_payout(session.effective_rate(), session.duration_minutes)?;
        session.approve(actor.id, payout, Utc::now())?;

        let mut batch = WriteBatch::new();
        batch.update_session(&mut session);
        batch.audit(AuditLogEntry::transition(
            EntityKind::Session,
            session.id,
            AuditAction::Approved,
            actor.id,
            format!("approved at {}", session.effective_rate()),
        ));
        self.store.commit(batch).await?;

        info!(session = %session.id, approver = %actor.id, "session approved");
        Ok(session)
    }

    /// Rejects a pending session. Rejection is terminal: the session can be
    /// edited for reference but never revived; mentors re-submit a new one.
    pub async fn reject_session(
        &self,
        actor: &Actor,
        id: SessionId,
        reason: &str,
    ) -> Result<Session> {
        actor.require_admin()?;
        let mut session = self.load_session(id).await?;
        session.reject(reason)?;

        let mut batch = WriteBatch::new();
        batch.update_session(&mut session);
        batch.audit(AuditLogEntry::transition(
            EntityKind::Session,
            session.id,
            AuditAction::Rejected,
            actor.id,
            format!("rejected: {reason}"),
        ));
        self.store.commit(batch).await?;

        info!(session = %session.id, "session rejected");
        Ok(session)
    }

    pub async fn session(&self, actor: &Actor, id: SessionId) -> Result<Session> {
        let session = self.load_session(id).await?;
        actor.require_self_or_admin(session.mentor)?;
        Ok(session)
    }

    /// Lists sessions; mentors are always scoped to their own.
    pub async fn list_sessions(&self, actor: &Actor, mut filter: SessionFilter) -> Result<Vec<Session>> {
        if !actor.is_admin() {
            filter.mentor = Some(actor.id);
        }
        self.store.sessions(filter).await
    }

    // ----- receipts -------------------------------------------------------

    /// Read-only preview of a receipt over the range; persists nothing and
    /// allocates no number.
    pub async fn simulate_payout(
        &self,
        actor: &Actor,
        mentor: MentorId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PayoutPreview> {
        actor.require_self_or_admin(mentor)?;
        let sessions = self.eligible_sessions(mentor, start, end).await?;
        let totals = self.aggregate(&sessions)?;
        Ok(PayoutPreview {
            total_sessions: totals.total_sessions,
            total_duration_minutes: totals.total_duration_minutes,
            breakdown: totals.breakdown,
            sessions: sessions.iter().map(|s| s.id).collect(),
        })
    }

    /// Aggregates the mentor's approved, unclaimed sessions in the range
    /// into a draft receipt, claiming each member session.
    ///
    /// The eligibility check, the claims, the receipt insert and the audit
    /// entry land in one commit; a concurrent overlapping call loses the
    /// race with `Conflict`. The receipt number is allocated just before
    /// the commit, so a failed commit burns the number instead of reusing
    /// it.
    pub async fn generate_receipt(
        &self,
        actor: &Actor,
        mentor: MentorId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<Receipt> {
        actor.require_self_or_admin(mentor)?;
        if end < start {
            return Err(PayoutError::InvalidInput(format!(
                "receipt range end {end} precedes start {start}"
            )));
        }

        let mut sessions = self.eligible_sessions(mentor, start, end).await?;
        if sessions.is_empty() {
            return Err(PayoutError::NoEligibleSessions { mentor, start, end });
        }
        let totals = self.aggregate(&sessions)?;

        let issued_at = Utc::now();
        let period = PeriodKey::from_datetime(issued_at);
        let seq = self
            .store
            .next_sequence(SequencePrefix::Receipt, &period)
            .await?;
        let number = SequenceNumber::format(SequencePrefix::Receipt, &period, seq);

        let receipt = Receipt::new(
            number,
            mentor,
            sessions.iter().map(|s| s.id).collect(),
            start,
            end,
            totals,
            notes,
            issued_at,
        )?;

        let mut batch = WriteBatch::new();
        for session in &mut sessions {
            session.claim(receipt.id)?;
            batch.update_session(session);
        }
        batch.insert_receipt(&receipt);
        batch.audit(AuditLogEntry::transition(
            EntityKind::Receipt,
            receipt.id,
            AuditAction::ReceiptCreated,
            actor.id,
            format!(
                "receipt {} generated over {} sessions",
                receipt.number, receipt.totals.total_sessions
            ),
        ));
        self.store.commit(batch).await?;

        info!(
            receipt = %receipt.number,
            mentor = %mentor,
            sessions = receipt.totals.total_sessions,
            "receipt generated"
        );
        Ok(receipt)
    }

    /// `draft -> sent`, then a fire-and-forget notification. A notifier
    /// failure is logged and never rolls the transition back.
    pub async fn send_receipt(&self, actor: &Actor, id: ReceiptId) -> Result<Receipt> {
        actor.require_admin()?;
        let mut receipt = self.load_receipt(id).await?;
        receipt.send()?;

        let mut batch = WriteBatch::new();
        batch.update_receipt(&mut receipt);
        batch.audit(AuditLogEntry::transition(
            EntityKind::Receipt,
            receipt.id,
            AuditAction::Sent,
            actor.id,
            format!("receipt {} sent to mentor", receipt.number),
        ));
        self.store.commit(batch).await?;
        info!(receipt = %receipt.number, "receipt sent");

        if let Err(e) = self.notifier.receipt_sent(&receipt).await {
            warn!(receipt = %receipt.number, error = %e, "receipt notification failed");
        }
        Ok(receipt)
    }

    /// `sent -> paid`, cascading `paid` to every member session in the same
    /// commit. Either the receipt and all of its sessions transition
    /// together, or none do.
    pub async fn mark_receipt_paid(
        &self,
        actor: &Actor,
        id: ReceiptId,
        payment_reference: &str,
        payment_date: DateTime<Utc>,
    ) -> Result<Receipt> {
        actor.require_admin()?;
        let mut receipt = self.load_receipt(id).await?;
        receipt.mark_paid(payment_reference, payment_date)?;

        let reference = payment_reference.trim();
        let now = Utc::now();
        let mut batch = WriteBatch::new();
        for session_id in receipt.sessions.clone() {
            let mut session = self.load_session(session_id).await?;
            session.mark_paid(reference, now)?;
            batch.update_session(&mut session);
            batch.audit(AuditLogEntry::transition(
                EntityKind::Session,
                session.id,
                AuditAction::Paid,
                actor.id,
                format!("paid via receipt {}", receipt.number),
            ));
        }
        batch.update_receipt(&mut receipt);
        batch.audit(AuditLogEntry::transition(
            EntityKind::Receipt,
            receipt.id,
            AuditAction::Paid,
            actor.id,
            format!("receipt {} marked paid", receipt.number),
        ));
        self.store.commit(batch).await?;

        info!(receipt = %receipt.number, reference = payment_reference, "receipt paid");
        Ok(receipt)
    }

    /// Edits a draft receipt through the whitelisted patch.
    pub async fn update_receipt(
        &self,
        actor: &Actor,
        id: ReceiptId,
        patch: ReceiptPatch,
    ) -> Result<Receipt> {
        let mut receipt = self.load_receipt(id).await?;
        actor.require_self_or_admin(receipt.mentor)?;

        let old_notes = receipt.notes.clone();
        receipt.apply(patch)?;
        if receipt.notes == old_notes {
            return Ok(receipt);
        }

        let mut batch = WriteBatch::new();
        let changes = vec![FieldChange::new("notes", json(&old_notes), json(&receipt.notes))];
        batch.update_receipt(&mut receipt);
        batch.audit(AuditLogEntry::field_update(
            EntityKind::Receipt,
            receipt.id,
            actor.id,
            changes,
        ));
        self.store.commit(batch).await?;

        info!(receipt = %receipt.number, "receipt updated");
        Ok(receipt)
    }

    /// Deletes a draft receipt and releases its session claims so the
    /// sessions become eligible for a future receipt.
    pub async fn delete_receipt(&self, actor: &Actor, id: ReceiptId) -> Result<()> {
        let receipt = self.load_receipt(id).await?;
        actor.require_self_or_admin(receipt.mentor)?;
        if !receipt.is_editable() {
            return Err(PayoutError::InvalidState(format!(
                "receipt {} is {:?} and can no longer be deleted",
                receipt.number, receipt.status
            )));
        }

        let mut batch = WriteBatch::new();
        for session_id in &receipt.sessions {
            let mut session = self.load_session(*session_id).await?;
            session.release(receipt.id)?;
            batch.update_session(&mut session);
        }
        batch.delete_receipt(&receipt);
        batch.audit(AuditLogEntry::transition(
            EntityKind::Receipt,
            receipt.id,
            AuditAction::Deleted,
            actor.id,
            format!(
                "draft receipt {} deleted, {} sessions released",
                receipt.number,
                receipt.sessions.len()
            ),
        ));
        self.store.commit(batch).await?;

        info!(receipt = %receipt.number, "draft receipt deleted");
        Ok(())
    }

    pub async fn receipt(&self, actor: &Actor, id: ReceiptId) -> Result<Receipt> {
        let receipt = self.load_receipt(id).await?;
        actor.require_self_or_admin(receipt.mentor)?;
        Ok(receipt)
    }

    /// Lists receipts; mentors are always scoped to their own.
    pub async fn list_receipts(&self, actor: &Actor, mut filter: ReceiptFilter) -> Result<Vec<Receipt>> {
        if !actor.is_admin() {
            filter.mentor = Some(actor.id);
        }
        self.store.receipts(filter).await
    }

    /// The append-ordered audit trail of one entity, visible to admins and
    /// to the owning mentor.
    pub async fn audit_trail(
        &self,
        actor: &Actor,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<Vec<AuditLogEntry>> {
        let owner = match kind {
            EntityKind::Session => self.load_session(entity_id).await?.mentor,
            EntityKind::Receipt => self.load_receipt(entity_id).await?.mentor,
        };
        actor.require_self_or_admin(owner)?;
        self.store.audit_trail(kind, entity_id).await
    }

    /// Rolls up paid receipts, optionally restricted to a mentor and a
    /// payment-date range.
    pub async fn payout_summary(&self, actor: &Actor, filter: SummaryFilter) -> Result<PayoutSummary> {
        let mentor = if actor.is_admin() {
            filter.mentor
        } else {
            Some(actor.id)
        };
        let receipts = self
            .store
            .receipts(ReceiptFilter {
                mentor,
                status: Some(ReceiptStatus::Paid),
                paid_from: filter.paid_from,
                paid_to: filter.paid_to,
                ..Default::default()
            })
            .await?;

        let mut summary = PayoutSummary {
            total_receipts: 0,
            total_sessions: 0,
            total_duration_minutes: 0,
            breakdown: PayoutBreakdown::zero(self.config.currency),
        };
        for receipt in &receipts {
            summary.total_receipts += 1;
            summary.total_sessions += receipt.totals.total_sessions;
            summary.total_duration_minutes += receipt.totals.total_duration_minutes;
            summary.breakdown = summary.breakdown.try_add(receipt.totals.breakdown)?;
        }
        Ok(summary)
    }

    // ----- internals ------------------------------------------------------

    async fn load_session(&self, id: SessionId) -> Result<Session> {
        self.store
            .session(id)
            .await?
            .ok_or_else(|| PayoutError::NotFound(format!("session {id}")))
    }

    async fn load_receipt(&self, id: ReceiptId) -> Result<Receipt> {
        self.store
            .receipt(id)
            .await?
            .ok_or_else(|| PayoutError::NotFound(format!("receipt {id}")))
    }

    /// Approved sessions in the range not yet claimed by a receipt.
    async fn eligible_sessions(
        &self,
        mentor: MentorId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Session>> {
        self.store
            .sessions(SessionFilter {
                mentor: Some(mentor),
                status: Some(SessionStatus::Approved),
                from: Some(start),
                to: Some(end),
                unclaimed_only: true,
            })
            .await
    }

    /// Sums the members' stored per-session breakdowns component-wise. The
    /// figures locked in at approval are what get paid, even if the
    /// mentor's profile rate has changed since.
    fn aggregate(&self, sessions: &[Session]) -> Result<ReceiptTotals> {
        let mut breakdown = PayoutBreakdown::zero(self.config.currency);
        let mut total_duration_minutes = 0;
        for session in sessions {
            let payout = session.payout.as_ref().ok_or_else(|| {
                PayoutError::InvalidState(format!(
                    "approved session {} has no stored payout breakdown",
                    session.id
                ))
            })?;
            breakdown = breakdown.try_add(*payout)?;
            total_duration_minutes += session.duration_minutes;
        }
        Ok(ReceiptTotals {
            total_sessions: sessions.len() as u32,
            total_duration_minutes,
            breakdown,
        })
    }
}

fn session_changes(before: &Session, after: &Session) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    if before.kind != after.kind {
        changes.push(FieldChange::new("kind", json(&before.kind), json(&after.kind)));
    }
    if before.start_time != after.start_time {
        changes.push(FieldChange::new(
            "start_time",
            json(&before.start_time),
            json(&after.start_time),
        ));
    }
    if before.end_time != after.end_time {
        changes.push(FieldChange::new(
            "end_time",
            json(&before.end_time),
            json(&after.end_time),
        ));
    }
    if before.duration_minutes != after.duration_minutes {
        changes.push(FieldChange::new(
            "duration_minutes",
            json(&before.duration_minutes),
            json(&after.duration_minutes),
        ));
    }
    if before.adjusted_rate != after.adjusted_rate {
        changes.push(FieldChange::new(
            "adjusted_rate",
            json(&before.adjusted_rate),
            json(&after.adjusted_rate),
        ));
    }
    if before.notes != after.notes {
        changes.push(FieldChange::new("notes", json(&before.notes), json(&after.notes)));
    }
    changes
}

fn json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
