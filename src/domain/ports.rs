use crate::domain::audit::{AuditLogEntry, EntityKind};
use crate::domain::receipt::{Receipt, ReceiptId, ReceiptStatus};
use crate::domain::sequence::{PeriodKey, SequencePrefix};
use crate::domain::session::{MentorId, Session, SessionId, SessionStatus};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Equality/range filter over sessions. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub mentor: Option<MentorId>,
    pub status: Option<SessionStatus>,
    /// Inclusive lower bound on `start_time`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `start_time`.
    pub to: Option<DateTime<Utc>>,
    /// Only sessions not claimed by any receipt.
    pub unclaimed_only: bool,
}

impl SessionFilter {
    pub fn matches(&self, session: &Session) -> bool {
        self.mentor.is_none_or(|m| session.mentor == m)
            && self.status.is_none_or(|s| session.status == s)
            && self.from.is_none_or(|f| session.start_time >= f)
            && self.to.is_none_or(|t| session.start_time <= t)
            && (!self.unclaimed_only || session.receipt.is_none())
    }
}

/// Equality/range filter over receipts. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ReceiptFilter {
    pub mentor: Option<MentorId>,
    pub status: Option<ReceiptStatus>,
    /// Inclusive bounds on `issued_at`.
    pub issued_from: Option<DateTime<Utc>>,
    pub issued_to: Option<DateTime<Utc>>,
    /// Inclusive bounds on `payment_date`; receipts without one never match.
    pub paid_from: Option<DateTime<Utc>>,
    pub paid_to: Option<DateTime<Utc>>,
}

impl ReceiptFilter {
    pub fn matches(&self, receipt: &Receipt) -> bool {
        let paid_in_range = match (self.paid_from, self.paid_to) {
            (None, None) => true,
            (from, to) => receipt.payment_date.is_some_and(|d| {
                from.is_none_or(|f| d >= f) && to.is_none_or(|t| d <= t)
            }),
        };
        self.mentor.is_none_or(|m| receipt.mentor == m)
            && self.status.is_none_or(|s| receipt.status == s)
            && self.issued_from.is_none_or(|f| receipt.issued_at >= f)
            && self.issued_to.is_none_or(|t| receipt.issued_at <= t)
            && paid_in_range
    }
}

/// One write in a transactional batch.
///
/// `expected_version` carries the optimistic-concurrency precondition: the
/// version the caller read, or `None` for an insert that must not collide
/// with an existing document. Any precondition miss fails the whole batch
/// with `Conflict` and applies nothing.
#[derive(Debug, Clone)]
pub enum WriteOp {
    PutSession {
        session: Session,
        expected_version: Option<u64>,
    },
    DeleteSession {
        id: SessionId,
        expected_version: u64,
    },
    PutReceipt {
        receipt: Receipt,
        expected_version: Option<u64>,
    },
    DeleteReceipt {
        id: ReceiptId,
        expected_version: u64,
    },
    AppendAudit {
        entry: AuditLogEntry,
    },
}

/// A transactional unit of work: entity writes plus the audit entries that
/// describe them, committed together or not at all.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Inserts a brand-new session (version 0, must not pre-exist).
    pub fn insert_session(&mut self, session: &Session) {
        self.ops.push(WriteOp::PutSession {
            session: session.clone(),
            expected_version: None,
        });
    }

    /// Stages an update, bumping the entity's version in place so the caller
    /// keeps a copy matching what the store will hold.
    pub fn update_session(&mut self, session: &mut Session) {
        let expected_version = session.version;
        session.version += 1;
        self.ops.push(WriteOp::PutSession {
            session: session.clone(),
            expected_version: Some(expected_version),
        });
    }

    pub fn delete_session(&mut self, session: &Session) {
        self.ops.push(WriteOp::DeleteSession {
            id: session.id,
            expected_version: session.version,
        });
    }

    pub fn insert_receipt(&mut self, receipt: &Receipt) {
        self.ops.push(WriteOp::PutReceipt {
            receipt: receipt.clone(),
            expected_version: None,
        });
    }

    pub fn update_receipt(&mut self, receipt: &mut Receipt) {
        let expected_version = receipt.version;
        receipt.version += 1;
        self.ops.push(WriteOp::PutReceipt {
            receipt: receipt.clone(),
            expected_version: Some(expected_version),
        });
    }

    pub fn delete_receipt(&mut self, receipt: &Receipt) {
        self.ops.push(WriteOp::DeleteReceipt {
            id: receipt.id,
            expected_version: receipt.version,
        });
    }

    pub fn audit(&mut self, entry: AuditLogEntry) {
        self.ops.push(WriteOp::AppendAudit { entry });
    }
}

/// Persistence port for the payout engine.
///
/// Backends must provide equality/range queries, an atomic counter
/// primitive for sequence allocation, and all-or-nothing batch commits.
#[async_trait]
pub trait PayoutStore: Send + Sync {
    async fn session(&self, id: SessionId) -> Result<Option<Session>>;

    /// Sessions matching the filter, ordered by `start_time`.
    async fn sessions(&self, filter: SessionFilter) -> Result<Vec<Session>>;

    async fn receipt(&self, id: ReceiptId) -> Result<Option<Receipt>>;

    /// Receipts matching the filter, ordered by `issued_at`.
    async fn receipts(&self, filter: ReceiptFilter) -> Result<Vec<Receipt>>;

    /// The append-ordered audit trail for one entity.
    async fn audit_trail(&self, kind: EntityKind, entity_id: Uuid) -> Result<Vec<AuditLogEntry>>;

    /// Atomically increments and returns the counter for `(prefix, period)`,
    /// starting at 1. Callers must treat an allocated value that never gets
    /// committed as burned: gaps are acceptable, duplicates are not.
    async fn next_sequence(&self, prefix: SequencePrefix, period: &PeriodKey) -> Result<u32>;

    /// Applies the batch atomically, or fails with `Conflict` on the first
    /// version-precondition miss without applying anything.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;
}

pub type PayoutStoreBox = Box<dyn PayoutStore>;

/// Outbound notification collaborator, invoked after a receipt is sent.
/// Delivery is fire-and-forget: failures are logged, never rolled back into
/// the state transition.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn receipt_sent(&self, receipt: &Receipt) -> Result<()>;
}

pub type NotifierBox = Box<dyn Notifier>;

/// Default notifier that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn receipt_sent(&self, _receipt: &Receipt) -> Result<()> {
        Ok(())
    }
}
