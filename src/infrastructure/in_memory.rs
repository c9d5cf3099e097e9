use crate::domain::audit::{AuditLogEntry, EntityKind};
use crate::domain::ports::{PayoutStore, ReceiptFilter, SessionFilter, WriteBatch, WriteOp};
use crate::domain::receipt::{Receipt, ReceiptId};
use crate::domain::sequence::{PeriodKey, SequencePrefix};
use crate::domain::session::{Session, SessionId};
use crate::error::{PayoutError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, Session>,
    receipts: HashMap<ReceiptId, Receipt>,
    audit: HashMap<(EntityKind, Uuid), Vec<AuditLogEntry>>,
    counters: HashMap<String, u32>,
}

/// A thread-safe in-memory store.
///
/// A single `RwLock` over the whole document set makes batch commits and
/// counter increments trivially atomic: every precondition is checked and
/// every write applied under one write-lock acquisition. Ideal for tests
/// and small deployments.
#[derive(Default, Clone)]
pub struct InMemoryPayoutStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryPayoutStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn counter_key(prefix: SequencePrefix, period: &PeriodKey) -> String {
    format!("{}:{}", prefix.as_str(), period.as_str())
}

impl Inner {
    fn check(&self, op: &WriteOp) -> Result<()> {
        match op {
            WriteOp::PutSession {
                session,
                expected_version,
            } => check_version(
                "session",
                session.id,
                self.sessions.get(&session.id).map(|s| s.version),
                *expected_version,
            ),
            WriteOp::DeleteSession {
                id,
                expected_version,
            } => check_version(
                "session",
                *id,
                self.sessions.get(id).map(|s| s.version),
                Some(*expected_version),
            ),
            WriteOp::PutReceipt {
                receipt,
                expected_version,
            } => check_version(
                "receipt",
                receipt.id,
                self.receipts.get(&receipt.id).map(|r| r.version),
                *expected_version,
            ),
            WriteOp::DeleteReceipt {
                id,
                expected_version,
            } => check_version(
                "receipt",
                *id,
                self.receipts.get(id).map(|r| r.version),
                Some(*expected_version),
            ),
            WriteOp::AppendAudit { .. } => Ok(()),
        }
    }

    fn apply(&mut self, op: WriteOp) {
        match op {
            WriteOp::PutSession { session, .. } => {
                self.sessions.insert(session.id, session);
            }
            WriteOp::DeleteSession { id, .. } => {
                self.sessions.remove(&id);
            }
            WriteOp::PutReceipt { receipt, .. } => {
                self.receipts.insert(receipt.id, receipt);
            }
            WriteOp::DeleteReceipt { id, .. } => {
                self.receipts.remove(&id);
            }
            WriteOp::AppendAudit { entry } => {
                self.audit
                    .entry((entry.entity_kind, entry.entity_id))
                    .or_default()
                    .push(entry);
            }
        }
    }
}

fn check_version(
    kind: &str,
    id: Uuid,
    current: Option<u64>,
    expected: Option<u64>,
) -> Result<()> {
    match (current, expected) {
        // Insert: the document must not exist yet.
        (None, None) => Ok(()),
        (Some(_), None) => Err(PayoutError::Conflict(format!("{kind} {id} already exists"))),
        // Update/delete: the stored version must be the one the caller read.
        (Some(current), Some(expected)) if current == expected => Ok(()),
        (Some(current), Some(expected)) => Err(PayoutError::Conflict(format!(
            "{kind} {id} was modified concurrently (stored v{current}, expected v{expected})"
        ))),
        (None, Some(_)) => Err(PayoutError::Conflict(format!(
            "{kind} {id} was deleted concurrently"
        ))),
    }
}

#[async_trait]
impl PayoutStore for InMemoryPayoutStore {
    async fn session(&self, id: SessionId) -> Result<Option<Session>> {
        let inner = self.inner.read().await;
        Ok(inner.sessions.get(&id).cloned())
    }

    async fn sessions(&self, filter: SessionFilter) -> Result<Vec<Session>> {
        let inner = self.inner.read().await;
        let mut matches: Vec<Session> = inner
            .sessions
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        matches.sort_by_key(|s| s.start_time);
        Ok(matches)
    }

    async fn receipt(&self, id: ReceiptId) -> Result<Option<Receipt>> {
        let inner = self.inner.read().await;
        Ok(inner.receipts.get(&id).cloned())
    }

    async fn receipts(&self, filter: ReceiptFilter) -> Result<Vec<Receipt>> {
        let inner = self.inner.read().await;
        let mut matches: Vec<Receipt> = inner
            .receipts
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matches.sort_by_key(|r| r.issued_at);
        Ok(matches)
    }

    async fn audit_trail(&self, kind: EntityKind, entity_id: Uuid) -> Result<Vec<AuditLogEntry>> {
        let inner = self.inner.read().await;
        Ok(inner
            .audit
            .get(&(kind, entity_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn next_sequence(&self, prefix: SequencePrefix, period: &PeriodKey) -> Result<u32> {
        let mut inner = self.inner.write().await;
        let counter = inner
            .counters
            .entry(counter_key(prefix, period))
            .or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut inner = self.inner.write().await;
        for op in batch.ops() {
            inner.check(op)?;
        }
        for op in batch.ops().iter().cloned() {
            inner.apply(op);
        }
        Ok(())
    }
}
