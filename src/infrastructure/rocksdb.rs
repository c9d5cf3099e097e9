use crate::domain::audit::{AuditLogEntry, EntityKind};
use crate::domain::ports::{PayoutStore, ReceiptFilter, SessionFilter, WriteBatch, WriteOp};
use crate::domain::receipt::{Receipt, ReceiptId};
use crate::domain::sequence::{PeriodKey, SequencePrefix};
use crate::domain::session::{Session, SessionId};
use crate::error::{PayoutError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family for session documents.
pub const CF_SESSIONS: &str = "sessions";
/// Column Family for receipt documents.
pub const CF_RECEIPTS: &str = "receipts";
/// Column Family for audit entries, keyed `<kind>:<entity>:<seq>`.
pub const CF_AUDIT: &str = "audit";
/// Column Family for sequence and audit counters.
pub const CF_COUNTERS: &str = "counters";

/// A persistent store implementation using RocksDB.
///
/// Documents are JSON values in per-entity Column Families. Commits are
/// serialized through a single async mutex: preconditions are checked
/// against the current state, then every write lands in one
/// `rocksdb::WriteBatch`, which RocksDB applies atomically. Counter
/// allocation takes the same mutex, making increment-and-return atomic
/// with respect to concurrent writers.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_guard: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_SESSIONS, CF_RECEIPTS, CF_AUDIT, CF_COUNTERS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();
        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            write_guard: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            PayoutError::Internal(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn get_doc<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(from_json(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_docs<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut docs = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            docs.push(from_json(&value)?);
        }
        Ok(docs)
    }

    fn counter_value(&self, key: &str) -> Result<u32> {
        Ok(self
            .get_doc::<u32>(CF_COUNTERS, key.as_bytes())?
            .unwrap_or(0))
    }

    fn check_op(&self, op: &WriteOp) -> Result<()> {
        match op {
            WriteOp::PutSession {
                session,
                expected_version,
            } => {
                let current = self
                    .get_doc::<Session>(CF_SESSIONS, session.id.as_bytes())?
                    .map(|s| s.version);
                check_version("session", session.id, current, *expected_version)
            }
            WriteOp::DeleteSession {
                id,
                expected_version,
            } => {
                let current = self
                    .get_doc::<Session>(CF_SESSIONS, id.as_bytes())?
                    .map(|s| s.version);
                check_version("session", *id, current, Some(*expected_version))
            }
            WriteOp::PutReceipt {
                receipt,
                expected_version,
            } => {
                let current = self
                    .get_doc::<Receipt>(CF_RECEIPTS, receipt.id.as_bytes())?
                    .map(|r| r.version);
                check_version("receipt", receipt.id, current, *expected_version)
            }
            WriteOp::DeleteReceipt {
                id,
                expected_version,
            } => {
                let current = self
                    .get_doc::<Receipt>(CF_RECEIPTS, id.as_bytes())?
                    .map(|r| r.version);
                check_version("receipt", *id, current, Some(*expected_version))
            }
            WriteOp::AppendAudit { .. } => Ok(()),
        }
    }
}

fn check_version(kind: &str, id: Uuid, current: Option<u64>, expected: Option<u64>) -> Result<()> {
    match (current, expected) {
        (None, None) => Ok(()),
        (Some(_), None) => Err(PayoutError::Conflict(format!("{kind} {id} already exists"))),
        (Some(current), Some(expected)) if current == expected => Ok(()),
        (Some(current), Some(expected)) => Err(PayoutError::Conflict(format!(
            "{kind} {id} was modified concurrently (stored v{current}, expected v{expected})"
        ))),
        (None, Some(_)) => Err(PayoutError::Conflict(format!(
            "{kind} {id} was deleted concurrently"
        ))),
    }
}

fn audit_counter_key(kind: EntityKind, entity_id: Uuid) -> String {
    format!("audit:{kind}:{entity_id}")
}

fn audit_entry_key(kind: EntityKind, entity_id: Uuid, seq: u32) -> Vec<u8> {
    format!("{kind}:{entity_id}:{seq:016}").into_bytes()
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| PayoutError::Internal(Box::new(e)))
}

fn from_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| PayoutError::Internal(Box::new(e)))
}

#[async_trait]
impl PayoutStore for RocksDbStore {
    async fn session(&self, id: SessionId) -> Result<Option<Session>> {
        self.get_doc(CF_SESSIONS, id.as_bytes())
    }

    async fn sessions(&self, filter: SessionFilter) -> Result<Vec<Session>> {
        let mut matches: Vec<Session> = self
            .scan_docs::<Session>(CF_SESSIONS)?
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect();
        matches.sort_by_key(|s| s.start_time);
        Ok(matches)
    }

    async fn receipt(&self, id: ReceiptId) -> Result<Option<Receipt>> {
        self.get_doc(CF_RECEIPTS, id.as_bytes())
    }

    async fn receipts(&self, filter: ReceiptFilter) -> Result<Vec<Receipt>> {
        let mut matches: Vec<Receipt> = self
            .scan_docs::<Receipt>(CF_RECEIPTS)?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        matches.sort_by_key(|r| r.issued_at);
        Ok(matches)
    }

    async fn audit_trail(&self, kind: EntityKind, entity_id: Uuid) -> Result<Vec<AuditLogEntry>> {
        let cf = self.cf(CF_AUDIT)?;
        let prefix = format!("{kind}:{entity_id}:").into_bytes();
        let mut entries = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            entries.push(from_json(&value)?);
        }
        Ok(entries)
    }

    async fn next_sequence(&self, prefix: SequencePrefix, period: &PeriodKey) -> Result<u32> {
        let _guard = self.write_guard.lock().await;

        let key = format!("seq:{}:{}", prefix.as_str(), period.as_str());
        let next = self.counter_value(&key)? + 1;
        let cf = self.cf(CF_COUNTERS)?;
        // Persisted immediately: if the caller's later commit fails, the
        // allocated number stays burned rather than being handed out twice.
        self.db.put_cf(cf, key.as_bytes(), to_json(&next)?)?;
        Ok(next)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let _guard = self.write_guard.lock().await;

        for op in batch.ops() {
            self.check_op(op)?;
        }

        let mut wb = rocksdb::WriteBatch::default();
        // Audit counters advanced within this batch, keyed per entity.
        let mut audit_counters: HashMap<String, u32> = HashMap::new();

        for op in batch.ops() {
            match op {
                WriteOp::PutSession { session, .. } => {
                    let cf = self.cf(CF_SESSIONS)?;
                    wb.put_cf(cf, session.id.as_bytes(), to_json(session)?);
                }
                WriteOp::DeleteSession { id, .. } => {
                    let cf = self.cf(CF_SESSIONS)?;
                    wb.delete_cf(cf, id.as_bytes());
                }
                WriteOp::PutReceipt { receipt, .. } => {
                    let cf = self.cf(CF_RECEIPTS)?;
                    wb.put_cf(cf, receipt.id.as_bytes(), to_json(receipt)?);
                }
                WriteOp::DeleteReceipt { id, .. } => {
                    let cf = self.cf(CF_RECEIPTS)?;
                    wb.delete_cf(cf, id.as_bytes());
                }
                WriteOp::AppendAudit { entry } => {
                    let counter_key = audit_counter_key(entry.entity_kind, entry.entity_id);
                    let seq = match audit_counters.get(&counter_key) {
                        Some(seq) => seq + 1,
                        None => self.counter_value(&counter_key)? + 1,
                    };
                    audit_counters.insert(counter_key.clone(), seq);

                    let audit_cf = self.cf(CF_AUDIT)?;
                    wb.put_cf(
                        audit_cf,
                        audit_entry_key(entry.entity_kind, entry.entity_id, seq),
                        to_json(entry)?,
                    );
                    let counters_cf = self.cf(CF_COUNTERS)?;
                    wb.put_cf(counters_cf, counter_key.as_bytes(), to_json(&seq)?);
                }
            }
        }

        self.db.write(wb)?;
        Ok(())
    }
}
