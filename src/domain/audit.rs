use crate::domain::actor::ActorId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Entity families that carry an audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Session,
    Receipt,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session => f.write_str("session"),
            Self::Receipt => f.write_str("receipt"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Updated,
    Deleted,
    Approved,
    Rejected,
    ReceiptCreated,
    Sent,
    Paid,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::ReceiptCreated => "receipt_created",
            Self::Sent => "sent",
            Self::Paid => "paid",
        };
        f.write_str(name)
    }
}

/// A before/after record for one mutated field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

impl FieldChange {
    pub fn new(field: impl Into<String>, old: Value, new: Value) -> Self {
        Self {
            field: field.into(),
            old,
            new,
        }
    }
}

/// One append-only history record.
///
/// Entries are written in the same store commit as the mutation they
/// describe; neither can exist without the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub action: AuditAction,
    pub actor: ActorId,
    pub changes: Vec<FieldChange>,
    pub details: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Entry for a lifecycle transition, described as free text.
    pub fn transition(
        entity_kind: EntityKind,
        entity_id: Uuid,
        action: AuditAction,
        actor: ActorId,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_kind,
            entity_id,
            action,
            actor,
            changes: Vec::new(),
            details: Some(details.into()),
            recorded_at: Utc::now(),
        }
    }

    /// Entry for a field-level update with before/after values.
    pub fn field_update(
        entity_kind: EntityKind,
        entity_id: Uuid,
        actor: ActorId,
        changes: Vec<FieldChange>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_kind,
            entity_id,
            action: AuditAction::Updated,
            actor,
            changes,
            details: None,
            recorded_at: Utc::now(),
        }
    }
}
