//! Append-only audit trail entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::identity::Identity;

/// What the user did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A statement import finished
    MmImport,
    ConfirmSingle,
    ConfirmBatch,
    RuleCreated,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::MmImport => "mm_import",
            AuditAction::ConfirmSingle => "confirm_single",
            AuditAction::ConfirmBatch => "confirm_batch",
            AuditAction::RuleCreated => "rule_created",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "mm_import" => Some(AuditAction::MmImport),
            "confirm_single" => Some(AuditAction::ConfirmSingle),
            "confirm_batch" => Some(AuditAction::ConfirmBatch),
            "rule_created" => Some(AuditAction::RuleCreated),
            _ => None,
        }
    }
}

/// Who did what, with what payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub profile_id: String,
    pub actor: String,
    pub action: AuditAction,
    pub payload: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(identity: &Identity, action: AuditAction, payload: JsonValue) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile_id: identity.id.clone(),
            actor: identity.actor().to_string(),
            action,
            payload,
            created_at: Utc::now(),
        }
    }
}
