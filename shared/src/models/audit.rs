//! Audit trail models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// Kinds of recorded actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Inbound,
    BulkInbound,
    OutboundShipped,
    BulkOutbound,
    Transfer,
    BulkImport,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Inbound => "INBOUND",
            AuditAction::BulkInbound => "BULK_INBOUND",
            AuditAction::OutboundShipped => "OUTBOUND_SHIPPED",
            AuditAction::BulkOutbound => "BULK_OUTBOUND",
            AuditAction::Transfer => "TRANSFER",
            AuditAction::BulkImport => "BULK_IMPORT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INBOUND" => Some(AuditAction::Inbound),
            "BULK_INBOUND" => Some(AuditAction::BulkInbound),
            "OUTBOUND_SHIPPED" => Some(AuditAction::OutboundShipped),
            "BULK_OUTBOUND" => Some(AuditAction::BulkOutbound),
            "TRANSFER" => Some(AuditAction::Transfer),
            "BULK_IMPORT" => Some(AuditAction::BulkImport),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    /// `None` for system actions
    pub user_id: Option<UserId>,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: i64,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

/// Input for appending an audit record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub user_id: Option<UserId>,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: i64,
    pub details: String,
}
