//! Audit recorder
//!
//! Every committed state change writes exactly one audit entry through the
//! same unit of work as the change itself, so a failed append aborts the
//! whole operation.

use std::sync::Arc;

use shared::{Actor, AuditAction, AuditEntry, NewAuditEntry, Pagination};

use crate::error::AppResult;
use crate::store::{Store, UnitOfWork};

/// Append an audit entry inside an open unit of work
pub async fn record(
    uow: &mut dyn UnitOfWork,
    actor: Actor,
    action: AuditAction,
    entity_type: &str,
    entity_id: i64,
    details: impl Into<String>,
) -> AppResult<AuditEntry> {
    let entry = uow
        .append_audit(NewAuditEntry {
            user_id: actor.user_id,
            action,
            entity_type: entity_type.to_string(),
            entity_id,
            details: details.into(),
        })
        .await?;

    tracing::debug!(
        audit_id = entry.id,
        action = %entry.action,
        entity_type = %entry.entity_type,
        entity_id = entry.entity_id,
        "Audit entry appended"
    );

    Ok(entry)
}

/// Read access to the audit trail
#[derive(Clone)]
pub struct AuditService {
    store: Arc<dyn Store>,
}

impl AuditService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Newest entries first
    pub async fn recent(&self, pagination: &Pagination) -> AppResult<Vec<AuditEntry>> {
        self.store
            .recent_audit(pagination.limit(), pagination.offset())
            .await
    }
}
