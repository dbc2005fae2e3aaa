use async_trait::async_trait;
use backoffice_core::{AppResult, EmployeeId};
use backoffice_domain::{AuditEntityType, PermissionAuditAction};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Append payload for one policy mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPermissionAuditRecord {
    /// Mutated entity type.
    pub entity_type: AuditEntityType,
    /// Mutated entity identifier.
    pub entity_id: String,
    /// Stable action identifier.
    pub action: PermissionAuditAction,
    /// Acting employee.
    pub operator_id: EmployeeId,
    /// Acting employee display name.
    pub operator_name: String,
    /// Opaque state before the change.
    pub before: Option<Value>,
    /// Opaque state after the change.
    pub after: Option<Value>,
    /// Human-readable change summary.
    pub detail: Option<String>,
    /// When the change happened.
    pub occurred_at: DateTime<Utc>,
}

/// Stored audit record projection.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionAuditRecord {
    /// Stable record identifier.
    pub record_id: String,
    /// Mutated entity type.
    pub entity_type: AuditEntityType,
    /// Mutated entity identifier.
    pub entity_id: String,
    /// Stable action identifier.
    pub action: PermissionAuditAction,
    /// Acting employee.
    pub operator_id: EmployeeId,
    /// Acting employee display name.
    pub operator_name: String,
    /// Opaque state before the change.
    pub before: Option<Value>,
    /// Opaque state after the change.
    pub after: Option<Value>,
    /// Human-readable change summary.
    pub detail: Option<String>,
    /// When the change happened.
    pub occurred_at: DateTime<Utc>,
}

/// Query parameters for audit record listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionAuditQuery {
    /// Optional entity type filter.
    pub entity_type: Option<AuditEntityType>,
    /// Optional entity id filter; only meaningful with `entity_type`.
    pub entity_id: Option<String>,
    /// Optional action filter.
    pub action: Option<PermissionAuditAction>,
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
}

/// Append-only repository for policy audit records.
#[async_trait]
pub trait PermissionAuditRepository: Send + Sync {
    /// Appends one immutable record.
    async fn append_record(&self, record: NewPermissionAuditRecord) -> AppResult<()>;

    /// Lists records newest first.
    async fn list_records(&self, query: PermissionAuditQuery)
    -> AppResult<Vec<PermissionAuditRecord>>;
}
