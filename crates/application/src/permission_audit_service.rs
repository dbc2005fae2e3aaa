use std::sync::Arc;

use backoffice_core::{AppResult, EmployeeId};
use backoffice_domain::{AuditEntityType, PermissionAuditAction};
use chrono::Utc;
use serde_json::Value;
use tracing::warn;

use crate::{
    NewPermissionAuditRecord, PermissionAuditQuery, PermissionAuditRecord,
    PermissionAuditRepository, PolicyStore,
};

/// Upper bound applied to audit page sizes.
pub const MAX_AUDIT_PAGE_SIZE: usize = 200;

/// Input for one permission audit entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionChangeInput {
    /// Mutated entity type.
    pub entity_type: AuditEntityType,
    /// Mutated entity identifier.
    pub entity_id: String,
    /// Stable action identifier.
    pub action: PermissionAuditAction,
    /// Acting employee.
    pub operator_id: EmployeeId,
    /// Acting employee display name; resolved from the policy store when absent.
    pub operator_name: Option<String>,
    /// State before the change.
    pub before: Option<Value>,
    /// State after the change.
    pub after: Option<Value>,
    /// Human-readable change summary.
    pub detail: Option<String>,
}

/// Records and queries who changed which permissions.
#[derive(Clone)]
pub struct PermissionAuditService {
    repository: Arc<dyn PermissionAuditRepository>,
    policy_store: Arc<dyn PolicyStore>,
}

impl PermissionAuditService {
    /// Creates an audit service.
    #[must_use]
    pub fn new(
        repository: Arc<dyn PermissionAuditRepository>,
        policy_store: Arc<dyn PolicyStore>,
    ) -> Self {
        Self {
            repository,
            policy_store,
        }
    }

    /// Appends one audit record.
    pub async fn log_permission_change(&self, input: PermissionChangeInput) -> AppResult<()> {
        let operator_name = match input.operator_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.resolve_operator_name(input.operator_id).await,
        };

        self.repository
            .append_record(NewPermissionAuditRecord {
                entity_type: input.entity_type,
                entity_id: input.entity_id,
                action: input.action,
                operator_id: input.operator_id,
                operator_name,
                before: input.before,
                after: input.after,
                detail: input.detail,
                occurred_at: Utc::now(),
            })
            .await
    }

    /// Lists the history of one entity, newest first.
    pub async fn list_by_entity(
        &self,
        entity_type: AuditEntityType,
        entity_id: &str,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<PermissionAuditRecord>> {
        self.list(PermissionAuditQuery {
            entity_type: Some(entity_type),
            entity_id: Some(entity_id.to_owned()),
            action: None,
            limit,
            offset,
        })
        .await
    }

    /// Lists every record of one action, newest first.
    pub async fn list_by_action(
        &self,
        action: PermissionAuditAction,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<PermissionAuditRecord>> {
        self.list(PermissionAuditQuery {
            entity_type: None,
            entity_id: None,
            action: Some(action),
            limit,
            offset,
        })
        .await
    }

    /// Lists records matching a query with a clamped page size.
    pub async fn list(&self, query: PermissionAuditQuery) -> AppResult<Vec<PermissionAuditRecord>> {
        self.repository
            .list_records(PermissionAuditQuery {
                limit: query.limit.clamp(1, MAX_AUDIT_PAGE_SIZE),
                ..query
            })
            .await
    }

    async fn resolve_operator_name(&self, operator_id: EmployeeId) -> String {
        match self.policy_store.find_employee_assignment(operator_id).await {
            Ok(Some(assignment)) => assignment.display_name,
            Ok(None) => operator_id.to_string(),
            Err(error) => {
                warn!(
                    operator_id = %operator_id,
                    error = %error,
                    "failed to resolve audit operator name"
                );
                operator_id.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use backoffice_core::EmployeeId;
    use backoffice_domain::{AuditEntityType, PermissionAuditAction, ScopeAnchors};
    use serde_json::json;

    use crate::test_support::{FakeAuditRepository, InMemoryPolicyStore};

    use super::{PermissionAuditService, PermissionChangeInput};

    fn change(
        operator_id: EmployeeId,
        entity_id: &str,
        action: PermissionAuditAction,
    ) -> PermissionChangeInput {
        PermissionChangeInput {
            entity_type: AuditEntityType::Position,
            entity_id: entity_id.to_owned(),
            action,
            operator_id,
            operator_name: None,
            before: Some(json!({ "data_scope": "self" })),
            after: Some(json!({ "data_scope": "group" })),
            detail: Some("+hr".to_owned()),
        }
    }

    #[tokio::test]
    async fn operator_name_is_resolved_from_policy_store() {
        let repository = Arc::new(FakeAuditRepository::default());
        let policy_store = Arc::new(InMemoryPolicyStore::default());
        let operator = policy_store
            .add_employee("Grace Hopper", None, ScopeAnchors::default())
            .await;
        let service = PermissionAuditService::new(repository.clone(), policy_store);

        let result = service
            .log_permission_change(change(
                operator,
                "pos-1",
                PermissionAuditAction::PositionPermissionsUpdated,
            ))
            .await;

        assert!(result.is_ok());
        let records = repository.records.lock().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].operator_name, "Grace Hopper");
        assert_eq!(records[0].before, Some(json!({ "data_scope": "self" })));
    }

    #[tokio::test]
    async fn unknown_operator_falls_back_to_identifier() {
        let repository = Arc::new(FakeAuditRepository::default());
        let service = PermissionAuditService::new(
            repository.clone(),
            Arc::new(InMemoryPolicyStore::default()),
        );
        let operator = EmployeeId::new();

        let result = service
            .log_permission_change(change(
                operator,
                "pos-1",
                PermissionAuditAction::PositionCreated,
            ))
            .await;

        assert!(result.is_ok());
        assert_eq!(
            repository.records.lock().await[0].operator_name,
            operator.to_string()
        );
    }

    #[tokio::test]
    async fn listings_filter_by_entity_and_action() {
        let repository = Arc::new(FakeAuditRepository::default());
        let service =
            PermissionAuditService::new(repository, Arc::new(InMemoryPolicyStore::default()));
        let operator = EmployeeId::new();
        for (entity_id, action) in [
            ("pos-1", PermissionAuditAction::PositionCreated),
            ("pos-1", PermissionAuditAction::PositionPermissionsUpdated),
            ("pos-2", PermissionAuditAction::PositionPermissionsUpdated),
        ] {
            let Ok(()) = service
                .log_permission_change(change(operator, entity_id, action))
                .await
            else {
                panic!("record should append");
            };
        }

        let Ok(by_entity) = service
            .list_by_entity(AuditEntityType::Position, "pos-1", 50, 0)
            .await
        else {
            panic!("listing should succeed");
        };
        let Ok(by_action) = service
            .list_by_action(PermissionAuditAction::PositionPermissionsUpdated, 0, 0)
            .await
        else {
            panic!("listing should succeed");
        };

        assert_eq!(by_entity.len(), 2);
        assert_eq!(
            by_entity[0].action,
            PermissionAuditAction::PositionPermissionsUpdated
        );
        assert_eq!(by_action.len(), 1);
        assert_eq!(by_action[0].entity_id, "pos-2");
    }
}
