use axum::Json;
use axum::extract::{Extension, Query, State};
use backoffice_application::PermissionAuditQuery;
use backoffice_core::AppError;
use backoffice_domain::{AuditEntityType, PermissionAuditAction, PermissionContext};
use serde::Deserialize;

use crate::dto::PermissionAuditRecordResponse;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PermissionAuditParams {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub action: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl PermissionAuditParams {
    fn into_query(self) -> Result<PermissionAuditQuery, AppError> {
        let entity_type = self
            .entity_type
            .as_deref()
            .map(str::parse::<AuditEntityType>)
            .transpose()?;
        if self.entity_id.is_some() && entity_type.is_none() {
            return Err(AppError::Validation(
                "entity_id filter requires entity_type".to_owned(),
            ));
        }

        Ok(PermissionAuditQuery {
            entity_type,
            entity_id: self.entity_id,
            action: self
                .action
                .as_deref()
                .map(str::parse::<PermissionAuditAction>)
                .transpose()?,
            limit: self.limit.unwrap_or(50),
            offset: self.offset.unwrap_or(0),
        })
    }
}

pub async fn list_permission_audit_handler(
    State(state): State<AppState>,
    Extension(context): Extension<PermissionContext>,
    Query(params): Query<PermissionAuditParams>,
) -> ApiResult<Json<Vec<PermissionAuditRecordResponse>>> {
    let records = state
        .policy_admin_service
        .list_permission_audit(&context, params.into_query()?)
        .await?
        .into_iter()
        .map(PermissionAuditRecordResponse::from)
        .collect();

    Ok(Json(records))
}

#[cfg(test)]
mod tests {
    use backoffice_core::AppError;
    use backoffice_domain::{AuditEntityType, PermissionAuditAction};

    use super::PermissionAuditParams;

    #[test]
    fn params_parse_filters_and_default_paging() {
        let params = PermissionAuditParams {
            entity_type: Some("position".to_owned()),
            entity_id: Some("p-1".to_owned()),
            action: Some(PermissionAuditAction::PositionPermissionsUpdated.as_str().to_owned()),
            limit: None,
            offset: None,
        };

        let Ok(query) = params.into_query() else {
            panic!("query should parse");
        };

        assert_eq!(query.entity_type, Some(AuditEntityType::Position));
        assert_eq!(
            query.action,
            Some(PermissionAuditAction::PositionPermissionsUpdated)
        );
        assert_eq!((query.limit, query.offset), (50, 0));
    }

    #[test]
    fn entity_id_without_type_is_rejected() {
        let params = PermissionAuditParams {
            entity_type: None,
            entity_id: Some("p-1".to_owned()),
            action: None,
            limit: Some(10),
            offset: None,
        };

        assert!(matches!(params.into_query(), Err(AppError::Validation(_))));
    }
}
