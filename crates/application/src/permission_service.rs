use std::sync::Arc;

use backoffice_core::{AppError, AppResult, EmployeeId, SessionId};
use backoffice_domain::{
    DataScopeColumns, DataScopePredicate, EmployeeScope, PermissionContext, PermissionLogic,
    PermissionRequirement,
};
use chrono::Utc;
use tracing::debug;

use crate::{
    ActiveSession, CacheLookup, DataScopeFilterCompiler, PermissionSnapshotBuilder, PolicyStore,
    SessionPermissionCache, SessionRepository,
};

/// Resolves permission contexts for sessions and answers access questions.
#[derive(Clone)]
pub struct PermissionService {
    sessions: Arc<dyn SessionRepository>,
    policy_store: Arc<dyn PolicyStore>,
    snapshot_builder: PermissionSnapshotBuilder,
    cache: SessionPermissionCache,
    filter_compiler: DataScopeFilterCompiler,
}

impl PermissionService {
    /// Creates a permission service.
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        policy_store: Arc<dyn PolicyStore>,
        cache: SessionPermissionCache,
        filter_compiler: DataScopeFilterCompiler,
    ) -> Self {
        Self {
            sessions,
            snapshot_builder: PermissionSnapshotBuilder::new(policy_store.clone()),
            policy_store,
            cache,
            filter_compiler,
        }
    }

    /// Returns the permission context of a session.
    ///
    /// Served from the cache when possible; otherwise the session is looked
    /// up, a fresh snapshot is built and the cache is re-populated.
    pub async fn context_for_session(
        &self,
        session_id: &SessionId,
    ) -> AppResult<PermissionContext> {
        match self.cache.get(session_id).await {
            CacheLookup::Hit(entry) => return Ok(PermissionContext::new(entry.snapshot)),
            CacheLookup::Miss => {
                debug!(session_id = %session_id, "permission cache miss");
            }
            CacheLookup::Fault => {}
        }

        let session = self
            .sessions
            .find_active_session(session_id)
            .await?
            .filter(|session| !session.is_expired_at(Utc::now()))
            .ok_or_else(|| unknown_session(session_id))?;

        let snapshot = self.snapshot_builder.build(session.employee_id).await?;
        self.cache.set(&session, snapshot.clone()).await;

        Ok(PermissionContext::new(snapshot))
    }

    /// Registers a new session and warms its cache entry.
    pub async fn open_session(&self, session: ActiveSession) -> AppResult<PermissionContext> {
        if session.is_expired_at(Utc::now()) {
            return Err(AppError::Validation(format!(
                "session '{}' is already expired",
                session.session_id
            )));
        }

        let snapshot = self.snapshot_builder.build(session.employee_id).await?;
        self.sessions.save_session(&session).await?;
        self.cache.set(&session, snapshot.clone()).await;

        Ok(PermissionContext::new(snapshot))
    }

    /// Revokes a session and drops its cache entry.
    ///
    /// Fails when the cache entry could not be dropped, since cache hits do not
    /// consult the session index and the token would keep resolving. Both
    /// steps are idempotent, so callers may retry.
    pub async fn close_session(&self, session_id: &SessionId) -> AppResult<()> {
        self.sessions.revoke_session(session_id).await?;
        if !self.cache.delete(session_id).await {
            return Err(AppError::Internal(format!(
                "session '{session_id}' was revoked but its cache entry could not be dropped"
            )));
        }

        Ok(())
    }

    /// Reads the scope anchors of a target employee.
    pub async fn employee_scope(&self, employee_id: EmployeeId) -> AppResult<EmployeeScope> {
        self.policy_store
            .find_employee_assignment(employee_id)
            .await?
            .map(|assignment| EmployeeScope {
                employee_id: assignment.employee_id,
                anchors: assignment.anchors,
            })
            .ok_or_else(|| AppError::NotFound(format!("employee '{employee_id}' was not found")))
    }

    /// Returns whether the actor may see a target employee's data.
    pub async fn can_access_employee_data(
        &self,
        context: &PermissionContext,
        target: EmployeeId,
    ) -> AppResult<bool> {
        if target == context.snapshot().employee_id() {
            return Ok(true);
        }

        let target = self.employee_scope(target).await?;
        Ok(context.can_access_data(&target))
    }

    /// Returns whether the actor may approve an applicant's request.
    pub async fn can_approve_employee(
        &self,
        context: &PermissionContext,
        applicant: EmployeeId,
    ) -> AppResult<bool> {
        if applicant == context.snapshot().employee_id() {
            return Ok(false);
        }

        let applicant = self.employee_scope(applicant).await?;
        Ok(context.can_approve(&applicant))
    }

    /// Ensures the actor holds one grant.
    pub fn require_permission(
        &self,
        context: &PermissionContext,
        requirement: &PermissionRequirement,
    ) -> AppResult<()> {
        if context.satisfies(requirement) {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "employee '{}' is missing permission '{requirement}'",
            context.snapshot().employee_id()
        )))
    }

    /// Ensures the actor satisfies a combination of grants.
    pub fn require_permissions(
        &self,
        context: &PermissionContext,
        requirements: &[PermissionRequirement],
        logic: PermissionLogic,
    ) -> AppResult<()> {
        if context.check_permissions(requirements, logic) {
            return Ok(());
        }

        let joined = requirements
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Err(AppError::Forbidden(format!(
            "employee '{}' does not satisfy {logic:?} of [{joined}]",
            context.snapshot().employee_id()
        )))
    }

    /// Ensures the actor may see a target employee's data.
    pub async fn require_data_access(
        &self,
        context: &PermissionContext,
        target: EmployeeId,
    ) -> AppResult<()> {
        if self.can_access_employee_data(context, target).await? {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "employee '{}' cannot access data of employee '{target}'",
            context.snapshot().employee_id()
        )))
    }

    /// Ensures the actor may approve an applicant's request.
    pub async fn require_approval(
        &self,
        context: &PermissionContext,
        applicant: EmployeeId,
    ) -> AppResult<()> {
        if self.can_approve_employee(context, applicant).await? {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "employee '{}' cannot approve requests of employee '{applicant}'",
            context.snapshot().employee_id()
        )))
    }

    /// Compiles the actor's row-visibility predicate for a table.
    pub fn data_scope_filter(
        &self,
        context: &PermissionContext,
        columns: &DataScopeColumns,
    ) -> AppResult<DataScopePredicate> {
        self.filter_compiler.compile(context, columns)
    }
}

fn unknown_session(session_id: &SessionId) -> AppError {
    AppError::Unauthorized(format!("session '{session_id}' is not active"))
}
