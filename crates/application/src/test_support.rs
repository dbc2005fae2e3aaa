use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use backoffice_core::{
    AppError, AppResult, DepartmentId, EmployeeId, PositionId, SessionId,
};
use backoffice_domain::{DataScope, Grants, ModuleAllowList, ScopeAnchors};
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use crate::{
    ActiveSession, CreatePositionInput, DepartmentModules, EmployeeAssignment,
    EmployeeAssignmentInput, NewPermissionAuditRecord, PermissionAuditQuery,
    PermissionAuditRecord, PermissionAuditRepository, PolicyChange, PolicyStore,
    PositionPermissionsInput, PositionRecord, SessionCacheEntry, SessionPermissionCacheStore,
    SessionRepository,
};

pub(crate) fn grants(triples: &[(&str, &str, &str)]) -> Grants {
    match Grants::from_triples(triples.iter().copied()) {
        Ok(grants) => grants,
        Err(error) => panic!("test grants should parse: {error}"),
    }
}

pub(crate) fn allow_list(values: &[&str]) -> ModuleAllowList {
    match ModuleAllowList::parse(values) {
        Ok(list) => list,
        Err(error) => panic!("test allow-list should parse: {error}"),
    }
}

pub(crate) fn session_for(employee_id: EmployeeId) -> ActiveSession {
    ActiveSession {
        session_id: SessionId::generate(),
        employee_id,
        expires_at: Some(Utc::now() + Duration::hours(8)),
    }
}

#[derive(Default)]
struct PolicyState {
    positions: HashMap<PositionId, PositionRecord>,
    employees: HashMap<EmployeeId, EmployeeAssignment>,
    departments: HashMap<DepartmentId, DepartmentModules>,
}

#[derive(Default)]
pub(crate) struct InMemoryPolicyStore {
    state: Mutex<PolicyState>,
    pub(crate) failing_employee_lookups: Mutex<Vec<EmployeeId>>,
}

impl InMemoryPolicyStore {
    pub(crate) async fn add_position(
        &self,
        name: &str,
        data_scope: DataScope,
        can_manage_subordinates: bool,
        permissions: Grants,
    ) -> PositionId {
        let position_id = PositionId::new();
        self.state.lock().await.positions.insert(
            position_id,
            PositionRecord {
                position_id,
                name: name.to_owned(),
                can_manage_subordinates,
                data_scope,
                permissions,
            },
        );
        position_id
    }

    pub(crate) async fn add_employee(
        &self,
        display_name: &str,
        position_id: Option<PositionId>,
        anchors: ScopeAnchors,
    ) -> EmployeeId {
        let employee_id = EmployeeId::new();
        self.state.lock().await.employees.insert(
            employee_id,
            EmployeeAssignment {
                employee_id,
                display_name: display_name.to_owned(),
                position_id,
                anchors,
            },
        );
        employee_id
    }

    pub(crate) async fn add_department(&self, allowed_modules: ModuleAllowList) -> DepartmentId {
        let department_id = DepartmentId::new();
        self.state.lock().await.departments.insert(
            department_id,
            DepartmentModules {
                department_id,
                allowed_modules,
            },
        );
        department_id
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn find_position(&self, position_id: PositionId) -> AppResult<Option<PositionRecord>> {
        Ok(self.state.lock().await.positions.get(&position_id).cloned())
    }

    async fn find_employee_assignment(
        &self,
        employee_id: EmployeeId,
    ) -> AppResult<Option<EmployeeAssignment>> {
        if self
            .failing_employee_lookups
            .lock()
            .await
            .contains(&employee_id)
        {
            return Err(AppError::Internal("policy store unavailable".to_owned()));
        }

        Ok(self.state.lock().await.employees.get(&employee_id).cloned())
    }

    async fn find_department_modules(
        &self,
        department_id: DepartmentId,
    ) -> AppResult<Option<DepartmentModules>> {
        Ok(self
            .state
            .lock()
            .await
            .departments
            .get(&department_id)
            .cloned())
    }

    async fn list_employees_by_position(
        &self,
        position_id: PositionId,
    ) -> AppResult<Vec<EmployeeId>> {
        Ok(self
            .state
            .lock()
            .await
            .employees
            .values()
            .filter(|employee| employee.position_id == Some(position_id))
            .map(|employee| employee.employee_id)
            .collect())
    }

    async fn list_employees_by_department(
        &self,
        department_id: DepartmentId,
    ) -> AppResult<Vec<EmployeeId>> {
        Ok(self
            .state
            .lock()
            .await
            .employees
            .values()
            .filter(|employee| employee.anchors.group_id == Some(department_id))
            .map(|employee| employee.employee_id)
            .collect())
    }

    async fn create_position(&self, input: CreatePositionInput) -> AppResult<PositionRecord> {
        let mut state = self.state.lock().await;
        if state
            .positions
            .values()
            .any(|position| position.name == input.name)
        {
            return Err(AppError::Conflict(format!(
                "position '{}' already exists",
                input.name
            )));
        }

        let record = PositionRecord {
            position_id: PositionId::new(),
            name: input.name,
            can_manage_subordinates: input.can_manage_subordinates,
            data_scope: input.data_scope,
            permissions: input.permissions,
        };
        state.positions.insert(record.position_id, record.clone());
        Ok(record)
    }

    async fn update_position_permissions(
        &self,
        position_id: PositionId,
        input: PositionPermissionsInput,
    ) -> AppResult<PolicyChange<PositionRecord>> {
        let mut state = self.state.lock().await;
        let record = state
            .positions
            .get_mut(&position_id)
            .ok_or_else(|| AppError::NotFound(format!("position '{position_id}' was not found")))?;

        let before = record.clone();
        record.can_manage_subordinates = input.can_manage_subordinates;
        record.data_scope = input.data_scope;
        record.permissions = input.permissions;

        Ok(PolicyChange {
            before,
            after: record.clone(),
        })
    }

    async fn update_employee_assignment(
        &self,
        employee_id: EmployeeId,
        input: EmployeeAssignmentInput,
    ) -> AppResult<PolicyChange<EmployeeAssignment>> {
        let mut state = self.state.lock().await;
        let record = state
            .employees
            .get_mut(&employee_id)
            .ok_or_else(|| AppError::NotFound(format!("employee '{employee_id}' was not found")))?;

        let before = record.clone();
        record.position_id = input.position_id;
        record.anchors = input.anchors;

        Ok(PolicyChange {
            before,
            after: record.clone(),
        })
    }

    async fn update_department_modules(
        &self,
        department_id: DepartmentId,
        allowed_modules: ModuleAllowList,
    ) -> AppResult<PolicyChange<DepartmentModules>> {
        let mut state = self.state.lock().await;
        let record = state.departments.get_mut(&department_id).ok_or_else(|| {
            AppError::NotFound(format!("department '{department_id}' was not found"))
        })?;

        let before = record.clone();
        record.allowed_modules = allowed_modules;

        Ok(PolicyChange {
            before,
            after: record.clone(),
        })
    }
}

#[derive(Default)]
pub(crate) struct InMemorySessionRepository {
    sessions: Mutex<HashMap<SessionId, ActiveSession>>,
    pub(crate) failing_employees: Mutex<Vec<EmployeeId>>,
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_active_session(
        &self,
        session_id: &SessionId,
    ) -> AppResult<Option<ActiveSession>> {
        let now = Utc::now();
        Ok(self
            .sessions
            .lock()
            .await
            .get(session_id)
            .filter(|session| !session.is_expired_at(now))
            .cloned())
    }

    async fn list_active_sessions_for_employee(
        &self,
        employee_id: EmployeeId,
    ) -> AppResult<Vec<ActiveSession>> {
        if self.failing_employees.lock().await.contains(&employee_id) {
            return Err(AppError::Internal("session index unavailable".to_owned()));
        }

        let now = Utc::now();
        Ok(self
            .sessions
            .lock()
            .await
            .values()
            .filter(|session| session.employee_id == employee_id && !session.is_expired_at(now))
            .cloned()
            .collect())
    }

    async fn save_session(&self, session: &ActiveSession) -> AppResult<()> {
        self.sessions
            .lock()
            .await
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn revoke_session(&self, session_id: &SessionId) -> AppResult<()> {
        self.sessions.lock().await.remove(session_id);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingCacheStore {
    pub(crate) entries: Mutex<HashMap<SessionId, (SessionCacheEntry, u64)>>,
    pub(crate) fail_reads: AtomicBool,
    pub(crate) fail_writes: AtomicBool,
    pub(crate) reads: AtomicUsize,
}

impl RecordingCacheStore {
    pub(crate) fn set_failing(&self, failing: bool) {
        self.fail_reads.store(failing, Ordering::SeqCst);
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub(crate) async fn contains(&self, session_id: &SessionId) -> bool {
        self.entries.lock().await.contains_key(session_id)
    }
}

#[async_trait]
impl SessionPermissionCacheStore for RecordingCacheStore {
    async fn get_entry(&self, session_id: &SessionId) -> AppResult<Option<SessionCacheEntry>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Internal("cache store unavailable".to_owned()));
        }

        Ok(self
            .entries
            .lock()
            .await
            .get(session_id)
            .map(|(entry, _)| entry.clone()))
    }

    async fn set_entry(&self, entry: &SessionCacheEntry, ttl_seconds: u64) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("cache store unavailable".to_owned()));
        }

        self.entries
            .lock()
            .await
            .insert(entry.session_id.clone(), (entry.clone(), ttl_seconds));
        Ok(())
    }

    async fn delete_entries(&self, session_ids: &[SessionId]) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("cache store unavailable".to_owned()));
        }

        let mut entries = self.entries.lock().await;
        for session_id in session_ids {
            entries.remove(session_id);
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeAuditRepository {
    pub(crate) records: Mutex<Vec<NewPermissionAuditRecord>>,
}

#[async_trait]
impl PermissionAuditRepository for FakeAuditRepository {
    async fn append_record(&self, record: NewPermissionAuditRecord) -> AppResult<()> {
        self.records.lock().await.push(record);
        Ok(())
    }

    async fn list_records(
        &self,
        query: PermissionAuditQuery,
    ) -> AppResult<Vec<PermissionAuditRecord>> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, record)| query.entity_type.is_none_or(|value| value == record.entity_type))
            .filter(|(_, record)| {
                query
                    .entity_id
                    .as_deref()
                    .is_none_or(|value| value == record.entity_id)
            })
            .filter(|(_, record)| query.action.is_none_or(|value| value == record.action))
            .skip(query.offset)
            .take(query.limit)
            .map(|(index, record)| PermissionAuditRecord {
                record_id: index.to_string(),
                entity_type: record.entity_type,
                entity_id: record.entity_id.clone(),
                action: record.action,
                operator_id: record.operator_id,
                operator_name: record.operator_name.clone(),
                before: record.before.clone(),
                after: record.after.clone(),
                detail: record.detail.clone(),
                occurred_at: record.occurred_at,
            })
            .collect())
    }
}

pub(crate) struct Harness {
    pub(crate) policy_store: Arc<InMemoryPolicyStore>,
    pub(crate) sessions: Arc<InMemorySessionRepository>,
    pub(crate) cache_store: Arc<RecordingCacheStore>,
    pub(crate) audit_repository: Arc<FakeAuditRepository>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self {
            policy_store: Arc::new(InMemoryPolicyStore::default()),
            sessions: Arc::new(InMemorySessionRepository::default()),
            cache_store: Arc::new(RecordingCacheStore::default()),
            audit_repository: Arc::new(FakeAuditRepository::default()),
        }
    }

    pub(crate) fn cache(&self) -> crate::SessionPermissionCache {
        crate::SessionPermissionCache::new(self.cache_store.clone())
    }

    pub(crate) fn snapshot_builder(&self) -> crate::PermissionSnapshotBuilder {
        crate::PermissionSnapshotBuilder::new(self.policy_store.clone())
    }

    pub(crate) fn permission_service(&self) -> crate::PermissionService {
        crate::PermissionService::new(
            self.sessions.clone(),
            self.policy_store.clone(),
            self.cache(),
            crate::DataScopeFilterCompiler::new(false),
        )
    }

    pub(crate) fn invalidation_service(&self) -> crate::PermissionInvalidationService {
        crate::PermissionInvalidationService::new(
            self.sessions.clone(),
            self.policy_store.clone(),
            self.cache(),
        )
    }

    pub(crate) fn policy_admin_service(&self) -> crate::PolicyAdminService {
        crate::PolicyAdminService::new(
            self.policy_store.clone(),
            crate::PermissionAuditService::new(
                self.audit_repository.clone(),
                self.policy_store.clone(),
            ),
            self.invalidation_service(),
        )
    }
}
