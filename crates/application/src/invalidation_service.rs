use std::collections::BTreeSet;
use std::sync::Arc;

use backoffice_core::{AppResult, DepartmentId, EmployeeId, PositionId, SessionId};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::{PermissionSnapshotBuilder, PolicyStore, SessionPermissionCache, SessionRepository};

/// Default number of employees invalidated concurrently.
pub const DEFAULT_FAN_OUT_CONCURRENCY: usize = 16;

/// Outcome of one invalidation entry point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Employees processed.
    pub employees: usize,
    /// Sessions whose entries were targeted.
    pub sessions: usize,
    /// Employees whose session index could not be read.
    pub failed_employees: usize,
    /// Sessions whose cache entry could not be deleted or rewritten.
    pub cache_faults: usize,
}

impl InvalidationReport {
    fn absorb(&mut self, other: Self) {
        self.employees += other.employees;
        self.sessions += other.sessions;
        self.failed_employees += other.failed_employees;
        self.cache_faults += other.cache_faults;
    }

    /// Returns whether every targeted entry was handled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_employees == 0 && self.cache_faults == 0
    }
}

/// Drops or rebuilds cached snapshots after committed policy writes.
#[derive(Clone)]
pub struct PermissionInvalidationService {
    sessions: Arc<dyn SessionRepository>,
    policy_store: Arc<dyn PolicyStore>,
    snapshot_builder: PermissionSnapshotBuilder,
    cache: SessionPermissionCache,
    max_concurrency: usize,
}

impl PermissionInvalidationService {
    /// Creates an invalidation service.
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        policy_store: Arc<dyn PolicyStore>,
        cache: SessionPermissionCache,
    ) -> Self {
        Self {
            sessions,
            snapshot_builder: PermissionSnapshotBuilder::new(policy_store.clone()),
            policy_store,
            cache,
            max_concurrency: DEFAULT_FAN_OUT_CONCURRENCY,
        }
    }

    /// Bounds how many employees are invalidated at once.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Drops the cache entries of every active session of one employee.
    pub async fn invalidate_by_employee_id(&self, employee_id: EmployeeId) -> InvalidationReport {
        let report = self.invalidate_employee(employee_id).await;
        log_report("employee", &employee_id.to_string(), &report);
        report
    }

    /// Drops the cache entries of every holder of a position.
    pub async fn invalidate_by_position_id(
        &self,
        position_id: PositionId,
    ) -> AppResult<InvalidationReport> {
        let employee_ids = self
            .policy_store
            .list_employees_by_position(position_id)
            .await?;
        let report = self.fan_out(employee_ids).await;
        log_report("position", &position_id.to_string(), &report);
        Ok(report)
    }

    /// Drops the cache entries of every member of a department.
    pub async fn invalidate_by_department_id(
        &self,
        department_id: DepartmentId,
    ) -> AppResult<InvalidationReport> {
        let employee_ids = self
            .policy_store
            .list_employees_by_department(department_id)
            .await?;
        let report = self.fan_out(employee_ids).await;
        log_report("department", &department_id.to_string(), &report);
        Ok(report)
    }

    /// Rebuilds one snapshot and writes it to every active session of the employee.
    pub async fn refresh_by_employee_id(
        &self,
        employee_id: EmployeeId,
    ) -> AppResult<InvalidationReport> {
        let sessions = self
            .sessions
            .list_active_sessions_for_employee(employee_id)
            .await?;
        let mut report = InvalidationReport {
            employees: 1,
            sessions: sessions.len(),
            ..InvalidationReport::default()
        };
        if sessions.is_empty() {
            return Ok(report);
        }

        let snapshot = self.snapshot_builder.build(employee_id).await?;
        for session in &sessions {
            if !self.cache.set(session, snapshot.clone()).await {
                report.cache_faults += 1;
            }
        }

        log_report("employee refresh", &employee_id.to_string(), &report);
        Ok(report)
    }

    async fn fan_out(&self, employee_ids: Vec<EmployeeId>) -> InvalidationReport {
        let employee_ids: BTreeSet<EmployeeId> = employee_ids.into_iter().collect();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for employee_id in employee_ids {
            let service = self.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                service.invalidate_employee(employee_id).await
            });
        }

        let mut report = InvalidationReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.absorb(outcome),
                Err(error) => {
                    warn!(error = %error, "permission invalidation task did not complete");
                    report.absorb(InvalidationReport {
                        employees: 1,
                        failed_employees: 1,
                        ..InvalidationReport::default()
                    });
                }
            }
        }

        report
    }

    async fn invalidate_employee(&self, employee_id: EmployeeId) -> InvalidationReport {
        let sessions = match self
            .sessions
            .list_active_sessions_for_employee(employee_id)
            .await
        {
            Ok(sessions) => sessions,
            Err(error) => {
                warn!(
                    employee_id = %employee_id,
                    error = %error,
                    "failed to list sessions for permission invalidation"
                );
                return InvalidationReport {
                    employees: 1,
                    failed_employees: 1,
                    ..InvalidationReport::default()
                };
            }
        };

        let session_ids: Vec<SessionId> = sessions
            .into_iter()
            .map(|session| session.session_id)
            .collect();
        let deleted = self.cache.delete_many(&session_ids).await;

        InvalidationReport {
            employees: 1,
            sessions: session_ids.len(),
            failed_employees: 0,
            cache_faults: if deleted { 0 } else { session_ids.len() },
        }
    }
}

fn log_report(scope: &str, target: &str, report: &InvalidationReport) {
    if report.is_complete() {
        info!(
            scope,
            target,
            employees = report.employees,
            sessions = report.sessions,
            "permission cache invalidated"
        );
    } else {
        warn!(
            scope,
            target,
            employees = report.employees,
            sessions = report.sessions,
            failed_employees = report.failed_employees,
            cache_faults = report.cache_faults,
            "permission cache invalidation incomplete, affected entries expire with their ttl"
        );
    }
}
