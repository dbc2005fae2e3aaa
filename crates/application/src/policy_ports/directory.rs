use async_trait::async_trait;
use backoffice_core::AppResult;
use backoffice_domain::DataScopePredicate;

use crate::EmployeeAssignment;

/// Read model of employees filtered by a row-visibility predicate.
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    /// Lists employees matching `predicate`, ordered by display name.
    async fn list_visible_employees(
        &self,
        predicate: &DataScopePredicate,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<EmployeeAssignment>>;
}
