use backoffice_core::{AppError, AppResult};
use backoffice_domain::{
    DataScopeColumns, DataScopePredicate, PermissionContext, compile_data_scope_filter,
};
use tracing::error;

/// Compiles row-visibility predicates for list queries.
///
/// In strict mode a column-mapping fault is returned to the caller. Otherwise
/// it is logged and the query is narrowed to no rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataScopeFilterCompiler {
    strict: bool,
}

impl DataScopeFilterCompiler {
    /// Creates a compiler.
    #[must_use]
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Returns whether configuration faults are surfaced as errors.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Compiles the actor's data scope against a table's column mapping.
    pub fn compile(
        &self,
        context: &PermissionContext,
        columns: &DataScopeColumns,
    ) -> AppResult<DataScopePredicate> {
        match compile_data_scope_filter(context.snapshot(), columns) {
            Ok(predicate) => Ok(predicate),
            Err(AppError::Configuration(message)) if !self.strict => {
                error!(
                    employee_id = %context.snapshot().employee_id(),
                    data_scope = context.data_scope().as_str(),
                    error = %message,
                    "data scope column mapping is incomplete, denying all rows"
                );
                Ok(DataScopePredicate::DenyAll)
            }
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use backoffice_core::{AppError, DepartmentId, EmployeeId};
    use backoffice_domain::{
        DataScope, DataScopeColumns, DataScopePredicate, ModuleAllowList, PermissionContext,
        PermissionSnapshot, RolePolicy, ScopeAnchors,
    };
    use chrono::Utc;

    use super::DataScopeFilterCompiler;

    fn group_context() -> PermissionContext {
        PermissionContext::new(PermissionSnapshot::new(
            EmployeeId::new(),
            RolePolicy {
                data_scope: DataScope::Group,
                ..RolePolicy::unassigned()
            },
            ScopeAnchors {
                project_id: None,
                group_id: Some(DepartmentId::new()),
            },
            ModuleAllowList::unrestricted(),
            Utc::now(),
        ))
    }

    fn owner_only_columns() -> DataScopeColumns {
        match DataScopeColumns::new().owner("owner_id") {
            Ok(columns) => columns,
            Err(error) => panic!("column should parse: {error}"),
        }
    }

    #[test]
    fn lenient_mode_denies_all_on_missing_column() {
        let compiler = DataScopeFilterCompiler::new(false);

        let predicate = compiler.compile(&group_context(), &owner_only_columns());

        assert!(matches!(predicate, Ok(DataScopePredicate::DenyAll)));
    }

    #[test]
    fn strict_mode_surfaces_configuration_error() {
        let compiler = DataScopeFilterCompiler::new(true);

        let result = compiler.compile(&group_context(), &owner_only_columns());

        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn complete_mapping_compiles_in_both_modes() {
        let columns = match owner_only_columns().group("department_id") {
            Ok(columns) => columns,
            Err(error) => panic!("column should parse: {error}"),
        };

        for strict in [false, true] {
            let predicate =
                DataScopeFilterCompiler::new(strict).compile(&group_context(), &columns);
            assert!(matches!(predicate, Ok(DataScopePredicate::Equals { .. })));
        }
    }
}
