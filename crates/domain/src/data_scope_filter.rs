use std::fmt::{Display, Formatter};

use backoffice_core::{AppError, AppResult, DepartmentId, EmployeeId, ProjectId};
use uuid::Uuid;

use crate::{DataScope, PermissionSnapshot};

/// Validated SQL column reference (`column` or `alias.column`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnName(String);

impl ColumnName {
    /// Validates a column reference; it is spliced into SQL verbatim.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let mut parts = value.split('.');
        let valid = match (parts.next(), parts.next(), parts.next()) {
            (Some(column), None, None) => is_sql_identifier(column),
            (Some(alias), Some(column), None) => {
                is_sql_identifier(alias) && is_sql_identifier(column)
            }
            _ => false,
        };

        if !valid {
            return Err(AppError::Validation(format!(
                "invalid column reference '{value}'"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the column reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ColumnName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

fn is_sql_identifier(value: &str) -> bool {
    let mut characters = value.chars();
    characters
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && characters.all(|character| character.is_ascii_alphanumeric() || character == '_')
}

/// Where a target table keeps its scope columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataScopeColumns {
    /// Column holding the owning employee id.
    pub owner_column: Option<ColumnName>,
    /// Column holding the department id.
    pub group_column: Option<ColumnName>,
    /// Column holding the project id.
    pub project_column: Option<ColumnName>,
    /// Explicit opt-out for tables that carry no department column.
    pub skip_group_filter: bool,
}

impl DataScopeColumns {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the owner column.
    pub fn owner(mut self, column: &str) -> AppResult<Self> {
        self.owner_column = Some(ColumnName::new(column)?);
        Ok(self)
    }

    /// Sets the department column.
    pub fn group(mut self, column: &str) -> AppResult<Self> {
        self.group_column = Some(ColumnName::new(column)?);
        Ok(self)
    }

    /// Sets the project column.
    pub fn project(mut self, column: &str) -> AppResult<Self> {
        self.project_column = Some(ColumnName::new(column)?);
        Ok(self)
    }

    /// Skips department filtering for this call site.
    #[must_use]
    pub fn without_group_filter(mut self) -> Self {
        self.skip_group_filter = true;
        self
    }
}

/// Bound value compared against a scope column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeValue {
    /// Owning employee.
    Employee(EmployeeId),
    /// Project anchor.
    Project(ProjectId),
    /// Department anchor.
    Department(DepartmentId),
}

impl ScopeValue {
    /// Returns the bindable UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        match self {
            Self::Employee(value) => value.as_uuid(),
            Self::Project(value) => value.as_uuid(),
            Self::Department(value) => value.as_uuid(),
        }
    }
}

/// Structured row predicate produced from a snapshot's data scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataScopePredicate {
    /// No restriction.
    Unrestricted,
    /// Matches no row.
    DenyAll,
    /// `column = value`.
    Equals {
        /// Compared column.
        column: ColumnName,
        /// Bound value.
        value: ScopeValue,
    },
}

/// Anchors of one row, for in-memory evaluation of a predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowScope<'a> {
    /// Owner column name and value.
    pub owner: Option<(&'a str, EmployeeId)>,
    /// Department column name and value.
    pub group: Option<(&'a str, DepartmentId)>,
    /// Project column name and value.
    pub project: Option<(&'a str, ProjectId)>,
}

impl DataScopePredicate {
    /// Returns whether the predicate can never match.
    #[must_use]
    pub fn is_deny_all(&self) -> bool {
        matches!(self, Self::DenyAll)
    }

    /// Evaluates the predicate against one already-fetched row.
    #[must_use]
    pub fn matches(&self, row: &RowScope<'_>) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::DenyAll => false,
            Self::Equals { column, value } => {
                let column = column.as_str();
                match value {
                    ScopeValue::Employee(expected) => row
                        .owner
                        .is_some_and(|(name, actual)| name == column && actual == *expected),
                    ScopeValue::Department(expected) => row
                        .group
                        .is_some_and(|(name, actual)| name == column && actual == *expected),
                    ScopeValue::Project(expected) => row
                        .project
                        .is_some_and(|(name, actual)| name == column && actual == *expected),
                }
            }
        }
    }
}

/// Compiles a snapshot's data scope into a predicate over `columns`.
///
/// A scope that needs a column the mapping lacks yields
/// [`AppError::Configuration`]; it is never widened to unrestricted.
pub fn compile_data_scope_filter(
    snapshot: &PermissionSnapshot,
    columns: &DataScopeColumns,
) -> AppResult<DataScopePredicate> {
    let scope = snapshot.role().data_scope;
    let anchors = snapshot.scope_anchors();

    match scope {
        DataScope::All => Ok(DataScopePredicate::Unrestricted),
        DataScope::Project => {
            let column = required_column(columns.project_column.as_ref(), scope)?;
            Ok(anchors
                .project_id
                .map_or(DataScopePredicate::DenyAll, |project_id| {
                    DataScopePredicate::Equals {
                        column,
                        value: ScopeValue::Project(project_id),
                    }
                }))
        }
        DataScope::Group => {
            if columns.skip_group_filter {
                return Ok(DataScopePredicate::Unrestricted);
            }

            let column = required_column(columns.group_column.as_ref(), scope)?;
            Ok(anchors
                .group_id
                .map_or(DataScopePredicate::DenyAll, |group_id| {
                    DataScopePredicate::Equals {
                        column,
                        value: ScopeValue::Department(group_id),
                    }
                }))
        }
        DataScope::SelfOnly => {
            let column = required_column(columns.owner_column.as_ref(), scope)?;
            Ok(DataScopePredicate::Equals {
                column,
                value: ScopeValue::Employee(snapshot.employee_id()),
            })
        }
    }
}

fn required_column(column: Option<&ColumnName>, scope: DataScope) -> AppResult<ColumnName> {
    column.cloned().ok_or_else(|| {
        AppError::Configuration(format!(
            "data scope '{}' requires a {} column but the table mapping does not provide one",
            scope.as_str(),
            match scope {
                DataScope::Project => "project",
                DataScope::Group => "group",
                _ => "owner",
            }
        ))
    })
}
