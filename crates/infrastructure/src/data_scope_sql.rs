use backoffice_domain::DataScopePredicate;
use sqlx::{Postgres, QueryBuilder};

/// Appends a row-visibility predicate to a query under construction.
///
/// Column names come from validated mappings; scope values are always bound.
pub fn push_data_scope_predicate(
    builder: &mut QueryBuilder<'_, Postgres>,
    predicate: &DataScopePredicate,
) {
    match predicate {
        DataScopePredicate::Unrestricted => {
            builder.push("TRUE");
        }
        DataScopePredicate::DenyAll => {
            builder.push("FALSE");
        }
        DataScopePredicate::Equals { column, value } => {
            builder.push(column.as_str());
            builder.push(" = ");
            builder.push_bind(value.as_uuid());
        }
    }
}

#[cfg(test)]
mod tests {
    use backoffice_core::{DepartmentId, EmployeeId};
    use backoffice_domain::{ColumnName, DataScopePredicate, ScopeValue};
    use sqlx::{Postgres, QueryBuilder};

    use super::push_data_scope_predicate;

    fn render(predicate: &DataScopePredicate) -> String {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT id FROM leave_requests WHERE ");
        push_data_scope_predicate(&mut builder, predicate);
        builder.sql().to_owned()
    }

    fn column(name: &str) -> ColumnName {
        match ColumnName::new(name) {
            Ok(column) => column,
            Err(error) => panic!("column should parse: {error}"),
        }
    }

    #[test]
    fn equality_binds_the_scope_value() {
        let sql = render(&DataScopePredicate::Equals {
            column: column("lr.department_id"),
            value: ScopeValue::Department(DepartmentId::new()),
        });

        assert_eq!(sql, "SELECT id FROM leave_requests WHERE lr.department_id = $1");
    }

    #[test]
    fn constant_predicates_render_as_literals() {
        assert_eq!(
            render(&DataScopePredicate::Unrestricted),
            "SELECT id FROM leave_requests WHERE TRUE"
        );
        assert_eq!(
            render(&DataScopePredicate::DenyAll),
            "SELECT id FROM leave_requests WHERE FALSE"
        );
        let owner = render(&DataScopePredicate::Equals {
            column: column("owner_id"),
            value: ScopeValue::Employee(EmployeeId::new()),
        });
        assert!(owner.ends_with("owner_id = $1"));
    }
}
