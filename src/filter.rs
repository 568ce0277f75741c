use crate::error::{DashboardError, Result};
use crate::filter_spec::{Constraint, FilterSpec};
use crate::table::{CellValue, Table};
use polars::prelude::*;
use tracing::debug;

/// Apply every constraint of `spec` to `table` and return the matching rows as a new table.
///
/// Constraints are validated against the table schema before anything runs, so a single
/// unknown column, or a range or flag over a text column, fails the whole evaluation.
pub fn apply_filters(table: &Table, spec: &FilterSpec) -> Result<Table> {
    for constraint in &spec.constraints {
        for column in constraint.columns() {
            match constraint {
                Constraint::Include { .. } => table.require_column(column)?,
                _ => table.require_numeric(column)?,
            };
        }
        if let Constraint::Range { column, bounds } = constraint {
            bounds.validate(column)?;
        }
    }

    let predicate = spec
        .constraints
        .iter()
        .filter_map(constraint_expr)
        .reduce(|acc, expr| acc.and(expr));

    let Some(predicate) = predicate else {
        debug!("No restrictive constraints, keeping all {} rows", table.height());
        return Ok(table.clone());
    };

    let rows_before = table.height();
    let frame = table
        .frame()
        .clone()
        .lazy()
        .filter(predicate)
        .collect()
        .map_err(|e| DashboardError::Polars(format!("Filter failed: {}", e)))?;

    debug!(
        "Applied {} constraints: {} rows -> {} rows",
        spec.len(),
        rows_before,
        frame.height()
    );

    Ok(Table::derived(frame))
}

/// Predicate for one constraint, `None` when it does not restrict anything.
fn constraint_expr(constraint: &Constraint) -> Option<Expr> {
    match constraint {
        Constraint::Range { column, bounds } => Some(
            numeric(column)
                .gt_eq(lit(bounds.min))
                .and(numeric(column).lt_eq(lit(bounds.max))),
        ),
        Constraint::Include { column, allowed } => allowed
            .iter()
            .map(|value| equals(column, value))
            .reduce(|acc, expr| acc.or(expr)),
        Constraint::AnyFlag { columns } => columns
            .iter()
            .map(|column| truthy(column))
            .reduce(|acc, expr| acc.or(expr)),
        Constraint::FlagSet { column } => Some(truthy(column)),
    }
}

fn numeric(column: &str) -> Expr {
    col(column).cast(DataType::Float64)
}

pub(crate) fn truthy(column: &str) -> Expr {
    numeric(column).eq(lit(1.0)).fill_null(lit(false))
}

fn equals(column: &str, value: &CellValue) -> Expr {
    match value {
        CellValue::Null => col(column).is_null(),
        CellValue::Flag(b) => numeric(column).eq(lit(if *b { 1.0 } else { 0.0 })),
        CellValue::Number(n) => numeric(column).eq(lit(*n)),
        CellValue::Text(s) => col(column).cast(DataType::String).eq(lit(s.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deals() -> Table {
        let frame = df![
            "Record ID" => [1i64, 2, 3, 4, 5],
            "Deal Score" => [10.0, 40.0, 60.0, 80.0, 95.0],
            "Deal Stage" => ["Lost", "Open", "Open", "Won", "Won"],
            "Deal Type_New" => [1i64, 0, 0, 1, 0],
            "Deal Type_Renewal" => [0i64, 1, 0, 0, 1],
        ]
        .unwrap();
        Table::new(frame).unwrap()
    }

    fn ids(table: &Table) -> Vec<Option<f64>> {
        table.numeric_values("Record ID").unwrap()
    }

    #[test]
    fn test_range_is_inclusive() {
        let spec = FilterSpec::new().range("Deal Score", 50.0, 100.0);
        let filtered = apply_filters(&deals(), &spec).unwrap();
        assert_eq!(ids(&filtered), vec![Some(3.0), Some(4.0), Some(5.0)]);

        let spec = FilterSpec::new().range("Deal Score", 10.0, 95.0);
        assert_eq!(apply_filters(&deals(), &spec).unwrap().height(), 5);
    }

    #[test]
    fn test_include_and_any_flag() {
        let spec = FilterSpec::new()
            .include("Deal Stage", ["Open", "Won"])
            .any_flag(["Deal Type_New"]);
        let filtered = apply_filters(&deals(), &spec).unwrap();
        assert_eq!(ids(&filtered), vec![Some(4.0)]);
    }

    #[test]
    fn test_empty_selection_does_not_filter() {
        let spec = FilterSpec::new()
            .include("Deal Stage", Vec::<CellValue>::new())
            .any_flag(Vec::<String>::new());
        assert_eq!(apply_filters(&deals(), &spec).unwrap().height(), 5);
    }

    #[test]
    fn test_numeric_constraints_reject_text_columns() {
        for spec in [
            FilterSpec::new().range("Deal Stage", 0.0, 100.0),
            FilterSpec::new().any_flag(["Deal Type_New", "Deal Stage"]),
            FilterSpec::new().flag_set("Deal Stage"),
        ] {
            let err = apply_filters(&deals(), &spec).unwrap_err();
            assert!(err.is_configuration());
            assert!(err.to_string().contains("'Deal Stage' is not numeric"));
        }
    }

    #[test]
    fn test_flag_set_gate() {
        let spec = FilterSpec::new().flag_set("Deal Type_Renewal");
        let filtered = apply_filters(&deals(), &spec).unwrap();
        assert_eq!(ids(&filtered), vec![Some(2.0), Some(5.0)]);
    }

    #[test]
    fn test_unknown_column_is_a_configuration_error() {
        let spec = FilterSpec::new()
            .range("Deal Score", 0.0, 100.0)
            .include("Stage", ["Won"]);
        let err = apply_filters(&deals(), &spec).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Stage"));
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let spec = FilterSpec::new().range("Deal Score", 90.0, 10.0);
        assert!(apply_filters(&deals(), &spec).unwrap_err().is_configuration());
    }

    #[test]
    fn test_source_table_is_untouched() {
        let table = deals();
        let spec = FilterSpec::new().range("Deal Score", 90.0, 100.0);
        let filtered = apply_filters(&table, &spec).unwrap();
        assert_eq!(filtered.height(), 1);
        assert_eq!(table.height(), 5);
    }
}
