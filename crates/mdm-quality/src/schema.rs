//! Column names and typed accessors for the materials table.
//!
//! Analyzers address columns through these constants and helpers rather than
//! string literals, so a schema change is a one-file edit.

use crate::error::{AuditError, Result};
use polars::prelude::*;

/// Unique material key. Duplicate detection targets violations of its
/// assumed uniqueness.
pub const CODE: &str = "code";
/// Free-text description.
pub const DESCRIPTION: &str = "description";
pub const CATEGORY: &str = "category";
pub const UNIT_OF_MEASURE: &str = "unit_of_measure";
pub const TAX_CODE: &str = "tax_code";
pub const UNIT_PRICE: &str = "unit_price";
pub const CURRENT_STOCK: &str = "current_stock";
pub const MIN_STOCK: &str = "min_stock";
pub const SUPPLIER: &str = "supplier";
pub const COST_CENTER: &str = "cost_center";
pub const STORAGE_LOCATION: &str = "storage_location";
pub const REGISTRAR: &str = "registrar";
pub const REGISTRATION_DATE: &str = "registration_date";
pub const LAST_MOVEMENT_DATE: &str = "last_movement_date";
pub const STATUS: &str = "status";

/// Externally supplied physical count, used by the accuracy analyzer when
/// present; simulated otherwise.
pub const PHYSICAL_COUNT: &str = "physical_count";

/// Derived: `unit_price * current_stock`, appended by the enrichment pass.
pub const STOCK_VALUE: &str = "stock_value";
/// Derived: days between `last_movement_date` and the reference date.
/// Negative values mean a movement date in the future (a data error).
pub const DAYS_SINCE_MOVEMENT: &str = "days_since_movement";

/// Check that a column exists, with a descriptive error if not.
pub fn require_column(df: &DataFrame, name: &str) -> Result<()> {
    if df.get_column_names().iter().any(|c| c.as_str() == name) {
        Ok(())
    } else {
        Err(AuditError::ColumnNotFound(name.to_string()))
    }
}

/// Whether an optional column is present.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Materialize a column as owned optional strings.
///
/// Non-string columns are rendered through their display form, matching how
/// the source CSVs carry every field as text.
pub fn str_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    require_column(df, name)?;
    let col = df.column(name)?;
    let series = col.as_materialized_series();

    if series.dtype() == &DataType::String {
        let str_series = series.str()?;
        Ok(str_series
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect())
    } else {
        let mut values = Vec::with_capacity(series.len());
        for i in 0..series.len() {
            let val = series.get(i)?;
            if matches!(val, AnyValue::Null) {
                values.push(None);
            } else {
                values.push(Some(format!("{}", val)));
            }
        }
        Ok(values)
    }
}

/// Materialize a column as optional f64 values, casting numerics as needed.
pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    require_column(df, name)?;
    let col = df.column(name)?;
    let series = col.as_materialized_series();
    let float_series = series.cast(&DataType::Float64)?;
    Ok(float_series.f64()?.into_iter().collect())
}

/// Materialize a column as optional i64 values.
pub fn i64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    require_column(df, name)?;
    let col = df.column(name)?;
    let series = col.as_materialized_series();
    let int_series = series.cast(&DataType::Int64)?;
    Ok(int_series.i64()?.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_column() {
        let df = df!["code" => ["MAT-00001"]].unwrap();
        assert!(require_column(&df, "code").is_ok());
        assert!(matches!(
            require_column(&df, "supplier"),
            Err(AuditError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_str_values_preserves_nulls() {
        let df = df!["description" => [Some("Bolt M6"), None, Some("Nut M6")]].unwrap();
        let values = str_values(&df, "description").unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0].as_deref(), Some("Bolt M6"));
        assert!(values[1].is_none());
    }

    #[test]
    fn test_f64_values_casts_integers() {
        let df = df!["current_stock" => [10i64, 0, 250]].unwrap();
        let values = f64_values(&df, "current_stock").unwrap();
        assert_eq!(values, vec![Some(10.0), Some(0.0), Some(250.0)]);
    }
}
