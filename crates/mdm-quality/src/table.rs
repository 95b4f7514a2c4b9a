//! Input resolution and the shared enrichment pass.
//!
//! The caller supplies a validated path or an in-memory frame; there is no
//! path-guessing fallback chain. Enrichment appends the derived columns
//! every analyzer reads (`stock_value`, `days_since_movement`) exactly once,
//! so no analyzer carries its own inline formula for the same concept.
//! The source table itself is never mutated or persisted back.

use chrono::NaiveDate;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::AuditConfig;
use crate::error::{AuditError, Result};
use crate::schema;

/// Date format used by the source extracts.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Load a materials CSV from an explicit path.
///
/// A missing file is a [`AuditError::SourceNotFound`], signalled up front
/// rather than surfacing later as an unguarded failure mid-analysis.
pub fn load_materials(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AuditError::SourceNotFound(path.display().to_string()));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    if df.height() == 0 {
        return Err(AuditError::EmptyDataset);
    }

    info!(
        "Loaded {} records x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(df)
}

/// Parse a movement/registration date cell.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

/// Append the derived columns to a working copy of the table.
///
/// - `stock_value` = `unit_price * current_stock` (null if either is null)
/// - `days_since_movement` = reference date minus `last_movement_date`
///   (null when the date is missing or unparseable; negative when the date
///   lies in the future — the movement analyzer reports both cases)
pub fn enrich(df: &DataFrame, config: &AuditConfig) -> Result<DataFrame> {
    schema::require_column(df, schema::CODE)?;
    let mut enriched = df.clone();

    let stock_values: Vec<Option<f64>> = if schema::has_column(df, schema::UNIT_PRICE)
        && schema::has_column(df, schema::CURRENT_STOCK)
    {
        let prices = schema::f64_values(df, schema::UNIT_PRICE)?;
        let stocks = schema::f64_values(df, schema::CURRENT_STOCK)?;
        prices
            .iter()
            .zip(stocks.iter())
            .map(|(price, stock)| match (price, stock) {
                (Some(p), Some(s)) => Some(p * s),
                _ => None,
            })
            .collect()
    } else {
        warn!("Price or stock column missing; stock_value not derivable");
        vec![None; df.height()]
    };
    enriched.with_column(Series::new(schema::STOCK_VALUE.into(), stock_values))?;

    if schema::has_column(df, schema::LAST_MOVEMENT_DATE) {
        let movement_dates = schema::str_values(df, schema::LAST_MOVEMENT_DATE)?;
        let days: Vec<Option<i64>> = movement_dates
            .iter()
            .map(|value| {
                value
                    .as_deref()
                    .and_then(parse_date)
                    .map(|date| (config.reference_date - date).num_days())
            })
            .collect();
        enriched.with_column(Series::new(schema::DAYS_SINCE_MOVEMENT.into(), days))?;
    } else {
        debug!("No '{}' column; movement age not derived", schema::LAST_MOVEMENT_DATE);
    }

    Ok(enriched)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AuditConfig {
        AuditConfig::builder()
            .reference_date(NaiveDate::from_ymd_opt(2026, 2, 27).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_load_materials_missing_file() {
        let result = load_materials("no/such/materials.csv");
        assert!(matches!(result, Err(AuditError::SourceNotFound(_))));
    }

    #[test]
    fn test_enrich_appends_stock_value() {
        let df = df![
            "code" => ["MAT-00001", "MAT-00002"],
            "unit_price" => [Some(10.0), None],
            "current_stock" => [5i64, 7],
        ]
        .unwrap();

        let enriched = enrich(&df, &test_config()).unwrap();
        let values = schema::f64_values(&enriched, schema::STOCK_VALUE).unwrap();
        assert_eq!(values[0], Some(50.0));
        assert_eq!(values[1], None); // null price -> null value, not zero
    }

    #[test]
    fn test_enrich_movement_days() {
        let df = df![
            "code" => ["MAT-00001", "MAT-00002", "MAT-00003"],
            "unit_price" => [1.0, 1.0, 1.0],
            "current_stock" => [1i64, 1, 1],
            "last_movement_date" => [Some("2026-02-17"), Some("not-a-date"), None],
        ]
        .unwrap();

        let enriched = enrich(&df, &test_config()).unwrap();
        let days = schema::i64_values(&enriched, schema::DAYS_SINCE_MOVEMENT).unwrap();
        assert_eq!(days[0], Some(10));
        assert_eq!(days[1], None);
        assert_eq!(days[2], None);
    }

    #[test]
    fn test_enrich_future_movement_date_goes_negative() {
        let df = df![
            "code" => ["MAT-00001"],
            "unit_price" => [1.0],
            "current_stock" => [1i64],
            "last_movement_date" => ["2026-03-09"],
        ]
        .unwrap();

        let enriched = enrich(&df, &test_config()).unwrap();
        let days = schema::i64_values(&enriched, schema::DAYS_SINCE_MOVEMENT).unwrap();
        assert_eq!(days[0], Some(-10)); // preserved for the movement analyzer to report
    }

    #[test]
    fn test_source_table_not_mutated() {
        let df = df![
            "code" => ["MAT-00001"],
            "unit_price" => [10.0],
            "current_stock" => [5i64],
        ]
        .unwrap();

        let _ = enrich(&df, &test_config()).unwrap();
        assert_eq!(df.width(), 3);
    }
}
