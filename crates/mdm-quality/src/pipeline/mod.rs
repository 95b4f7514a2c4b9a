//! The audit pipeline.
//!
//! Validates configuration, enriches the table once, then runs each
//! analyzer independently. A failure or missing optional column degrades
//! that section with a warning; it never aborts the others.

use polars::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::analyzers::{
    CompletenessAnalyzer, ConcentrationAnalyzer, DuplicateDetector, MovementAnalyzer,
    PriceAnalyzer, StandardizationAnalyzer,
};
use crate::config::AuditConfig;
use crate::error::{AuditError, Result};
use crate::schema;
use crate::table;
use crate::types::{AuditReport, SkippedSection};

/// The main audit pipeline.
///
/// Use [`AuditPipeline::builder()`] for fluent setup.
///
/// # Example
///
/// ```rust,ignore
/// use mdm_quality::{AuditConfig, AuditPipeline};
/// use chrono::NaiveDate;
///
/// let report = AuditPipeline::builder()
///     .config(
///         AuditConfig::builder()
///             .reference_date(NaiveDate::from_ymd_opt(2026, 2, 27).unwrap())
///             .build()?,
///     )
///     .build()?
///     .run(&df)?;
///
/// println!("{} sections produced", report.sections_run());
/// ```
pub struct AuditPipeline {
    config: AuditConfig,
}

impl AuditPipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> AuditPipelineBuilder {
        AuditPipelineBuilder::default()
    }

    /// Create a pipeline from a validated configuration.
    pub fn new(config: AuditConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| AuditError::InvalidConfig(e.to_string()))?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Load a materials CSV and audit it.
    pub fn run_path(&self, path: impl AsRef<Path>) -> Result<AuditReport> {
        let df = table::load_materials(path)?;
        self.run(&df)
    }

    /// Audit an in-memory table. The input is never mutated; analyzers see
    /// an enriched working copy.
    pub fn run(&self, df: &DataFrame) -> Result<AuditReport> {
        if df.height() == 0 {
            return Err(AuditError::EmptyDataset);
        }
        let started = Instant::now();
        info!(
            "Auditing {} records as of {}",
            df.height(),
            self.config.reference_date
        );

        let enriched = table::enrich(df, &self.config)?;
        let mut skipped = Vec::new();

        let completeness = Self::section("completeness", &mut skipped, || {
            CompletenessAnalyzer::analyze(&enriched, &self.config)
        });
        let duplicates = Self::section("duplicates", &mut skipped, || {
            DuplicateDetector::analyze(&enriched, &self.config)
        });
        let standardization = Self::section("standardization", &mut skipped, || {
            StandardizationAnalyzer::analyze(&enriched, &self.config)
        });
        let pricing = Self::section("pricing", &mut skipped, || {
            PriceAnalyzer::analyze(&enriched, &self.config)
        });
        let movement = Self::section("movement", &mut skipped, || {
            MovementAnalyzer::analyze(&enriched, &self.config)
        });
        let supplier_abc = Self::section("supplier_abc", &mut skipped, || {
            ConcentrationAnalyzer::abc(&enriched, schema::SUPPLIER, &self.config)
        });
        let category_abc = Self::section("category_abc", &mut skipped, || {
            ConcentrationAnalyzer::abc(&enriched, schema::CATEGORY, &self.config)
        });
        let categories = Self::section("categories", &mut skipped, || {
            ConcentrationAnalyzer::categories(&enriched, &self.config)
        });

        let report = AuditReport {
            rows: df.height(),
            columns: df.width(),
            reference_date: self.config.reference_date,
            duration_ms: started.elapsed().as_millis() as u64,
            completeness,
            duplicates,
            standardization,
            pricing,
            movement,
            supplier_abc,
            category_abc,
            categories,
            skipped,
        };
        info!(
            "Audit finished: {}/8 sections in {}ms",
            report.sections_run(),
            report.duration_ms
        );
        Ok(report)
    }

    fn section<T>(
        name: &str,
        skipped: &mut Vec<SkippedSection>,
        run: impl FnOnce() -> anyhow::Result<T>,
    ) -> Option<T> {
        match run() {
            Ok(result) => {
                debug!("Section '{}' complete", name);
                Some(result)
            }
            Err(e) => {
                warn!("Section '{}' skipped: {}", name, e);
                skipped.push(SkippedSection {
                    section: name.to_string(),
                    reason: e.to_string(),
                });
                None
            }
        }
    }
}

/// Builder for [`AuditPipeline`].
#[derive(Debug, Default)]
pub struct AuditPipelineBuilder {
    config: Option<AuditConfig>,
}

impl AuditPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: AuditConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the pipeline, validating the configuration.
    pub fn build(self) -> Result<AuditPipeline> {
        AuditPipeline::new(self.config.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn pipeline() -> AuditPipeline {
        AuditPipeline::builder()
            .config(
                AuditConfig::builder()
                    .reference_date(NaiveDate::from_ymd_opt(2026, 2, 27).unwrap())
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    fn full_frame() -> DataFrame {
        df![
            "code" => ["MAT-00001", "MAT-00002", "MAT-00003"],
            "description" => ["Hex bolt M6", "hex bolt m6", "Hydraulic hose"],
            "category" => ["Fasteners", "Fasteners", "Hydraulic"],
            "unit_of_measure" => ["EA", "EA", "M"],
            "unit_price" => [1.5, 1.6, 12.0],
            "current_stock" => [100i64, 40, 25],
            "supplier" => [Some("Acme"), Some("Acme"), None],
            "last_movement_date" => ["2026-02-01", "2024-01-01", "2026-02-20"],
            "status" => ["Active", "active", "Active"],
        ]
        .unwrap()
    }

    #[test]
    fn test_run_produces_all_sections() {
        let report = pipeline().run(&full_frame()).unwrap();
        assert_eq!(report.sections_run(), 8);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_empty_table_is_fatal() {
        let df = df!["code" => Vec::<String>::new()].unwrap();
        let result = pipeline().run(&df);
        assert!(matches!(result, Err(AuditError::EmptyDataset)));
    }

    #[test]
    fn test_missing_optional_column_degrades_gracefully() {
        let df = df![
            "code" => ["MAT-00001", "MAT-00002"],
            "description" => ["Hex bolt", "Washer"],
            "category" => ["Fasteners", "Fasteners"],
            "unit_price" => [1.5, 0.2],
            "current_stock" => [10i64, 20],
        ]
        .unwrap();
        let report = pipeline().run(&df).unwrap();

        // No supplier and no movement dates: those sections are skipped
        assert!(report.supplier_abc.is_none());
        assert!(report.movement.is_none());
        assert!(report.skipped.iter().any(|s| s.section == "supplier_abc"));

        // Everything else still runs
        assert!(report.completeness.is_some());
        assert!(report.duplicates.is_some());
        assert!(report.pricing.is_some());
        assert!(report.categories.is_some());
    }

    #[test]
    fn test_invalid_config_rejected_at_build() {
        let config = AuditConfig {
            top_n: 0,
            ..AuditConfig::default()
        };
        assert!(matches!(
            AuditPipeline::new(config),
            Err(AuditError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_input_frame_unchanged() {
        let df = full_frame();
        let before = df.clone();
        let _ = pipeline().run(&df).unwrap();
        assert_eq!(df.width(), before.width());
        assert_eq!(df.height(), before.height());
    }
}
