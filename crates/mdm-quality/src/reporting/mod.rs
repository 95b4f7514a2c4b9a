//! Report output: ranked CSV exports, a JSON dump of the full report and a
//! plain-text summary.
//!
//! Export schemas are stable; downstream remediation sheets key on these
//! column names.

use polars::prelude::*;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::{AuditError, Result};
use crate::types::AuditReport;

/// Writes audit outputs under a target directory.
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write every available export plus the JSON report. Returns the paths
    /// written. Sections the audit skipped are skipped here too.
    pub fn write_all(&self, report: &AuditReport) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.output_dir)?;
        let mut written = Vec::new();

        if let Some(duplicates) = &report.duplicates
            && !duplicates.description_groups.is_empty()
        {
            let mut df = df![
                "description" => duplicates.description_groups.iter().map(|g| g.description.clone()).collect::<Vec<_>>(),
                "duplicate_count" => duplicates.description_groups.iter().map(|g| g.duplicate_count as u32).collect::<Vec<_>>(),
                "all_codes" => duplicates.description_groups.iter().map(|g| g.all_codes.join(", ")).collect::<Vec<_>>(),
                "code_to_keep" => duplicates.description_groups.iter().map(|g| g.code_to_keep.clone()).collect::<Vec<_>>(),
                "codes_to_remove" => duplicates.description_groups.iter().map(|g| g.codes_to_remove.join(", ")).collect::<Vec<_>>(),
                "category" => duplicates.description_groups.iter().map(|g| g.category.clone()).collect::<Vec<_>>(),
                "total_stock_value" => duplicates.description_groups.iter().map(|g| g.total_stock_value).collect::<Vec<_>>(),
            ]?;
            written.push(self.write_csv("duplicates.csv", &mut df)?);
        }

        if let Some(pricing) = &report.pricing
            && !pricing.suspects.is_empty()
        {
            let mut df = df![
                "code" => pricing.suspects.iter().map(|s| s.code.clone()).collect::<Vec<_>>(),
                "category" => pricing.suspects.iter().map(|s| s.category.clone()).collect::<Vec<_>>(),
                "unit_price" => pricing.suspects.iter().map(|s| s.unit_price).collect::<Vec<_>>(),
                "current_stock" => pricing.suspects.iter().map(|s| s.current_stock).collect::<Vec<_>>(),
                "stock_value" => pricing.suspects.iter().map(|s| s.stock_value).collect::<Vec<_>>(),
                "z_score" => pricing.suspects.iter().map(|s| s.z).collect::<Vec<_>>(),
                "category_ratio" => pricing.suspects.iter().map(|s| s.category_ratio).collect::<Vec<_>>(),
                "rules" => pricing.suspects.iter().map(|s| s.flags.labels().join(" + ")).collect::<Vec<_>>(),
                "score" => pricing.suspects.iter().map(|s| s.score).collect::<Vec<_>>(),
            ]?;
            written.push(self.write_csv("price_suspects.csv", &mut df)?);
        }

        if let Some(movement) = &report.movement
            && !movement.top_stalled.is_empty()
        {
            let mut df = df![
                "code" => movement.top_stalled.iter().map(|s| s.code.clone()).collect::<Vec<_>>(),
                "category" => movement.top_stalled.iter().map(|s| s.category.clone()).collect::<Vec<_>>(),
                "days_since_movement" => movement.top_stalled.iter().map(|s| s.days_since_movement).collect::<Vec<_>>(),
                "stock_value" => movement.top_stalled.iter().map(|s| s.stock_value).collect::<Vec<_>>(),
                "critical" => movement.top_stalled.iter().map(|s| s.critical).collect::<Vec<_>>(),
            ]?;
            written.push(self.write_csv("stalled_inventory.csv", &mut df)?);
        }

        if let Some(categories) = &report.categories
            && !categories.mismatches.is_empty()
        {
            let mut df = df![
                "code" => categories.mismatches.iter().map(|m| m.code.clone()).collect::<Vec<_>>(),
                "description" => categories.mismatches.iter().map(|m| m.description.clone()).collect::<Vec<_>>(),
                "current_category" => categories.mismatches.iter().map(|m| m.current_category.clone()).collect::<Vec<_>>(),
                "suggested_category" => categories.mismatches.iter().map(|m| m.suggested_category.clone()).collect::<Vec<_>>(),
                "keyword" => categories.mismatches.iter().map(|m| m.keyword.clone()).collect::<Vec<_>>(),
                "stock_value" => categories.mismatches.iter().map(|m| m.stock_value).collect::<Vec<_>>(),
            ]?;
            written.push(self.write_csv("category_mismatches.csv", &mut df)?);
        }

        written.push(self.write_json(report)?);

        info!("Wrote {} report files to {}", written.len(), self.output_dir.display());
        Ok(written)
    }

    fn write_csv(&self, name: &str, df: &mut DataFrame) -> Result<PathBuf> {
        let path = self.output_dir.join(name);
        let mut file = File::create(&path)
            .map_err(|e| AuditError::ExportFailed(format!("{}: {}", path.display(), e)))?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .finish(df)?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }

    fn write_json(&self, report: &AuditReport) -> Result<PathBuf> {
        let path = self.output_dir.join("audit_report.json");
        let json = serde_json::to_string_pretty(report)?;
        fs::write(&path, json)?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }
}

/// Render a human-readable summary of an audit report.
pub fn render_summary(report: &AuditReport) -> String {
    let mut out = String::new();
    let line = "=".repeat(72);

    let _ = writeln!(out, "{line}");
    let _ = writeln!(
        out,
        "MATERIALS MASTER-DATA AUDIT  ({} records x {} columns, as of {})",
        report.rows, report.columns, report.reference_date
    );
    let _ = writeln!(out, "{line}");

    if let Some(completeness) = &report.completeness {
        let (complete, good, fair, incomplete) = completeness.band_counts;
        let _ = writeln!(out, "\nCOMPLETENESS");
        let _ = writeln!(
            out,
            "  Mean record score: {:.1}%  (complete {}, good {}, fair {}, incomplete {})",
            completeness.mean_record_score, complete, good, fair, incomplete
        );
        for field in completeness.fields.iter().take(5) {
            let _ = writeln!(
                out,
                "  {:<24} {:>6.1}% filled ({} blank)",
                field.field, field.fill_pct, field.blank
            );
        }
        if !completeness.required_violations.is_empty() {
            let total: usize = completeness.required_violations.iter().map(|v| v.count).sum();
            let _ = writeln!(out, "  Required-field violations: {total}");
        }
    }

    if let Some(duplicates) = &report.duplicates {
        let _ = writeln!(out, "\nDUPLICATES");
        let _ = writeln!(
            out,
            "  Exact code violations: {} records over {} codes",
            duplicates.exact_code_duplicate_records, duplicates.exact_code_duplicate_keys
        );
        let _ = writeln!(
            out,
            "  Description groups: {} ({} records affected)",
            duplicates.description_group_count, duplicates.description_duplicate_records
        );
        for group in duplicates.description_groups.iter().take(3) {
            let _ = writeln!(
                out,
                "    \"{}\" x{}  value at stake {:.2}  keep {}",
                group.description, group.duplicate_count, group.total_stock_value, group.code_to_keep
            );
        }
    }

    if let Some(standardization) = &report.standardization {
        let _ = writeln!(out, "\nSTANDARDIZATION");
        for casing in &standardization.casing {
            if casing.inconsistent > 0 {
                let _ = writeln!(
                    out,
                    "  {:<24} dominant {:<10} {} inconsistent",
                    casing.field,
                    casing.dominant.label(),
                    casing.inconsistent
                );
            }
        }
        for reduction in &standardization.reductions {
            if reduction.reduction > 0 {
                let _ = writeln!(
                    out,
                    "  {:<24} {} -> {} distinct values after normalization",
                    reduction.field, reduction.distinct_before, reduction.distinct_after
                );
            }
        }
    }

    if let Some(pricing) = &report.pricing {
        let _ = writeln!(out, "\nPRICING");
        let _ = writeln!(
            out,
            "  Valid prices: {}  zero: {}  missing: {}",
            pricing.distribution.valid_count,
            pricing.distribution.zero_count,
            pricing.distribution.missing_count
        );
        let _ = writeln!(
            out,
            "  Outliers: z-score {}, IQR {}, intra-category {}; {} suspects total",
            pricing.z_outlier_count,
            pricing.iqr_outlier_count,
            pricing.ratio_outlier_count,
            pricing.total_suspects
        );
        for suspect in pricing.suspects.iter().take(3) {
            let _ = writeln!(
                out,
                "    {:<12} price {:>10.2}  score {:>5.1}  [{}]",
                suspect.code.as_deref().unwrap_or("-"),
                suspect.unit_price.unwrap_or(0.0),
                suspect.score,
                suspect.flags.labels().join(" + ")
            );
        }
    }

    if let Some(movement) = &report.movement {
        let _ = writeln!(out, "\nMOVEMENT");
        let _ = writeln!(
            out,
            "  Stalled: {} records ({:.1}%), value {:.2}; critical: {} (value {:.2})",
            movement.stalled_count,
            movement.stalled_pct,
            movement.stalled_value,
            movement.critical_count,
            movement.critical_value
        );
        if !movement.invalid_dates.is_empty() {
            let _ = writeln!(
                out,
                "  Invalid movement dates: {} (reported, not clamped)",
                movement.invalid_dates.len()
            );
        }
        if let Some(accuracy) = &movement.accuracy {
            let (a, b, c, d, f) = accuracy.class_counts;
            let _ = writeln!(
                out,
                "  Count accuracy{}: qty {}  A/B/C/D/F = {}/{}/{}/{}/{}",
                if accuracy.simulated { " (simulated)" } else { "" },
                accuracy
                    .overall_qty_accuracy_pct
                    .map(|p| format!("{:.2}%", p))
                    .unwrap_or_else(|| "n/a".to_string()),
                a,
                b,
                c,
                d,
                f
            );
        }
    }

    if let Some(supplier_abc) = &report.supplier_abc {
        let (a, b, c) = supplier_abc.class_counts;
        let _ = writeln!(out, "\nSUPPLIER CONCENTRATION");
        let _ = writeln!(
            out,
            "  {} suppliers, total value {:.2}; classes A/B/C = {}/{}/{}",
            supplier_abc.entities.len(),
            supplier_abc.total_value,
            a,
            b,
            c
        );
    }

    if let Some(categories) = &report.categories {
        let _ = writeln!(out, "\nCATEGORIES");
        let _ = writeln!(
            out,
            "  {} categories; {} suspected miscategorizations; {} multi-category descriptions",
            categories.stats.len(),
            categories.total_mismatches,
            categories.multi_category_count
        );
        for overlap in &categories.overlaps {
            if overlap.common_descriptions > 0 {
                let _ = writeln!(
                    out,
                    "  overlap {} x {}: {:.1}% ({:?})",
                    overlap.category_a, overlap.category_b, overlap.overlap_pct, overlap.severity
                );
            }
        }
    }

    if !report.skipped.is_empty() {
        let _ = writeln!(out, "\nSKIPPED SECTIONS");
        for skipped in &report.skipped {
            let _ = writeln!(out, "  {}: {}", skipped.section, skipped.reason);
        }
    }

    let _ = writeln!(out, "\n{line}");
    out
}
