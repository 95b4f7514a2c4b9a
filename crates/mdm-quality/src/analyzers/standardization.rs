//! Standardization analyzer: casing consistency, incidental text defects
//! and categorical-variant reduction.
//!
//! The analyzer only reports what normalization *would* do; it never writes
//! normalized values back.

use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::AuditConfig;
use crate::schema;
use crate::text::{CasingPattern, canonicalize, classify_casing, detect_defects, is_blank};

/// Free-text fields whose casing pattern is worth checking.
const CASING_FIELDS: [&str; 5] = [
    schema::DESCRIPTION,
    schema::CATEGORY,
    schema::SUPPLIER,
    schema::STATUS,
    schema::REGISTRAR,
];

/// Categorical fields where distinct raw variants should collapse to one
/// canonical value.
const CATEGORICAL_FIELDS: [&str; 5] = [
    schema::CATEGORY,
    schema::UNIT_OF_MEASURE,
    schema::STATUS,
    schema::SUPPLIER,
    schema::COST_CENTER,
];

/// Casing distribution of one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasingDistribution {
    pub field: String,
    pub all_upper: usize,
    pub all_lower: usize,
    pub title_case: usize,
    pub irregular: usize,
    /// Most common pattern; ties resolved in enum order for stable output.
    pub dominant: CasingPattern,
    /// Values not matching the dominant pattern.
    pub inconsistent: usize,
}

/// Incidental defect counts for one field. A single value may contribute to
/// several counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefects {
    pub field: String,
    pub leading_whitespace: usize,
    pub trailing_whitespace: usize,
    pub repeated_whitespace: usize,
    pub special_characters: usize,
    pub total_defects: usize,
}

/// Raw variants collapsing to one canonical value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalBucket {
    pub canonical: String,
    /// The raw spellings observed, sorted, for human review.
    pub variants: Vec<String>,
}

/// How many distinct raw values a field loses under trim + uppercase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoricalReduction {
    pub field: String,
    pub distinct_before: usize,
    pub distinct_after: usize,
    pub reduction: usize,
    /// Only buckets with more than one raw variant.
    pub buckets: Vec<CanonicalBucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardizationReport {
    pub casing: Vec<CasingDistribution>,
    pub defects: Vec<FieldDefects>,
    pub reductions: Vec<CategoricalReduction>,
}

pub struct StandardizationAnalyzer;

impl StandardizationAnalyzer {
    pub fn analyze(df: &DataFrame, _config: &AuditConfig) -> Result<StandardizationReport> {
        let mut casing = Vec::new();
        let mut defects = Vec::new();
        for field in CASING_FIELDS {
            if !schema::has_column(df, field) {
                continue;
            }
            let values = schema::str_values(df, field)?;
            casing.push(Self::casing_distribution(field, &values));
            defects.push(Self::field_defects(field, &values));
        }

        let mut reductions = Vec::new();
        for field in CATEGORICAL_FIELDS {
            if !schema::has_column(df, field) {
                continue;
            }
            let values = schema::str_values(df, field)?;
            reductions.push(Self::categorical_reduction(field, &values));
        }

        Ok(StandardizationReport {
            casing,
            defects,
            reductions,
        })
    }

    fn casing_distribution(field: &str, values: &[Option<String>]) -> CasingDistribution {
        let mut counts = [0usize; 4];
        for value in values.iter().flatten() {
            if is_blank(value) {
                continue;
            }
            let idx = match classify_casing(value) {
                CasingPattern::AllUpper => 0,
                CasingPattern::AllLower => 1,
                CasingPattern::TitleCase => 2,
                CasingPattern::Irregular => 3,
            };
            counts[idx] += 1;
        }

        let patterns = [
            CasingPattern::AllUpper,
            CasingPattern::AllLower,
            CasingPattern::TitleCase,
            CasingPattern::Irregular,
        ];
        let dominant_idx = (0..4).max_by_key(|i| (counts[*i], 3 - *i)).unwrap_or(0);
        let classified: usize = counts.iter().sum();

        CasingDistribution {
            field: field.to_string(),
            all_upper: counts[0],
            all_lower: counts[1],
            title_case: counts[2],
            irregular: counts[3],
            dominant: patterns[dominant_idx],
            inconsistent: classified - counts[dominant_idx],
        }
    }

    fn field_defects(field: &str, values: &[Option<String>]) -> FieldDefects {
        let mut result = FieldDefects {
            field: field.to_string(),
            leading_whitespace: 0,
            trailing_whitespace: 0,
            repeated_whitespace: 0,
            special_characters: 0,
            total_defects: 0,
        };
        for value in values.iter().flatten() {
            if is_blank(value) {
                continue;
            }
            let d = detect_defects(value);
            if d.leading_whitespace {
                result.leading_whitespace += 1;
            }
            if d.trailing_whitespace {
                result.trailing_whitespace += 1;
            }
            if d.repeated_whitespace {
                result.repeated_whitespace += 1;
            }
            if d.special_characters {
                result.special_characters += 1;
            }
        }
        result.total_defects = result.leading_whitespace
            + result.trailing_whitespace
            + result.repeated_whitespace
            + result.special_characters;
        result
    }

    fn categorical_reduction(field: &str, values: &[Option<String>]) -> CategoricalReduction {
        let mut buckets: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for value in values.iter().flatten() {
            if is_blank(value) {
                continue;
            }
            let variants = buckets.entry(canonicalize(value)).or_default();
            if !variants.contains(value) {
                variants.push(value.clone());
            }
        }

        let distinct_before: usize = buckets.values().map(|v| v.len()).sum();
        let distinct_after = buckets.len();
        let mut collapsing: Vec<CanonicalBucket> = buckets
            .into_iter()
            .filter(|(_, variants)| variants.len() > 1)
            .map(|(canonical, mut variants)| {
                variants.sort();
                CanonicalBucket { canonical, variants }
            })
            .collect();
        collapsing.sort_by(|a, b| {
            b.variants
                .len()
                .cmp(&a.variants.len())
                .then_with(|| a.canonical.cmp(&b.canonical))
        });

        CategoricalReduction {
            field: field.to_string(),
            distinct_before,
            distinct_after,
            reduction: distinct_before - distinct_after,
            buckets: collapsing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> AuditConfig {
        AuditConfig::default()
    }

    // ==================== casing tests ====================

    #[test]
    fn test_casing_distribution_and_inconsistent_count() {
        let df = df![
            "description" => ["HEX BOLT", "HEX NUT", "hex washer", "Hex Rivet"],
        ]
        .unwrap();
        let report = StandardizationAnalyzer::analyze(&df, &config()).unwrap();
        let dist = report
            .casing
            .iter()
            .find(|c| c.field == "description")
            .unwrap();
        assert_eq!(dist.all_upper, 2);
        assert_eq!(dist.all_lower, 1);
        assert_eq!(dist.title_case, 1);
        assert_eq!(dist.dominant, CasingPattern::AllUpper);
        assert_eq!(dist.inconsistent, 2);
    }

    #[test]
    fn test_blank_values_not_classified() {
        let df = df![
            "description" => [Some("BOLT"), Some("  "), None],
        ]
        .unwrap();
        let report = StandardizationAnalyzer::analyze(&df, &config()).unwrap();
        let dist = &report.casing[0];
        assert_eq!(
            dist.all_upper + dist.all_lower + dist.title_case + dist.irregular,
            1
        );
    }

    // ==================== defect tests ====================

    #[test]
    fn test_defects_counted_independently() {
        // One value carrying two defects increments two counters
        let df = df![
            "description" => ["  Hex  bolt", "clean value"],
        ]
        .unwrap();
        let report = StandardizationAnalyzer::analyze(&df, &config()).unwrap();
        let defects = &report.defects[0];
        assert_eq!(defects.leading_whitespace, 1);
        assert_eq!(defects.repeated_whitespace, 1);
        assert_eq!(defects.trailing_whitespace, 0);
        assert_eq!(defects.total_defects, 2);
    }

    #[test]
    fn test_special_characters_detected() {
        let df = df![
            "description" => ["Bolt #6", "Bolt M6"],
        ]
        .unwrap();
        let report = StandardizationAnalyzer::analyze(&df, &config()).unwrap();
        assert_eq!(report.defects[0].special_characters, 1);
    }

    // ==================== reduction tests ====================

    #[test]
    fn test_categorical_reduction_counts_collapsed_variants() {
        let df = df![
            "description" => ["x", "x", "x", "x"],
            "unit_of_measure" => ["EA", "ea", " EA ", "KG"],
        ]
        .unwrap();
        let report = StandardizationAnalyzer::analyze(&df, &config()).unwrap();
        let reduction = report
            .reductions
            .iter()
            .find(|r| r.field == "unit_of_measure")
            .unwrap();
        assert_eq!(reduction.distinct_before, 4); // "EA", "ea", " EA ", "KG"
        assert_eq!(reduction.distinct_after, 2); // "EA", "KG"
        assert_eq!(reduction.reduction, 2);

        let bucket = &reduction.buckets[0];
        assert_eq!(bucket.canonical, "EA");
        assert_eq!(bucket.variants.len(), 3);
    }

    #[test]
    fn test_consistent_field_reports_zero_reduction() {
        let df = df![
            "description" => ["x", "y"],
            "status" => ["Active", "Inactive"],
        ]
        .unwrap();
        let report = StandardizationAnalyzer::analyze(&df, &config()).unwrap();
        let reduction = report
            .reductions
            .iter()
            .find(|r| r.field == "status")
            .unwrap();
        assert_eq!(reduction.reduction, 0);
        assert!(reduction.buckets.is_empty());
    }

    #[test]
    fn test_missing_optional_columns_skipped() {
        let df = df![
            "description" => ["Bolt"],
        ]
        .unwrap();
        let report = StandardizationAnalyzer::analyze(&df, &config()).unwrap();
        assert_eq!(report.casing.len(), 1);
        assert!(report.reductions.is_empty());
    }
}
