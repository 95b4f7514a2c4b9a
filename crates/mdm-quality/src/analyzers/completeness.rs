//! Completeness analyzer: per-field fill rates and tier-weighted record
//! scores.
//!
//! "Filled" means non-null and, for text fields, not whitespace-only.
//! Numeric zero is a valid value, not a blank.

use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::AuditConfig;
use crate::schema;
use crate::text::is_blank;

/// Derived columns appended by the enrichment pass; not part of the master
/// record and excluded from completeness scoring.
const DERIVED_COLUMNS: [&str; 3] = [
    schema::STOCK_VALUE,
    schema::DAYS_SINCE_MOVEMENT,
    schema::PHYSICAL_COUNT,
];

/// Quality band of a single field's fill rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldStatus {
    /// >= 95% filled
    Excellent,
    /// >= 80%
    Warning,
    /// >= 60%
    Critical,
    /// < 60%
    Severe,
}

impl FieldStatus {
    fn from_pct(pct: f64) -> Self {
        if pct >= 95.0 {
            Self::Excellent
        } else if pct >= 80.0 {
            Self::Warning
        } else if pct >= 60.0 {
            Self::Critical
        } else {
            Self::Severe
        }
    }
}

/// Band of a record's weighted completeness score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreBand {
    /// >= 90
    Complete,
    /// >= 70
    Good,
    /// >= 50
    Fair,
    /// < 50
    Incomplete,
}

impl ScoreBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::Complete
        } else if score >= 70.0 {
            Self::Good
        } else if score >= 50.0 {
            Self::Fair
        } else {
            Self::Incomplete
        }
    }
}

/// Fill statistics for one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCompleteness {
    pub field: String,
    pub tier: String,
    pub total: usize,
    pub filled: usize,
    pub blank: usize,
    pub fill_pct: f64,
    pub status: FieldStatus,
    /// True when the field had zero rows to inspect; the 100% fill rate is
    /// then vacuous, not an achievement.
    pub no_data: bool,
}

/// A record and its weighted completeness score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordScore {
    pub code: Option<String>,
    pub score: f64,
    pub band: ScoreBand,
}

/// A required field and the records leaving it blank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredViolation {
    pub field: String,
    pub count: usize,
    /// Codes of offending records, capped at the configured top-N.
    pub codes: Vec<String>,
}

/// Mean record score within one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,
    pub record_count: usize,
    pub mean_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletenessReport {
    pub fields: Vec<FieldCompleteness>,
    /// Mean of all record scores (100.0 by convention for an empty table).
    pub mean_record_score: f64,
    /// Record counts per band: (complete, good, fair, incomplete).
    pub band_counts: (usize, usize, usize, usize),
    /// Lowest-scoring records, capped at top-N.
    pub worst_records: Vec<RecordScore>,
    pub required_violations: Vec<RequiredViolation>,
    pub category_scores: Vec<CategoryScore>,
}

pub struct CompletenessAnalyzer;

impl CompletenessAnalyzer {
    pub fn analyze(df: &DataFrame, config: &AuditConfig) -> Result<CompletenessReport> {
        let columns: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .filter(|c| !DERIVED_COLUMNS.contains(&c.as_str()))
            .collect();

        let total = df.height();
        let tiers = &config.field_tiers;

        // Per-column filled masks drive both the field and the record view.
        let mut masks: HashMap<String, Vec<bool>> = HashMap::new();
        let mut fields = Vec::with_capacity(columns.len());

        for name in &columns {
            let mask = Self::filled_mask(df, name)?;
            let filled = mask.iter().filter(|f| **f).count();
            let no_data = total == 0;
            let fill_pct = if no_data {
                // Vacuous truth; must not divide by zero.
                100.0
            } else {
                filled as f64 / total as f64 * 100.0
            };

            let tier = if tiers.is_required(name) {
                "required"
            } else if tiers.weight(name) == 2 {
                "important"
            } else {
                "informational"
            };

            fields.push(FieldCompleteness {
                field: name.clone(),
                tier: tier.to_string(),
                total,
                filled,
                blank: total - filled,
                fill_pct,
                status: FieldStatus::from_pct(fill_pct),
                no_data,
            });
            masks.insert(name.clone(), mask);
        }
        fields.sort_by(|a, b| {
            a.fill_pct
                .partial_cmp(&b.fill_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.field.cmp(&b.field))
        });

        // Record scores: filled weight over total weight.
        let total_weight: u32 = columns.iter().map(|c| tiers.weight(c)).sum();
        let codes = if schema::has_column(df, schema::CODE) {
            schema::str_values(df, schema::CODE)?
        } else {
            vec![None; total]
        };

        let mut scores = Vec::with_capacity(total);
        let mut band_counts = (0usize, 0usize, 0usize, 0usize);
        for row in 0..total {
            let filled_weight: u32 = columns
                .iter()
                .filter(|c| masks[c.as_str()][row])
                .map(|c| tiers.weight(c))
                .sum();
            let score = if total_weight == 0 {
                100.0
            } else {
                filled_weight as f64 / total_weight as f64 * 100.0
            };
            let band = ScoreBand::from_score(score);
            match band {
                ScoreBand::Complete => band_counts.0 += 1,
                ScoreBand::Good => band_counts.1 += 1,
                ScoreBand::Fair => band_counts.2 += 1,
                ScoreBand::Incomplete => band_counts.3 += 1,
            }
            scores.push(RecordScore {
                code: codes[row].clone(),
                score,
                band,
            });
        }

        let mean_record_score = if scores.is_empty() {
            100.0
        } else {
            scores.iter().map(|s| s.score).sum::<f64>() / scores.len() as f64
        };

        let mut worst: Vec<RecordScore> = scores.clone();
        worst.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.code.cmp(&b.code))
        });
        worst.truncate(config.top_n);

        // Required-field violations, listed per field.
        let mut required_violations = Vec::new();
        for name in &columns {
            if !tiers.is_required(name) {
                continue;
            }
            let mask = &masks[name.as_str()];
            let mut offender_codes: Vec<String> = Vec::new();
            let mut count = 0usize;
            for row in 0..total {
                if !mask[row] {
                    count += 1;
                    if offender_codes.len() < config.top_n
                        && let Some(code) = &codes[row]
                    {
                        offender_codes.push(code.clone());
                    }
                }
            }
            if count > 0 {
                required_violations.push(RequiredViolation {
                    field: name.clone(),
                    count,
                    codes: offender_codes,
                });
            }
        }
        required_violations.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.field.cmp(&b.field)));

        // Mean score per category; blank categories land in an explicit
        // bucket rather than vanishing from the totals.
        let mut category_scores = Vec::new();
        if schema::has_column(df, schema::CATEGORY) {
            let categories = schema::str_values(df, schema::CATEGORY)?;
            let mut by_category: HashMap<String, (usize, f64)> = HashMap::new();
            for row in 0..total {
                let key = match &categories[row] {
                    Some(c) if !is_blank(c) => c.trim().to_string(),
                    _ => "(unclassified)".to_string(),
                };
                let entry = by_category.entry(key).or_insert((0, 0.0));
                entry.0 += 1;
                entry.1 += scores[row].score;
            }
            category_scores = by_category
                .into_iter()
                .map(|(category, (count, sum))| CategoryScore {
                    category,
                    record_count: count,
                    mean_score: sum / count as f64,
                })
                .collect();
            category_scores.sort_by(|a, b| {
                a.mean_score
                    .partial_cmp(&b.mean_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.category.cmp(&b.category))
            });
        }

        Ok(CompletenessReport {
            fields,
            mean_record_score,
            band_counts,
            worst_records: worst,
            required_violations,
            category_scores,
        })
    }

    /// Per-row "has a usable value" mask for one column.
    fn filled_mask(df: &DataFrame, name: &str) -> Result<Vec<bool>> {
        let col = df.column(name)?;
        let series = col.as_materialized_series();

        if series.dtype() == &DataType::String {
            let str_series = series.str()?;
            Ok(str_series
                .into_iter()
                .map(|v| v.map(|s| !is_blank(s)).unwrap_or(false))
                .collect())
        } else {
            let null_mask = series.is_null();
            Ok((0..series.len())
                .map(|i| !null_mask.get(i).unwrap_or(true))
                .collect())
        }
    }
}
