//! Duplicate detector: exact-key and normalized-description grouping.
//!
//! Survivor election is deterministic under row permutation: the member
//! with the largest stock wins, ties broken by the lexicographically
//! smallest code.

use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::AuditConfig;
use crate::schema;
use crate::stats;
use crate::text::{is_blank, normalize_description};

/// One code appearing on more than one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactCodeGroup {
    pub code: String,
    pub occurrences: usize,
}

/// A group of records sharing a normalized description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Original-cased description of the lowest-coded member.
    pub description: String,
    pub duplicate_count: usize,
    /// All member codes, sorted.
    pub all_codes: Vec<String>,
    pub code_to_keep: String,
    pub codes_to_remove: Vec<String>,
    /// Single category, or "mixed" when members span several.
    pub category: String,
    /// Mean of the members' valid unit prices; absent when none has one.
    pub mean_unit_price: Option<f64>,
    pub total_stock: f64,
    /// Value at stake: mean unit price x summed stock (0 when the mean is
    /// undefined).
    pub total_stock_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateReport {
    pub total_records: usize,
    /// Records belonging to an exact-code group of size > 1. A pair of rows
    /// sharing a code contributes 2 here, not 1.
    pub exact_code_duplicate_records: usize,
    /// Distinct codes violating uniqueness.
    pub exact_code_duplicate_keys: usize,
    pub exact_code_groups: Vec<ExactCodeGroup>,
    /// Records belonging to a normalized-description group of size > 1.
    pub description_duplicate_records: usize,
    /// Total number of duplicate groups found.
    pub description_group_count: usize,
    /// Groups ranked by value at stake, descending, capped at top-N.
    pub description_groups: Vec<DuplicateGroup>,
    /// Duplicate record counts per category, descending.
    pub duplicates_by_category: Vec<(String, usize)>,
}

pub struct DuplicateDetector;

impl DuplicateDetector {
    pub fn analyze(df: &DataFrame, config: &AuditConfig) -> Result<DuplicateReport> {
        let codes = schema::str_values(df, schema::CODE)?;
        let descriptions = schema::str_values(df, schema::DESCRIPTION)?;
        let categories = if schema::has_column(df, schema::CATEGORY) {
            schema::str_values(df, schema::CATEGORY)?
        } else {
            vec![None; df.height()]
        };
        let prices = schema::f64_values(df, schema::UNIT_PRICE)?;
        let stocks = schema::f64_values(df, schema::CURRENT_STOCK)?;

        // Method 1: exact-key duplicates over the code column.
        let mut code_counts: BTreeMap<String, usize> = BTreeMap::new();
        for code in codes.iter().flatten() {
            *code_counts.entry(code.clone()).or_insert(0) += 1;
        }
        let mut exact_code_groups: Vec<ExactCodeGroup> = code_counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(code, occurrences)| ExactCodeGroup { code, occurrences })
            .collect();
        let exact_code_duplicate_records: usize =
            exact_code_groups.iter().map(|g| g.occurrences).sum();
        let exact_code_duplicate_keys = exact_code_groups.len();
        exact_code_groups.sort_by(|a, b| {
            b.occurrences
                .cmp(&a.occurrences)
                .then_with(|| a.code.cmp(&b.code))
        });

        // Method 2: normalized-description grouping. Blank descriptions are
        // never a duplicate key.
        let mut desc_groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (row, description) in descriptions.iter().enumerate() {
            if let Some(d) = description
                && !is_blank(d)
            {
                desc_groups
                    .entry(normalize_description(d))
                    .or_default()
                    .push(row);
            }
        }

        let mut description_groups = Vec::new();
        let mut description_duplicate_records = 0usize;
        let mut duplicates_by_category: BTreeMap<String, usize> = BTreeMap::new();

        for rows in desc_groups.values() {
            if rows.len() < 2 {
                continue;
            }
            description_duplicate_records += rows.len();

            // Members keyed by code (missing codes sort last) so every
            // per-group choice is independent of row order.
            let mut members: Vec<usize> = rows.clone();
            members.sort_by(|a, b| Self::code_key(&codes[*a]).cmp(&Self::code_key(&codes[*b])));

            // Members are sorted by code ascending and strict > keeps the
            // earlier member, so a stock tie falls to the smallest code.
            let mut survivor = members[0];
            for &candidate in &members[1..] {
                if stocks[candidate].unwrap_or(0.0) > stocks[survivor].unwrap_or(0.0) {
                    survivor = candidate;
                }
            }

            let all_codes: Vec<String> = members.iter().map(|r| Self::code_key(&codes[*r])).collect();
            let code_to_keep = Self::code_key(&codes[survivor]);
            let codes_to_remove: Vec<String> = members
                .iter()
                .filter(|r| **r != survivor)
                .map(|r| Self::code_key(&codes[*r]))
                .collect();

            let mut group_categories: Vec<String> = members
                .iter()
                .filter_map(|r| categories[*r].as_ref())
                .filter(|c| !is_blank(c))
                .map(|c| c.trim().to_string())
                .collect();
            group_categories.sort();
            group_categories.dedup();
            let category = match group_categories.len() {
                0 => "(unclassified)".to_string(),
                1 => group_categories.remove(0),
                _ => "mixed".to_string(),
            };

            let valid_prices: Vec<f64> = members.iter().filter_map(|r| prices[*r]).collect();
            let mean_unit_price = stats::mean(&valid_prices);
            let total_stock: f64 = members.iter().filter_map(|r| stocks[*r]).sum();
            let total_stock_value = mean_unit_price.map(|m| m * total_stock).unwrap_or(0.0);

            for row in &members {
                let key = match &categories[*row] {
                    Some(c) if !is_blank(c) => c.trim().to_string(),
                    _ => "(unclassified)".to_string(),
                };
                *duplicates_by_category.entry(key).or_insert(0) += 1;
            }

            description_groups.push(DuplicateGroup {
                description: descriptions[members[0]]
                    .clone()
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                duplicate_count: members.len(),
                all_codes,
                code_to_keep,
                codes_to_remove,
                category,
                mean_unit_price,
                total_stock,
                total_stock_value,
            });
        }

        // Prioritized remediation output: biggest value at stake first.
        description_groups.sort_by(|a, b| {
            b.total_stock_value
                .partial_cmp(&a.total_stock_value)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.description.cmp(&b.description))
        });
        let description_group_count = description_groups.len();
        description_groups.truncate(config.top_n);

        let mut duplicates_by_category: Vec<(String, usize)> =
            duplicates_by_category.into_iter().collect();
        duplicates_by_category.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(DuplicateReport {
            total_records: df.height(),
            exact_code_duplicate_records,
            exact_code_duplicate_keys,
            exact_code_groups,
            description_duplicate_records,
            description_group_count,
            description_groups,
            duplicates_by_category,
        })
    }

    fn code_key(code: &Option<String>) -> String {
        code.clone().unwrap_or_else(|| "~".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> AuditConfig {
        AuditConfig::default()
    }

    fn materials(rows: Vec<(&str, &str, &str, f64, i64)>) -> DataFrame {
        let codes: Vec<&str> = rows.iter().map(|r| r.0).collect();
        let descs: Vec<&str> = rows.iter().map(|r| r.1).collect();
        let cats: Vec<&str> = rows.iter().map(|r| r.2).collect();
        let prices: Vec<f64> = rows.iter().map(|r| r.3).collect();
        let stocks: Vec<i64> = rows.iter().map(|r| r.4).collect();
        df![
            "code" => codes,
            "description" => descs,
            "category" => cats,
            "unit_price" => prices,
            "current_stock" => stocks,
        ]
        .unwrap()
    }

    // ==================== exact-code tests ====================

    #[test]
    fn test_exact_code_duplicates_count_both_rows() {
        let df = materials(vec![
            ("MAT-00001", "Hex bolt", "Fasteners", 1.0, 10),
            ("MAT-00001", "Hex bolt zinc", "Fasteners", 1.1, 5),
            ("MAT-00002", "Washer", "Fasteners", 0.2, 50),
        ]);
        let report = DuplicateDetector::analyze(&df, &config()).unwrap();
        assert_eq!(report.exact_code_duplicate_records, 2); // both rows, not 1
        assert_eq!(report.exact_code_duplicate_keys, 1);
        assert_eq!(report.exact_code_groups[0].code, "MAT-00001");
        assert_eq!(report.exact_code_groups[0].occurrences, 2);
    }

    // ==================== description grouping tests ====================

    #[test]
    fn test_description_grouping_is_case_insensitive() {
        let df = materials(vec![
            ("MAT-00001", "Hex Bolt M6", "Fasteners", 1.0, 10),
            ("MAT-00002", "  hex bolt m6 ", "Fasteners", 1.2, 20),
            ("MAT-00003", "Washer", "Fasteners", 0.2, 5),
        ]);
        let report = DuplicateDetector::analyze(&df, &config()).unwrap();
        assert_eq!(report.description_duplicate_records, 2);
        assert_eq!(report.description_groups.len(), 1);
        assert_eq!(report.description_groups[0].duplicate_count, 2);
    }

    #[test]
    fn test_blank_descriptions_never_group() {
        let df = df![
            "code" => ["MAT-00001", "MAT-00002", "MAT-00003"],
            "description" => [Some(""), Some("   "), None],
            "category" => ["Tools", "Tools", "Tools"],
            "unit_price" => [1.0, 2.0, 3.0],
            "current_stock" => [1i64, 2, 3],
        ]
        .unwrap();
        let report = DuplicateDetector::analyze(&df, &config()).unwrap();
        assert_eq!(report.description_duplicate_records, 0);
        assert!(report.description_groups.is_empty());
    }

    // ==================== survivor election tests ====================

    #[test]
    fn test_survivor_is_largest_stock() {
        let df = materials(vec![
            ("MAT-00005", "Valve", "Hydraulic", 10.0, 3),
            ("MAT-00002", "valve", "Hydraulic", 11.0, 30),
        ]);
        let report = DuplicateDetector::analyze(&df, &config()).unwrap();
        let group = &report.description_groups[0];
        assert_eq!(group.code_to_keep, "MAT-00002");
        assert_eq!(group.codes_to_remove, vec!["MAT-00005".to_string()]);
    }

    #[test]
    fn test_survivor_tie_breaks_on_smallest_code() {
        let df = materials(vec![
            ("MAT-00009", "Valve", "Hydraulic", 10.0, 30),
            ("MAT-00002", "valve", "Hydraulic", 11.0, 30),
        ]);
        let report = DuplicateDetector::analyze(&df, &config()).unwrap();
        assert_eq!(report.description_groups[0].code_to_keep, "MAT-00002");
    }

    #[test]
    fn test_survivor_deterministic_under_row_permutation() {
        let rows = vec![
            ("MAT-00003", "Valve", "Hydraulic", 10.0, 7),
            ("MAT-00001", "valve ", "Hydraulic", 12.0, 7),
            ("MAT-00002", "VALVE", "Hydraulic", 11.0, 5),
        ];
        let mut permuted = rows.clone();
        permuted.reverse();

        let report_a = DuplicateDetector::analyze(&materials(rows), &config()).unwrap();
        let report_b = DuplicateDetector::analyze(&materials(permuted), &config()).unwrap();

        assert_eq!(
            report_a.description_groups[0].code_to_keep,
            report_b.description_groups[0].code_to_keep
        );
        assert_eq!(
            report_a.description_groups[0].all_codes,
            report_b.description_groups[0].all_codes
        );
        assert_eq!(report_a.description_groups[0].code_to_keep, "MAT-00001");
    }

    // ==================== value / category tests ====================

    #[test]
    fn test_group_value_is_mean_price_times_total_stock() {
        let df = materials(vec![
            ("MAT-00001", "Valve", "Hydraulic", 10.0, 30),
            ("MAT-00002", "valve", "Hydraulic", 20.0, 20),
        ]);
        let report = DuplicateDetector::analyze(&df, &config()).unwrap();
        let group = &report.description_groups[0];
        assert_eq!(group.mean_unit_price, Some(15.0));
        assert_eq!(group.total_stock, 50.0);
        assert_eq!(group.total_stock_value, 750.0);
    }

    #[test]
    fn test_mixed_category_group_is_reported_mixed() {
        let df = materials(vec![
            ("MAT-00001", "Valve", "Hydraulic", 10.0, 1),
            ("MAT-00002", "valve", "Pneumatic", 10.0, 1),
        ]);
        let report = DuplicateDetector::analyze(&df, &config()).unwrap();
        assert_eq!(report.description_groups[0].category, "mixed");
    }

    #[test]
    fn test_groups_ranked_by_value_descending() {
        let df = materials(vec![
            ("MAT-00001", "Cheap washer", "Fasteners", 0.1, 10),
            ("MAT-00002", "cheap washer", "Fasteners", 0.1, 10),
            ("MAT-00003", "Servo motor", "Electrical", 500.0, 10),
            ("MAT-00004", "servo motor", "Electrical", 500.0, 10),
        ]);
        let report = DuplicateDetector::analyze(&df, &config()).unwrap();
        assert_eq!(report.description_groups.len(), 2);
        assert!(
            report.description_groups[0].total_stock_value
                >= report.description_groups[1].total_stock_value
        );
        assert_eq!(report.description_groups[0].description, "Servo motor");
    }
}
