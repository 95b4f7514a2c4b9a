//! Supplier/category analyzer: ABC concentration, keyword-based
//! category-mismatch detection and category overlap.

use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::config::AuditConfig;
use crate::schema;
use crate::stats;
use crate::text::{is_blank, normalize_description};

/// Bucket for records whose entity value is blank; they stay in the
/// ranking rather than vanishing from the totals.
const UNASSIGNED: &str = "(unassigned)";

/// Pareto class of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbcClass {
    A,
    B,
    C,
}

/// One entity (supplier or category) in the ABC ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbcEntity {
    pub name: String,
    pub item_count: usize,
    pub total_value: f64,
    pub value_pct: f64,
    /// Cumulative value percentage at this rank; non-decreasing down the
    /// ranking.
    pub cumulative_pct: f64,
    pub class: AbcClass,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbcReport {
    /// Which column the entities came from.
    pub dimension: String,
    /// Entities in rank order (value descending, name ascending on ties).
    pub entities: Vec<AbcEntity>,
    /// Entity counts per class: (A, B, C).
    pub class_counts: (usize, usize, usize),
    pub total_value: f64,
}

/// A record whose description keyword disagrees with its category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryMismatch {
    pub code: Option<String>,
    pub description: String,
    pub current_category: String,
    pub suggested_category: String,
    pub keyword: String,
    pub stock_value: f64,
}

/// Severity of a category-pair overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlapSeverity {
    Ok,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryOverlap {
    pub category_a: String,
    pub category_b: String,
    pub items_a: usize,
    pub items_b: usize,
    pub common_descriptions: usize,
    /// `|intersection| / max(|set_a|, |set_b|) * 100`; 0 when both sets
    /// are empty.
    pub overlap_pct: f64,
    pub severity: OverlapSeverity,
    /// A few shared descriptions for human review.
    pub examples: Vec<String>,
}

/// Aggregate statistics of one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category: String,
    pub item_count: usize,
    pub count_pct: f64,
    pub total_value: f64,
    pub value_pct: f64,
    pub mean_price: Option<f64>,
    pub distinct_units: usize,
}

/// A description appearing under more than one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiCategoryDescription {
    pub description: String,
    pub categories: Vec<String>,
    pub item_count: usize,
    pub total_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryReport {
    pub stats: Vec<CategoryStats>,
    pub total_mismatches: usize,
    /// Mismatches ranked by stock value, capped at top-N.
    pub mismatches: Vec<CategoryMismatch>,
    pub overlaps: Vec<CategoryOverlap>,
    pub multi_category_count: usize,
    /// Multi-category descriptions ranked by value, capped at top-N.
    pub multi_category: Vec<MultiCategoryDescription>,
}

pub struct ConcentrationAnalyzer;

impl ConcentrationAnalyzer {
    /// ABC-classify the entities of one column by total stock value.
    ///
    /// The ranking is a stable sort (value descending, name ascending on
    /// ties) so classification is reproducible across runs.
    pub fn abc(df: &DataFrame, dimension: &str, config: &AuditConfig) -> Result<AbcReport> {
        schema::require_column(df, dimension)?;
        let entities = schema::str_values(df, dimension)?;
        let values = schema::f64_values(df, schema::STOCK_VALUE)?;

        let mut totals: BTreeMap<String, (usize, f64)> = BTreeMap::new();
        for (entity, value) in entities.iter().zip(values.iter()) {
            let key = match entity {
                Some(e) if !is_blank(e) => e.trim().to_string(),
                _ => UNASSIGNED.to_string(),
            };
            let entry = totals.entry(key).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += value.unwrap_or(0.0);
        }

        let total_value: f64 = totals.values().map(|(_, v)| v).sum();

        let mut ranked: Vec<(String, usize, f64)> = totals
            .into_iter()
            .map(|(name, (count, value))| (name, count, value))
            .collect();
        ranked.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let mut entities = Vec::with_capacity(ranked.len());
        let mut class_counts = (0usize, 0usize, 0usize);
        let mut cumulative = 0.0;
        for (name, item_count, value) in ranked {
            // A zero-value dataset cannot support a Pareto cut; everything
            // lands in C with 0% shares instead of dividing by zero.
            let value_pct = if total_value == 0.0 {
                0.0
            } else {
                value / total_value * 100.0
            };
            cumulative += value_pct;
            let class = if total_value == 0.0 {
                AbcClass::C
            } else if cumulative <= config.abc_a_cutoff {
                AbcClass::A
            } else if cumulative <= config.abc_b_cutoff {
                AbcClass::B
            } else {
                AbcClass::C
            };
            match class {
                AbcClass::A => class_counts.0 += 1,
                AbcClass::B => class_counts.1 += 1,
                AbcClass::C => class_counts.2 += 1,
            }
            entities.push(AbcEntity {
                name,
                item_count,
                total_value: value,
                value_pct,
                cumulative_pct: cumulative,
                class,
            });
        }

        Ok(AbcReport {
            dimension: dimension.to_string(),
            entities,
            class_counts,
            total_value,
        })
    }

    /// Category statistics, keyword mismatches, pair overlaps and
    /// multi-category descriptions.
    pub fn categories(df: &DataFrame, config: &AuditConfig) -> Result<CategoryReport> {
        schema::require_column(df, schema::CATEGORY)?;
        let categories = schema::str_values(df, schema::CATEGORY)?;
        let descriptions = schema::str_values(df, schema::DESCRIPTION)?;
        let codes = schema::str_values(df, schema::CODE)?;
        let prices = if schema::has_column(df, schema::UNIT_PRICE) {
            schema::f64_values(df, schema::UNIT_PRICE)?
        } else {
            vec![None; df.height()]
        };
        let units = if schema::has_column(df, schema::UNIT_OF_MEASURE) {
            schema::str_values(df, schema::UNIT_OF_MEASURE)?
        } else {
            vec![None; df.height()]
        };
        let stock_values = schema::f64_values(df, schema::STOCK_VALUE)?;

        let category_of = |row: usize| -> String {
            match &categories[row] {
                Some(c) if !is_blank(c) => c.trim().to_string(),
                _ => UNASSIGNED.to_string(),
            }
        };

        // Per-category aggregates.
        let mut aggregates: BTreeMap<String, (usize, f64, Vec<f64>, BTreeSet<String>)> =
            BTreeMap::new();
        for row in 0..df.height() {
            let entry = aggregates
                .entry(category_of(row))
                .or_insert_with(|| (0, 0.0, Vec::new(), BTreeSet::new()));
            entry.0 += 1;
            entry.1 += stock_values[row].unwrap_or(0.0);
            if let Some(p) = prices[row] {
                entry.2.push(p);
            }
            if let Some(u) = &units[row]
                && !is_blank(u)
            {
                entry.3.insert(u.trim().to_uppercase());
            }
        }
        let grand_total_value: f64 = aggregates.values().map(|(_, v, _, _)| v).sum();
        let total_rows = df.height();

        let mut stats_rows: Vec<CategoryStats> = aggregates
            .into_iter()
            .map(|(category, (count, value, prices, units))| CategoryStats {
                category,
                item_count: count,
                count_pct: if total_rows == 0 {
                    0.0
                } else {
                    count as f64 / total_rows as f64 * 100.0
                },
                total_value: value,
                value_pct: if grand_total_value == 0.0 {
                    0.0
                } else {
                    value / grand_total_value * 100.0
                },
                mean_price: stats::mean(&prices),
                distinct_units: units.len(),
            })
            .collect();
        stats_rows.sort_by(|a, b| {
            b.total_value
                .partial_cmp(&a.total_value)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.category.cmp(&b.category))
        });

        // Keyword mismatches: first matching rule wins, one finding per
        // record at most.
        let mut mismatches = Vec::new();
        for row in 0..df.height() {
            let Some(description) = &descriptions[row] else {
                continue;
            };
            if is_blank(description) {
                continue;
            }
            let haystack = description.to_lowercase();
            let current = category_of(row);
            for rule in &config.keyword_rules {
                if haystack.contains(&rule.keyword) && current != rule.expected_category {
                    mismatches.push(CategoryMismatch {
                        code: codes[row].clone(),
                        description: description.trim().to_string(),
                        current_category: current.clone(),
                        suggested_category: rule.expected_category.clone(),
                        keyword: rule.keyword.clone(),
                        stock_value: stock_values[row].unwrap_or(0.0),
                    });
                    break;
                }
            }
        }
        let total_mismatches = mismatches.len();
        mismatches.sort_by(|a, b| {
            b.stock_value
                .partial_cmp(&a.stock_value)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.code.cmp(&b.code))
        });
        mismatches.truncate(config.top_n);

        // Normalized description sets per category, shared by the overlap
        // and multi-category checks.
        let mut desc_sets: BTreeMap<String, HashSet<String>> = BTreeMap::new();
        let mut desc_categories: BTreeMap<String, (BTreeSet<String>, usize, f64)> = BTreeMap::new();
        for row in 0..df.height() {
            if let Some(d) = &descriptions[row]
                && !is_blank(d)
            {
                let normalized = normalize_description(d);
                let category = category_of(row);
                desc_sets
                    .entry(category.clone())
                    .or_default()
                    .insert(normalized.clone());
                let entry = desc_categories
                    .entry(normalized)
                    .or_insert_with(|| (BTreeSet::new(), 0, 0.0));
                entry.0.insert(category);
                entry.1 += 1;
                entry.2 += stock_values[row].unwrap_or(0.0);
            }
        }

        let empty = HashSet::new();
        let mut overlaps = Vec::new();
        for (a, b) in &config.category_pairs {
            let set_a = desc_sets.get(a.as_str()).unwrap_or(&empty);
            let set_b = desc_sets.get(b.as_str()).unwrap_or(&empty);
            let larger = set_a.len().max(set_b.len());
            let mut common: Vec<&String> = set_a.intersection(set_b).collect();
            common.sort();

            let overlap_pct = if larger == 0 {
                0.0
            } else {
                common.len() as f64 / larger as f64 * 100.0
            };
            let severity = if overlap_pct > config.overlap_critical_pct {
                OverlapSeverity::Critical
            } else if overlap_pct > config.overlap_warning_pct {
                OverlapSeverity::Warning
            } else {
                OverlapSeverity::Ok
            };

            overlaps.push(CategoryOverlap {
                category_a: a.clone(),
                category_b: b.clone(),
                items_a: set_a.len(),
                items_b: set_b.len(),
                common_descriptions: common.len(),
                overlap_pct,
                severity,
                examples: common.iter().take(3).map(|s| s.to_string()).collect(),
            });
        }

        let mut multi_category: Vec<MultiCategoryDescription> = desc_categories
            .into_iter()
            .filter(|(_, (categories, _, _))| categories.len() > 1)
            .map(
                |(description, (categories, item_count, total_value))| MultiCategoryDescription {
                    description,
                    categories: categories.into_iter().collect(),
                    item_count,
                    total_value,
                },
            )
            .collect();
        let multi_category_count = multi_category.len();
        multi_category.sort_by(|a, b| {
            b.total_value
                .partial_cmp(&a.total_value)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.description.cmp(&b.description))
        });
        multi_category.truncate(config.top_n);

        Ok(CategoryReport {
            stats: stats_rows,
            total_mismatches,
            mismatches,
            overlaps,
            multi_category_count,
            multi_category,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table;
    use pretty_assertions::assert_eq;

    fn config() -> AuditConfig {
        AuditConfig::default()
    }

    fn enriched(rows: Vec<(&str, &str, &str, &str, f64, i64)>) -> DataFrame {
        let codes: Vec<&str> = rows.iter().map(|r| r.0).collect();
        let descs: Vec<&str> = rows.iter().map(|r| r.1).collect();
        let cats: Vec<&str> = rows.iter().map(|r| r.2).collect();
        let suppliers: Vec<&str> = rows.iter().map(|r| r.3).collect();
        let prices: Vec<f64> = rows.iter().map(|r| r.4).collect();
        let stocks: Vec<i64> = rows.iter().map(|r| r.5).collect();
        let df = df![
            "code" => codes,
            "description" => descs,
            "category" => cats,
            "supplier" => suppliers,
            "unit_price" => prices,
            "current_stock" => stocks,
        ]
        .unwrap();
        table::enrich(&df, &config()).unwrap()
    }

    // ==================== ABC tests ====================

    #[test]
    fn test_abc_partition_covers_every_entity_once() {
        let df = enriched(vec![
            ("MAT-00001", "Motor", "Electrical", "Acme", 1000.0, 100),
            ("MAT-00002", "Bolt", "Fasteners", "Bravo", 10.0, 100),
            ("MAT-00003", "Washer", "Fasteners", "Clarke", 1.0, 100),
            ("MAT-00004", "Nut", "Fasteners", "Delta", 0.5, 100),
        ]);
        let report = ConcentrationAnalyzer::abc(&df, "supplier", &config()).unwrap();

        assert_eq!(report.entities.len(), 4);
        let (a, b, c) = report.class_counts;
        assert_eq!(a + b + c, 4); // partition: every entity exactly once

        // Cumulative percentage is monotonically non-decreasing
        let mut previous = 0.0;
        for entity in &report.entities {
            assert!(entity.cumulative_pct >= previous);
            previous = entity.cumulative_pct;
        }
        assert!((previous - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_abc_cutoffs() {
        // Value shares 60/15/15/10: cumulative 60, 75, 90, 100 -> A, A, B, C.
        let df = enriched(vec![
            ("MAT-00001", "Motor", "Electrical", "Acme", 60.0, 100),
            ("MAT-00002", "Bolt", "Fasteners", "Bravo", 15.0, 100),
            ("MAT-00003", "Washer", "Fasteners", "Clarke", 15.0, 100),
            ("MAT-00004", "Nut", "Fasteners", "Delta", 10.0, 100),
        ]);
        let report = ConcentrationAnalyzer::abc(&df, "supplier", &config()).unwrap();
        let classes: Vec<AbcClass> = report.entities.iter().map(|e| e.class).collect();
        assert_eq!(classes, vec![AbcClass::A, AbcClass::A, AbcClass::B, AbcClass::C]);
    }

    #[test]
    fn test_abc_ties_ranked_by_name() {
        let df = enriched(vec![
            ("MAT-00001", "Bolt", "Fasteners", "Zeta", 10.0, 10),
            ("MAT-00002", "Nut", "Fasteners", "Alpha", 10.0, 10),
        ]);
        let report = ConcentrationAnalyzer::abc(&df, "supplier", &config()).unwrap();
        assert_eq!(report.entities[0].name, "Alpha"); // stable tie-break
        assert_eq!(report.entities[1].name, "Zeta");
    }

    #[test]
    fn test_abc_blank_entities_bucketed_not_dropped() {
        let df = df![
            "code" => ["MAT-00001", "MAT-00002"],
            "description" => ["Bolt", "Nut"],
            "category" => ["Fasteners", "Fasteners"],
            "supplier" => [Some("Acme"), None],
            "unit_price" => [10.0, 5.0],
            "current_stock" => [10i64, 10],
        ]
        .unwrap();
        let df = table::enrich(&df, &config()).unwrap();
        let report = ConcentrationAnalyzer::abc(&df, "supplier", &config()).unwrap();
        assert!(report.entities.iter().any(|e| e.name == UNASSIGNED));
        let total_items: usize = report.entities.iter().map(|e| e.item_count).sum();
        assert_eq!(total_items, 2);
    }

    #[test]
    fn test_abc_zero_total_value_does_not_divide() {
        let df = enriched(vec![
            ("MAT-00001", "Bolt", "Fasteners", "Acme", 0.0, 0),
            ("MAT-00002", "Nut", "Fasteners", "Bravo", 0.0, 0),
        ]);
        let report = ConcentrationAnalyzer::abc(&df, "supplier", &config()).unwrap();
        assert!(report.entities.iter().all(|e| e.class == AbcClass::C));
        assert!(report.entities.iter().all(|e| e.value_pct == 0.0));
    }

    // ==================== keyword mismatch tests ====================

    #[test]
    fn test_keyword_mismatch_flags_wrong_category() {
        let df = enriched(vec![
            ("MAT-00001", "Hydraulic hose 1/2\"", "Office", "Acme", 20.0, 10),
            ("MAT-00002", "Hydraulic hose 3/4\"", "Hydraulic", "Acme", 25.0, 10),
        ]);
        let report = ConcentrationAnalyzer::categories(&df, &config()).unwrap();
        assert_eq!(report.total_mismatches, 1);
        let mismatch = &report.mismatches[0];
        assert_eq!(mismatch.code.as_deref(), Some("MAT-00001"));
        assert_eq!(mismatch.suggested_category, "Hydraulic");
        assert_eq!(mismatch.keyword, "hose");
    }

    #[test]
    fn test_keyword_mismatch_deduped_per_record() {
        // "hose" and "pump" both match; the record is counted once with the
        // first (highest-priority) rule's suggestion.
        let df = enriched(vec![(
            "MAT-00001",
            "Hose for pump assembly",
            "Office",
            "Acme",
            20.0,
            10,
        )]);
        let report = ConcentrationAnalyzer::categories(&df, &config()).unwrap();
        assert_eq!(report.total_mismatches, 1);
        assert_eq!(report.mismatches[0].keyword, "hose");
    }

    // ==================== overlap tests ====================

    #[test]
    fn test_overlap_ratio_uses_larger_set() {
        let df = enriched(vec![
            ("MAT-00001", "Sensor cable", "Electrical", "Acme", 5.0, 1),
            ("MAT-00002", "Sensor cable", "Electronic", "Acme", 5.0, 1),
            ("MAT-00003", "Relay module", "Electronic", "Acme", 5.0, 1),
        ]);
        let report = ConcentrationAnalyzer::categories(&df, &config()).unwrap();
        let overlap = report
            .overlaps
            .iter()
            .find(|o| o.category_a == "Electrical" && o.category_b == "Electronic")
            .unwrap();
        assert_eq!(overlap.items_a, 1);
        assert_eq!(overlap.items_b, 2);
        assert_eq!(overlap.common_descriptions, 1);
        assert_eq!(overlap.overlap_pct, 50.0); // 1 / max(1, 2)
        assert_eq!(overlap.severity, OverlapSeverity::Critical);
    }

    #[test]
    fn test_overlap_empty_categories_are_ok() {
        let df = enriched(vec![(
            "MAT-00001",
            "Desk organizer",
            "Office",
            "Acme",
            5.0,
            1,
        )]);
        let report = ConcentrationAnalyzer::categories(&df, &config()).unwrap();
        for overlap in &report.overlaps {
            assert_eq!(overlap.severity, OverlapSeverity::Ok);
            assert_eq!(overlap.overlap_pct, 0.0);
        }
    }

    // ==================== category stats tests ====================

    #[test]
    fn test_category_stats_and_multi_category() {
        let df = enriched(vec![
            ("MAT-00001", "Ball bearing 608", "Mechanical", "Acme", 4.0, 100),
            ("MAT-00002", "ball bearing 608", "Spare Parts", "Acme", 4.5, 50),
            ("MAT-00003", "Drive belt", "Mechanical", "Acme", 12.0, 10),
        ]);
        let report = ConcentrationAnalyzer::categories(&df, &config()).unwrap();

        let mechanical = report
            .stats
            .iter()
            .find(|s| s.category == "Mechanical")
            .unwrap();
        assert_eq!(mechanical.item_count, 2);

        assert_eq!(report.multi_category_count, 1);
        assert_eq!(report.multi_category[0].description, "ball bearing 608");
        assert_eq!(
            report.multi_category[0].categories,
            vec!["Mechanical".to_string(), "Spare Parts".to_string()]
        );
        assert_eq!(report.multi_category[0].item_count, 2);
    }
}
