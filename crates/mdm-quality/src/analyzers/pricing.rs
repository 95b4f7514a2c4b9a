//! Price analyzer: zero prices, statistical outliers and intra-category
//! anomalies, consolidated into one ranked suspect list.
//!
//! "Valid" prices are strictly positive; every statistic here is computed
//! over the valid subset only, and a subset too degenerate to support a
//! statistic yields an absent metric, never NaN.

use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::config::AuditConfig;
use crate::schema;
use crate::stats;
use crate::text::is_blank;

/// Score contributions per detection rule. Zero price outranks a borderline
/// statistical outlier; the magnitude terms are capped so one huge record
/// cannot dominate the ranking.
const SCORE_ZERO_PRICE: f64 = 30.0;
const SCORE_IQR: f64 = 20.0;
const SCORE_Z: f64 = 15.0;
const SCORE_RATIO: f64 = 10.0;
const VALUE_CAP: f64 = 10.0;
const STOCK_CAP: f64 = 5.0;

/// Price-band histogram edges (upper bounds, exclusive).
const PRICE_BANDS: [(f64, &str); 6] = [
    (1.0, "under 1"),
    (10.0, "1 to 10"),
    (50.0, "10 to 50"),
    (100.0, "50 to 100"),
    (500.0, "100 to 500"),
    (2000.0, "500 to 2000"),
];

/// Descriptive statistics of the valid price distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceDistribution {
    pub valid_count: usize,
    pub zero_count: usize,
    pub missing_count: usize,
    pub min: Option<f64>,
    pub q1: Option<f64>,
    pub median: Option<f64>,
    pub mean: Option<f64>,
    pub q3: Option<f64>,
    pub max: Option<f64>,
    pub std: Option<f64>,
    /// (band label, record count), zero band first.
    pub bands: Vec<(String, usize)>,
}

/// A record priced at zero while holding stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZeroPriceRecord {
    pub code: Option<String>,
    pub category: Option<String>,
    pub current_stock: f64,
    /// Median valid price of the same category. Absent when the category
    /// has no valid-price records; never defaulted to zero.
    pub shadow_price: Option<f64>,
    pub estimated_value: Option<f64>,
}

/// Which detection rules flagged a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFlags {
    pub zero_price: bool,
    pub z_score: bool,
    pub iqr: bool,
    pub ratio: bool,
}

impl PriceFlags {
    pub fn any(&self) -> bool {
        self.zero_price || self.z_score || self.iqr || self.ratio
    }

    pub fn rule_count(&self) -> usize {
        [self.zero_price, self.z_score, self.iqr, self.ratio]
            .iter()
            .filter(|f| **f)
            .count()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.zero_price {
            labels.push("zero-price");
        }
        if self.z_score {
            labels.push("z-score");
        }
        if self.iqr {
            labels.push("iqr");
        }
        if self.ratio {
            labels.push("intra-category");
        }
        labels
    }
}

/// A record flagged by at least one rule, with its priority score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspectPrice {
    pub code: Option<String>,
    pub category: Option<String>,
    pub unit_price: Option<f64>,
    pub current_stock: f64,
    pub stock_value: f64,
    pub z: Option<f64>,
    pub category_ratio: Option<f64>,
    pub flags: PriceFlags,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceReport {
    pub distribution: PriceDistribution,
    pub zero_price_records: Vec<ZeroPriceRecord>,
    pub z_outlier_count: usize,
    pub iqr_outlier_count: usize,
    pub ratio_outlier_count: usize,
    pub iqr_fences: Option<(f64, f64)>,
    pub total_suspects: usize,
    /// All flagged records, ranked by score descending, capped at top-N.
    pub suspects: Vec<SuspectPrice>,
}

pub struct PriceAnalyzer;

impl PriceAnalyzer {
    pub fn analyze(df: &DataFrame, config: &AuditConfig) -> Result<PriceReport> {
        let prices = schema::f64_values(df, schema::UNIT_PRICE)?;
        let stocks = schema::f64_values(df, schema::CURRENT_STOCK)?;
        let codes = schema::str_values(df, schema::CODE)?;
        let categories = if schema::has_column(df, schema::CATEGORY) {
            schema::str_values(df, schema::CATEGORY)?
        } else {
            vec![None; df.height()]
        };

        let valid_prices: Vec<f64> = prices.iter().flatten().copied().filter(|p| *p > 0.0).collect();

        // Population statistics over the valid subset; a constant-price
        // dataset has std 0 and therefore no Z-score outliers.
        let mean = stats::mean(&valid_prices);
        let std = stats::population_std(&valid_prices).filter(|s| *s > 0.0);
        let iqr_fences = stats::iqr_fences(&valid_prices, config.iqr_multiplier);
        let category_medians = Self::category_medians(&prices, &categories);

        let distribution = Self::distribution(&prices, &valid_prices);

        let mut zero_price_records = Vec::new();
        let mut suspects = Vec::new();
        let mut z_outlier_count = 0usize;
        let mut iqr_outlier_count = 0usize;
        let mut ratio_outlier_count = 0usize;

        for row in 0..df.height() {
            let price = prices[row];
            let stock = stocks[row].unwrap_or(0.0);
            let category = categories[row]
                .as_ref()
                .filter(|c| !is_blank(c))
                .map(|c| c.trim().to_string());

            let mut flags = PriceFlags::default();
            let mut z = None;
            let mut category_ratio = None;

            // Rule 1: zero price with stock on hand.
            if price == Some(0.0) && stock > 0.0 {
                flags.zero_price = true;
                let shadow_price = category
                    .as_ref()
                    .and_then(|c| category_medians.get(c).copied());
                zero_price_records.push(ZeroPriceRecord {
                    code: codes[row].clone(),
                    category: category.clone(),
                    current_stock: stock,
                    shadow_price,
                    estimated_value: shadow_price.map(|p| p * stock),
                });
            }

            if let Some(p) = price
                && p > 0.0
            {
                // Rule 2: Z-score against the population of valid prices.
                if let (Some(m), Some(s)) = (mean, std)
                    && let Some(value) = stats::z_score(p, m, s)
                {
                    if value.abs() > config.z_score_threshold {
                        flags.z_score = true;
                    }
                    z = Some(value);
                }

                // Rule 3: IQR fences.
                if let Some((lower, upper)) = iqr_fences
                    && (p < lower || p > upper)
                {
                    flags.iqr = true;
                }

                // Rule 4: price against its own category's median.
                if let Some(c) = &category
                    && let Some(median) = category_medians.get(c)
                    && *median > 0.0
                {
                    let ratio = p / median;
                    if ratio > config.ratio_high || ratio < config.ratio_low {
                        flags.ratio = true;
                    }
                    category_ratio = Some(ratio);
                }
            }

            if flags.z_score {
                z_outlier_count += 1;
            }
            if flags.iqr {
                iqr_outlier_count += 1;
            }
            if flags.ratio {
                ratio_outlier_count += 1;
            }

            if flags.any() {
                let stock_value = price.unwrap_or(0.0) * stock;
                suspects.push(SuspectPrice {
                    code: codes[row].clone(),
                    category,
                    unit_price: price,
                    current_stock: stock,
                    stock_value,
                    z,
                    category_ratio,
                    flags,
                    score: Self::score(&flags, stock_value, stock),
                });
            }
        }

        let total_suspects = suspects.len();
        suspects.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.code.cmp(&b.code))
        });
        suspects.truncate(config.top_n);

        zero_price_records.sort_by(|a, b| {
            b.current_stock
                .partial_cmp(&a.current_stock)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.code.cmp(&b.code))
        });

        Ok(PriceReport {
            distribution,
            zero_price_records,
            z_outlier_count,
            iqr_outlier_count,
            ratio_outlier_count,
            iqr_fences,
            total_suspects,
            suspects,
        })
    }

    /// Priority score. Monotone in the triggered-rule set: every rule adds
    /// a non-negative contribution, so triggering strictly more rules can
    /// never lower the score.
    fn score(flags: &PriceFlags, stock_value: f64, stock: f64) -> f64 {
        let mut score = 0.0;
        if flags.zero_price {
            score += SCORE_ZERO_PRICE;
        }
        if flags.iqr {
            score += SCORE_IQR;
        }
        if flags.z_score {
            score += SCORE_Z;
        }
        if flags.ratio {
            score += SCORE_RATIO;
        }
        score += (stock_value / 1_000_000.0).min(VALUE_CAP);
        score += (stock / 1_000.0).min(STOCK_CAP);
        score
    }

    /// Median valid price per category. Categories with no valid price are
    /// absent from the map, which is what makes the shadow value undefined.
    fn category_medians(
        prices: &[Option<f64>],
        categories: &[Option<String>],
    ) -> HashMap<String, f64> {
        let mut by_category: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (price, category) in prices.iter().zip(categories.iter()) {
            if let (Some(p), Some(c)) = (price, category)
                && *p > 0.0
                && !is_blank(c)
            {
                by_category.entry(c.trim().to_string()).or_default().push(*p);
            }
        }
        by_category
            .into_iter()
            .filter_map(|(category, values)| stats::median(&values).map(|m| (category, m)))
            .collect()
    }

    fn distribution(prices: &[Option<f64>], valid: &[f64]) -> PriceDistribution {
        let zero_count = prices.iter().flatten().filter(|p| **p == 0.0).count();
        let missing_count = prices.iter().filter(|p| p.is_none()).count();

        let mut bands: Vec<(String, usize)> = Vec::with_capacity(PRICE_BANDS.len() + 2);
        bands.push(("zero".to_string(), zero_count));
        let mut previous = 0.0;
        for (upper, label) in PRICE_BANDS {
            let count = valid.iter().filter(|p| **p >= previous && **p < upper).count();
            bands.push((label.to_string(), count));
            previous = upper;
        }
        bands.push((
            "2000 and above".to_string(),
            valid.iter().filter(|p| **p >= previous).count(),
        ));

        PriceDistribution {
            valid_count: valid.len(),
            zero_count,
            missing_count,
            min: valid
                .iter()
                .copied()
                .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)),
            q1: stats::quantile(valid, 0.25),
            median: stats::median(valid),
            mean: stats::mean(valid),
            q3: stats::quantile(valid, 0.75),
            max: valid
                .iter()
                .copied()
                .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)),
            std: stats::population_std(valid),
            bands,
        }
    }
}
