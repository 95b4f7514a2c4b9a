//! Configuration types for the audit pipeline.
//!
//! Every threshold the analyzers consult lives here as an explicit field
//! with the conventional default, so policies are testable instead of being
//! inline literals. Use the builder for fluent setup.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::schema;

/// Classification of fields into completeness tiers.
///
/// Fields present in the table but listed in neither tier are treated as
/// informational (weight 1), never silently dropped from the record score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldTiers {
    /// Weight 3. A blank here is a violation worth listing per record.
    pub required: Vec<String>,
    /// Weight 2.
    pub important: Vec<String>,
}

impl Default for FieldTiers {
    fn default() -> Self {
        Self {
            required: vec![
                schema::CODE.to_string(),
                schema::DESCRIPTION.to_string(),
                schema::CATEGORY.to_string(),
                schema::UNIT_OF_MEASURE.to_string(),
                schema::UNIT_PRICE.to_string(),
            ],
            important: vec![
                schema::SUPPLIER.to_string(),
                schema::STORAGE_LOCATION.to_string(),
                schema::TAX_CODE.to_string(),
                schema::MIN_STOCK.to_string(),
                schema::COST_CENTER.to_string(),
            ],
        }
    }
}

impl FieldTiers {
    /// Weight of a field under this tiering.
    pub fn weight(&self, field: &str) -> u32 {
        if self.required.iter().any(|f| f == field) {
            3
        } else if self.important.iter().any(|f| f == field) {
            2
        } else {
            1
        }
    }

    pub fn is_required(&self, field: &str) -> bool {
        self.required.iter().any(|f| f == field)
    }
}

/// A keyword that implies an expected category when found as a substring of
/// a (lowercased) description. Rule order is match priority: a record
/// matching several keywords keeps the first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keyword: String,
    pub expected_category: String,
}

impl KeywordRule {
    pub fn new(keyword: impl Into<String>, expected_category: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            expected_category: expected_category.into(),
        }
    }
}

static DEFAULT_KEYWORD_RULES: Lazy<Vec<KeywordRule>> = Lazy::new(|| {
    vec![
        KeywordRule::new("hose", "Hydraulic"),
        KeywordRule::new("hydraulic valve", "Hydraulic"),
        KeywordRule::new("pump", "Hydraulic"),
        KeywordRule::new("piston", "Hydraulic"),
        KeywordRule::new("cable", "Electrical"),
        KeywordRule::new("wire", "Electrical"),
        KeywordRule::new("breaker", "Electrical"),
        KeywordRule::new("relay", "Electrical"),
        KeywordRule::new("conduit", "Electrical"),
        KeywordRule::new("solvent", "Chemical"),
        KeywordRule::new("reagent", "Chemical"),
        KeywordRule::new("catalyst", "Chemical"),
        KeywordRule::new("disinfectant", "Chemical"),
        KeywordRule::new("grease", "Lubricants"),
        KeywordRule::new("lubric", "Lubricants"),
        KeywordRule::new("oil", "Lubricants"),
        KeywordRule::new("glove", "Safety"),
        KeywordRule::new("helmet", "Safety"),
        KeywordRule::new("mask", "Safety"),
        KeywordRule::new("goggles", "Safety"),
        KeywordRule::new("bolt", "Fasteners"),
        KeywordRule::new("washer", "Fasteners"),
        KeywordRule::new("rivet", "Fasteners"),
        KeywordRule::new("bearing", "Mechanical"),
        KeywordRule::new("gear", "Mechanical"),
    ]
});

static DEFAULT_CATEGORY_PAIRS: Lazy<Vec<(String, String)>> = Lazy::new(|| {
    [
        ("Electrical", "Electronic"),
        ("Mechanical", "Spare Parts"),
        ("Hydraulic", "Pneumatic"),
        ("Cleaning", "Chemical"),
        ("Accessories", "Fasteners"),
    ]
    .iter()
    .map(|(a, b)| (a.to_string(), b.to_string()))
    .collect()
});

/// Configuration for the audit pipeline.
///
/// Use [`AuditConfig::builder()`] for fluent setup.
///
/// # Example
///
/// ```rust,ignore
/// use mdm_quality::AuditConfig;
/// use chrono::NaiveDate;
///
/// let config = AuditConfig::builder()
///     .reference_date(NaiveDate::from_ymd_opt(2026, 2, 27).unwrap())
///     .z_score_threshold(2.5)
///     .top_n(20)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// "As of" date for movement-age calculations.
    pub reference_date: NaiveDate,

    /// Field tiering for completeness scoring.
    pub field_tiers: FieldTiers,

    /// |z| above which a valid price is a statistical outlier.
    /// Default: 3.0
    pub z_score_threshold: f64,

    /// IQR fence multiplier. Default: 1.5
    pub iqr_multiplier: f64,

    /// Price / category-median ratio above which a price is suspect.
    /// Default: 10.0
    pub ratio_high: f64,

    /// Price / category-median ratio below which a price is suspect.
    /// Default: 0.05
    pub ratio_low: f64,

    /// Days without movement after which stock counts as stalled.
    /// Default: 365
    pub stalled_days: i64,

    /// Cumulative-value percentage closing class A. Default: 80.0
    pub abc_a_cutoff: f64,

    /// Cumulative-value percentage closing class B. Default: 95.0
    pub abc_b_cutoff: f64,

    /// Description-overlap percentage that warrants a warning. Default: 5.0
    pub overlap_warning_pct: f64,

    /// Description-overlap percentage that is critical. Default: 15.0
    pub overlap_critical_pct: f64,

    /// |divergence %| within which a count is considered accurate.
    /// Default: 2.0
    pub accuracy_tolerance_pct: f64,

    /// Bound on ranked remediation lists. Default: 50
    pub top_n: usize,

    /// Seed for the physical-count simulation, so audits are reproducible.
    /// Default: 42
    pub count_seed: u64,

    /// Category pairs checked for description overlap.
    pub category_pairs: Vec<(String, String)>,

    /// Ordered keyword rules for category-mismatch detection.
    pub keyword_rules: Vec<KeywordRule>,

    /// Output directory for exported reports. Default: "output"
    pub output_dir: PathBuf,

    /// Whether to write ranked CSV exports. Default: true
    pub export_csv: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            // Callers normally set this; a fixed default keeps library use
            // deterministic instead of sneaking in the wall clock.
            reference_date: NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date"),
            field_tiers: FieldTiers::default(),
            z_score_threshold: 3.0,
            iqr_multiplier: 1.5,
            ratio_high: 10.0,
            ratio_low: 0.05,
            stalled_days: 365,
            abc_a_cutoff: 80.0,
            abc_b_cutoff: 95.0,
            overlap_warning_pct: 5.0,
            overlap_critical_pct: 15.0,
            accuracy_tolerance_pct: 2.0,
            top_n: 50,
            count_seed: 42,
            category_pairs: DEFAULT_CATEGORY_PAIRS.clone(),
            keyword_rules: DEFAULT_KEYWORD_RULES.clone(),
            output_dir: PathBuf::from("output"),
            export_csv: true,
        }
    }
}

impl AuditConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AuditConfigBuilder {
        AuditConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.z_score_threshold <= 0.0 {
            return Err(ConfigValidationError::NonPositive {
                field: "z_score_threshold",
                value: self.z_score_threshold,
            });
        }
        if self.iqr_multiplier <= 0.0 {
            return Err(ConfigValidationError::NonPositive {
                field: "iqr_multiplier",
                value: self.iqr_multiplier,
            });
        }
        if self.ratio_low <= 0.0 {
            return Err(ConfigValidationError::NonPositive {
                field: "ratio_low",
                value: self.ratio_low,
            });
        }
        if self.ratio_low >= self.ratio_high {
            return Err(ConfigValidationError::InvertedRange {
                low: "ratio_low",
                high: "ratio_high",
            });
        }
        if self.stalled_days <= 0 {
            return Err(ConfigValidationError::NonPositive {
                field: "stalled_days",
                value: self.stalled_days as f64,
            });
        }
        if !(0.0 < self.abc_a_cutoff && self.abc_a_cutoff < self.abc_b_cutoff
            && self.abc_b_cutoff <= 100.0)
        {
            return Err(ConfigValidationError::InvalidAbcCutoffs {
                a: self.abc_a_cutoff,
                b: self.abc_b_cutoff,
            });
        }
        if self.overlap_warning_pct >= self.overlap_critical_pct {
            return Err(ConfigValidationError::InvertedRange {
                low: "overlap_warning_pct",
                high: "overlap_critical_pct",
            });
        }
        if self.top_n == 0 {
            return Err(ConfigValidationError::ZeroTopN);
        }
        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("'{field}' must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("'{low}' must be strictly below '{high}'")]
    InvertedRange {
        low: &'static str,
        high: &'static str,
    },

    #[error("ABC cutoffs must satisfy 0 < A < B <= 100, got A={a}, B={b}")]
    InvalidAbcCutoffs { a: f64, b: f64 },

    #[error("top_n must be at least 1")]
    ZeroTopN,
}

/// Builder for [`AuditConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct AuditConfigBuilder {
    reference_date: Option<NaiveDate>,
    field_tiers: Option<FieldTiers>,
    z_score_threshold: Option<f64>,
    iqr_multiplier: Option<f64>,
    ratio_high: Option<f64>,
    ratio_low: Option<f64>,
    stalled_days: Option<i64>,
    abc_a_cutoff: Option<f64>,
    abc_b_cutoff: Option<f64>,
    overlap_warning_pct: Option<f64>,
    overlap_critical_pct: Option<f64>,
    accuracy_tolerance_pct: Option<f64>,
    top_n: Option<usize>,
    count_seed: Option<u64>,
    category_pairs: Option<Vec<(String, String)>>,
    keyword_rules: Option<Vec<KeywordRule>>,
    output_dir: Option<PathBuf>,
    export_csv: Option<bool>,
}

impl AuditConfigBuilder {
    /// Set the "as of" date for movement-age calculations.
    pub fn reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    /// Set the completeness field tiering.
    pub fn field_tiers(mut self, tiers: FieldTiers) -> Self {
        self.field_tiers = Some(tiers);
        self
    }

    /// Set the Z-score outlier threshold.
    pub fn z_score_threshold(mut self, threshold: f64) -> Self {
        self.z_score_threshold = Some(threshold);
        self
    }

    /// Set the IQR fence multiplier.
    pub fn iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = Some(multiplier);
        self
    }

    /// Set the upper intra-category price-ratio fence.
    pub fn ratio_high(mut self, ratio: f64) -> Self {
        self.ratio_high = Some(ratio);
        self
    }

    /// Set the lower intra-category price-ratio fence.
    pub fn ratio_low(mut self, ratio: f64) -> Self {
        self.ratio_low = Some(ratio);
        self
    }

    /// Set the stalled-inventory age threshold in days.
    pub fn stalled_days(mut self, days: i64) -> Self {
        self.stalled_days = Some(days);
        self
    }

    /// Set the ABC classification cutoffs (cumulative-value percentages).
    pub fn abc_cutoffs(mut self, a: f64, b: f64) -> Self {
        self.abc_a_cutoff = Some(a);
        self.abc_b_cutoff = Some(b);
        self
    }

    /// Set the category-overlap severity cuts.
    pub fn overlap_cuts(mut self, warning_pct: f64, critical_pct: f64) -> Self {
        self.overlap_warning_pct = Some(warning_pct);
        self.overlap_critical_pct = Some(critical_pct);
        self
    }

    /// Set the accuracy tolerance percentage.
    pub fn accuracy_tolerance_pct(mut self, pct: f64) -> Self {
        self.accuracy_tolerance_pct = Some(pct);
        self
    }

    /// Set the bound on ranked remediation lists.
    pub fn top_n(mut self, n: usize) -> Self {
        self.top_n = Some(n);
        self
    }

    /// Set the physical-count simulation seed.
    pub fn count_seed(mut self, seed: u64) -> Self {
        self.count_seed = Some(seed);
        self
    }

    /// Set the category pairs checked for description overlap.
    pub fn category_pairs(mut self, pairs: Vec<(String, String)>) -> Self {
        self.category_pairs = Some(pairs);
        self
    }

    /// Set the ordered keyword rules for category-mismatch detection.
    pub fn keyword_rules(mut self, rules: Vec<KeywordRule>) -> Self {
        self.keyword_rules = Some(rules);
        self
    }

    /// Set the output directory for exported reports.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Enable or disable ranked CSV exports.
    pub fn export_csv(mut self, export: bool) -> Self {
        self.export_csv = Some(export);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `AuditConfig` or an error if validation fails.
    pub fn build(self) -> Result<AuditConfig, ConfigValidationError> {
        let defaults = AuditConfig::default();
        let config = AuditConfig {
            reference_date: self.reference_date.unwrap_or(defaults.reference_date),
            field_tiers: self.field_tiers.unwrap_or(defaults.field_tiers),
            z_score_threshold: self.z_score_threshold.unwrap_or(defaults.z_score_threshold),
            iqr_multiplier: self.iqr_multiplier.unwrap_or(defaults.iqr_multiplier),
            ratio_high: self.ratio_high.unwrap_or(defaults.ratio_high),
            ratio_low: self.ratio_low.unwrap_or(defaults.ratio_low),
            stalled_days: self.stalled_days.unwrap_or(defaults.stalled_days),
            abc_a_cutoff: self.abc_a_cutoff.unwrap_or(defaults.abc_a_cutoff),
            abc_b_cutoff: self.abc_b_cutoff.unwrap_or(defaults.abc_b_cutoff),
            overlap_warning_pct: self
                .overlap_warning_pct
                .unwrap_or(defaults.overlap_warning_pct),
            overlap_critical_pct: self
                .overlap_critical_pct
                .unwrap_or(defaults.overlap_critical_pct),
            accuracy_tolerance_pct: self
                .accuracy_tolerance_pct
                .unwrap_or(defaults.accuracy_tolerance_pct),
            top_n: self.top_n.unwrap_or(defaults.top_n),
            count_seed: self.count_seed.unwrap_or(defaults.count_seed),
            category_pairs: self.category_pairs.unwrap_or(defaults.category_pairs),
            keyword_rules: self.keyword_rules.unwrap_or(defaults.keyword_rules),
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            export_csv: self.export_csv.unwrap_or(defaults.export_csv),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuditConfig::default();
        assert_eq!(config.z_score_threshold, 3.0);
        assert_eq!(config.iqr_multiplier, 1.5);
        assert_eq!(config.stalled_days, 365);
        assert_eq!(config.abc_a_cutoff, 80.0);
        assert_eq!(config.abc_b_cutoff, 95.0);
        assert_eq!(config.top_n, 50);
        assert!(config.export_csv);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AuditConfig::builder()
            .z_score_threshold(2.5)
            .stalled_days(180)
            .abc_cutoffs(70.0, 90.0)
            .top_n(10)
            .build()
            .unwrap();

        assert_eq!(config.z_score_threshold, 2.5);
        assert_eq!(config.stalled_days, 180);
        assert_eq!(config.abc_a_cutoff, 70.0);
        assert_eq!(config.abc_b_cutoff, 90.0);
        assert_eq!(config.top_n, 10);
    }

    #[test]
    fn test_validation_inverted_ratio_fences() {
        let result = AuditConfig::builder()
            .ratio_low(20.0)
            .ratio_high(10.0)
            .build();

        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvertedRange { .. }
        ));
    }

    #[test]
    fn test_validation_invalid_abc_cutoffs() {
        let result = AuditConfig::builder().abc_cutoffs(95.0, 80.0).build();

        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidAbcCutoffs { .. }
        ));
    }

    #[test]
    fn test_validation_zero_top_n() {
        let result = AuditConfig::builder().top_n(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::ZeroTopN
        ));
    }

    #[test]
    fn test_field_tier_weights() {
        let tiers = FieldTiers::default();
        assert_eq!(tiers.weight("code"), 3);
        assert_eq!(tiers.weight("supplier"), 2);
        assert_eq!(tiers.weight("status"), 1);
        // Unknown fields fall back to informational, never dropped
        assert_eq!(tiers.weight("some_custom_field"), 1);
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = AuditConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: AuditConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config.z_score_threshold, deserialized.z_score_threshold);
        assert_eq!(config.reference_date, deserialized.reference_date);
        assert_eq!(config.keyword_rules.len(), deserialized.keyword_rules.len());
    }
}
