use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analyzers::completeness::CompletenessReport;
use crate::analyzers::concentration::{AbcReport, CategoryReport};
use crate::analyzers::duplicates::DuplicateReport;
use crate::analyzers::movement::MovementReport;
use crate::analyzers::pricing::PriceReport;
use crate::analyzers::standardization::StandardizationReport;

/// A section that could not be produced, with the reason. The rest of the
/// audit is unaffected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedSection {
    pub section: String,
    pub reason: String,
}

/// The aggregate result of one audit run.
///
/// Each section is independent; a `None` means that analyzer was skipped or
/// failed (see [`AuditReport::skipped`] for why), never that the others are
/// suspect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub rows: usize,
    pub columns: usize,
    pub reference_date: NaiveDate,
    pub duration_ms: u64,

    pub completeness: Option<CompletenessReport>,
    pub duplicates: Option<DuplicateReport>,
    pub standardization: Option<StandardizationReport>,
    pub pricing: Option<PriceReport>,
    pub movement: Option<MovementReport>,
    pub supplier_abc: Option<AbcReport>,
    pub category_abc: Option<AbcReport>,
    pub categories: Option<CategoryReport>,

    pub skipped: Vec<SkippedSection>,
}

impl AuditReport {
    /// Number of sections that produced output.
    pub fn sections_run(&self) -> usize {
        [
            self.completeness.is_some(),
            self.duplicates.is_some(),
            self.standardization.is_some(),
            self.pricing.is_some(),
            self.movement.is_some(),
            self.supplier_abc.is_some(),
            self.category_abc.is_some(),
            self.categories.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}
