//! The audit analyzers.
//!
//! Each analyzer is a pure function of (enriched table, configuration) into
//! a report: aggregate metrics plus flagged records. Analyzers share no
//! state and have no ordering dependency; the pipeline runs them
//! independently and a failure in one never aborts the others.

pub mod completeness;
pub mod concentration;
pub mod duplicates;
pub mod movement;
pub mod pricing;
pub mod standardization;

pub use completeness::CompletenessAnalyzer;
pub use concentration::ConcentrationAnalyzer;
pub use duplicates::DuplicateDetector;
pub use movement::MovementAnalyzer;
pub use pricing::PriceAnalyzer;
pub use standardization::StandardizationAnalyzer;
