//! Materials Master-Data Quality Audit Library
//!
//! A data-quality audit library for materials master data (inventory item
//! registers), built with Rust and Polars.
//!
//! # Overview
//!
//! The library runs a set of independent analyzers over one immutable
//! materials table and produces a combined report:
//!
//! - **Completeness**: per-field fill rates and tier-weighted record scores
//! - **Duplicates**: exact-code and normalized-description grouping with
//!   deterministic survivor election
//! - **Standardization**: casing consistency, whitespace defects and
//!   categorical-variant reduction
//! - **Pricing**: zero prices, Z-score/IQR outliers and intra-category
//!   anomalies, consolidated into a ranked suspect list
//! - **Movement**: stock age bands, stalled/critical classification and
//!   physical-vs-system count accuracy
//! - **Concentration**: ABC (Pareto) classification of suppliers and
//!   categories, keyword-based category-mismatch detection, category
//!   overlap
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use mdm_quality::{AuditConfig, AuditPipeline, reporting};
//! use chrono::NaiveDate;
//!
//! let config = AuditConfig::builder()
//!     .reference_date(NaiveDate::from_ymd_opt(2026, 2, 27).unwrap())
//!     .top_n(20)
//!     .build()?;
//!
//! let report = AuditPipeline::builder()
//!     .config(config)
//!     .build()?
//!     .run_path("data/materials.csv")?;
//!
//! println!("{}", reporting::render_summary(&report));
//! ```
//!
//! # Degradation
//!
//! Analyzers are independent. A missing optional column (say `supplier`)
//! skips the dependent section with a warning and leaves every other
//! section intact; the skip and its reason are carried in the report.
//!
//! # Configuration
//!
//! Every threshold (Z-score cut, IQR multiplier, intra-category ratio
//! fences, stalled-days horizon, ABC cutoffs, overlap severity cuts) is an
//! explicit [`AuditConfig`] field with the conventional default, so policy
//! changes never require touching analyzer code.

pub mod analyzers;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod reporting;
pub mod schema;
pub mod stats;
pub mod table;
pub mod text;
pub mod types;

// Re-exports for convenient access
pub use analyzers::{
    CompletenessAnalyzer, ConcentrationAnalyzer, DuplicateDetector, MovementAnalyzer,
    PriceAnalyzer, StandardizationAnalyzer,
};
pub use config::{AuditConfig, AuditConfigBuilder, ConfigValidationError, FieldTiers, KeywordRule};
pub use error::{AuditError, Result as AuditResult, ResultExt};
pub use pipeline::{AuditPipeline, AuditPipelineBuilder};
pub use reporting::{ReportWriter, render_summary};
pub use table::{enrich, load_materials};
pub use types::{AuditReport, SkippedSection};
