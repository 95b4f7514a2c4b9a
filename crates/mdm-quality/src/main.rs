//! CLI entry point for the materials master-data audit.

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use clap::Parser;
use mdm_quality::{AuditConfig, AuditPipeline, ReportWriter, render_summary, table};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Materials master-data quality audit",
    long_about = "Runs independent data-quality audits (duplicates, completeness,\n\
                  standardization, price outliers, stock movement, count accuracy,\n\
                  supplier/category concentration) over a materials CSV.\n\n\
                  EXAMPLES:\n  \
                  # Audit with today's date as reference\n  \
                  mdm-quality -i data/materials.csv\n\n  \
                  # Fixed reference date and smaller remediation lists\n  \
                  mdm-quality -i data/materials.csv --reference-date 2026-02-27 --top-n 20\n\n  \
                  # JSON report on stdout, no CSV exports\n  \
                  mdm-quality -i data/materials.csv --json --no-export"
)]
struct Args {
    /// Path to the materials CSV file to audit
    #[arg(short, long)]
    input: String,

    /// Output directory for exported reports
    #[arg(short, long, default_value = "./output")]
    output: String,

    /// Reference "as of" date (YYYY-MM-DD) for movement calculations
    ///
    /// Defaults to today.
    #[arg(long)]
    reference_date: Option<String>,

    /// Bound on ranked remediation lists
    #[arg(long, default_value = "50")]
    top_n: usize,

    /// Seed for the physical-count simulation
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Z-score threshold for price outliers
    #[arg(long, default_value = "3.0")]
    z_threshold: f64,

    /// Days without movement before stock counts as stalled
    #[arg(long, default_value = "365")]
    stalled_days: i64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and the final summary)
    #[arg(short, long)]
    quiet: bool,

    /// Output the JSON report to stdout instead of the text summary
    ///
    /// Disables all logging so stdout only carries JSON. Useful for piping:
    /// `mdm-quality -i data.csv --json | jq .pricing.total_suspects`
    #[arg(long)]
    json: bool,

    /// Skip writing CSV/JSON exports to the output directory
    #[arg(long)]
    no_export: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.quiet, args.json);

    let reference_date = match &args.reference_date {
        Some(raw) => NaiveDate::parse_from_str(raw, table::DATE_FORMAT)
            .map_err(|e| anyhow!("Invalid --reference-date '{}': {}", raw, e))?,
        None => chrono::Local::now().date_naive(),
    };

    let config = AuditConfig::builder()
        .reference_date(reference_date)
        .top_n(args.top_n)
        .count_seed(args.seed)
        .z_score_threshold(args.z_threshold)
        .stalled_days(args.stalled_days)
        .output_dir(&args.output)
        .export_csv(!args.no_export)
        .build()?;

    let pipeline = AuditPipeline::builder().config(config).build()?;
    let report = pipeline.run_path(&args.input)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        // User-facing output, visible regardless of log level.
        println!("{}", render_summary(&report));
    }

    if !args.no_export {
        let written = ReportWriter::new(&args.output).write_all(&report)?;
        if !args.json {
            for path in &written {
                info!("Report written: {}", path.display());
            }
        }
    }

    Ok(())
}
