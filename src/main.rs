use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use reappointment_analysis::{
    write_outputs, AnalysisConfig, AnalysisReport, AnnualScope, FlagPolicy, NormalizerKind,
    ReappointmentPipeline, RecordIngestor,
};

#[derive(Parser, Debug)]
#[command(name = "reappointment-analysis")]
#[command(version)]
#[command(about = "Tag reappointments in yearly appointment records and test for a trend")]
struct Args {
    /// Directory holding one CSV file per year (year in the file name)
    #[arg(short, long)]
    input_dir: PathBuf,

    /// Directory for the output tables and JSON report
    #[arg(short, long, default_value = "analysis_output")]
    output_dir: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    normalizer: Option<NormalizerKind>,

    /// How supplied reappointment flags combine with the computed tag
    #[arg(long, value_enum)]
    flag_policy: Option<FlagPolicy>,

    /// Which records count toward the annual totals
    #[arg(long, value_enum)]
    annual_scope: Option<AnnualScope>,

    #[arg(long)]
    first_year: Option<i32>,

    #[arg(long)]
    last_year: Option<i32>,

    /// Minimum appointments for an organization to be ranked
    #[arg(long)]
    min_appointments: Option<usize>,

    /// Standardized residual threshold for outlier years
    #[arg(long)]
    outlier_z: Option<f64>,
}

impl Args {
    fn apply(&self, mut config: AnalysisConfig) -> AnalysisConfig {
        if let Some(kind) = self.normalizer {
            config.normalizer = kind;
        }
        if let Some(policy) = self.flag_policy {
            config.flag_policy = policy;
        }
        if let Some(scope) = self.annual_scope {
            config.annual_scope = scope;
        }
        if let Some(year) = self.first_year {
            config.first_year = year;
        }
        if let Some(year) = self.last_year {
            config.last_year = year;
        }
        if let Some(min) = self.min_appointments {
            config.min_appointments = min;
        }
        if let Some(z) = self.outlier_z {
            config.outlier_z = z;
        }
        config
    }
}

const DEFAULT_LOG: &str = "reappointment_analysis=info";

/// RUST_LOG when set and parseable, otherwise info for this crate
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG))
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Layering: defaults → file → environment → command line
    let base = match &args.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };
    let config = args.apply(base.with_env().context("Invalid REAPPOINT_* environment variable")?);

    let pipeline = ReappointmentPipeline::new(config)?;

    tracing::info!("Loading records from {}", args.input_dir.display());
    let records = RecordIngestor::ingest_dir(&args.input_dir)?;

    let report = pipeline.run(records)?;

    let written = write_outputs(&report, &args.output_dir)
        .with_context(|| format!("Failed to write outputs to {:?}", args.output_dir))?;

    print_summary(&report);
    for path in written {
        println!("✓ Wrote {}", path.display());
    }

    Ok(())
}

fn print_summary(report: &AnalysisReport) {
    println!("📊 Reappointment Analysis ({})", report.run_id);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("{}", report.tagging.summary());
    if report.out_of_range > 0 {
        println!("⚠️  {} records outside {}-{} skipped",
            report.out_of_range, report.config.first_year, report.config.last_year);
    }

    println!("\n📅 Annual proportions:");
    for year in &report.annual {
        println!(
            "   {}  {:>5} / {:<5}  {:.1}%",
            year.year,
            year.reappointment_count,
            year.total_count,
            year.proportion * 100.0
        );
    }

    if let Some(top) = report.top_organizations.first() {
        println!(
            "\n🏛️  Most reappointments: {} ({} of {})",
            top.display_name, top.reappointment_count, top.total_count
        );
    }

    println!("\n📈 {}", report.trend.summary());
    if !report.trend.outliers.is_empty() {
        println!("   Outlier years: {:?}", report.trend.outliers);
    }
}
