// Reappointment Analysis - Core Library
// Exposes the pipeline stages for use in the CLI and tests

pub mod error;
pub mod record;
pub mod normalize;      // Field normalization strategies
pub mod identity;       // Identity keys and grouping
pub mod tagger;         // Chronological reappointment tagging
pub mod aggregate;      // Org-year and annual counts
pub mod rates;          // Rates, year leaders, top organizations
pub mod stats;          // Distribution functions for regression inference
pub mod trend;          // OLS trend with diagnostics
pub mod ingest;         // Per-year CSV ingestion
pub mod config;
pub mod pipeline;
pub mod output;

// Re-export commonly used types
pub use error::{Error, Result, Stage, StageExt};
pub use record::{sequence_records, AppointmentRecord};
pub use normalize::{
    BasicNormalizer, FieldKind, FieldNormalizer, NormalizedField, NormalizerKind,
    StandardNormalizer,
};
pub use identity::{IdentityGroup, IdentityKey, IdentityResolver, KeyResolution, ResolvedRecords};
pub use tagger::{FlagPolicy, ReappointmentTagger, TaggedRecord, TaggedRecords, TaggingSummary};
pub use aggregate::{AnnualScope, Aggregates, Aggregator, OrgYearAggregate, YearTotals};
pub use rates::{
    AnnualAggregate, OrgYearRate, OrganizationRanking, RateCalculator, RateTables, YearLeader,
};
pub use stats::NormalityTest;
pub use trend::{Autocorrelation, TrendAnalyzer, TrendDirection, TrendResult, YearResidual};
pub use ingest::{detect_year, parse_flag, ColumnMap, CsvYearFile, RecordIngestor, RecordSource};
pub use config::AnalysisConfig;
pub use pipeline::{AnalysisReport, ReappointmentPipeline};
pub use output::write_outputs;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
