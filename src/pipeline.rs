// 🔗 Reappointment Pipeline - records → tags → aggregates → rates → trend
// Each stage consumes the complete output of the previous one. A run either
// yields a full report or an error naming the failing stage.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::aggregate::Aggregator;
use crate::config::AnalysisConfig;
use crate::error::{Error, Result, Stage, StageExt};
use crate::identity::IdentityResolver;
use crate::normalize::FieldNormalizer;
use crate::rates::{AnnualAggregate, OrgYearRate, OrganizationRanking, RateCalculator, YearLeader};
use crate::record::AppointmentRecord;
use crate::tagger::{ReappointmentTagger, TaggedRecord, TaggingSummary};
use crate::trend::{TrendAnalyzer, TrendResult};

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub config: AnalysisConfig,
    /// Records dropped for falling outside the configured year range
    pub out_of_range: usize,
    pub tagging: TaggingSummary,
    /// Written as a CSV table, not part of the JSON report
    #[serde(skip)]
    pub tagged: Vec<TaggedRecord>,
    #[serde(skip)]
    pub org_year_rates: Vec<OrgYearRate>,
    pub annual: Vec<AnnualAggregate>,
    pub year_leaders: Vec<YearLeader>,
    pub top_organizations: Vec<OrganizationRanking>,
    pub trend: TrendResult,
}

pub struct ReappointmentPipeline {
    config: AnalysisConfig,
    normalizer: Box<dyn FieldNormalizer>,
}

impl ReappointmentPipeline {
    /// Pipeline using the normalizer named in the configuration
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        let normalizer = config.normalizer.build();
        Self::with_normalizer(config, normalizer)
    }

    /// Pipeline with a custom normalization strategy
    pub fn with_normalizer(
        config: AnalysisConfig,
        normalizer: Box<dyn FieldNormalizer>,
    ) -> Result<Self> {
        config.validate().stage(Stage::Configure)?;
        Ok(ReappointmentPipeline { config, normalizer })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn run(&self, records: Vec<AppointmentRecord>) -> Result<AnalysisReport> {
        let config = &self.config;

        // Step 1: Restrict to the configured year range
        let total = records.len();
        let records: Vec<AppointmentRecord> = records
            .into_iter()
            .filter(|r| config.contains_year(r.year))
            .collect();
        let out_of_range = total - records.len();
        if out_of_range > 0 {
            tracing::warn!(
                out_of_range,
                first_year = config.first_year,
                last_year = config.last_year,
                "dropped records outside the year range"
            );
        }
        if records.is_empty() {
            return Err(Error::EmptyInput {
                first_year: config.first_year,
                last_year: config.last_year,
            }
            .at(Stage::Select));
        }

        // Step 2: Normalize and group by identity
        let resolved = IdentityResolver::new(self.normalizer.as_ref()).resolve(records);
        tracing::info!(
            records = resolved.records.len(),
            groups = resolved.groups.len(),
            excluded = resolved.excluded_count(),
            "resolved identities"
        );

        // Step 3: Tag reappointments
        let tagged = ReappointmentTagger::new(config.flag_policy).tag(resolved);

        // Step 4: Aggregate counts
        let aggregates = Aggregator::new(config.annual_scope)
            .aggregate(&tagged.records)
            .stage(Stage::Aggregate)?;

        // Step 5: Rates and top organizations
        let rates = RateCalculator::new(config.min_appointments, config.top_n)
            .calculate(&aggregates)
            .stage(Stage::Rates)?;

        // Step 6: Trend over the annual proportions
        let trend = TrendAnalyzer::new(config.outlier_z, config.confidence_level, config.alpha)
            .analyze(&rates.annual)
            .stage(Stage::Trend)?;

        Ok(AnalysisReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            config: config.clone(),
            out_of_range,
            tagging: tagged.summary,
            tagged: tagged.records,
            org_year_rates: rates.org_years,
            annual: rates.annual,
            year_leaders: rates.year_leaders,
            top_organizations: rates.top_organizations,
            trend,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{FieldKind, NormalizedField};
    use crate::record::sequence_records;
    use crate::tagger::FlagPolicy;
    use crate::trend::TrendDirection;

    fn create_test_record(name: &str, org: Option<&str>, year: i32) -> AppointmentRecord {
        AppointmentRecord::new(0, Some(name), Some("Member"), org, year)
    }

    /// Each year: `held` returning members plus one newcomer
    fn create_growing_records() -> Vec<AppointmentRecord> {
        let mut rows = Vec::new();
        for (i, year) in (2013..=2017).enumerate() {
            for member in 0..=i {
                rows.push(create_test_record(&format!("Member {}", member), Some("Health Board"), year));
            }
            rows.push(create_test_record(&format!("Newcomer {}", year), Some("Arts Council"), year));
        }
        sequence_records(rows)
    }

    #[test]
    fn test_full_run() {
        let pipeline = ReappointmentPipeline::new(AnalysisConfig {
            min_appointments: 1,
            ..AnalysisConfig::default()
        })
        .unwrap();

        let report = pipeline.run(create_growing_records()).unwrap();

        // 2013: 2 appointments, 0 reappointments; 2017: 6 appointments, 4 reappointments
        assert_eq!(report.annual.len(), 5);
        assert_eq!(report.annual[0].reappointment_count, 0);
        assert_eq!(report.annual[4].total_count, 6);
        assert_eq!(report.annual[4].reappointment_count, 4);
        assert_eq!(report.trend.direction, TrendDirection::Increasing);
        assert_eq!(report.top_organizations[0].organization, "health board");
        assert_eq!(report.tagging.records, report.tagged.len());

        let covered: usize = report.org_year_rates.iter().map(|r| r.total_count).sum();
        assert_eq!(covered, report.tagging.keyed);
    }

    #[test]
    fn test_year_range_filter() {
        let pipeline = ReappointmentPipeline::new(AnalysisConfig {
            first_year: 2014,
            ..AnalysisConfig::default()
        })
        .unwrap();

        let report = pipeline.run(create_growing_records()).unwrap();

        assert_eq!(report.out_of_range, 2);
        assert_eq!(report.annual[0].year, 2014);
        // Member 0's first in-range appearance becomes the original
        assert_eq!(report.annual[0].reappointment_count, 0);
        assert_eq!(report.annual[1].reappointment_count, 2);
    }

    #[test]
    fn test_empty_range_fails_in_select_stage() {
        let pipeline = ReappointmentPipeline::new(AnalysisConfig {
            first_year: 2030,
            last_year: 2031,
            ..AnalysisConfig::default()
        })
        .unwrap();

        let err = pipeline.run(create_growing_records()).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Select));
        assert!(matches!(err.root(), Error::EmptyInput { .. }));
    }

    #[test]
    fn test_single_year_fails_in_trend_stage() {
        let records = sequence_records(vec![
            create_test_record("Alice", Some("Health"), 2020),
            create_test_record("Bob", Some("Health"), 2020),
        ]);

        let err = ReappointmentPipeline::new(AnalysisConfig::default())
            .unwrap()
            .run(records)
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Trend));
        assert!(matches!(err.root(), Error::InsufficientData { years: 1 }));
    }

    #[test]
    fn test_invalid_config_fails_in_configure_stage() {
        let result = ReappointmentPipeline::new(AnalysisConfig {
            confidence_level: 1.5,
            ..AnalysisConfig::default()
        });

        let err = result.err().unwrap();
        assert_eq!(err.stage(), Some(Stage::Configure));
    }

    #[test]
    fn test_custom_normalizer_changes_grouping() {
        // Case-sensitive exact matching: "ALICE" and "Alice" are different people
        let exact = |_kind: FieldKind, raw: Option<&str>| match raw.map(str::trim) {
            Some(value) if !value.is_empty() => NormalizedField::Known(value.to_string()),
            _ => NormalizedField::Unknown,
        };

        let records = sequence_records(vec![
            create_test_record("Alice", Some("Health"), 2013),
            create_test_record("ALICE", Some("Health"), 2014),
            create_test_record("Alice", Some("Health"), 2015),
        ]);

        let standard = ReappointmentPipeline::new(AnalysisConfig::default())
            .unwrap()
            .run(records.clone())
            .unwrap();
        let strict = ReappointmentPipeline::with_normalizer(AnalysisConfig::default(), Box::new(exact))
            .unwrap()
            .run(records)
            .unwrap();

        assert_eq!(standard.tagging.reappointments, 2);
        assert_eq!(strict.tagging.reappointments, 1);
    }

    #[test]
    fn test_merge_policy_flows_through() {
        let records = sequence_records(vec![
            create_test_record("Alice", Some("Health"), 2013).with_flag(true),
            create_test_record("Bob", Some("Health"), 2014),
            create_test_record("Cy", Some("Health"), 2015),
        ]);

        let merged = ReappointmentPipeline::new(AnalysisConfig {
            flag_policy: FlagPolicy::Merge,
            ..AnalysisConfig::default()
        })
        .unwrap()
        .run(records)
        .unwrap();

        assert_eq!(merged.annual[0].reappointment_count, 1);
        assert_eq!(merged.tagging.source_flags_disagreed, 1);
    }
}
