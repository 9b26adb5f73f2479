// 📊 Aggregator - appointment counts per organization-year and per year
// Only observed combinations are emitted; there is no zero-filled grid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::tagger::TaggedRecord;

/// Which records count toward the government-wide annual totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AnnualScope {
    /// Every record of the year, including ones excluded from grouping
    #[default]
    AllRecords,
    /// Only records with a complete identity key (reconciles with org-year totals)
    KeyedOnly,
}

impl AnnualScope {
    pub fn name(&self) -> &str {
        match self {
            AnnualScope::AllRecords => "all_records",
            AnnualScope::KeyedOnly => "keyed_only",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgYearAggregate {
    /// Normalized organization key
    pub organization: String,
    /// First raw spelling seen for the organization
    pub display_name: String,
    pub year: i32,
    pub total_count: usize,
    pub reappointment_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearTotals {
    pub year: i32,
    pub total_count: usize,
    pub reappointment_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregates {
    /// Sorted by year, then organization
    pub org_years: Vec<OrgYearAggregate>,
    /// Sorted by year
    pub annual: Vec<YearTotals>,
}

/// Reject a counts row where reappointments exceed appointments
pub fn check_counts(scope: &str, total: usize, reappointments: usize) -> Result<()> {
    if reappointments > total {
        return Err(Error::InvariantViolation {
            scope: scope.to_string(),
            total,
            reappointments,
        });
    }
    Ok(())
}

pub struct Aggregator {
    scope: AnnualScope,
}

impl Aggregator {
    pub fn new(scope: AnnualScope) -> Self {
        Aggregator { scope }
    }

    pub fn aggregate(&self, tagged: &[TaggedRecord]) -> Result<Aggregates> {
        // (year, organization) -> (display name, total, reappointments)
        let mut org_years: BTreeMap<(i32, String), (String, usize, usize)> = BTreeMap::new();
        let mut annual: BTreeMap<i32, (usize, usize)> = BTreeMap::new();

        for t in tagged {
            let hit = usize::from(t.reappointed);

            if let Some(key) = &t.key {
                let entry = org_years
                    .entry((t.record.year, key.organization.clone()))
                    .or_insert_with(|| (display_name(t), 0, 0));
                entry.1 += 1;
                entry.2 += hit;
            }

            if t.is_keyed() || self.scope == AnnualScope::AllRecords {
                let entry = annual.entry(t.record.year).or_insert((0, 0));
                entry.0 += 1;
                entry.1 += hit;
            }
        }

        let org_years: Vec<OrgYearAggregate> = org_years
            .into_iter()
            .map(|((year, organization), (display_name, total, reappointments))| {
                OrgYearAggregate {
                    organization,
                    display_name,
                    year,
                    total_count: total,
                    reappointment_count: reappointments,
                }
            })
            .collect();

        let annual: Vec<YearTotals> = annual
            .into_iter()
            .map(|(year, (total, reappointments))| YearTotals {
                year,
                total_count: total,
                reappointment_count: reappointments,
            })
            .collect();

        for row in &org_years {
            check_counts(
                &format!("{}/{}", row.organization, row.year),
                row.total_count,
                row.reappointment_count,
            )?;
        }
        for row in &annual {
            check_counts(&format!("year {}", row.year), row.total_count, row.reappointment_count)?;
        }

        tracing::info!(
            scope = self.scope.name(),
            org_year_rows = org_years.len(),
            years = annual.len(),
            "aggregated appointment counts"
        );

        Ok(Aggregates { org_years, annual })
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(AnnualScope::default())
    }
}

fn display_name(t: &TaggedRecord) -> String {
    t.record
        .organization
        .as_deref()
        .map(|raw| raw.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

// ============================================================================
// TESTS
// ============================================================================
