// 📈 Rate Calculator - reappointment rates and top-organization reporting

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::aggregate::{check_counts, Aggregates, OrgYearAggregate, YearTotals};
use crate::error::{Error, Result};

// ============================================================================
// RATE ROWS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgYearRate {
    pub organization: String,
    pub display_name: String,
    pub year: i32,
    pub total_count: usize,
    pub reappointment_count: usize,
    pub rate: f64,
}

/// Government-wide counts for one year with the reappointment proportion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualAggregate {
    pub year: i32,
    pub total_count: usize,
    pub reappointment_count: usize,
    pub proportion: f64,
}

/// Organization with the highest rate in one year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearLeader {
    pub year: i32,
    pub organization: String,
    pub display_name: String,
    pub total_count: usize,
    pub reappointment_count: usize,
    pub rate: f64,
}

/// Organization totals pooled over every year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRanking {
    pub rank: usize,
    pub organization: String,
    pub display_name: String,
    pub total_count: usize,
    pub reappointment_count: usize,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateTables {
    pub org_years: Vec<OrgYearRate>,
    pub annual: Vec<AnnualAggregate>,
    pub year_leaders: Vec<YearLeader>,
    pub top_organizations: Vec<OrganizationRanking>,
}

/// reappointments / total, undefined (an error) for an empty row
pub fn rate(scope: &str, total: usize, reappointments: usize) -> Result<f64> {
    if total == 0 {
        return Err(Error::InvariantViolation {
            scope: scope.to_string(),
            total,
            reappointments,
        });
    }
    check_counts(scope, total, reappointments)?;
    Ok(reappointments as f64 / total as f64)
}

// ============================================================================
// RATE CALCULATOR
// ============================================================================

pub struct RateCalculator {
    /// Minimum appointments for an organization to be ranked
    pub min_appointments: usize,
    /// Length of the overall ranking
    pub top_n: usize,
}

impl RateCalculator {
    pub fn new(min_appointments: usize, top_n: usize) -> Self {
        RateCalculator {
            min_appointments,
            top_n,
        }
    }

    pub fn calculate(&self, aggregates: &Aggregates) -> Result<RateTables> {
        let org_years = aggregates
            .org_years
            .iter()
            .map(org_year_rate)
            .collect::<Result<Vec<_>>>()?;

        let annual = aggregates
            .annual
            .iter()
            .map(annual_proportion)
            .collect::<Result<Vec<_>>>()?;

        let year_leaders = self.year_leaders(&org_years);
        let top_organizations = self.rank_organizations(&aggregates.org_years)?;

        tracing::info!(
            org_year_rates = org_years.len(),
            years = annual.len(),
            ranked = top_organizations.len(),
            "computed reappointment rates"
        );

        Ok(RateTables {
            org_years,
            annual,
            year_leaders,
            top_organizations,
        })
    }

    /// Highest-rate organization per year among those meeting the threshold
    fn year_leaders(&self, rows: &[OrgYearRate]) -> Vec<YearLeader> {
        let mut best: BTreeMap<i32, &OrgYearRate> = BTreeMap::new();

        for row in rows.iter().filter(|r| r.total_count >= self.min_appointments) {
            let replace = best
                .get(&row.year)
                .map_or(true, |current| outranks(row, current));
            if replace {
                best.insert(row.year, row);
            }
        }

        best.into_values()
            .map(|row| YearLeader {
                year: row.year,
                organization: row.organization.clone(),
                display_name: row.display_name.clone(),
                total_count: row.total_count,
                reappointment_count: row.reappointment_count,
                rate: row.rate,
            })
            .collect()
    }

    /// Organizations by total reappointments across all years
    fn rank_organizations(&self, rows: &[OrgYearAggregate]) -> Result<Vec<OrganizationRanking>> {
        let mut pooled: BTreeMap<&str, (&str, usize, usize)> = BTreeMap::new();
        for row in rows {
            let entry = pooled
                .entry(row.organization.as_str())
                .or_insert((row.display_name.as_str(), 0, 0));
            entry.1 += row.total_count;
            entry.2 += row.reappointment_count;
        }

        let mut ranked = Vec::new();
        for (organization, (display_name, total, reappointments)) in pooled {
            if total < self.min_appointments {
                continue;
            }
            ranked.push(OrganizationRanking {
                rank: 0,
                organization: organization.to_string(),
                display_name: display_name.to_string(),
                total_count: total,
                reappointment_count: reappointments,
                rate: rate(organization, total, reappointments)?,
            });
        }

        ranked.sort_by(|a, b| {
            b.reappointment_count
                .cmp(&a.reappointment_count)
                .then_with(|| b.rate.partial_cmp(&a.rate).unwrap_or(Ordering::Equal))
                .then_with(|| a.organization.cmp(&b.organization))
        });
        ranked.truncate(self.top_n);
        for (i, row) in ranked.iter_mut().enumerate() {
            row.rank = i + 1;
        }

        Ok(ranked)
    }
}

impl Default for RateCalculator {
    fn default() -> Self {
        Self::new(5, 10)
    }
}

fn org_year_rate(row: &OrgYearAggregate) -> Result<OrgYearRate> {
    let scope = format!("{}/{}", row.organization, row.year);
    Ok(OrgYearRate {
        organization: row.organization.clone(),
        display_name: row.display_name.clone(),
        year: row.year,
        total_count: row.total_count,
        reappointment_count: row.reappointment_count,
        rate: rate(&scope, row.total_count, row.reappointment_count)?,
    })
}

fn annual_proportion(row: &YearTotals) -> Result<AnnualAggregate> {
    Ok(AnnualAggregate {
        year: row.year,
        total_count: row.total_count,
        reappointment_count: row.reappointment_count,
        proportion: rate(&format!("year {}", row.year), row.total_count, row.reappointment_count)?,
    })
}

/// Rate first, then more reappointments, then name ascending
fn outranks(candidate: &OrgYearRate, current: &OrgYearRate) -> bool {
    match candidate.rate.partial_cmp(&current.rate).unwrap_or(Ordering::Equal) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => match candidate.reappointment_count.cmp(&current.reappointment_count) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => candidate.organization < current.organization,
        },
    }
}

// ============================================================================
// TESTS
// ============================================================================
