// 💾 Output writers - CSV tables and the JSON analysis report
// Nothing is written unless the whole pipeline succeeded.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::pipeline::AnalysisReport;
use crate::tagger::TaggedRecord;

pub const TAGGED_FILE: &str = "tagged_appointments.csv";
pub const ORG_YEAR_FILE: &str = "org_year_rates.csv";
pub const ANNUAL_FILE: &str = "annual_proportions.csv";
pub const TOP_ORGANIZATIONS_FILE: &str = "top_organizations.csv";
pub const REPORT_FILE: &str = "analysis_report.json";

// ============================================================================
// CSV ROWS
// ============================================================================

#[derive(Debug, Serialize)]
struct TaggedRow<'a> {
    sequence: usize,
    year: i32,
    name: &'a str,
    position: &'a str,
    organization: &'a str,
    identity_id: String,
    source_file: &'a str,
    source_reappointed: Option<bool>,
    reappointed: bool,
}

impl<'a> From<&'a TaggedRecord> for TaggedRow<'a> {
    fn from(tagged: &'a TaggedRecord) -> Self {
        let record = &tagged.record;
        TaggedRow {
            sequence: record.sequence,
            year: record.year,
            name: record.person_name.as_deref().unwrap_or(""),
            position: record.position.as_deref().unwrap_or(""),
            organization: record.organization.as_deref().unwrap_or(""),
            identity_id: tagged.key.as_ref().map(|k| k.fingerprint()).unwrap_or_default(),
            source_file: &record.source_file,
            source_reappointed: tagged.source_flag(),
            reappointed: tagged.reappointed,
        }
    }
}

#[derive(Debug, Serialize)]
struct RateRow<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    rank: Option<usize>,
    organization: &'a str,
    display_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    year: Option<i32>,
    total_appointments: usize,
    reappointments: usize,
    reappointment_rate: f64,
}

#[derive(Debug, Serialize)]
struct AnnualRow {
    year: i32,
    total_appointments: usize,
    reappointments: usize,
    proportion: f64,
}

// ============================================================================
// WRITERS
// ============================================================================

fn write_rows<T, I>(path: &Path, rows: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write every output table into `dir`, returning the paths in write order
///
/// On failure every file written so far is removed again.
pub fn write_outputs(report: &AnalysisReport, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    match write_all(report, dir, &mut written) {
        Ok(()) => {
            tracing::info!(dir = %dir.display(), "wrote analysis outputs");
            Ok(written)
        }
        Err(e) => {
            for path in written.iter().filter(|p| p.is_file()) {
                if let Err(cleanup) = fs::remove_file(path) {
                    tracing::warn!(file = %path.display(), error = %cleanup, "could not remove partial output");
                }
            }
            Err(e)
        }
    }
}

/// Paths are recorded before each write so a partial file is also cleaned up
fn write_all(report: &AnalysisReport, dir: &Path, written: &mut Vec<PathBuf>) -> Result<()> {
    let tagged = dir.join(TAGGED_FILE);
    written.push(tagged.clone());
    write_rows(&tagged, report.tagged.iter().map(TaggedRow::from))?;

    let org_years = dir.join(ORG_YEAR_FILE);
    written.push(org_years.clone());
    write_rows(
        &org_years,
        report.org_year_rates.iter().map(|r| RateRow {
            rank: None,
            organization: &r.organization,
            display_name: &r.display_name,
            year: Some(r.year),
            total_appointments: r.total_count,
            reappointments: r.reappointment_count,
            reappointment_rate: r.rate,
        }),
    )?;

    let annual = dir.join(ANNUAL_FILE);
    written.push(annual.clone());
    write_rows(
        &annual,
        report.annual.iter().map(|a| AnnualRow {
            year: a.year,
            total_appointments: a.total_count,
            reappointments: a.reappointment_count,
            proportion: a.proportion,
        }),
    )?;

    let top = dir.join(TOP_ORGANIZATIONS_FILE);
    written.push(top.clone());
    write_rows(
        &top,
        report.top_organizations.iter().map(|r| RateRow {
            rank: Some(r.rank),
            organization: &r.organization,
            display_name: &r.display_name,
            year: None,
            total_appointments: r.total_count,
            reappointments: r.reappointment_count,
            reappointment_rate: r.rate,
        }),
    )?;

    let json = dir.join(REPORT_FILE);
    let content = serde_json::to_string_pretty(report)?;
    written.push(json.clone());
    fs::write(&json, content)?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
