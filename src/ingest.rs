// 📥 Record Ingestor - per-year appointment tables → one record set
// Each file's year comes from its name (e.g. appointments_2013.csv) and
// stamps every row; files are concatenated in ascending year order.

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::record::AppointmentRecord;

// ============================================================================
// SOURCE TRAIT
// ============================================================================

/// One year's worth of appointment rows
pub trait RecordSource {
    /// Read the rows; `sequence` is assigned later by the ingestor
    fn load(&self) -> Result<Vec<AppointmentRecord>>;

    /// Year stamped on every row of this source
    fn year(&self) -> i32;

    /// Label for provenance and logging
    fn label(&self) -> String;
}

// ============================================================================
// COLUMN MAPPING
// ============================================================================

const NAME_COLUMNS: [&str; 4] = ["name", "person", "person_name", "appointee"];
const POSITION_COLUMNS: [&str; 3] = ["position", "title", "position_title"];
const ORGANIZATION_COLUMNS: [&str; 5] = ["org", "organization", "organisation", "department", "agency"];
const FLAG_COLUMNS: [&str; 3] = ["reappointed", "reappointment", "is_reappointed"];

/// Header positions of the columns we read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMap {
    pub name: Option<usize>,
    pub position: Option<usize>,
    pub organization: Option<usize>,
    pub reappointed: Option<usize>,
}

impl ColumnMap {
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut map = ColumnMap::default();
        for (idx, header) in headers.into_iter().enumerate() {
            let header = header.trim().trim_start_matches('\u{feff}').to_lowercase();
            let header = header.as_str();
            // First matching column wins
            if NAME_COLUMNS.contains(&header) && map.name.is_none() {
                map.name = Some(idx);
            } else if POSITION_COLUMNS.contains(&header) && map.position.is_none() {
                map.position = Some(idx);
            } else if ORGANIZATION_COLUMNS.contains(&header) && map.organization.is_none() {
                map.organization = Some(idx);
            } else if FLAG_COLUMNS.contains(&header) && map.reappointed.is_none() {
                map.reappointed = Some(idx);
            }
        }
        map
    }

    pub fn has_identity_column(&self) -> bool {
        self.name.is_some() || self.position.is_some() || self.organization.is_some()
    }
}

/// Parse a source reappointment flag; unrecognized values are absent
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "t" => Some(true),
        "false" | "no" | "n" | "0" | "f" => Some(false),
        _ => None,
    }
}

/// Year embedded in a file name: the first run of exactly four digits in 1900..=2100
pub fn detect_year(path: &Path) -> Option<i32> {
    let stem = path.file_stem()?.to_str()?;
    let chars: Vec<char> = stem.chars().collect();

    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i - start == 4 {
                let year: i32 = chars[start..i].iter().collect::<String>().parse().ok()?;
                if (1900..=2100).contains(&year) {
                    return Some(year);
                }
            }
        } else {
            i += 1;
        }
    }
    None
}

// ============================================================================
// CSV SOURCE
// ============================================================================

pub struct CsvYearFile {
    path: PathBuf,
    year: i32,
}

impl CsvYearFile {
    pub fn new(path: PathBuf, year: i32) -> Self {
        CsvYearFile { path, year }
    }

    /// Build from a path whose name carries the year
    pub fn from_path(path: &Path) -> Result<Self> {
        let year = detect_year(path).ok_or_else(|| {
            anyhow::anyhow!("Could not detect year from filename: {}", path.display())
        })?;
        Ok(CsvYearFile::new(path.to_path_buf(), year))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for CsvYearFile {
    fn load(&self) -> Result<Vec<AppointmentRecord>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open file: {}", self.path.display()))?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let label = self.label();
        let headers = reader
            .byte_headers()
            .with_context(|| format!("Failed to read CSV header in {}", label))?
            .iter()
            .map(|h| String::from_utf8_lossy(h).into_owned())
            .collect::<Vec<_>>();

        let columns = ColumnMap::from_headers(headers.iter().map(String::as_str));
        if !columns.has_identity_column() {
            anyhow::bail!(
                "No name, position or organization column in {} (headers: {})",
                label,
                headers.join(", ")
            );
        }

        let mut records = Vec::new();
        for (line_num, result) in reader.byte_records().enumerate() {
            let row = result.with_context(|| {
                format!("Failed to parse CSV line {} in {}", line_num + 2, label)
            })?;

            // Source files are not reliably UTF-8
            let cell = |idx: Option<usize>| -> Option<String> {
                let raw = row.get(idx?)?;
                let text = String::from_utf8_lossy(raw).trim().to_string();
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            };

            let flag = cell(columns.reappointed).as_deref().and_then(parse_flag);

            records.push(AppointmentRecord {
                sequence: 0,
                person_name: cell(columns.name),
                position: cell(columns.position),
                organization: cell(columns.organization),
                year: self.year,
                reappointed_flag: flag,
                source_file: label.clone(),
            });
        }

        Ok(records)
    }

    fn year(&self) -> i32 {
        self.year
    }

    fn label(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.csv")
            .to_string()
    }
}

// ============================================================================
// INGESTOR
// ============================================================================

pub struct RecordIngestor;

impl RecordIngestor {
    /// CSV files in `dir` with a year in their name, in (year, name) order
    pub fn discover(dir: &Path) -> Result<Vec<CsvYearFile>> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read input directory: {}", dir.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_csv = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("csv"))
                .unwrap_or(false);
            if !is_csv {
                continue;
            }
            match detect_year(&path) {
                Some(year) => files.push(CsvYearFile::new(path, year)),
                None => tracing::warn!(file = %path.display(), "skipping file without a year in its name"),
            }
        }

        files.sort_by(|a, b| a.year.cmp(&b.year).then_with(|| a.path.cmp(&b.path)));
        Ok(files)
    }

    /// Load sources in order and assign ingestion sequence
    pub fn ingest(sources: &[&dyn RecordSource]) -> Result<Vec<AppointmentRecord>> {
        let mut all = Vec::new();
        for source in sources {
            let records = source.load()?;
            tracing::info!(
                source = %source.label(),
                year = source.year(),
                rows = records.len(),
                "loaded appointment table"
            );
            all.extend(records);
        }

        for (i, record) in all.iter_mut().enumerate() {
            record.sequence = i;
        }
        Ok(all)
    }

    pub fn ingest_dir(dir: &Path) -> Result<Vec<AppointmentRecord>> {
        let files = Self::discover(dir)?;
        if files.is_empty() {
            anyhow::bail!("No year-stamped CSV files found in {}", dir.display());
        }
        let sources: Vec<&dyn RecordSource> = files.iter().map(|f| f as &dyn RecordSource).collect();
        Self::ingest(&sources)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_detect_year() {
        assert_eq!(detect_year(Path::new("appointments_2013.csv")), Some(2013));
        assert_eq!(detect_year(Path::new("data/2024-appointments.csv")), Some(2024));
        assert_eq!(detect_year(Path::new("batch_12_2019.csv")), Some(2019));
        assert_eq!(detect_year(Path::new("appointments_123456.csv")), None);
        assert_eq!(detect_year(Path::new("appointments.csv")), None);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("True"), Some(true));
        assert_eq!(parse_flag(" yes "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("F"), Some(false));
        assert_eq!(parse_flag(""), None);
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_column_aliases() {
        let map = ColumnMap::from_headers(["\u{feff}Name", "Title", "Organization", "Reappointed"]);
        assert_eq!(map.name, Some(0));
        assert_eq!(map.position, Some(1));
        assert_eq!(map.organization, Some(2));
        assert_eq!(map.reappointed, Some(3));

        let map = ColumnMap::from_headers(["year", "org", "notes"]);
        assert_eq!(map.organization, Some(1));
        assert!(map.name.is_none());
        assert!(map.has_identity_column());
    }

    #[test]
    fn test_csv_file_stamps_year() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "appointments_2015.csv",
            "name,position,org,year,reappointed\n\
             Alice,Director,Health,1999,true\n\
             Bob,,Finance,1999,\n",
        );

        let records = CsvYearFile::from_path(&path).unwrap().load().unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.year == 2015));
        assert_eq!(records[0].reappointed_flag, Some(true));
        assert_eq!(records[1].position, None);
        assert_eq!(records[1].reappointed_flag, None);
        assert_eq!(records[1].source_file, "appointments_2015.csv");
    }

    #[test]
    fn test_missing_columns_yield_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "appointments_2016.csv", "name,org\nAlice,Health\n");

        let records = CsvYearFile::from_path(&path).unwrap().load().unwrap();

        assert_eq!(records[0].position, None);
        assert_eq!(records[0].reappointed_flag, None);
    }

    #[test]
    fn test_file_without_identity_columns_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "appointments_2016.csv", "foo,bar\n1,2\n");
        assert!(CsvYearFile::from_path(&path).unwrap().load().is_err());
    }

    #[test]
    fn test_ingest_dir_orders_by_year_and_sequences() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "appointments_2014.csv", "name,position,org\nCarol,Chair,Arts\n");
        write_file(
            dir.path(),
            "appointments_2013.csv",
            "name,position,org\nAlice,Director,Health\nBob,Member,Finance\n",
        );
        write_file(dir.path(), "readme.csv", "name\nignored\n");
        write_file(dir.path(), "notes_2013.txt", "not a table");

        let records = RecordIngestor::ingest_dir(dir.path()).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(
            records.iter().map(|r| (r.sequence, r.year)).collect::<Vec<_>>(),
            vec![(0, 2013), (1, 2013), (2, 2014)]
        );
        assert_eq!(records[2].person_name.as_deref(), Some("Carol"));
    }

    #[test]
    fn test_ingest_dir_without_files_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RecordIngestor::ingest_dir(dir.path()).is_err());
    }
}
