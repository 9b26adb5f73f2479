// 📄 Appointment records - the row shape every stage consumes

use serde::{Deserialize, Serialize};

/// One appointment as supplied by a source table
///
/// Identity fields are optional because real-world sources omit them;
/// the normalizer maps a missing field to the unknown sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    /// Position in the concatenated record set (0-based ingestion order)
    pub sequence: usize,

    pub person_name: Option<String>,
    pub position: Option<String>,
    pub organization: Option<String>,

    /// Source year stamped by the ingestor
    pub year: i32,

    /// Reappointment flag as supplied by the source, if any
    pub reappointed_flag: Option<bool>,

    /// File the record came from (empty for in-memory input)
    #[serde(default)]
    pub source_file: String,
}

impl AppointmentRecord {
    pub fn new(
        sequence: usize,
        person_name: Option<&str>,
        position: Option<&str>,
        organization: Option<&str>,
        year: i32,
    ) -> Self {
        AppointmentRecord {
            sequence,
            person_name: person_name.map(str::to_string),
            position: position.map(str::to_string),
            organization: organization.map(str::to_string),
            year,
            reappointed_flag: None,
            source_file: String::new(),
        }
    }

    /// Builder pattern: add the source-supplied flag
    pub fn with_flag(mut self, flag: bool) -> Self {
        self.reappointed_flag = Some(flag);
        self
    }

    /// Builder pattern: add provenance
    pub fn with_source(mut self, source_file: &str) -> Self {
        self.source_file = source_file.to_string();
        self
    }
}

/// Build an in-memory record set, assigning ingestion sequence in order
pub fn sequence_records<I>(rows: I) -> Vec<AppointmentRecord>
where
    I: IntoIterator<Item = AppointmentRecord>,
{
    rows.into_iter()
        .enumerate()
        .map(|(i, mut record)| {
            record.sequence = i;
            record
        })
        .collect()
}
