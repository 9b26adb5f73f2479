// ⚠️ Error taxonomy for the reappointment pipeline
// Recovered conditions (missing identity fields) never reach this type;
// they are counted in the tagging summary instead.

use std::fmt;
use thiserror::Error;

use crate::normalize::FieldKind;

/// Pipeline stage that produced an error (only stages that can fail)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configure,
    Select,
    Aggregate,
    Rates,
    Trend,
}

impl Stage {
    pub fn name(&self) -> &str {
        match self {
            Stage::Configure => "configure",
            Stage::Select => "select",
            Stage::Aggregate => "aggregate",
            Stage::Rates => "rates",
            Stage::Trend => "trend",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Recovered locally: the record is excluded from identity grouping
    #[error("record {sequence} is missing identity field(s): {fields:?}")]
    MissingField {
        sequence: usize,
        fields: Vec<FieldKind>,
    },

    #[error("insufficient data for regression: {years} distinct year(s), at least 3 required")]
    InsufficientData { years: usize },

    #[error("invariant violated for {scope}: {reappointments} reappointments out of {total} appointments")]
    InvariantViolation {
        scope: String,
        total: usize,
        reappointments: usize,
    },

    #[error("invalid annual series: {0}")]
    InvalidSeries(String),

    #[error("no appointment records in year range {first_year}-{last_year}")]
    EmptyInput { first_year: i32, last_year: i32 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an error with the stage it came from (no double wrapping)
    pub fn at(self, stage: Stage) -> Self {
        match self {
            Error::Stage { .. } => self,
            other => Error::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The failing stage, if this error has been attributed to one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The underlying error without the stage wrapper
    pub fn root(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Attach a pipeline stage to a fallible result
pub trait StageExt<T> {
    fn stage(self, stage: Stage) -> Result<T>;
}

impl<T> StageExt<T> for Result<T> {
    fn stage(self, stage: Stage) -> Result<T> {
        self.map_err(|e| e.at(stage))
    }
}
