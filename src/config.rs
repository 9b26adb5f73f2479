// ⚙️ Analysis configuration - explicit parameters passed into the pipeline
// Layering: defaults → JSON file → environment → command line.

use anyhow::{Context as AnyhowContext, Result as AnyhowResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::aggregate::AnnualScope;
use crate::error::{Error, Result};
use crate::normalize::NormalizerKind;
use crate::tagger::FlagPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// First year of records included (inclusive)
    pub first_year: i32,
    /// Last year of records included (inclusive)
    pub last_year: i32,
    /// Minimum appointments for an organization to appear in top-organization reports
    pub min_appointments: usize,
    /// Length of the overall top-organization ranking
    pub top_n: usize,
    /// |standardized residual| above this flags a year as an outlier
    pub outlier_z: f64,
    pub confidence_level: f64,
    /// Significance level for the trend verdict
    pub alpha: f64,
    pub flag_policy: FlagPolicy,
    pub annual_scope: AnnualScope,
    pub normalizer: NormalizerKind,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            first_year: 2013,
            last_year: 2024,
            min_appointments: 5,
            top_n: 10,
            outlier_z: 2.5,
            confidence_level: 0.95,
            alpha: 0.05,
            flag_policy: FlagPolicy::default(),
            annual_scope: AnnualScope::default(),
            normalizer: NormalizerKind::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a JSON file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> AnyhowResult<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: AnalysisConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        Ok(config)
    }

    /// Overlay `REAPPOINT_*` environment variables
    pub fn with_env(self) -> Result<Self> {
        self.with_overrides(|name| env::var(name).ok())
    }

    /// Overlay values from any variable lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("REAPPOINT_FIRST_YEAR") {
            self.first_year = parse_var("REAPPOINT_FIRST_YEAR", &value)?;
        }
        if let Some(value) = lookup("REAPPOINT_LAST_YEAR") {
            self.last_year = parse_var("REAPPOINT_LAST_YEAR", &value)?;
        }
        if let Some(value) = lookup("REAPPOINT_MIN_APPOINTMENTS") {
            self.min_appointments = parse_var("REAPPOINT_MIN_APPOINTMENTS", &value)?;
        }
        if let Some(value) = lookup("REAPPOINT_OUTLIER_Z") {
            self.outlier_z = parse_var("REAPPOINT_OUTLIER_Z", &value)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.first_year > self.last_year {
            return Err(Error::Config(format!(
                "first_year {} is after last_year {}",
                self.first_year, self.last_year
            )));
        }
        if !(self.outlier_z.is_finite() && self.outlier_z > 0.0) {
            return Err(Error::Config(format!(
                "outlier_z must be a positive number, got {}",
                self.outlier_z
            )));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(Error::Config(format!(
                "confidence_level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(Error::Config(format!("alpha must be in (0, 1), got {}", self.alpha)));
        }
        if self.top_n == 0 {
            return Err(Error::Config("top_n must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn contains_year(&self, year: i32) -> bool {
        (self.first_year..=self.last_year).contains(&year)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} has invalid value: {:?}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.contains_year(2013));
        assert!(config.contains_year(2024));
        assert!(!config.contains_year(2025));
    }

    #[test]
    fn test_from_file_partial_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"first_year": 2015, "flag_policy": "merge", "annual_scope": "keyed_only", "normalizer": "basic"}}"#
        )
        .unwrap();

        let config = AnalysisConfig::from_file(file.path()).unwrap();

        assert_eq!(config.first_year, 2015);
        assert_eq!(config.last_year, 2024);
        assert_eq!(config.flag_policy, FlagPolicy::Merge);
        assert_eq!(config.annual_scope, AnnualScope::KeyedOnly);
        assert_eq!(config.normalizer, NormalizerKind::Basic);
    }

    #[test]
    fn test_from_file_missing() {
        let result = AnalysisConfig::from_file("/nonexistent/reappoint.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [("REAPPOINT_LAST_YEAR", "2020"), ("REAPPOINT_OUTLIER_Z", " 3.0 ")]
            .into_iter()
            .collect();

        let config = AnalysisConfig::default()
            .with_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.last_year, 2020);
        assert_eq!(config.outlier_z, 3.0);
        assert_eq!(config.first_year, 2013);
    }

    #[test]
    fn test_invalid_override_is_config_error() {
        let err = AnalysisConfig::default()
            .with_overrides(|name| (name == "REAPPOINT_MIN_APPOINTMENTS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let reversed = AnalysisConfig {
            first_year: 2024,
            last_year: 2013,
            ..AnalysisConfig::default()
        };
        assert!(reversed.validate().is_err());

        let bad_z = AnalysisConfig {
            outlier_z: 0.0,
            ..AnalysisConfig::default()
        };
        assert!(bad_z.validate().is_err());

        let bad_level = AnalysisConfig {
            confidence_level: 1.0,
            ..AnalysisConfig::default()
        };
        assert!(bad_level.validate().is_err());
    }
}
