// 📉 Trend Analyzer - OLS fit of the annual reappointment proportion
// Diagnostics: t-test on the slope, confidence interval, Durbin-Watson,
// Jarque-Bera residual normality, standardized-residual outliers.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::rates::AnnualAggregate;
use crate::stats::{self, NormalityTest};

/// Minimum distinct years for the regression to have degrees of freedom
pub const MIN_YEARS: usize = 3;

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    NoSignificantTrend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Autocorrelation {
    Positive,
    None,
    Negative,
}

impl Autocorrelation {
    /// Durbin-Watson rule of thumb: below 1.5 positive, above 2.5 negative
    pub fn from_durbin_watson(dw: f64) -> Self {
        if dw < 1.5 {
            Autocorrelation::Positive
        } else if dw > 2.5 {
            Autocorrelation::Negative
        } else {
            Autocorrelation::None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearResidual {
    pub year: i32,
    pub actual: f64,
    pub fitted: f64,
    pub residual: f64,
    pub standardized: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub n: usize,
    pub degrees_of_freedom: usize,
    /// Regressor is `year - base_year`
    pub base_year: i32,
    /// Change in proportion per year
    pub slope: f64,
    /// Fitted proportion at `base_year`
    pub intercept: f64,
    pub r_squared: f64,
    /// Pearson correlation of proportion with year
    pub correlation: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    /// Standard error of the slope
    pub std_error: f64,
    pub confidence_level: f64,
    pub confidence_interval: (f64, f64),
    pub durbin_watson: f64,
    pub autocorrelation: Autocorrelation,
    /// None when residuals have no spread (exact fit)
    pub residual_normality: Option<NormalityTest>,
    pub outliers: Vec<i32>,
    pub direction: TrendDirection,
    pub significant: bool,
    pub residuals: Vec<YearResidual>,
}

impl TrendResult {
    /// Fitted proportion at a calendar year
    pub fn predict(&self, year: i32) -> f64 {
        self.intercept + self.slope * f64::from(year - self.base_year)
    }

    /// Fitted change between the first and last observed years
    pub fn total_change(&self) -> f64 {
        match (self.residuals.first(), self.residuals.last()) {
            (Some(first), Some(last)) => last.fitted - first.fitted,
            _ => 0.0,
        }
    }

    pub fn summary(&self) -> String {
        let direction = match self.direction {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::NoSignificantTrend => "no significant trend",
        };
        format!(
            "Trend: {} ({:+.4} per year, p = {:.4}, R² = {:.3}, n = {}, DW = {:.2})",
            direction, self.slope, self.p_value, self.r_squared, self.n, self.durbin_watson
        )
    }
}

// ============================================================================
// ANALYZER
// ============================================================================

pub struct TrendAnalyzer {
    /// |z| above this marks a year as an outlier
    ///
    /// z is the residual over the residual standard deviation, so
    /// |z| <= sqrt(n - 2) for every year. With the default 2.5 no year can
    /// be flagged when n <= 8.
    pub outlier_z: f64,
    pub confidence_level: f64,
    /// Significance level for the direction verdict
    pub alpha: f64,
}

impl TrendAnalyzer {
    pub fn new(outlier_z: f64, confidence_level: f64, alpha: f64) -> Self {
        TrendAnalyzer {
            outlier_z,
            confidence_level,
            alpha,
        }
    }

    /// Whether `outlier_z` is reachable for a series of `n` years
    pub fn outliers_detectable(&self, n: usize) -> bool {
        n > 2 && ((n - 2) as f64).sqrt() > self.outlier_z
    }

    pub fn analyze(&self, series: &[AnnualAggregate]) -> Result<TrendResult> {
        validate_series(series)?;
        if !self.outliers_detectable(series.len()) {
            tracing::debug!(
                n = series.len(),
                outlier_z = self.outlier_z,
                "outlier threshold exceeds the largest possible standardized residual"
            );
        }

        let n = series.len();
        let df = n - 2;
        let base_year = series[0].year;

        let xs: Vec<f64> = series.iter().map(|p| f64::from(p.year - base_year)).collect();
        let ys: Vec<f64> = series.iter().map(|p| p.proportion).collect();

        let x_mean = stats::mean(&xs);
        let y_mean = stats::mean(&ys);
        let sxx: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();
        let syy: f64 = ys.iter().map(|y| (y - y_mean).powi(2)).sum();
        let sxy: f64 = xs
            .iter()
            .zip(&ys)
            .map(|(x, y)| (x - x_mean) * (y - y_mean))
            .sum();

        // Sums of squares below this are rounding noise
        let tolerance = 1e-24 * ys.iter().map(|y| y * y).sum::<f64>();
        let flat = syy <= tolerance;

        let slope = if flat { 0.0 } else { sxy / sxx };
        let intercept = y_mean - slope * x_mean;

        let fitted: Vec<f64> = xs.iter().map(|x| intercept + slope * x).collect();
        let residuals: Vec<f64> = ys.iter().zip(&fitted).map(|(y, f)| y - f).collect();
        let ss_res: f64 = residuals.iter().map(|e| e * e).sum();

        let correlation = if flat { 0.0 } else { sxy / (sxx * syy).sqrt() };
        // For simple regression corr(actual, fitted)² equals corr(x, y)²
        let r_squared = correlation * correlation;

        let exact_fit = ss_res <= tolerance;

        let mse = ss_res / df as f64;
        let (std_error, t_statistic, p_value) = if exact_fit {
            let t = if slope == 0.0 { 0.0 } else { f64::INFINITY.copysign(slope) };
            let p = if slope == 0.0 { 1.0 } else { 0.0 };
            (0.0, t, p)
        } else {
            let se = (mse / sxx).sqrt();
            let t = slope / se;
            (se, t, stats::student_t_two_sided_p(t, df as f64))
        };

        let t_critical = stats::student_t_quantile(0.5 + self.confidence_level / 2.0, df as f64);
        let margin = t_critical * std_error;
        let confidence_interval = (slope - margin, slope + margin);

        let durbin_watson = if exact_fit {
            2.0
        } else {
            let num: f64 = residuals.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
            num / ss_res
        };

        let residual_sd = mse.sqrt();
        let year_residuals: Vec<YearResidual> = series
            .iter()
            .zip(fitted.iter().zip(&residuals))
            .map(|(point, (&fit, &residual))| YearResidual {
                year: point.year,
                actual: point.proportion,
                fitted: fit,
                residual,
                standardized: if exact_fit { 0.0 } else { residual / residual_sd },
            })
            .collect();

        let outliers: Vec<i32> = year_residuals
            .iter()
            .filter(|r| r.standardized.abs() > self.outlier_z)
            .map(|r| r.year)
            .collect();

        let residual_normality = if exact_fit {
            None
        } else {
            stats::jarque_bera(&residuals)
        };

        let significant = p_value < self.alpha;
        let direction = match (significant, slope > 0.0) {
            (true, true) => TrendDirection::Increasing,
            (true, false) if slope < 0.0 => TrendDirection::Decreasing,
            _ => TrendDirection::NoSignificantTrend,
        };

        let result = TrendResult {
            n,
            degrees_of_freedom: df,
            base_year,
            slope,
            intercept,
            r_squared,
            correlation,
            t_statistic,
            p_value,
            std_error,
            confidence_level: self.confidence_level,
            confidence_interval,
            durbin_watson,
            autocorrelation: Autocorrelation::from_durbin_watson(durbin_watson),
            residual_normality,
            outliers,
            direction,
            significant,
            residuals: year_residuals,
        };

        tracing::info!("{}", result.summary());
        if !result.outliers.is_empty() {
            tracing::warn!(outliers = ?result.outliers, "years with large standardized residuals");
        }

        Ok(result)
    }
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::new(2.5, 0.95, 0.05)
    }
}

/// At least MIN_YEARS points, years strictly increasing, finite proportions
fn validate_series(series: &[AnnualAggregate]) -> Result<()> {
    let mut years: Vec<i32> = series.iter().map(|p| p.year).collect();
    years.dedup();
    if years.len() < MIN_YEARS {
        return Err(Error::InsufficientData { years: years.len() });
    }

    for pair in series.windows(2) {
        if pair[1].year <= pair[0].year {
            return Err(Error::InvalidSeries(format!(
                "years must be strictly increasing ({} follows {})",
                pair[1].year, pair[0].year
            )));
        }
    }

    if let Some(point) = series.iter().find(|p| !p.proportion.is_finite()) {
        return Err(Error::InvalidSeries(format!(
            "proportion for {} is not a finite number",
            point.year
        )));
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
