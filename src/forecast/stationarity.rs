//! Augmented Dickey-Fuller stationarity check.
//!
//! The regression includes a constant and no trend. Lag length is picked by
//! AIC on a common sample, then refit on the largest sample available for
//! that lag. p-values come from MacKinnon's (1994) approximate surface.

use crate::domain::ports::StationarityCheck;
use crate::utils::ols::{ols, OlsError};
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

pub const DEFAULT_ALPHA: f64 = 0.05;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StationarityError {
    #[error("sample of {observations} values is too short for a unit-root regression")]
    TooShort { observations: usize },

    #[error("unit-root regression is degenerate: {0}")]
    Degenerate(#[from] OlsError),

    #[error("test statistic is not finite")]
    NonFiniteStatistic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdfResult {
    pub statistic: f64,
    pub p_value: f64,
    pub used_lag: usize,
    pub nobs: usize,
}

/// Outcome of a stationarity check.
#[derive(Debug, Clone, PartialEq)]
pub enum StationarityVerdict {
    /// Every value identical; no test was run.
    Constant,
    /// Too few values to run the regression.
    TooShort { observations: usize },
    /// The regression could not produce a statistic. A zero-residual fit
    /// has an undefined p-value and is read as a unit root.
    Degenerate { reason: String, unit_root: bool },
    Tested { result: AdfResult, alpha: f64 },
}

impl StationarityVerdict {
    /// Untestable inputs count as stationary so the raw series is modelled.
    pub fn is_stationary(&self) -> bool {
        match self {
            StationarityVerdict::Constant | StationarityVerdict::TooShort { .. } => true,
            StationarityVerdict::Degenerate { unit_root, .. } => !unit_root,
            StationarityVerdict::Tested { result, alpha } => result.p_value < *alpha,
        }
    }

    /// Diagnostic text for verdicts that did not come from a real test.
    pub fn warning(&self) -> Option<String> {
        match self {
            StationarityVerdict::TooShort { observations } => Some(format!(
                "stationarity test skipped: only {} observations; treating series as stationary",
                observations
            )),
            StationarityVerdict::Degenerate { reason, unit_root } => Some(format!(
                "stationarity test degenerate ({}); treating series as {}",
                reason,
                if *unit_root { "non-stationary" } else { "stationary" }
            )),
            _ => None,
        }
    }
}

/// ADF-based [`StationarityCheck`] at a fixed significance level.
#[derive(Debug, Clone, Copy)]
pub struct AdfStationarity {
    pub alpha: f64,
}

impl Default for AdfStationarity {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
        }
    }
}

impl AdfStationarity {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }
}

impl StationarityCheck for AdfStationarity {
    fn check(&self, values: &[f64]) -> StationarityVerdict {
        check_stationarity(values, self.alpha)
    }
}

pub fn is_constant(values: &[f64]) -> bool {
    match values.first() {
        Some(first) => values.iter().all(|v| v == first),
        None => false,
    }
}

/// Classify `values` (missing entries already removed).
pub fn check_stationarity(values: &[f64], alpha: f64) -> StationarityVerdict {
    if is_constant(values) {
        return StationarityVerdict::Constant;
    }

    match adf_test(values) {
        Ok(result) => StationarityVerdict::Tested { result, alpha },
        Err(StationarityError::TooShort { observations }) => {
            StationarityVerdict::TooShort { observations }
        }
        Err(e) => StationarityVerdict::Degenerate {
            unit_root: matches!(e, StationarityError::Degenerate(OlsError::PerfectFit)),
            reason: e.to_string(),
        },
    }
}

pub fn is_stationary(values: &[f64], alpha: f64) -> bool {
    check_stationarity(values, alpha).is_stationary()
}

/// Run the ADF regression `Δy_t = c + γ y_{t-1} + Σ δ_i Δy_{t-i}`.
pub fn adf_test(values: &[f64]) -> Result<AdfResult, StationarityError> {
    let n = values.len();
    let too_short = StationarityError::TooShort { observations: n };

    // 常數項佔一個自由度
    let cap = (n / 2) as i64 - 2;
    if n < 2 || cap < 0 {
        return Err(too_short);
    }
    let schwert = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as i64;
    let max_lag = schwert.min(cap) as usize;

    let diff: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    let mut best: Option<(usize, f64)> = None;
    for lag in 0..=max_lag {
        let (y, x) = adf_design(values, &diff, lag, max_lag);
        let Ok(fit) = ols(&y, &x) else {
            continue;
        };
        let aic = fit.aic();
        if aic.is_finite() && best.map_or(true, |(_, best_aic)| aic < best_aic) {
            best = Some((lag, aic));
        }
    }

    let used_lag = match best {
        Some((lag, _)) => lag,
        None => {
            // 每個落後階數都失敗時，用最簡單的迴歸回報原因
            let (y, x) = adf_design(values, &diff, 0, max_lag);
            return Err(ols(&y, &x).err().map(Into::into).unwrap_or(too_short));
        }
    };

    let (y, x) = adf_design(values, &diff, used_lag, used_lag);
    let fit = ols(&y, &x)?;
    let statistic = fit.t_value(1);
    if !statistic.is_finite() {
        return Err(StationarityError::NonFiniteStatistic);
    }

    Ok(AdfResult {
        statistic,
        p_value: mackinnon_p_value(statistic),
        used_lag,
        nobs: fit.nobs,
    })
}

/// Design for lag `lag` on the sample that drops the first `skip` differences.
///
/// Columns: constant, lagged level, then `lag` lagged differences.
fn adf_design(values: &[f64], diff: &[f64], lag: usize, skip: usize) -> (DVector<f64>, DMatrix<f64>) {
    let rows: Vec<usize> = (skip..diff.len()).collect();
    let y = DVector::from_iterator(rows.len(), rows.iter().map(|&t| diff[t]));
    let x = DMatrix::from_fn(rows.len(), lag + 2, |r, c| {
        let t = rows[r];
        match c {
            0 => 1.0,
            1 => values[t],
            k => diff[t - (k - 1)],
        }
    });
    (y, x)
}

const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

/// MacKinnon approximate p-value for the constant-only ADF statistic.
pub fn mackinnon_p_value(statistic: f64) -> f64 {
    if statistic.is_nan() {
        return f64::NAN;
    }
    if statistic > TAU_MAX {
        return 1.0;
    }
    if statistic < TAU_MIN {
        return 0.0;
    }

    let coefficients: &[f64] = if statistic <= TAU_STAR {
        &TAU_SMALL_P
    } else {
        &TAU_LARGE_P
    };
    let z = coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, c| acc * statistic + c);

    Normal::new(0.0, 1.0)
        .map(|normal| normal.cdf(z))
        .unwrap_or(f64::NAN)
}
