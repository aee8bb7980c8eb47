//! Ordinary least squares for the unit-root regressions.
//!
//! Solves the normal equations through a Cholesky factorisation and reports
//! the coefficient standard errors and the Gaussian AIC.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OlsError {
    #[error("need more observations ({nobs}) than regressors ({regressors})")]
    TooFewObservations { nobs: usize, regressors: usize },

    #[error("design matrix is rank deficient (rank {rank} of {regressors})")]
    Singular { rank: usize, regressors: usize },

    #[error("regression fits the data exactly")]
    PerfectFit,
}

/// Fitted OLS regression.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub params: DVector<f64>,
    /// Standard errors of `params`.
    pub bse: DVector<f64>,
    pub ssr: f64,
    pub nobs: usize,
}

impl OlsFit {
    /// t-statistic of the coefficient in column `index`.
    pub fn t_value(&self, index: usize) -> f64 {
        self.params[index] / self.bse[index]
    }

    /// Akaike information criterion with the Gaussian log-likelihood,
    /// counting every column of the design as a parameter.
    pub fn aic(&self) -> f64 {
        let n = self.nobs as f64;
        let k = self.params.len() as f64;
        let llf = -n / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (self.ssr / n).ln() + 1.0);
        -2.0 * llf + 2.0 * k
    }
}

/// Fit `y = X b + e`.
pub fn ols(y: &DVector<f64>, x: &DMatrix<f64>) -> Result<OlsFit, OlsError> {
    let nobs = x.nrows();
    let regressors = x.ncols();

    if nobs <= regressors {
        return Err(OlsError::TooFewObservations { nobs, regressors });
    }

    let singular_values = x.clone().svd(false, false).singular_values;
    let largest = singular_values.iter().cloned().fold(0.0_f64, f64::max);
    let threshold = largest * nobs.max(regressors) as f64 * f64::EPSILON;
    let rank = singular_values.iter().filter(|&&s| s > threshold).count();
    if rank < regressors {
        return Err(OlsError::Singular { rank, regressors });
    }

    let xtx = x.transpose() * x;
    let xty = x.transpose() * y;
    let cholesky = xtx
        .cholesky()
        .ok_or(OlsError::Singular { rank, regressors })?;

    let params = cholesky.solve(&xty);
    let residuals = y - x * &params;
    let ssr = residuals.norm_squared();

    // 殘差為零時 t 值沒有定義
    let scale = y.norm_squared().max(f64::MIN_POSITIVE);
    if ssr <= scale * f64::EPSILON * nobs as f64 {
        return Err(OlsError::PerfectFit);
    }

    let sigma2 = ssr / (nobs - regressors) as f64;
    let covariance = cholesky.inverse() * sigma2;
    let bse = covariance.diagonal().map(f64::sqrt);

    Ok(OlsFit {
        params,
        bse,
        ssr,
        nobs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn design(rows: &[[f64; 2]]) -> DMatrix<f64> {
        DMatrix::from_fn(rows.len(), 2, |r, c| rows[r][c])
    }

    #[test]
    fn test_ols_recovers_line() {
        let rows: Vec<[f64; 2]> = (0..10).map(|i| [1.0, i as f64]).collect();
        let noise = [0.1, -0.1, 0.05, -0.05, 0.0, 0.1, -0.1, 0.05, -0.05, 0.0];
        let y = DVector::from_iterator(10, (0..10).map(|i| 3.0 + 2.0 * i as f64 + noise[i]));

        let fit = ols(&y, &design(&rows)).unwrap();

        assert_relative_eq!(fit.params[0], 3.0, epsilon = 0.1);
        assert_relative_eq!(fit.params[1], 2.0, epsilon = 0.02);
        assert!(fit.bse.iter().all(|se| se.is_finite() && *se > 0.0));
        assert!(fit.t_value(1) > 100.0);
        assert!(fit.aic().is_finite());
    }

    #[test]
    fn test_ols_rejects_collinear_design() {
        let rows: Vec<[f64; 2]> = (0..6).map(|_| [1.0, 2.0]).collect();
        let y = DVector::from_iterator(6, (0..6).map(|i| i as f64));

        assert!(matches!(
            ols(&y, &design(&rows)),
            Err(OlsError::Singular { .. })
        ));
    }

    #[test]
    fn test_ols_rejects_exact_fit() {
        let rows: Vec<[f64; 2]> = (0..6).map(|i| [1.0, i as f64]).collect();
        let y = DVector::from_iterator(6, (0..6).map(|i| 1.0 + 0.5 * i as f64));

        assert_eq!(ols(&y, &design(&rows)).unwrap_err(), OlsError::PerfectFit);
    }

    #[test]
    fn test_ols_needs_degrees_of_freedom() {
        let rows = [[1.0, 0.0], [1.0, 1.0]];
        let y = DVector::from_vec(vec![1.0, 2.0]);

        assert_eq!(
            ols(&y, &design(&rows)).unwrap_err(),
            OlsError::TooFewObservations {
                nobs: 2,
                regressors: 2
            }
        );
    }
}
