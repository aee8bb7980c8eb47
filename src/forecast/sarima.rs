//! Seasonal ARIMA with conditional-sum-of-squares estimation.
//!
//! The model is `φ(B) Φ(B^s) (1-B)^d (1-B^s)^D y_t = θ(B) Θ(B^s) ε_t` with no
//! trend term. Parameters minimise the sum of squared one-step errors of the
//! differenced series, taking differenced pre-sample values and errors as
//! zero. Gaps after the warm-up window are replaced by their one-step
//! prediction and contribute no error.

use crate::domain::model::ForecastSettings;
use crate::domain::ports::{ModelForecast, SeasonalModel};
use crate::utils::optimization::{nelder_mead, NelderMeadConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const INITIAL_COEFFICIENT: f64 = 0.1;
const CONSTRAINED_BOUND: f64 = 0.99;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("insufficient data: need at least {needed} {what}, got {got}")]
    InsufficientData {
        needed: usize,
        got: usize,
        what: &'static str,
    },

    #[error("no observed value inside the first {span} periods used to initialise differencing")]
    EmptyWarmup { span: usize },

    #[error("parameter estimation did not reach a finite objective after {iterations} iterations")]
    NonFiniteObjective { iterations: usize },

    #[error("one-step forecast is not finite")]
    NonFiniteForecast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub period: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SarimaSpec {
    pub order: Order,
    pub seasonal: SeasonalOrder,
    /// Bound AR coefficients to (-0.99, 0.99) during estimation.
    pub enforce_stationarity: bool,
    /// Bound MA coefficients to (-0.99, 0.99) during estimation.
    pub enforce_invertibility: bool,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for SarimaSpec {
    /// SARIMA(1,1,1)(1,1,0)[12] with both constraints relaxed.
    fn default() -> Self {
        Self {
            order: Order { p: 1, d: 1, q: 1 },
            seasonal: SeasonalOrder {
                p: 1,
                d: 1,
                q: 0,
                period: 12,
            },
            enforce_stationarity: false,
            enforce_invertibility: false,
            max_iterations: 2000,
            tolerance: 1e-10,
        }
    }
}

impl SarimaSpec {
    pub fn num_params(&self) -> usize {
        self.order.p + self.order.q + self.seasonal.p + self.seasonal.q
    }

    /// Raw values consumed by differencing before the first error term.
    pub fn warmup(&self) -> usize {
        self.order.d + self.seasonal.d * self.seasonal.period
    }

    pub fn min_observations(&self) -> usize {
        self.warmup() + self.num_params()
    }
}

impl From<&ForecastSettings> for SarimaSpec {
    fn from(settings: &ForecastSettings) -> Self {
        Self {
            enforce_stationarity: settings.enforce_stationarity,
            enforce_invertibility: settings.enforce_invertibility,
            max_iterations: settings.max_iterations,
            tolerance: settings.tolerance,
            ..Default::default()
        }
    }
}

/// Estimated coefficients, in the order AR, MA, seasonal AR, seasonal MA.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficients {
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub seasonal_ar: Vec<f64>,
    pub seasonal_ma: Vec<f64>,
}

impl Coefficients {
    fn unpack(spec: &SarimaSpec, params: &[f64]) -> Self {
        let (ar, rest) = params.split_at(spec.order.p);
        let (ma, rest) = rest.split_at(spec.order.q);
        let (seasonal_ar, seasonal_ma) = rest.split_at(spec.seasonal.p);
        Self {
            ar: ar.to_vec(),
            ma: ma.to_vec(),
            seasonal_ar: seasonal_ar.to_vec(),
            seasonal_ma: seasonal_ma.to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FittedSarima {
    pub coefficients: Coefficients,
    pub sigma2: f64,
    pub css: f64,
    pub iterations: usize,
    pub converged: bool,
    pub warnings: Vec<String>,
    next: f64,
}

impl FittedSarima {
    /// Point forecast for the period after the training input.
    pub fn forecast_next(&self) -> f64 {
        self.next
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sarima {
    pub spec: SarimaSpec,
}

/// Lag polynomials in `1 + c_1 B + c_2 B^2 + ...` form.
struct Polynomials {
    ar: Vec<f64>,
    ma: Vec<f64>,
    diff: Vec<f64>,
}

struct FilterOutput {
    css: f64,
    terms: usize,
    next: f64,
}

impl Sarima {
    pub fn new(spec: SarimaSpec) -> Self {
        Self { spec }
    }

    pub fn fit(&self, training: &[Option<f64>]) -> Result<FittedSarima, ModelError> {
        let spec = &self.spec;
        let warmup = spec.warmup();
        let k = spec.num_params();

        if training.len() < spec.min_observations() {
            return Err(ModelError::InsufficientData {
                needed: spec.min_observations(),
                got: training.len(),
                what: "periods",
            });
        }

        let observed = training[warmup..].iter().filter(|v| v.is_some()).count();
        if observed < k.max(1) {
            return Err(ModelError::InsufficientData {
                needed: k.max(1),
                got: observed,
                what: "observations after differencing",
            });
        }

        let start = fill_warmup(&training[..warmup]).ok_or(ModelError::EmptyWarmup { span: warmup })?;

        let initial = vec![INITIAL_COEFFICIENT; k];
        let bounds = self.bounds();
        let config = NelderMeadConfig {
            max_iter: spec.max_iterations,
            tolerance: spec.tolerance,
            ..Default::default()
        };

        let result = nelder_mead(
            |params| self.filter(training, &start, params).css,
            &initial,
            bounds.as_deref(),
            &config,
        );

        if !result.value.is_finite() {
            return Err(ModelError::NonFiniteObjective {
                iterations: result.iterations,
            });
        }

        let output = self.filter(training, &start, &result.point);
        if !output.next.is_finite() {
            return Err(ModelError::NonFiniteForecast);
        }

        let coefficients = Coefficients::unpack(spec, &result.point);
        let mut warnings = Vec::new();
        if !result.converged {
            warnings.push(format!(
                "parameter estimation stopped after {} iterations without converging",
                result.iterations
            ));
        }
        if !spec.enforce_stationarity
            && outside_unit_bound(&[&coefficients.ar, &coefficients.seasonal_ar])
        {
            warnings.push("estimated autoregressive parameters may be non-stationary".to_string());
        }
        if !spec.enforce_invertibility
            && outside_unit_bound(&[&coefficients.ma, &coefficients.seasonal_ma])
        {
            warnings.push("estimated moving-average parameters may be non-invertible".to_string());
        }

        Ok(FittedSarima {
            coefficients,
            sigma2: output.css / output.terms as f64,
            css: output.css,
            iterations: result.iterations,
            converged: result.converged,
            warnings,
            next: output.next,
        })
    }

    fn bounds(&self) -> Option<Vec<(f64, f64)>> {
        let spec = &self.spec;
        if !spec.enforce_stationarity && !spec.enforce_invertibility {
            return None;
        }

        let bound = |enforce: bool, count: usize| {
            let range = if enforce {
                (-CONSTRAINED_BOUND, CONSTRAINED_BOUND)
            } else {
                (f64::NEG_INFINITY, f64::INFINITY)
            };
            std::iter::repeat(range).take(count)
        };

        Some(
            bound(spec.enforce_stationarity, spec.order.p)
                .chain(bound(spec.enforce_invertibility, spec.order.q))
                .chain(bound(spec.enforce_stationarity, spec.seasonal.p))
                .chain(bound(spec.enforce_invertibility, spec.seasonal.q))
                .collect(),
        )
    }

    fn polynomials(&self, params: &[f64]) -> Polynomials {
        let spec = &self.spec;
        let c = Coefficients::unpack(spec, params);
        let s = spec.seasonal.period;

        let ar = poly_mul(
            &lag_poly(&c.ar, 1, -1.0),
            &lag_poly(&c.seasonal_ar, s, -1.0),
        );
        let ma = poly_mul(&lag_poly(&c.ma, 1, 1.0), &lag_poly(&c.seasonal_ma, s, 1.0));

        let mut diff = vec![1.0];
        for _ in 0..spec.order.d {
            diff = poly_mul(&diff, &lag_poly(&[1.0], 1, -1.0));
        }
        for _ in 0..spec.seasonal.d {
            diff = poly_mul(&diff, &lag_poly(&[1.0], s, -1.0));
        }

        Polynomials { ar, ma, diff }
    }

    /// Run the one-step recursion over `training` and predict the next value.
    fn filter(&self, training: &[Option<f64>], start: &[f64], params: &[f64]) -> FilterOutput {
        let poly = self.polynomials(params);
        let warmup = start.len();
        let n = training.len();

        let mut y = Vec::with_capacity(n + 1);
        y.extend_from_slice(start);
        let mut w = vec![0.0; warmup];
        let mut e = vec![0.0; warmup];
        let mut css = 0.0;
        let mut terms = 0;

        for t in warmup..=n {
            // 差分後序列的一步預測
            let mut w_hat = 0.0;
            for (k, coef) in poly.ar.iter().enumerate().skip(1) {
                if *coef != 0.0 && k <= t {
                    w_hat -= coef * w[t - k];
                }
            }
            for (k, coef) in poly.ma.iter().enumerate().skip(1) {
                if *coef != 0.0 && k <= t {
                    w_hat += coef * e[t - k];
                }
            }

            let integrated: f64 = poly
                .diff
                .iter()
                .enumerate()
                .skip(1)
                .map(|(k, coef)| -coef * y[t - k])
                .sum();

            if t == n {
                return FilterOutput {
                    css,
                    terms,
                    next: w_hat + integrated,
                };
            }

            match training[t] {
                Some(observed) => {
                    let w_t = observed - integrated;
                    let error = w_t - w_hat;
                    css += error * error;
                    terms += 1;
                    y.push(observed);
                    w.push(w_t);
                    e.push(error);
                }
                None => {
                    y.push(w_hat + integrated);
                    w.push(w_hat);
                    e.push(0.0);
                }
            }
        }

        unreachable!("filter loop returns at t == n")
    }
}

impl SeasonalModel for Sarima {
    fn forecast_next(&self, training: &[Option<f64>]) -> Result<ModelForecast, ModelError> {
        let fitted = self.fit(training)?;
        Ok(ModelForecast {
            value: fitted.forecast_next(),
            warnings: fitted.warnings,
        })
    }
}

/// `1 + sign * Σ coef_i B^(i * step)`.
fn lag_poly(coefficients: &[f64], step: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coefficients.len() * step + 1];
    poly[0] = 1.0;
    for (i, c) in coefficients.iter().enumerate() {
        poly[(i + 1) * step] = sign * c;
    }
    poly
}

fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Flags a factor whose absolute coefficients sum to 1 or more. Below that
/// every root lies outside the unit circle; at or above it the roots are not
/// examined further.
fn outside_unit_bound(factors: &[&Vec<f64>]) -> bool {
    factors
        .iter()
        .any(|f| !f.is_empty() && f.iter().map(|c| c.abs()).sum::<f64>() >= 1.0)
}

/// Fill gaps in the warm-up window from the nearest observed neighbour.
fn fill_warmup(values: &[Option<f64>]) -> Option<Vec<f64>> {
    if values.is_empty() {
        return Some(vec![]);
    }
    let first = values.iter().flatten().next().copied()?;

    let mut last = first;
    Some(
        values
            .iter()
            .map(|v| {
                if let Some(x) = v {
                    last = *x;
                }
                last
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn seasonal_pattern(t: usize) -> f64 {
        50.0 + 10.0 * (2.0 * std::f64::consts::PI * t as f64 / 12.0).sin()
    }

    fn observed(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    /// Deterministic noise in [-0.5, 0.5).
    fn noise(n: usize) -> Vec<f64> {
        let mut state: u64 = 7;
        (0..n)
            .map(|_| {
                state = (state * 1_103_515_245 + 12_345) % (1 << 31);
                state as f64 / (1u64 << 31) as f64 - 0.5
            })
            .collect()
    }

    #[test]
    fn test_default_spec_matches_fixed_orders() {
        let spec = SarimaSpec::default();

        assert_eq!(spec.order, Order { p: 1, d: 1, q: 1 });
        assert_eq!(
            spec.seasonal,
            SeasonalOrder {
                p: 1,
                d: 1,
                q: 0,
                period: 12
            }
        );
        assert!(!spec.enforce_stationarity);
        assert!(!spec.enforce_invertibility);
        assert_eq!(spec.warmup(), 13);
        assert_eq!(spec.num_params(), 3);
        assert_eq!(spec.min_observations(), 16);
    }

    #[test]
    fn test_polynomial_expansion() {
        let model = Sarima::default();
        let poly = model.polynomials(&[0.5, 0.3, 0.2]);

        // (1 - 0.5B)(1 - 0.2B^12)
        assert_eq!(poly.ar.len(), 14);
        assert_relative_eq!(poly.ar[1], -0.5);
        assert_relative_eq!(poly.ar[12], -0.2);
        assert_relative_eq!(poly.ar[13], 0.1);
        // (1 + 0.3B)
        assert_eq!(poly.ma, vec![1.0, 0.3]);
        // (1 - B)(1 - B^12)
        assert_eq!(poly.diff[0], 1.0);
        assert_eq!(poly.diff[1], -1.0);
        assert_eq!(poly.diff[12], -1.0);
        assert_eq!(poly.diff[13], 1.0);
    }

    #[test]
    fn test_too_short_is_insufficient_data() {
        let values: Vec<f64> = (0..15).map(|t| t as f64).collect();

        let err = Sarima::default().fit(&observed(&values)).unwrap_err();
        assert_eq!(
            err,
            ModelError::InsufficientData {
                needed: 16,
                got: 15,
                what: "periods"
            }
        );
    }

    #[test]
    fn test_gaps_after_warmup_count_against_minimum() {
        let mut values: Vec<Option<f64>> = (0..18).map(|t| Some(t as f64)).collect();
        for v in values.iter_mut().skip(14) {
            *v = None;
        }

        assert!(matches!(
            Sarima::default().fit(&values),
            Err(ModelError::InsufficientData { got: 1, .. })
        ));
    }

    #[test]
    fn test_linear_trend_continues() {
        let values: Vec<f64> = (0..24).map(|t| 5.0 + 2.0 * t as f64).collect();

        let fitted = Sarima::default().fit(&observed(&values)).unwrap();

        assert!(fitted.converged);
        assert_relative_eq!(fitted.forecast_next(), 53.0, epsilon = 1e-9);
        assert_relative_eq!(fitted.css, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_repeating_season_is_reproduced() {
        let values: Vec<f64> = (0..36).map(seasonal_pattern).collect();

        let fitted = Sarima::default().fit(&observed(&values)).unwrap();

        assert_relative_eq!(fitted.forecast_next(), seasonal_pattern(36), epsilon = 1e-9);
    }

    #[test]
    fn test_gap_is_imputed_from_model() {
        let mut values: Vec<Option<f64>> = (0..36).map(|t| Some(seasonal_pattern(t))).collect();
        values[20] = None;
        values[33] = None;

        let fitted = Sarima::default().fit(&values).unwrap();

        assert_relative_eq!(fitted.forecast_next(), seasonal_pattern(36), epsilon = 1e-9);
    }

    #[test]
    fn test_gap_inside_warmup_is_filled() {
        let mut values: Vec<Option<f64>> = (0..36).map(|t| Some(seasonal_pattern(t))).collect();
        values[0] = None;
        values[5] = None;

        let fitted = Sarima::default().fit(&values).unwrap();
        assert!(fitted.forecast_next().is_finite());
    }

    #[test]
    fn test_empty_warmup_is_an_error() {
        let mut values: Vec<Option<f64>> = vec![None; 13];
        values.extend((0..10).map(|t| Some(t as f64)));

        assert_eq!(
            Sarima::default().fit(&values).unwrap_err(),
            ModelError::EmptyWarmup { span: 13 }
        );
    }

    #[test]
    fn test_noisy_seasonal_trend_forecast_is_reasonable() {
        let noise = noise(48);
        let values: Vec<f64> = (0..48)
            .map(|t| seasonal_pattern(t) + 0.5 * t as f64 + 2.0 * noise[t])
            .collect();

        let fitted = Sarima::default().fit(&observed(&values)).unwrap();
        let expected = seasonal_pattern(48) + 0.5 * 48.0;

        assert!(fitted.sigma2.is_finite() && fitted.sigma2 > 0.0);
        assert!(
            (fitted.forecast_next() - expected).abs() < 3.0,
            "forecast {} expected near {}",
            fitted.forecast_next(),
            expected
        );
    }

    #[test]
    fn test_enforced_constraints_bound_coefficients() {
        let noise = noise(48);
        let values: Vec<f64> = (0..40)
            .map(|t| seasonal_pattern(t) + 6.0 * noise[t])
            .collect();
        let spec = SarimaSpec {
            enforce_stationarity: true,
            enforce_invertibility: true,
            ..Default::default()
        };

        let fitted = Sarima::new(spec).fit(&observed(&values)).unwrap();

        let c = &fitted.coefficients;
        for coef in c.ar.iter().chain(&c.ma).chain(&c.seasonal_ar) {
            assert!(coef.abs() <= CONSTRAINED_BOUND, "coefficient {}", coef);
        }
        assert!(fitted.warnings.iter().all(|w| !w.contains("non-stationary")));
    }

    #[test]
    fn test_iteration_limit_is_a_warning() {
        let noise = noise(48);
        let values: Vec<f64> = (0..40)
            .map(|t| seasonal_pattern(t) + 6.0 * noise[t])
            .collect();
        let spec = SarimaSpec {
            max_iterations: 2,
            ..Default::default()
        };

        let forecast = Sarima::new(spec).forecast_next(&observed(&values)).unwrap();

        assert!(forecast.value.is_finite());
        assert!(forecast
            .warnings
            .iter()
            .any(|w| w.contains("without converging")));
    }

    #[test]
    fn test_fill_warmup() {
        assert_eq!(
            fill_warmup(&[None, Some(2.0), None, Some(4.0)]),
            Some(vec![2.0, 2.0, 2.0, 4.0])
        );
        assert_eq!(fill_warmup(&[None, None]), None);
    }
}
