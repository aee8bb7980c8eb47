use crate::domain::model::{ForecastMethod, ForecastOutcome, ForecastSettings, Series, SeriesKey};
use crate::domain::ports::{SeasonalModel, StationarityCheck};
use crate::forecast::sarima::{Sarima, SarimaSpec};
use crate::forecast::stationarity::{is_constant, AdfStationarity};
use crate::utils::error::{ForecastError, Result};

/// One-step-ahead forecaster for a single series.
///
/// Constant series return their value. Otherwise the stationarity check
/// decides whether the model is trained on the raw values or on their first
/// difference; in the latter case the last raw value is added back. Any model
/// failure falls back to the mean of the raw observed values.
pub struct SeriesForecaster<M = Sarima, S = AdfStationarity> {
    model: M,
    stationarity: S,
}

impl SeriesForecaster {
    pub fn from_settings(settings: &ForecastSettings) -> Self {
        Self::new(
            Sarima::new(SarimaSpec::from(settings)),
            AdfStationarity::new(settings.alpha),
        )
    }
}

impl Default for SeriesForecaster {
    fn default() -> Self {
        Self::new(Sarima::default(), AdfStationarity::default())
    }
}

impl<M: SeasonalModel, S: StationarityCheck> SeriesForecaster<M, S> {
    pub fn new(model: M, stationarity: S) -> Self {
        Self {
            model,
            stationarity,
        }
    }

    pub fn forecast_next(&self, key: &SeriesKey, series: &Series) -> Result<ForecastOutcome> {
        let observed = series.observed_values();
        let Some(mean) = series.mean() else {
            return Err(ForecastError::EmptySeriesError {
                warehouse: key.warehouse.clone(),
                product: key.product.clone(),
            });
        };

        if is_constant(&observed) {
            tracing::debug!("{}: constant series, skipping model", key);
            return Ok(ForecastOutcome::Success {
                value: observed[0].max(0.0),
                method: ForecastMethod::Constant,
                warnings: Vec::new(),
            });
        }

        let verdict = self.stationarity.check(&observed);
        let mut warnings: Vec<String> = verdict.warning().into_iter().collect();
        let differenced = !verdict.is_stationary();
        tracing::debug!(
            "{}: {} observations, stationarity {:?}, differenced = {}",
            key,
            observed.len(),
            verdict,
            differenced
        );

        let (training, offset) = if differenced {
            (series.differenced(), series.last_observed().unwrap_or(0.0))
        } else {
            (series.values().to_vec(), 0.0)
        };

        let reason = match self.model.forecast_next(&training) {
            Ok(forecast) => {
                let value = forecast.value + offset;
                if value.is_finite() {
                    warnings.extend(forecast.warnings);
                    return Ok(ForecastOutcome::Success {
                        value: value.max(0.0),
                        method: ForecastMethod::Sarima { differenced },
                        warnings,
                    });
                }
                "model produced a non-finite forecast".to_string()
            }
            Err(e) => e.to_string(),
        };

        // 失敗時一律用原始值平均，不還原差分
        tracing::warn!(
            warehouse = %key.warehouse,
            product = %key.product,
            "Model fit failed, falling back to mean: {}",
            reason
        );
        Ok(ForecastOutcome::Fallback {
            value: mean.max(0.0),
            reason,
        })
    }
}
