use crate::domain::model::{
    BatchReport, Diagnostic, DiagnosticKind, ForecastOutcome, ForecastResult, ForecastSettings,
    History, Series, SeriesKey,
};
use crate::domain::ports::{SeasonalModel, StationarityCheck};
use crate::forecast::forecaster::SeriesForecaster;
use crate::forecast::sarima::Sarima;
use crate::forecast::stationarity::AdfStationarity;
use crate::utils::error::{ForecastError, Result};

/// Forecasts every template row in order, one result per row.
pub struct BatchForecastRunner<M = Sarima, S = AdfStationarity> {
    forecaster: SeriesForecaster<M, S>,
}

impl BatchForecastRunner {
    pub fn from_settings(settings: &ForecastSettings) -> Self {
        Self::new(SeriesForecaster::from_settings(settings))
    }
}

impl Default for BatchForecastRunner {
    fn default() -> Self {
        Self::new(SeriesForecaster::default())
    }
}

impl<M: SeasonalModel, S: StationarityCheck> BatchForecastRunner<M, S> {
    pub fn new(forecaster: SeriesForecaster<M, S>) -> Self {
        Self { forecaster }
    }

    /// Every key is looked up before any model is fit, so a missing key
    /// fails the batch without wasted work.
    pub fn run(&self, template: &[SeriesKey], history: &History) -> Result<BatchReport> {
        let series: Vec<&Series> = template
            .iter()
            .enumerate()
            .map(|(row, key)| {
                history.get(key).ok_or_else(|| ForecastError::MissingKeyError {
                    row: row + 1,
                    warehouse: key.warehouse.clone(),
                    product: key.product.clone(),
                })
            })
            .collect::<Result<_>>()?;

        tracing::info!("Forecasting {} template rows", template.len());

        let mut report = BatchReport {
            results: Vec::with_capacity(template.len()),
            diagnostics: Vec::new(),
        };

        for (row, (key, series)) in template.iter().zip(series).enumerate() {
            let outcome = self.forecaster.forecast_next(key, series)?;
            let diagnostic = |kind, message: String| Diagnostic {
                row,
                warehouse: key.warehouse.clone(),
                product: key.product.clone(),
                kind,
                message,
            };

            match &outcome {
                ForecastOutcome::Success { warnings, .. } => report.diagnostics.extend(
                    warnings
                        .iter()
                        .map(|w| diagnostic(DiagnosticKind::Warning, w.clone())),
                ),
                ForecastOutcome::Fallback { reason, .. } => report
                    .diagnostics
                    .push(diagnostic(DiagnosticKind::Fallback, reason.clone())),
            }

            report.results.push(ForecastResult {
                key: key.clone(),
                value: outcome.value(),
            });
        }

        tracing::info!(
            "Produced {} forecasts ({} fallbacks, {} diagnostics)",
            report.results.len(),
            report.fallback_count(),
            report.diagnostics.len()
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::TimeSeriesPoint;
    use crate::domain::ports::ModelForecast;
    use crate::forecast::sarima::ModelError;
    use crate::forecast::stationarity::{AdfResult, StationarityVerdict};
    use chrono::NaiveDate;
    use std::collections::HashMap;

    /// Fails for short training input, otherwise returns the last value.
    struct LastValue;

    impl SeasonalModel for LastValue {
        fn forecast_next(
            &self,
            training: &[Option<f64>],
        ) -> std::result::Result<ModelForecast, ModelError> {
            if training.len() < 4 {
                return Err(ModelError::InsufficientData {
                    needed: 4,
                    got: training.len(),
                    what: "periods",
                });
            }
            Ok(ModelForecast {
                value: training.iter().rev().flatten().next().copied().unwrap_or(0.0),
                warnings: vec![],
            })
        }
    }

    struct AlwaysStationary;

    impl StationarityCheck for AlwaysStationary {
        fn check(&self, values: &[f64]) -> StationarityVerdict {
            StationarityVerdict::Tested {
                result: AdfResult {
                    statistic: -10.0,
                    p_value: 0.0,
                    used_lag: 0,
                    nobs: values.len(),
                },
                alpha: 0.05,
            }
        }
    }

    fn runner() -> BatchForecastRunner<LastValue, AlwaysStationary> {
        BatchForecastRunner::new(SeriesForecaster::new(LastValue, AlwaysStationary))
    }

    fn history(entries: &[(&str, &str, Vec<f64>)]) -> History {
        let series = entries
            .iter()
            .map(|(w, p, values)| {
                let key = SeriesKey::new(*w, *p);
                let points = values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| TimeSeriesPoint {
                        month: NaiveDate::from_ymd_opt(2020, i as u32 + 1, 1).unwrap(),
                        value: *v,
                    })
                    .collect();
                let series = Series::from_points(&key, points).unwrap();
                (key, series)
            })
            .collect::<HashMap<_, _>>();
        History::from_series(series, NaiveDate::from_ymd_opt(2020, 12, 1).unwrap())
    }

    #[test]
    fn test_results_follow_template_order_including_duplicates() {
        let history = history(&[
            ("W1", "A", vec![1.0, 2.0, 3.0, 4.0, 5.0]),
            ("W1", "B", vec![7.0; 6]),
            ("W2", "A", vec![9.0, 8.0, 7.0, 6.0]),
        ]);
        let template = vec![
            SeriesKey::new("W2", "A"),
            SeriesKey::new("W1", "A"),
            SeriesKey::new("W1", "B"),
            SeriesKey::new("W2", "A"),
        ];

        let report = runner().run(&template, &history).unwrap();

        let keys: Vec<&SeriesKey> = report.results.iter().map(|r| &r.key).collect();
        assert_eq!(keys, template.iter().collect::<Vec<_>>());
        let values: Vec<f64> = report.results.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![6.0, 5.0, 7.0, 6.0]);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_fallbacks_are_reported_per_row() {
        let history = history(&[("W1", "A", vec![1.0, 2.0, 6.0]), ("W1", "B", vec![7.0; 6])]);
        let template = vec![SeriesKey::new("W1", "B"), SeriesKey::new("W1", "A")];

        let report = runner().run(&template, &history).unwrap();

        assert_eq!(report.results[1].value, 3.0);
        assert_eq!(report.fallback_count(), 1);
        let diagnostic = &report.diagnostics[0];
        assert_eq!(diagnostic.row, 1);
        assert_eq!(diagnostic.product, "A");
        assert_eq!(diagnostic.kind, DiagnosticKind::Fallback);
        assert!(diagnostic.message.contains("insufficient data"));
    }

    #[test]
    fn test_missing_key_fails_with_row_and_key() {
        let history = history(&[("W1", "A", vec![1.0, 2.0, 3.0, 4.0])]);
        let template = vec![SeriesKey::new("W1", "A"), SeriesKey::new("W9", "Z")];

        let err = runner().run(&template, &history).unwrap_err();

        match err {
            ForecastError::MissingKeyError {
                row,
                warehouse,
                product,
            } => {
                assert_eq!(row, 2);
                assert_eq!(warehouse, "W9");
                assert_eq!(product, "Z");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_empty_template_yields_empty_report() {
        let history = history(&[("W1", "A", vec![1.0])]);

        let report = runner().run(&[], &history).unwrap();

        assert_eq!(report, BatchReport::default());
    }
}
