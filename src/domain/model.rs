use crate::utils::error::{ForecastError, Result};
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One time series: a (warehouse, product) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub warehouse: String,
    pub product: String,
}

impl SeriesKey {
    pub fn new(warehouse: impl Into<String>, product: impl Into<String>) -> Self {
        Self {
            warehouse: warehouse.into(),
            product: product.into(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.warehouse, self.product)
    }
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn next_month(month: NaiveDate) -> NaiveDate {
    month_start(month)
        .checked_add_months(Months::new(1))
        .unwrap_or(NaiveDate::MAX)
}

fn month_ordinal(month: NaiveDate) -> i64 {
    month.year() as i64 * 12 + month.month0() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub month: NaiveDate,
    pub value: f64,
}

/// One row of long-format history. `value` is `None` for a blank cell.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRecord {
    pub key: SeriesKey,
    pub month: NaiveDate,
    pub value: Option<f64>,
}

/// Monthly values from the first to the last observed month; gaps are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    start: NaiveDate,
    values: Vec<Option<f64>>,
}

impl Series {
    /// Resample `points` to strict monthly frequency.
    pub fn from_points(key: &SeriesKey, mut points: Vec<TimeSeriesPoint>) -> Result<Self> {
        if points.is_empty() {
            return Err(ForecastError::EmptySeriesError {
                warehouse: key.warehouse.clone(),
                product: key.product.clone(),
            });
        }

        points.sort_by_key(|p| p.month);
        let start = month_start(points[0].month);
        let origin = month_ordinal(start);
        let span = (month_ordinal(points[points.len() - 1].month) - origin + 1) as usize;

        let mut values = vec![None; span];
        for point in &points {
            let slot = &mut values[(month_ordinal(point.month) - origin) as usize];
            if slot.is_some() {
                return Err(ForecastError::DuplicateObservationError {
                    warehouse: key.warehouse.clone(),
                    product: key.product.clone(),
                    month: month_start(point.month).format("%Y-%m").to_string(),
                });
            }
            *slot = Some(point.value);
        }

        Ok(Self { start, values })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.start
            .checked_add_months(Months::new(self.values.len().saturating_sub(1) as u32))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn observed_values(&self) -> Vec<f64> {
        self.values.iter().flatten().copied().collect()
    }

    pub fn last_observed(&self) -> Option<f64> {
        self.values.iter().rev().flatten().next().copied()
    }

    pub fn mean(&self) -> Option<f64> {
        let observed = self.observed_values();
        if observed.is_empty() {
            None
        } else {
            Some(observed.iter().sum::<f64>() / observed.len() as f64)
        }
    }

    /// First difference; the leading undefined value is dropped and any
    /// difference that touches a gap is itself a gap.
    pub fn differenced(&self) -> Vec<Option<f64>> {
        self.values
            .windows(2)
            .map(|w| match (w[0], w[1]) {
                (Some(prev), Some(curr)) => Some(curr - prev),
                _ => None,
            })
            .collect()
    }
}

/// All series of one run.
#[derive(Debug, Clone)]
pub struct History {
    series: HashMap<SeriesKey, Series>,
    last_month: NaiveDate,
}

impl History {
    /// Group long records by key. Blank values become gaps; keys whose
    /// values are all blank get no series.
    pub fn from_records(records: Vec<LongRecord>) -> Result<Self> {
        let last_month = records
            .iter()
            .map(|r| month_start(r.month))
            .max()
            .ok_or_else(|| ForecastError::ValidationError {
                message: "history contains no monthly records".to_string(),
            })?;

        let mut grouped: HashMap<SeriesKey, Vec<TimeSeriesPoint>> = HashMap::new();
        for record in records {
            let points = grouped.entry(record.key).or_default();
            if let Some(value) = record.value {
                points.push(TimeSeriesPoint {
                    month: record.month,
                    value,
                });
            }
        }

        let mut series = HashMap::with_capacity(grouped.len());
        for (key, points) in grouped {
            if points.is_empty() {
                tracing::debug!("Series {} has no observed values", key);
                continue;
            }
            let built = Series::from_points(&key, points)?;
            series.insert(key, built);
        }

        Ok(Self { series, last_month })
    }

    pub fn from_series(series: HashMap<SeriesKey, Series>, last_month: NaiveDate) -> Self {
        Self {
            series,
            last_month: month_start(last_month),
        }
    }

    pub fn get(&self, key: &SeriesKey) -> Option<&Series> {
        self.series.get(key)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn last_month(&self) -> NaiveDate {
        self.last_month
    }

    /// The month every request in this run forecasts.
    pub fn forecast_month(&self) -> NaiveDate {
        next_month(self.last_month)
    }
}

/// The submission template: original header and rows plus each row's key.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub keys: Vec<SeriesKey>,
}

impl Template {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    Constant,
    Sarima { differenced: bool },
}

/// Result of forecasting one series.
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastOutcome {
    Success {
        value: f64,
        method: ForecastMethod,
        warnings: Vec<String>,
    },
    /// The model failed and the mean of the observed raw values was used.
    Fallback { value: f64, reason: String },
}

impl ForecastOutcome {
    pub fn value(&self) -> f64 {
        match self {
            ForecastOutcome::Success { value, .. } | ForecastOutcome::Fallback { value, .. } => {
                *value
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ForecastOutcome::Fallback { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    pub key: SeriesKey,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Fallback,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Zero-based template row.
    pub row: usize,
    pub warehouse: String,
    pub product: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub results: Vec<ForecastResult>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BatchReport {
    pub fn fallback_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Fallback)
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct ForecastInput {
    pub template: Template,
    pub history: History,
}

#[derive(Debug, Clone)]
pub struct ForecastOutput {
    pub template: Template,
    /// Header of the appended forecast column.
    pub target_column: String,
    pub report: BatchReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum HistoryLayout {
    /// Identifier columns followed by one column per month.
    #[default]
    Wide,
    /// One row per (warehouse, product, month).
    Long,
}

/// Column names used by the CSV adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSpec {
    pub warehouse: String,
    pub product: String,
    /// Further identifier columns in wide history that are not months.
    pub extra_ids: Vec<String>,
    /// Month column of long history.
    pub month: String,
    /// Sales column of long history.
    pub value: String,
    /// chrono format of wide month headers, without a day.
    pub month_format: String,
}

impl Default for ColumnSpec {
    fn default() -> Self {
        Self {
            warehouse: "Warehouse id".to_string(),
            product: "SKU id".to_string(),
            extra_ids: vec!["Region".to_string()],
            month: "Month".to_string(),
            value: "Sales".to_string(),
            month_format: "%b-%y".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSettings {
    pub alpha: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub enforce_stationarity: bool,
    pub enforce_invertibility: bool,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            max_iterations: 2000,
            tolerance: 1e-10,
            enforce_stationarity: false,
            enforce_invertibility: false,
        }
    }
}
