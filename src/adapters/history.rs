//! Sales history reader.
//!
//! Wide files carry identifier columns followed by one column per month
//! (`Warehouse id,Region,SKU id,Jan-20,Feb-20,...`); long files carry one row
//! per (warehouse, product, month). Both are reshaped to [`LongRecord`]s.

use crate::adapters::{column_index, reader};
use crate::domain::model::{ColumnSpec, History, HistoryLayout, LongRecord, SeriesKey};
use crate::utils::error::{ForecastError, Result};
use chrono::NaiveDate;
use csv::StringRecord;

pub fn parse_history(data: &[u8], layout: HistoryLayout, columns: &ColumnSpec) -> Result<History> {
    let records = match layout {
        HistoryLayout::Wide => parse_wide(data, columns)?,
        HistoryLayout::Long => parse_long(data, columns)?,
    };
    tracing::debug!("Parsed {} monthly history records", records.len());

    History::from_records(records)
}

pub fn parse_wide(data: &[u8], columns: &ColumnSpec) -> Result<Vec<LongRecord>> {
    let mut reader = reader(data);
    let headers = reader.headers()?.clone();

    let warehouse = required_column(&headers, &columns.warehouse)?;
    let product = required_column(&headers, &columns.product)?;

    let mut months = Vec::new();
    for (index, header) in headers.iter().enumerate() {
        let is_identifier = header == columns.warehouse
            || header == columns.product
            || columns.extra_ids.iter().any(|id| id == header);
        if is_identifier {
            continue;
        }
        let month = parse_month(header, &columns.month_format).ok_or_else(|| {
            ForecastError::MalformedHistoryError {
                row: 1,
                message: format!(
                    "column '{}' is neither an identifier nor a month in format '{}'",
                    header, columns.month_format
                ),
            }
        })?;
        months.push((index, month));
    }

    if months.is_empty() {
        return Err(ForecastError::MalformedHistoryError {
            row: 1,
            message: "no month columns found".to_string(),
        });
    }

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let row = result?;
        let key = row_key(&row, warehouse, product, line)?;

        for &(index, month) in &months {
            records.push(LongRecord {
                key: key.clone(),
                month,
                value: parse_value(row.get(index).unwrap_or(""), line)?,
            });
        }
    }

    Ok(records)
}

pub fn parse_long(data: &[u8], columns: &ColumnSpec) -> Result<Vec<LongRecord>> {
    let mut reader = reader(data);
    let headers = reader.headers()?.clone();

    let warehouse = required_column(&headers, &columns.warehouse)?;
    let product = required_column(&headers, &columns.product)?;
    let month_column = required_column(&headers, &columns.month)?;
    let value_column = required_column(&headers, &columns.value)?;

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let row = result?;
        let key = row_key(&row, warehouse, product, line)?;

        let raw_month = row.get(month_column).unwrap_or("");
        let month = parse_month(raw_month, &columns.month_format).ok_or_else(|| {
            ForecastError::MalformedHistoryError {
                row: line,
                message: format!(
                    "'{}' is not a month in format '{}', YYYY-MM or YYYY-MM-DD",
                    raw_month, columns.month_format
                ),
            }
        })?;

        records.push(LongRecord {
            key,
            month,
            value: parse_value(row.get(value_column).unwrap_or(""), line)?,
        });
    }

    Ok(records)
}

/// Parse a month label such as `Jan-20` (with `%b-%y`), an ISO date or an
/// ISO month (`2021-06`); the result is the first day of that month.
pub fn parse_month(raw: &str, format: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(&format!("01-{}", raw), &format!("%d-{}", format))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d"))
        .ok()
        .map(crate::domain::model::month_start)
}

/// Blank cells are gaps; anything else must be a finite, non-negative number.
fn parse_value(raw: &str, line: usize) -> Result<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let value: f64 = raw
        .parse()
        .map_err(|_| ForecastError::MalformedHistoryError {
            row: line,
            message: format!("sales value '{}' is not a number", raw),
        })?;

    if !value.is_finite() || value < 0.0 {
        return Err(ForecastError::MalformedHistoryError {
            row: line,
            message: format!("sales value '{}' must be a non-negative number", raw),
        });
    }

    Ok(Some(value))
}

fn required_column(headers: &StringRecord, name: &str) -> Result<usize> {
    column_index(headers, name).ok_or_else(|| ForecastError::MalformedHistoryError {
        row: 1,
        message: format!("missing column '{}'", name),
    })
}

fn row_key(row: &StringRecord, warehouse: usize, product: usize, line: usize) -> Result<SeriesKey> {
    let warehouse = row.get(warehouse).unwrap_or("");
    let product = row.get(product).unwrap_or("");
    if warehouse.is_empty() || product.is_empty() {
        return Err(ForecastError::MalformedHistoryError {
            row: line,
            message: "warehouse and product identifiers must not be blank".to_string(),
        });
    }
    Ok(SeriesKey::new(warehouse, product))
}
