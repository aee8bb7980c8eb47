use crate::domain::model::{Diagnostic, ForecastResult, Template};
use crate::utils::error::{ForecastError, Result};

/// Write the template with the forecast column filled in.
///
/// The column is appended, or overwritten in place when the template already
/// has a column with that header.
pub fn render_submission(
    template: &Template,
    column: &str,
    results: &[ForecastResult],
) -> Result<Vec<u8>> {
    if results.len() != template.len() {
        return Err(ForecastError::ProcessingError {
            message: format!(
                "{} forecasts for {} template rows",
                results.len(),
                template.len()
            ),
        });
    }

    let existing = template.headers.iter().position(|h| h == column);
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut headers = template.headers.clone();
    if existing.is_none() {
        headers.push(column.to_string());
    }
    writer.write_record(&headers)?;

    for (row, result) in template.rows.iter().zip(results) {
        let mut record = row.clone();
        let value = result.value.to_string();
        match existing {
            Some(index) => record[index] = value,
            None => record.push(value),
        }
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|e| ForecastError::ProcessingError {
            message: format!("failed to flush submission CSV: {}", e),
        })
}

pub fn render_diagnostics(diagnostics: &[Diagnostic]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(diagnostics)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{DiagnosticKind, SeriesKey};

    fn template(headers: &[&str], rows: &[&[&str]]) -> Template {
        Template {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
            keys: rows.iter().map(|r| SeriesKey::new(r[0], r[1])).collect(),
        }
    }

    fn results(values: &[f64]) -> Vec<ForecastResult> {
        values
            .iter()
            .map(|v| ForecastResult {
                key: SeriesKey::new("W", "P"),
                value: *v,
            })
            .collect()
    }

    #[test]
    fn test_appends_forecast_column() {
        let template = template(&["Warehouse id", "SKU id"], &[&["W1", "A"], &["W1", "B"]]);

        let csv = render_submission(&template, "2021-06-01", &results(&[10.0, 53.5])).unwrap();

        assert_eq!(
            String::from_utf8(csv).unwrap(),
            "Warehouse id,SKU id,2021-06-01\nW1,A,10\nW1,B,53.5\n"
        );
    }

    #[test]
    fn test_overwrites_existing_target_column() {
        let template = template(&["Warehouse id", "SKU id", "2021-06-01"], &[&["W1", "A", ""]]);

        let csv = render_submission(&template, "2021-06-01", &results(&[4.0])).unwrap();

        assert_eq!(
            String::from_utf8(csv).unwrap(),
            "Warehouse id,SKU id,2021-06-01\nW1,A,4\n"
        );
    }

    #[test]
    fn test_row_count_mismatch_is_an_error() {
        let template = template(&["Warehouse id", "SKU id"], &[&["W1", "A"]]);

        assert!(render_submission(&template, "x", &results(&[])).is_err());
    }

    #[test]
    fn test_diagnostics_are_json() {
        let diagnostics = vec![Diagnostic {
            row: 0,
            warehouse: "W1".to_string(),
            product: "A".to_string(),
            kind: DiagnosticKind::Fallback,
            message: "insufficient data".to_string(),
        }];

        let json: serde_json::Value =
            serde_json::from_slice(&render_diagnostics(&diagnostics).unwrap()).unwrap();

        assert_eq!(json[0]["kind"], "fallback");
        assert_eq!(json[0]["warehouse"], "W1");
    }
}
