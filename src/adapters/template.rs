use crate::adapters::reader;
use crate::domain::model::{ColumnSpec, SeriesKey, Template};
use crate::utils::error::{ForecastError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use std::path::Path;

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods"];

/// Read the template at `path`, choosing the workbook reader for spreadsheet
/// extensions and the CSV reader otherwise.
pub fn read_template(path: &str, data: &[u8], columns: &ColumnSpec) -> Result<Template> {
    let is_workbook = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| WORKBOOK_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));

    if is_workbook {
        parse_workbook_template(data, columns)
    } else {
        parse_template(data, columns)
    }
}

/// Read the submission template, keeping every original column.
pub fn parse_template(data: &[u8], columns: &ColumnSpec) -> Result<Template> {
    let mut reader = reader(data);
    let headers = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        rows.push(result?.iter().map(str::to_string).collect());
    }

    build_template(headers, rows, columns)
}

/// Read the first sheet of a workbook; its first row is the header.
pub fn parse_workbook_template(data: &[u8], columns: &ColumnSpec) -> Result<Template> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ForecastError::MalformedTemplateError {
            row: 1,
            message: "workbook has no sheets".to_string(),
        })??;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<String>>());
    let headers = rows.next().ok_or_else(|| ForecastError::MalformedTemplateError {
        row: 1,
        message: "first sheet is empty".to_string(),
    })?;
    // 空白列是試算表的格式殘留
    let rows = rows
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect();

    build_template(headers, rows, columns)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{}", *value as i64)
        }
        other => other.to_string().trim().to_string(),
    }
}

fn build_template(headers: Vec<String>, rows: Vec<Vec<String>>, columns: &ColumnSpec) -> Result<Template> {
    let required = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name.trim())
            .ok_or_else(|| ForecastError::MalformedTemplateError {
                row: 1,
                message: format!("missing column '{}'", name),
            })
    };
    let warehouse = required(columns.warehouse.as_str())?;
    let product = required(columns.product.as_str())?;

    let mut keys = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let line = idx + 2;
        let cell = |index: usize| row.get(index).map(String::as_str).unwrap_or("");

        let key = SeriesKey::new(cell(warehouse), cell(product));
        if key.warehouse.is_empty() || key.product.is_empty() {
            return Err(ForecastError::MalformedTemplateError {
                row: line,
                message: "warehouse and product identifiers must not be blank".to_string(),
            });
        }
        keys.push(key);
    }

    tracing::debug!("Template has {} rows", keys.len());

    Ok(Template {
        headers,
        rows,
        keys,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_keeps_columns_and_order() {
        let data = "Warehouse id,Region,SKU id\nW2,South,B\nW1,North,A\nW2,South,B\n";

        let template = parse_template(data.as_bytes(), &ColumnSpec::default()).unwrap();

        assert_eq!(template.headers, vec!["Warehouse id", "Region", "SKU id"]);
        assert_eq!(template.rows[1], vec!["W1", "North", "A"]);
        assert_eq!(
            template.keys,
            vec![
                SeriesKey::new("W2", "B"),
                SeriesKey::new("W1", "A"),
                SeriesKey::new("W2", "B"),
            ]
        );
    }

    #[test]
    fn test_template_requires_product_column() {
        let data = "Warehouse id,Region\nW1,North\n";

        let err = parse_template(data.as_bytes(), &ColumnSpec::default()).unwrap_err();
        assert!(matches!(err, ForecastError::MalformedTemplateError { row: 1, .. }));
    }

    #[test]
    fn test_template_rejects_blank_key() {
        let data = "Warehouse id,SKU id\nW1,A\nW1,\n";

        let err = parse_template(data.as_bytes(), &ColumnSpec::default()).unwrap_err();
        assert!(matches!(err, ForecastError::MalformedTemplateError { row: 3, .. }));
    }

    #[test]
    fn test_header_only_template_is_empty() {
        let template = parse_template(b"Warehouse id,SKU id\n", &ColumnSpec::default()).unwrap();

        assert!(template.is_empty());
    }

    fn workbook(cells: &[&[&str]], numeric_product: Option<f64>) -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in cells.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                sheet.write_string(r as u32, c as u16, *value).unwrap();
            }
        }
        if let Some(product) = numeric_product {
            sheet.write_number(cells.len() as u32, 0, 7.0).unwrap();
            sheet.write_number(cells.len() as u32, 2, product).unwrap();
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_workbook_template_reads_first_sheet() {
        let data = workbook(
            &[
                &["Warehouse id", "Region", "SKU id"],
                &["W2", "South", "B"],
                &["W1", "North", "A"],
            ],
            Some(1001.0),
        );

        let template = read_template("data/Submission Format.xlsx", &data, &ColumnSpec::default()).unwrap();

        assert_eq!(template.headers, vec!["Warehouse id", "Region", "SKU id"]);
        assert_eq!(template.rows[0], vec!["W2", "South", "B"]);
        assert_eq!(
            template.keys,
            vec![
                SeriesKey::new("W2", "B"),
                SeriesKey::new("W1", "A"),
                SeriesKey::new("7", "1001"),
            ]
        );
    }

    #[test]
    fn test_workbook_template_requires_key_columns() {
        let data = workbook(&[&["Warehouse id", "Region"], &["W1", "North"]], None);

        let err = read_template("template.XLSX", &data, &ColumnSpec::default()).unwrap_err();
        assert!(matches!(err, ForecastError::MalformedTemplateError { row: 1, .. }));
    }

    #[test]
    fn test_csv_extension_uses_csv_reader() {
        let data = "Warehouse id,SKU id\nW1,A\n";

        let template = read_template("template.csv", data.as_bytes(), &ColumnSpec::default()).unwrap();
        assert_eq!(template.keys, vec![SeriesKey::new("W1", "A")]);
    }

    #[test]
    fn test_csv_bytes_are_not_a_workbook() {
        let data = "Warehouse id,SKU id\nW1,A\n";

        assert!(matches!(
            read_template("template.xlsx", data.as_bytes(), &ColumnSpec::default()),
            Err(ForecastError::SpreadsheetError(_))
        ));
    }

    #[test]
    fn test_ragged_row_is_a_csv_error() {
        let data = "Warehouse id,SKU id\nW1,A,extra\n";

        assert!(matches!(
            parse_template(data.as_bytes(), &ColumnSpec::default()),
            Err(ForecastError::CsvError(_))
        ));
    }
}
