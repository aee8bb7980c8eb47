use crate::utils::error::{ForecastError, Result};
use std::collections::HashSet;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(ForecastError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(ForecastError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(ForecastError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_file_extension(field_name: &str, file: &str, allowed_extensions: &[&str]) -> Result<()> {
    let allowed_set: HashSet<&str> = allowed_extensions.iter().copied().collect();

    match std::path::Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
    {
        Some(extension) if allowed_set.contains(extension.to_ascii_lowercase().as_str()) => Ok(()),
        Some(extension) => Err(ForecastError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: file.to_string(),
            reason: format!(
                "Unsupported file extension: {}. Allowed extensions: {}",
                extension,
                allowed_extensions.join(", ")
            ),
        }),
        None => Err(ForecastError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: file.to_string(),
            reason: "File has no extension or invalid filename".to_string(),
        }),
    }
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ForecastError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(ForecastError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// Significance levels and tolerances live strictly between 0 and 1.
pub fn validate_open_unit_interval(field_name: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value < 1.0) {
        return Err(ForecastError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value must be strictly between 0 and 1".to_string(),
        });
    }
    Ok(())
}

pub fn validate_month_format(field_name: &str, format: &str) -> Result<()> {
    validate_non_empty_string(field_name, format)?;

    // 月份欄位沒有日，解析時會補上 "01-"
    let has_month = ["%b", "%B", "%m"].iter().any(|spec| format.contains(spec));
    let has_year = ["%y", "%Y"].iter().any(|spec| format.contains(spec));
    if !has_month || !has_year {
        return Err(ForecastError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: format.to_string(),
            reason: "Month format must contain a month (%b, %B or %m) and a year (%y or %Y)"
                .to_string(),
        });
    }
    if format.contains("%d") || format.contains("%e") {
        return Err(ForecastError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: format.to_string(),
            reason: "Month format must not contain a day specifier".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("input.history", "data/history.csv").is_ok());
        assert!(validate_path("input.history", "").is_err());
        assert!(validate_path("input.history", "bad\0path").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("model.max_iterations", 500, 1).is_ok());
        assert!(validate_positive_number("model.max_iterations", 0, 1).is_err());
    }

    #[test]
    fn test_validate_file_extension() {
        assert!(validate_file_extension("output.filename", "final_submission.csv", &["csv"]).is_ok());
        assert!(validate_file_extension("output.filename", "FINAL.CSV", &["csv"]).is_ok());
        assert!(validate_file_extension("output.filename", "final.xlsx", &["csv"]).is_err());
        assert!(validate_file_extension("output.filename", "final", &["csv"]).is_err());
    }

    #[test]
    fn test_validate_open_unit_interval() {
        assert!(validate_open_unit_interval("forecast.alpha", 0.05).is_ok());
        assert!(validate_open_unit_interval("forecast.alpha", 0.0).is_err());
        assert!(validate_open_unit_interval("forecast.alpha", 1.0).is_err());
        assert!(validate_open_unit_interval("forecast.alpha", f64::NAN).is_err());
    }

    #[test]
    fn test_validate_month_format() {
        assert!(validate_month_format("input.month_format", "%b-%y").is_ok());
        assert!(validate_month_format("input.month_format", "%Y-%m").is_ok());
        assert!(validate_month_format("input.month_format", "%Y").is_err());
        assert!(validate_month_format("input.month_format", "%d-%b-%y").is_err());
    }
}
