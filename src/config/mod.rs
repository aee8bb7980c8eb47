pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::domain::model::{ColumnSpec, ForecastSettings, HistoryLayout};
#[cfg(feature = "cli")]
use crate::domain::ports::ConfigProvider;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "sales-forecast")]
#[command(about = "Forecast next-month sales for every (warehouse, product) in a submission template")]
pub struct CliConfig {
    #[arg(long, help = "Submission template CSV listing the keys to forecast")]
    pub template: String,

    #[arg(long, help = "Historical sales CSV")]
    pub history: String,

    #[arg(long, value_enum, default_value = "wide")]
    pub layout: HistoryLayout,

    #[arg(long, default_value = "%b-%y", help = "chrono format of month labels, without a day")]
    pub month_format: String,

    #[arg(long, default_value = "Warehouse id")]
    pub warehouse_column: String,

    #[arg(long, default_value = "SKU id")]
    pub product_column: String,

    #[arg(
        long,
        value_delimiter = ',',
        default_value = "Region",
        help = "Other identifier columns of wide history"
    )]
    pub id_columns: Vec<String>,

    #[arg(long, default_value = "Month", help = "Month column of long history")]
    pub month_column: String,

    #[arg(long, default_value = "Sales", help = "Sales column of long history")]
    pub value_column: String,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, default_value = "final_submission.csv")]
    pub output_file: String,

    #[arg(long, help = "Header of the forecast column (default: month after the last history month)")]
    pub target_column: Option<String>,

    #[arg(long, default_value = "diagnostics.json")]
    pub diagnostics_file: String,

    #[arg(long, help = "Do not write the diagnostics report")]
    pub no_diagnostics: bool,

    #[arg(long, default_value = "0.05", help = "Significance level of the stationarity test")]
    pub alpha: f64,

    #[arg(long, default_value = "2000")]
    pub max_iterations: usize,

    #[arg(long, default_value = "1e-10")]
    pub tolerance: f64,

    #[arg(long, help = "Bound autoregressive coefficients during estimation")]
    pub enforce_stationarity: bool,

    #[arg(long, help = "Bound moving-average coefficients during estimation")]
    pub enforce_invertibility: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log elapsed time and memory per phase")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn template_path(&self) -> &str {
        &self.template
    }

    fn history_path(&self) -> &str {
        &self.history
    }

    fn history_layout(&self) -> HistoryLayout {
        self.layout
    }

    fn columns(&self) -> ColumnSpec {
        ColumnSpec {
            warehouse: self.warehouse_column.clone(),
            product: self.product_column.clone(),
            extra_ids: self.id_columns.clone(),
            month: self.month_column.clone(),
            value: self.value_column.clone(),
            month_format: self.month_format.clone(),
        }
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_filename(&self) -> &str {
        &self.output_file
    }

    fn target_column(&self) -> Option<&str> {
        self.target_column.as_deref()
    }

    fn diagnostics_filename(&self) -> Option<&str> {
        if self.no_diagnostics {
            None
        } else {
            Some(&self.diagnostics_file)
        }
    }

    fn forecast_settings(&self) -> ForecastSettings {
        ForecastSettings {
            alpha: self.alpha,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            enforce_stationarity: self.enforce_stationarity,
            enforce_invertibility: self.enforce_invertibility,
        }
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("template", &self.template)?;
        validation::validate_file_extension("template", &self.template, &["csv", "xlsx"])?;
        validation::validate_path("history", &self.history)?;
        validation::validate_file_extension("history", &self.history, &["csv"])?;
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_non_empty_string("output_file", &self.output_file)?;
        validation::validate_month_format("month_format", &self.month_format)?;
        validation::validate_non_empty_string("warehouse_column", &self.warehouse_column)?;
        validation::validate_non_empty_string("product_column", &self.product_column)?;
        validation::validate_open_unit_interval("alpha", self.alpha)?;
        validation::validate_positive_number("max_iterations", self.max_iterations, 1)?;
        validation::validate_open_unit_interval("tolerance", self.tolerance)?;
        Ok(())
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_submission_layout() {
        let config =
            CliConfig::parse_from(["sales-forecast", "--template", "t.csv", "--history", "h.csv"]);

        assert_eq!(config.history_layout(), HistoryLayout::Wide);
        assert_eq!(config.columns(), ColumnSpec::default());
        assert_eq!(config.forecast_settings(), ForecastSettings::default());
        assert_eq!(config.output_filename(), "final_submission.csv");
        assert_eq!(config.diagnostics_filename(), Some("diagnostics.json"));
        assert!(config.target_column().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = CliConfig::parse_from([
            "sales-forecast",
            "--template",
            "t.csv",
            "--history",
            "h.csv",
            "--layout",
            "long",
            "--id-columns",
            "Region,Channel",
            "--alpha",
            "0.01",
            "--no-diagnostics",
            "--target-column",
            "2021-06-01",
        ]);

        assert_eq!(config.history_layout(), HistoryLayout::Long);
        assert_eq!(config.columns().extra_ids, vec!["Region", "Channel"]);
        assert_eq!(config.forecast_settings().alpha, 0.01);
        assert!(config.diagnostics_filename().is_none());
        assert_eq!(config.target_column(), Some("2021-06-01"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = CliConfig::parse_from([
            "sales-forecast",
            "--template",
            "t.xlsx",
            "--history",
            "h.csv",
        ]);
        assert!(config.validate().is_ok());

        let config = CliConfig::parse_from([
            "sales-forecast",
            "--template",
            "t.csv",
            "--history",
            "h.xlsx",
        ]);
        assert!(config.validate().is_err());

        let config = CliConfig::parse_from([
            "sales-forecast",
            "--template",
            "t.csv",
            "--history",
            "h.csv",
            "--alpha",
            "1.5",
        ]);
        assert!(config.validate().is_err());
    }
}
