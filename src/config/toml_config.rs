use crate::domain::model::{ColumnSpec, ForecastSettings, HistoryLayout};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{ForecastError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub input: InputConfig,
    #[serde(default)]
    pub columns: ColumnSpec,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub model: ModelConfig,
    pub output: OutputConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub template: String,
    pub history: String,
    #[serde(default)]
    pub layout: HistoryLayout,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub alpha: Option<f64>,
    pub target_column: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    pub max_iterations: Option<usize>,
    pub tolerance: Option<f64>,
    pub enforce_stationarity: Option<bool>,
    pub enforce_invertibility: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: String,
    pub filename: Option<String>,
    /// Diagnostics report file name; omit to skip the report.
    pub diagnostics: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
    pub json_logs: Option<bool>,
}

const DEFAULT_OUTPUT_FILENAME: &str = "final_submission.csv";

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // 只接受 ${VAR_NAME} 格式
    PATTERN.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"))
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ForecastError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replace `${VAR}` with the environment value; unknown variables are left as written.
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("pipeline.name", &self.pipeline.name)?;

        for (field, path, extensions) in [
            ("input.template", &self.input.template, &["csv", "xlsx"][..]),
            ("input.history", &self.input.history, &["csv"][..]),
        ] {
            if env_var_pattern().is_match(path) {
                return Err(ForecastError::ConfigValidationError {
                    field: field.to_string(),
                    message: format!("unresolved environment variable in '{}'", path),
                });
            }
            validation::validate_path(field, path)?;
            validation::validate_file_extension(field, path, extensions)?;
        }

        validation::validate_path("output.path", &self.output.path)?;
        validation::validate_non_empty_string("output.filename", self.output_filename())?;

        validation::validate_non_empty_string("columns.warehouse", &self.columns.warehouse)?;
        validation::validate_non_empty_string("columns.product", &self.columns.product)?;
        validation::validate_month_format("columns.month_format", &self.columns.month_format)?;
        if self.input.layout == HistoryLayout::Long {
            validation::validate_non_empty_string("columns.month", &self.columns.month)?;
            validation::validate_non_empty_string("columns.value", &self.columns.value)?;
        }

        let settings = self.forecast_settings();
        validation::validate_open_unit_interval("forecast.alpha", settings.alpha)?;
        validation::validate_range("model.max_iterations", settings.max_iterations, 1, 1_000_000)?;
        validation::validate_open_unit_interval("model.tolerance", settings.tolerance)?;

        if let Some(target) = &self.forecast.target_column {
            validation::validate_non_empty_string("forecast.target_column", target)?;
        }

        Ok(())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json_logs)
            .unwrap_or(false)
    }

    pub fn verbose(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.log_level.as_deref())
            .map(|level| matches!(level.to_ascii_lowercase().as_str(), "debug" | "trace"))
            .unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn template_path(&self) -> &str {
        &self.input.template
    }

    fn history_path(&self) -> &str {
        &self.input.history
    }

    fn history_layout(&self) -> HistoryLayout {
        self.input.layout
    }

    fn columns(&self) -> ColumnSpec {
        self.columns.clone()
    }

    fn output_path(&self) -> &str {
        &self.output.path
    }

    fn output_filename(&self) -> &str {
        self.output
            .filename
            .as_deref()
            .unwrap_or(DEFAULT_OUTPUT_FILENAME)
    }

    fn target_column(&self) -> Option<&str> {
        self.forecast.target_column.as_deref()
    }

    fn diagnostics_filename(&self) -> Option<&str> {
        self.output.diagnostics.as_deref()
    }

    fn forecast_settings(&self) -> ForecastSettings {
        let defaults = ForecastSettings::default();
        ForecastSettings {
            alpha: self.forecast.alpha.unwrap_or(defaults.alpha),
            max_iterations: self.model.max_iterations.unwrap_or(defaults.max_iterations),
            tolerance: self.model.tolerance.unwrap_or(defaults.tolerance),
            enforce_stationarity: self
                .model
                .enforce_stationarity
                .unwrap_or(defaults.enforce_stationarity),
            enforce_invertibility: self
                .model
                .enforce_invertibility
                .unwrap_or(defaults.enforce_invertibility),
        }
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
