use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    SpreadsheetError(#[from] calamine::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Template row {row} (warehouse '{warehouse}', product '{product}') has no sales history")]
    MissingKeyError {
        row: usize,
        warehouse: String,
        product: String,
    },

    #[error("Series for warehouse '{warehouse}', product '{product}' has no observed values")]
    EmptySeriesError { warehouse: String, product: String },

    #[error("Duplicate observation for warehouse '{warehouse}', product '{product}' in {month}")]
    DuplicateObservationError {
        warehouse: String,
        product: String,
        month: String,
    },

    #[error("Malformed template at row {row}: {message}")]
    MalformedTemplateError { row: usize, message: String },

    #[error("Malformed history at row {row}: {message}")]
    MalformedHistoryError { row: usize, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    InputData,
    Processing,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ForecastError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ForecastError::ConfigValidationError { .. }
            | ForecastError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            ForecastError::CsvError(_)
            | ForecastError::SpreadsheetError(_)
            | ForecastError::MissingKeyError { .. }
            | ForecastError::EmptySeriesError { .. }
            | ForecastError::DuplicateObservationError { .. }
            | ForecastError::MalformedTemplateError { .. }
            | ForecastError::MalformedHistoryError { .. }
            | ForecastError::ValidationError { .. } => ErrorCategory::InputData,
            ForecastError::ProcessingError { .. } | ForecastError::SerializationError(_) => {
                ErrorCategory::Processing
            }
            ForecastError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::InputData => ErrorSeverity::Medium,
            ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            ForecastError::MissingKeyError { warehouse, product, .. } => format!(
                "Add sales history for warehouse '{}' and product '{}', or remove the row from the template",
                warehouse, product
            ),
            ForecastError::EmptySeriesError { .. } => {
                "Every template key needs at least one non-blank sales value".to_string()
            }
            ForecastError::DuplicateObservationError { .. } => {
                "Each (warehouse, product) pair may appear only once per month in the history file"
                    .to_string()
            }
            ForecastError::MalformedTemplateError { .. } => {
                "Check the template header and make sure every row has a warehouse and product id"
                    .to_string()
            }
            ForecastError::MalformedHistoryError { .. } | ForecastError::ValidationError { .. } => {
                "Sales values must be blank or non-negative numbers; check month headers against --month-format"
                    .to_string()
            }
            ForecastError::CsvError(_) => "Make sure the input files are valid CSV".to_string(),
            ForecastError::SpreadsheetError(_) => {
                "Make sure the template workbook opens and its first sheet holds the header row"
                    .to_string()
            }
            ForecastError::ConfigValidationError { .. }
            | ForecastError::InvalidConfigValueError { .. } => {
                "Review the command line arguments or the TOML configuration file".to_string()
            }
            ForecastError::IoError(_) => {
                "Check that the input paths exist and the output directory is writable".to_string()
            }
            ForecastError::SerializationError(_) | ForecastError::ProcessingError { .. } => {
                "Re-run with --verbose and inspect the log for the failing step".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::InputData => format!("Input data problem: {}", self),
            ErrorCategory::Processing => format!("Forecasting failed: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
