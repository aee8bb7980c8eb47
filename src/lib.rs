pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod forecast;
pub mod utils;

pub use crate::config::{cli::LocalStorage, toml_config::TomlConfig};
#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::core::{
    engine::{ForecastEngine, RunSummary},
    pipeline::ForecastPipeline,
};
pub use crate::domain::model::{ForecastOutcome, Series, SeriesKey};
pub use crate::forecast::{is_stationary, BatchForecastRunner, SeriesForecaster};
pub use crate::utils::error::{ForecastError, Result};
