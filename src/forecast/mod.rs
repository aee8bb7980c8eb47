pub mod forecaster;
pub mod runner;
pub mod sarima;
pub mod stationarity;

pub use forecaster::SeriesForecaster;
pub use runner::BatchForecastRunner;
pub use sarima::{ModelError, Sarima, SarimaSpec};
pub use stationarity::{is_stationary, AdfStationarity, StationarityVerdict};
