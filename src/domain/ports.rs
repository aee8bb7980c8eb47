use crate::domain::model::{
    ColumnSpec, ForecastInput, ForecastOutput, ForecastSettings, HistoryLayout,
};
use crate::forecast::sarima::ModelError;
use crate::forecast::stationarity::StationarityVerdict;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn template_path(&self) -> &str;
    fn history_path(&self) -> &str;
    fn history_layout(&self) -> HistoryLayout;
    fn columns(&self) -> ColumnSpec;
    fn output_path(&self) -> &str;
    fn output_filename(&self) -> &str;
    /// Header override for the forecast column; derived from the history when `None`.
    fn target_column(&self) -> Option<&str>;
    /// File name for the diagnostics report, or `None` to skip writing it.
    fn diagnostics_filename(&self) -> Option<&str>;
    fn forecast_settings(&self) -> ForecastSettings;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<ForecastInput>;
    async fn transform(&self, input: ForecastInput) -> Result<ForecastOutput>;
    async fn load(&self, output: ForecastOutput) -> Result<String>;
}

/// Decides whether a gap-free sequence is stationary.
pub trait StationarityCheck: Send + Sync {
    fn check(&self, values: &[f64]) -> StationarityVerdict;
}

/// Point forecast plus any warnings raised while fitting.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelForecast {
    pub value: f64,
    pub warnings: Vec<String>,
}

/// A model fitted per call that predicts the period after `training`.
/// Gaps in `training` are `None`.
pub trait SeasonalModel: Send + Sync {
    fn forecast_next(&self, training: &[Option<f64>]) -> std::result::Result<ModelForecast, ModelError>;
}
