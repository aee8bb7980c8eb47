use crate::adapters::history::parse_history;
use crate::adapters::submission::{render_diagnostics, render_submission};
use crate::adapters::template::read_template;
use crate::core::{ConfigProvider, Pipeline, Storage};
use crate::domain::model::{ForecastInput, ForecastOutput};
use crate::forecast::runner::BatchForecastRunner;
use crate::utils::error::{ForecastError, Result};
use std::path::Path;

/// Reads the template and history through `Storage`, forecasts every
/// template row and writes the submission plus an optional diagnostics report.
pub struct ForecastPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> ForecastPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    fn output_file(&self, filename: &str) -> String {
        Path::new(self.config.output_path())
            .join(filename)
            .to_string_lossy()
            .into_owned()
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for ForecastPipeline<S, C> {
    async fn extract(&self) -> Result<ForecastInput> {
        let columns = self.config.columns();

        tracing::debug!("Reading template from {}", self.config.template_path());
        let template_data = self.storage.read_file(self.config.template_path()).await?;
        let template = read_template(self.config.template_path(), &template_data, &columns)?;

        tracing::debug!("Reading history from {}", self.config.history_path());
        let history_data = self.storage.read_file(self.config.history_path()).await?;
        let history = parse_history(&history_data, self.config.history_layout(), &columns)?;

        Ok(ForecastInput { template, history })
    }

    async fn transform(&self, input: ForecastInput) -> Result<ForecastOutput> {
        let ForecastInput { template, history } = input;

        let target_column = match self.config.target_column() {
            Some(column) => column.to_string(),
            None => history.forecast_month().format("%Y-%m-%d").to_string(),
        };
        tracing::debug!("Forecast target column: {}", target_column);

        // 模型估計是純 CPU 工作，移到 blocking 執行緒
        let settings = self.config.forecast_settings();
        let (template, report) = tokio::task::spawn_blocking(move || {
            let report = BatchForecastRunner::from_settings(&settings).run(&template.keys, &history)?;
            Ok::<_, ForecastError>((template, report))
        })
        .await
        .map_err(|e| ForecastError::ProcessingError {
            message: format!("forecast task failed: {}", e),
        })??;

        for diagnostic in &report.diagnostics {
            tracing::debug!(
                "row {} ({}/{}) {:?}: {}",
                diagnostic.row,
                diagnostic.warehouse,
                diagnostic.product,
                diagnostic.kind,
                diagnostic.message
            );
        }

        Ok(ForecastOutput {
            template,
            target_column,
            report,
        })
    }

    async fn load(&self, output: ForecastOutput) -> Result<String> {
        let submission =
            render_submission(&output.template, &output.target_column, &output.report.results)?;
        let output_path = self.output_file(self.config.output_filename());

        tracing::debug!("Writing submission ({} bytes) to {}", submission.len(), output_path);
        self.storage.write_file(&output_path, &submission).await?;

        if let Some(filename) = self.config.diagnostics_filename() {
            let report = render_diagnostics(&output.report.diagnostics)?;
            let report_path = self.output_file(filename);
            tracing::debug!(
                "Writing {} diagnostics to {}",
                output.report.diagnostics.len(),
                report_path
            );
            self.storage.write_file(&report_path, &report).await?;
        }

        Ok(output_path)
    }
}
