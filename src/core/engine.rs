use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use serde::Serialize;

/// What one run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub output_path: String,
    pub target_column: String,
    pub rows: usize,
    pub fallbacks: usize,
    pub diagnostics: usize,
}

pub struct ForecastEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> ForecastEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        tracing::info!("Starting forecast run");

        tracing::info!("Reading template and history...");
        let input = self.pipeline.extract().await?;
        tracing::info!(
            "Loaded {} template rows and {} series",
            input.template.len(),
            input.history.len()
        );
        self.monitor.log_stats("Extract");

        tracing::info!("Forecasting...");
        let output = self.pipeline.transform(input).await?;
        let summary = RunSummary {
            output_path: String::new(),
            target_column: output.target_column.clone(),
            rows: output.report.results.len(),
            fallbacks: output.report.fallback_count(),
            diagnostics: output.report.diagnostics.len(),
        };
        tracing::info!(
            "Forecast column '{}': {} rows, {} fallbacks",
            summary.target_column,
            summary.rows,
            summary.fallbacks
        );
        self.monitor.log_stats("Transform");

        tracing::info!("Writing submission...");
        let output_path = self.pipeline.load(output).await?;
        tracing::info!("Output saved to: {}", output_path);
        self.monitor.log_stats("Load");
        self.monitor.log_final_stats();

        Ok(RunSummary {
            output_path,
            ..summary
        })
    }
}
