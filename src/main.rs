use anyhow::Context;
use clap::Parser;
use sales_forecast::utils::error::ForecastError;
use sales_forecast::utils::{logger, validation::Validate};
use sales_forecast::{CliConfig, ForecastEngine, ForecastPipeline, LocalStorage};

fn exit_with(e: &ForecastError) -> ! {
    tracing::error!(
        "❌ Forecast failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_logger(config.verbose, config.json_logs);

    tracing::info!("Starting sales-forecast");
    tracing::debug!("CLI config: {:?}", config);

    if let Err(e) = config.validate() {
        exit_with(&e);
    }

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }
    let json_summary = config.json_logs;

    let storage = LocalStorage::new(".");
    let pipeline = ForecastPipeline::new(storage, config);
    let engine = ForecastEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(summary) => {
            if json_summary {
                let line = serde_json::to_string(&summary).context("failed to encode run summary")?;
                println!("{}", line);
            } else {
                println!("✅ Forecast completed: {} rows, {} fallbacks", summary.rows, summary.fallbacks);
                println!("📁 Output saved to: {}", summary.output_path);
            }
            Ok(())
        }
        Err(e) => exit_with(&e),
    }
}
