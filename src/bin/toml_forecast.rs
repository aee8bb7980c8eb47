use anyhow::Context;
use clap::Parser;
use sales_forecast::domain::ports::{ConfigProvider, Pipeline};
use sales_forecast::utils::{logger, validation::Validate};
use sales_forecast::{ForecastEngine, ForecastPipeline, LocalStorage, TomlConfig};

#[derive(Parser)]
#[command(name = "toml-forecast")]
#[command(about = "Sales forecasting driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "forecast.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override the stationarity test significance level
    #[arg(long)]
    alpha: Option<f64>,

    /// Dry run - show what would be processed without executing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = TomlConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config file '{}'", args.config))?;

    // 初始化日誌
    logger::init_logger(args.verbose || config.verbose(), config.json_logs());
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    // 應用命令列覆蓋設定
    if let Some(alpha) = args.alpha {
        config.forecast.alpha = Some(alpha);
        tracing::info!("🔧 Stationarity alpha overridden to: {}", alpha);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());
        std::process::exit(e.exit_code());
    }

    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No forecasts will be written");
        perform_dry_run(&config).await?;
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());

    let storage = LocalStorage::new(".");
    let pipeline = ForecastPipeline::new(storage, config);
    let engine = ForecastEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(summary) => {
            println!(
                "✅ Forecast completed: {} rows in column '{}', {} fallbacks",
                summary.rows, summary.target_column, summary.fallbacks
            );
            println!("📁 Output saved to: {}", summary.output_path);
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                "❌ Forecast failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(e.exit_code());
        }
    }
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!(
        "  Pipeline: {} v{}",
        config.pipeline.name,
        config.pipeline.version.as_deref().unwrap_or("-")
    );
    println!("  Template: {}", config.template_path());
    println!("  History: {} ({:?})", config.history_path(), config.history_layout());
    println!(
        "  Output: {}/{}",
        config.output_path(),
        config.output_filename()
    );

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

/// Parse both inputs and report what a real run would forecast.
async fn perform_dry_run(config: &TomlConfig) -> anyhow::Result<()> {
    let storage = LocalStorage::new(".");
    let pipeline = ForecastPipeline::new(storage, config.clone());
    let input = pipeline
        .extract()
        .await
        .context("failed to read inputs")?;

    let missing = input
        .template
        .keys
        .iter()
        .filter(|key| input.history.get(key).is_none())
        .count();
    let target = config
        .target_column()
        .map(str::to_string)
        .unwrap_or_else(|| input.history.forecast_month().format("%Y-%m-%d").to_string());
    let settings = config.forecast_settings();

    println!("🔍 Dry Run Analysis:");
    println!("  Template rows: {}", input.template.len());
    println!("  Series in history: {}", input.history.len());
    println!(
        "  Last history month: {}",
        input.history.last_month().format("%Y-%m")
    );
    println!("  Forecast column: {}", target);
    println!("  Stationarity alpha: {}", settings.alpha);
    println!(
        "  Model: SARIMA(1,1,1)(1,1,0)[12], max {} iterations",
        settings.max_iterations
    );
    if missing > 0 {
        println!("  ⚠️ {} template rows have no history; a real run would fail", missing);
    }
    if let Some(diagnostics) = config.diagnostics_filename() {
        println!("  Diagnostics: {}/{}", config.output_path(), diagnostics);
    }

    println!();
    println!("✅ Dry run analysis complete.");

    Ok(())
}
