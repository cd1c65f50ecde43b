use tracing_subscriber::EnvFilter;

use staking_report::config::Config;
use staking_report::pipeline::ReportPipeline;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Initialize structured logging (set RUST_LOG=debug for per-page detail)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    tracing::info!("Staking report starting");

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path)?;
    tracing::info!(
        chains = config.chains.len(),
        "Configuration loaded from {}",
        config_path
    );

    let pipeline = ReportPipeline::from_config(&config)?;
    let summaries = pipeline.run(&config.output_path).await?;

    let total_rows: usize = summaries.iter().map(|s| s.rows).sum();
    tracing::info!(
        rows = total_rows,
        "Data saved to {}",
        config.output_path
    );
    Ok(())
}
