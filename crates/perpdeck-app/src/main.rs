//! perpdeck - Entry Point

use anyhow::Result;
use clap::Parser;
use perpdeck_core::ProviderId;
use tracing::info;

/// Headless perpetuals trading state runner
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via PERPDECK_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Provider to select, overriding the configured default
    #[arg(short, long)]
    provider: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    perpdeck_telemetry::init_logging()?;

    info!("Starting perpdeck v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > PERPDECK_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("PERPDECK_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = perpdeck_app::AppConfig::from_file(&config_path)?;
    info!(base_url = %config.api.base_url, wallet = config.wallet.is_some(), "Configuration loaded");

    let app = perpdeck_app::Application::new(config)?;
    if let Some(provider) = args.provider {
        app.select_provider(ProviderId::new(provider)?);
    }

    app.run().await?;
    Ok(())
}
