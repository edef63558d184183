//! Futures account monitor - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Real-time futures account monitor: order notifications and position
/// rule alerts over chat webhooks.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Position-rules config path (overrides POSITION_RULES_CONFIG_PATH).
    #[arg(short, long)]
    rules_config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = vigil_bot::AppConfig::from_env()?;
    if let Some(path) = args.rules_config {
        config.position_rules_config_path = path;
    }

    vigil_bot::logging::init_logging(&config.log_level);
    info!("Starting vigil-bot v{}", env!("CARGO_PKG_VERSION"));
    info!(
        rest_url = %config.rest_url,
        ws_url = %config.ws_url,
        rules = %config.position_rules_config_path,
        "Configuration loaded"
    );

    let app = vigil_bot::Application::new(config);
    app.run().await?;

    Ok(())
}
