use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use vault_sync::cli::Cli;
use vault_sync::config::Config;
use vault_sync::observer::TracingObserver;
use vault_sync::sync;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "vault_sync=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    if let Err(err) = sync::run(&config, &TracingObserver).await {
        error!("Sync failed: {err}");
        std::process::exit(1);
    }
    Ok(())
}
