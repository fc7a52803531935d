use carlotta_api::api::start_api_server;
use carlotta_api::config::{ConfigManager, FileConfigManager};
use carlotta_api::registry::CapabilityRegistry;
use carlotta_api::scraper::{http_client, ModuleCatalog};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_manager = FileConfigManager::new(PathBuf::from("config.toml"));
    let mut config = config_manager
        .load_config()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    config
        .apply_env_overrides()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let config = Arc::new(config);

    tracing::info!("Starting Carlotta API");

    let client = http_client(&config.upstream).map_err(|e| anyhow::anyhow!("{}", e))?;
    let catalog = ModuleCatalog::builtin(client);
    let registry = CapabilityRegistry::scan(&config.registry.scrape_dir, &catalog)
        .map_err(|e| anyhow::anyhow!("Failed to scan {}: {}", config.registry.scrape_dir.display(), e))?;

    start_api_server(Arc::new(registry), config)
        .await
        .map_err(|e| anyhow::anyhow!("API server error: {}", e))?;

    tracing::info!("Carlotta API stopped.");
    Ok(())
}
