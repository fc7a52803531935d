use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Result, ScrapeError};

/// Environment variable that overrides `server.port`.
pub const PORT_ENV: &str = "PORT";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub registry: RegistryConfig,
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_size: usize, // bytes
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    pub scrape_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                max_body_size: 1024 * 1024,
            },
            registry: RegistryConfig {
                scrape_dir: PathBuf::from("./scrape"),
            },
            upstream: UpstreamConfig {
                timeout: Duration::from_secs(30),
                user_agent: "Mozilla/5.0".to_string(),
            },
        }
    }
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Applies `PORT` from the process environment, if set.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        let port = std::env::var(PORT_ENV).ok();
        self.apply_port_override(port.as_deref())
    }

    pub fn apply_port_override(&mut self, value: Option<&str>) -> Result<()> {
        let Some(raw) = value else {
            return Ok(());
        };
        let port = raw.trim().parse::<u16>().map_err(|_| {
            ScrapeError::Config(format!("{} must be a port number, got '{}'", PORT_ENV, raw))
        })?;
        debug!("Port overridden by {}: {}", PORT_ENV, port);
        self.server.port = port;
        Ok(())
    }
}

#[async_trait::async_trait]
pub trait ConfigManager {
    async fn load_config(&self) -> Result<Config>;
    async fn save_config(&self, config: &Config) -> Result<()>;
    fn validate_config(&self, config: &Config) -> Result<()>;
}

pub struct FileConfigManager {
    config_path: PathBuf,
}

impl FileConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }
}

#[async_trait::async_trait]
impl ConfigManager for FileConfigManager {
    async fn load_config(&self) -> Result<Config> {
        info!("Loading configuration from {:?}", self.config_path);

        if !self.config_path.exists() {
            warn!("Configuration file not found, creating default config at {:?}", self.config_path);
            self.create_default_config().await?;
        }

        let config_content = fs::read_to_string(&self.config_path)
            .map_err(|e| ScrapeError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&config_content)
            .map_err(|e| ScrapeError::Config(format!("Failed to parse TOML config: {}", e)))?;

        self.validate_config(&config)?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    fn validate_config(&self, config: &Config) -> Result<()> {
        debug!("Validating configuration");

        if config.server.host.trim().is_empty() {
            return Err(ScrapeError::Config("server.host cannot be empty".to_string()).into());
        }
        if config.server.max_body_size == 0 {
            return Err(ScrapeError::Config("server.max_body_size must be greater than 0".to_string()).into());
        }

        if config.registry.scrape_dir.as_os_str().is_empty() {
            return Err(ScrapeError::Config("registry.scrape_dir cannot be empty".to_string()).into());
        }

        if config.upstream.timeout.is_zero() {
            return Err(ScrapeError::Config("upstream.timeout must be greater than 0".to_string()).into());
        }
        if config.upstream.user_agent.trim().is_empty() {
            return Err(ScrapeError::Config("upstream.user_agent cannot be empty".to_string()).into());
        }

        debug!("Configuration validation passed");
        Ok(())
    }

    async fn save_config(&self, config: &Config) -> Result<()> {
        info!("Saving configuration to {:?}", self.config_path);

        let toml_content = toml::to_string_pretty(config)
            .map_err(|e| ScrapeError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&self.config_path, toml_content)
            .map_err(|e| ScrapeError::Config(format!("Failed to write config file: {}", e)))?;

        info!("Configuration saved successfully");
        Ok(())
    }
}

impl FileConfigManager {
    /// Create a default configuration file
    async fn create_default_config(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| ScrapeError::Config(format!("Failed to create config directory: {}", e)))?;
            }
        }

        self.save_config(&Config::default()).await?;
        info!("Default configuration file created at {:?}", self.config_path);
        Ok(())
    }
}
