use super::schema::HarcapConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./harcap.yaml
    /// 2. ~/.harcap/config.yaml
    /// 3. Default configuration
    pub async fn load_default() -> Result<HarcapConfig, ConfigError> {
        let local_config = PathBuf::from("./harcap.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".harcap").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        Ok(HarcapConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<HarcapConfig, ConfigError> {
        tracing::debug!("Loading config from {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<HarcapConfig, ConfigError> {
        // An empty file is a valid, fully defaulted config.
        if content.trim().is_empty() {
            return Ok(HarcapConfig::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}
