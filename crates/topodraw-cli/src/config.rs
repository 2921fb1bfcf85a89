//! Configuration loading and validation

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use topodraw_core::placement::FOOTPRINT;
use topodraw_core::{Canvas, Role};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub canvas: CanvasConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one `<user>.txt` topology file per user
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    /// Drawing area width
    #[serde(default = "default_width")]
    pub width: i32,
    /// Drawing area height
    #[serde(default = "default_height")]
    pub height: i32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_width() -> i32 {
    800
}

fn default_height() -> i32 {
    600
}

impl CanvasConfig {
    pub fn to_canvas(&self) -> Canvas {
        Canvas::new(self.width, self.height)
    }

    /// A canvas must fit at least one device footprint
    pub fn validate(&self) -> Result<()> {
        if self.width < FOOTPRINT || self.height < FOOTPRINT {
            bail!(
                "Canvas {}x{} is smaller than one {FOOTPRINT}x{FOOTPRINT} device",
                self.width,
                self.height
            );
        }
        Ok(())
    }
}

/// Identity handed over by the authentication layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub role: Role,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
            role: Role::User,
        }
    }
}

fn default_user() -> String {
    "guest".to_string()
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.canvas.validate()?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content)?;
    Ok(())
}
