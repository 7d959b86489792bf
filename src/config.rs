//! # Configuration Management Module
//!
//! Persistent application settings, stored as `config.json` in the per-user
//! configuration directory.
//!
//! ## Settings:
//! - `watchConfigs`: watched directories, each with its own pattern and switch
//! - `notifications`: show a notification per processed file (default: true)
//! - `autoStart`: start watching when the app starts (default: true)
//! - `resizeRatio`: optional linear downscale in `(0, 1]` (default: null)
//!
//! ## Loading rules:
//! - Missing file: defaults are written to disk
//! - Legacy `retinaOptimization` flag: `true` becomes a 0.5 ratio, `false`
//!   becomes no resize, and the flag is dropped and the file saved
//! - Empty watch list: a default watcher on the desktop (or home) directory is
//!   synthesized and saved
//!
//! ## Example:
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use karuku::config::{ConfigStore, WatchConfig};
//!
//! let store = ConfigStore::new(ConfigStore::default_dir()?);
//! let mut config = store.load().await?;
//! config.watch_configs.push(WatchConfig::new("/tmp/screenshots"));
//! config.validate()?;
//! store.save(&config).await?;
//! # Ok(())
//! # }
//! ```

use crate::pattern::PNG_WILDCARD;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const APP_DIR_NAME: &str = "Karuku";
pub const CONFIG_FILE_NAME: &str = "config.json";

const LEGACY_RETINA_KEY: &str = "retinaOptimization";
const RESIZE_RATIO_KEY: &str = "resizeRatio";
const LEGACY_RETINA_RATIO: f64 = 0.5;

pub const DEFAULT_DESKTOP_WATCHER_ID: &str = "default-desktop-watcher";
pub const DEFAULT_HOME_WATCHER_ID: &str = "default-home-watcher";

/// One watched directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchConfig {
    pub id: String,
    pub path: PathBuf,
    /// `*.png` or a regular expression over the base name
    pub pattern: String,
    pub enabled: bool,
}

impl WatchConfig {
    /// Enabled `*.png` watch with a fresh id
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), path)
    }

    pub fn with_id(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            pattern: PNG_WILDCARD.to_string(),
            enabled: true,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub watch_configs: Vec<WatchConfig>,
    #[serde(default = "default_true")]
    pub notifications: bool,
    #[serde(default = "default_true")]
    pub auto_start: bool,
    #[serde(default)]
    pub resize_ratio: Option<f64>,
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            watch_configs: Vec::new(),
            notifications: true,
            auto_start: true,
            resize_ratio: None,
        }
    }
}

impl AppConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if let Some(ratio) = self.resize_ratio {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(anyhow::anyhow!("Resize ratio must be greater than 0 and at most 1, got {}", ratio));
            }
        }

        let mut seen = HashSet::new();
        for watch in &self.watch_configs {
            if !seen.insert(watch.id.as_str()) {
                return Err(anyhow::anyhow!("Duplicate watch id: {}", watch.id));
            }
        }

        Ok(())
    }

    pub fn find_watch(&self, id: &str) -> Option<&WatchConfig> {
        self.watch_configs.iter().find(|watch| watch.id == id)
    }

    pub fn find_watch_mut(&mut self, id: &str) -> Option<&mut WatchConfig> {
        self.watch_configs.iter_mut().find(|watch| watch.id == id)
    }

    pub fn enabled_watches(&self) -> impl Iterator<Item = &WatchConfig> {
        self.watch_configs.iter().filter(|watch| watch.enabled)
    }
}

/// First-run watcher: the desktop if it exists, otherwise the home directory
pub fn default_watchers() -> Vec<WatchConfig> {
    if let Some(desktop) = dirs::desktop_dir().filter(|dir| dir.is_dir()) {
        return vec![WatchConfig::with_id(DEFAULT_DESKTOP_WATCHER_ID, desktop)];
    }
    match dirs::home_dir() {
        Some(home) => vec![WatchConfig::with_id(DEFAULT_HOME_WATCHER_ID, home)],
        None => Vec::new(),
    }
}

/// Rewrite a legacy `retinaOptimization` flag in place; true if anything changed
fn migrate_legacy(document: &mut serde_json::Value) -> bool {
    let Some(object) = document.as_object_mut() else {
        return false;
    };
    let Some(legacy) = object.remove(LEGACY_RETINA_KEY) else {
        return false;
    };

    if !object.contains_key(RESIZE_RATIO_KEY) {
        let ratio = match legacy.as_bool() {
            Some(true) => serde_json::json!(LEGACY_RETINA_RATIO),
            _ => serde_json::Value::Null,
        };
        object.insert(RESIZE_RATIO_KEY.to_string(), ratio);
    }
    true
}

/// Reads and writes `config.json`
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<platform config dir>/Karuku`
    pub fn default_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .context("Could not determine the user configuration directory")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    /// Load configuration from file, applying migration and first-run defaults
    pub async fn load(&self) -> Result<AppConfig> {
        self.load_with_defaults(default_watchers).await
    }

    pub async fn load_with_defaults<F>(&self, defaults: F) -> Result<AppConfig>
    where
        F: FnOnce() -> Vec<WatchConfig>,
    {
        let path = self.path();
        let (mut config, mut dirty) = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let mut document: serde_json::Value = serde_json::from_str(&content)
                    .with_context(|| format!("Invalid configuration file {}", path.display()))?;
                let migrated = migrate_legacy(&mut document);
                if migrated {
                    info!("Migrated legacy retina setting in {}", path.display());
                }
                let config: AppConfig = serde_json::from_value(document)
                    .with_context(|| format!("Invalid configuration file {}", path.display()))?;
                (config, migrated)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No configuration at {}, using defaults", path.display());
                (AppConfig::default(), true)
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
        };

        if config.watch_configs.is_empty() {
            config.watch_configs = defaults();
            if let Some(watch) = config.watch_configs.first() {
                info!("Watching {} by default", watch.path.display());
            }
            dirty = true;
        }

        config.validate()?;
        if dirty {
            self.save(&config).await?;
        }
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, config: &AppConfig) -> Result<()> {
        config.validate()?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let content = serde_json::to_string_pretty(config)?;
        let path = self.path();
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
