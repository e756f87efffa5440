//! Editor configuration
//!
//! Small TOML file under the platform config dir holding the user's choices
//! between runs: a custom profile path, whether to protect after applying,
//! the log level and any custom presets.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::atomic;
use crate::constants::{config, process};

/// Persistent editor settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Profile path used instead of searching the game's settings folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_config_path: Option<PathBuf>,

    /// Mark the profile read-only after applying so the game cannot revert it
    #[serde(default = "default_protect_after_apply")]
    pub protect_after_apply: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Executable names that block editing while running
    #[serde(default = "default_game_processes")]
    pub game_processes: Vec<String>,

    /// Preset name -> (setting id -> value)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_presets: BTreeMap<String, BTreeMap<String, String>>,
}

fn default_protect_after_apply() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_game_processes() -> Vec<String> {
    process::GAME_PROCESSES.iter().map(|s| s.to_string()).collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            custom_config_path: None,
            protect_after_apply: default_protect_after_apply(),
            log_level: default_log_level(),
            game_processes: default_game_processes(),
            custom_presets: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    pub fn path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(config::APP_DIR);
        path.push(config::FILENAME);
        path
    }

    /// Load from the default location, falling back to defaults if absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No editor config found, using defaults");
            return Ok(Self::default());
        }

        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config from {:?}", path))?;
        let config: AppConfig =
            toml::from_str(&contents).with_context(|| format!("Failed to parse TOML from {:?}", path))?;

        info!(path = %path.display(), presets = config.custom_presets.len(), "Loaded editor config");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        atomic::write_atomic(path, toml_string.as_bytes())
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        info!(path = %path.display(), "Saved editor config");
        Ok(())
    }

    /// Profile override: `PROFSAVE_PATH` wins over the saved custom path
    pub fn profile_override(&self) -> Option<PathBuf> {
        env::var_os(config::PATH_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| self.custom_config_path.clone())
    }
}
