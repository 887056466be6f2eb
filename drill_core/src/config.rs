//! Configuration file support for drill.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/drill/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub guides: GuidesConfig,

    #[serde(default)]
    pub sound: SoundConfig,
}

/// Exercise guides loaded before any given on the command line
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct GuidesConfig {
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

/// Which sound implementation to use
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SoundBackend {
    /// Ask the platform registry
    #[default]
    Auto,
    /// Never make a sound
    Quiet,
}

/// Sound cue configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SoundConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub backend: SoundBackend,

    /// Command (and leading arguments) used to play a sound file
    #[serde(default = "default_player")]
    pub player: Vec<String>,

    #[serde(default = "default_start_cue")]
    pub start_cue: String,

    #[serde(default = "default_countdown_cue")]
    pub countdown_cue: String,

    #[serde(default = "default_finish_cue")]
    pub finish_cue: String,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            backend: SoundBackend::default(),
            player: default_player(),
            start_cue: default_start_cue(),
            countdown_cue: default_countdown_cue(),
            finish_cue: default_finish_cue(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_player() -> Vec<String> {
    vec!["mplayer".into(), "-really-quiet".into()]
}

fn default_start_cue() -> String {
    "sounds/boop.ogg".into()
}

fn default_countdown_cue() -> String {
    "sounds/beep.ogg".into()
}

fn default_finish_cue() -> String {
    "sounds/boop.ogg".into()
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("drill").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.sound.enabled
            && self.sound.backend == SoundBackend::Auto
            && self.sound.player.is_empty()
        {
            return Err(Error::Config(
                "sound.player must name a command when sound is enabled".into(),
            ));
        }
        Ok(())
    }
}
