//! Configuration management for the music director
//!
//! Two tiers:
//! 1. **TOML bootstrap** (`cuedeck.toml`): where music.json and assets live,
//!    tick rate, logging, and the director's mix settings.
//! 2. **music.json**: per-scene cue lists, playlist and snippets
//!    (see `cuedeck_common::config`).
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments
//! 2. TOML configuration file
//! 3. Built-in defaults (code constants)
//!
//! A missing TOML file is not an error: the director starts on defaults.

use crate::error::{Error, Result};
use cuedeck_common::FadeCurve;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Explicit music.json path (optional)
    pub music_config: Option<PathBuf>,

    /// Root for relative clip locators and bundled music.json (optional)
    pub asset_root: Option<PathBuf>,

    /// Director ticks per second
    ///
    /// Default: 60
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: u32,

    /// Logging configuration (optional)
    pub logging: LoggingConfig,

    /// Mix settings
    pub director: DirectorSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_tick_rate() -> u32 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Mix policy settings
///
/// All fields have built-in defaults; out-of-range values are clamped by
/// [`DirectorSettings::validated`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorSettings {
    // === Ducking ===
    /// Lower the video's own audio while scene music is audible
    pub enable_ducking: bool,
    /// Ducked video volume (0.0-1.0)
    pub duck_to: f32,
    /// Duck/un-duck tween length in seconds
    pub duck_fade: f64,

    // === Playlist Overlay ===
    pub enable_playlist_overlay: bool,
    /// Paused video triggers the overlay
    pub overlay_on_pause: bool,
    /// Playback rate above which the overlay plays
    pub fast_forward_threshold: f32,
    pub overlay_pause_volume: f32,
    pub overlay_fast_volume: f32,
    /// Overlay fade in/out and scene suspend/restore length in seconds
    pub overlay_fade: f64,
    /// Seconds the overlay decision must hold before switching (0 = immediate)
    pub overlay_debounce_secs: f64,

    // === Scene Cue Mix ===
    pub scene_cue_volume_multiplier: f32,
    pub overlay_volume_multiplier: f32,
    /// Fade applied to leftover scene channels on scene change
    pub default_stop_fade: f64,
    /// Volume above which a playing channel counts as audible
    pub audible_epsilon: f32,
    /// Scene channels available for crossfading (minimum 2)
    pub scene_channels: usize,
    /// Shape of every volume ramp
    pub fade_curve: FadeCurve,

    // === Loading ===
    /// Fail loads that take longer than this (None = wait forever)
    pub load_timeout_secs: Option<f64>,

    // === Scene Binding ===
    /// Activate a scene's cues when the host announces the scene
    pub auto_apply_on_scene_load: bool,
}

impl Default for DirectorSettings {
    fn default() -> Self {
        Self {
            enable_ducking: true,
            duck_to: 0.6,
            duck_fade: 0.5,
            enable_playlist_overlay: true,
            overlay_on_pause: true,
            fast_forward_threshold: 1.05,
            overlay_pause_volume: 0.12,
            overlay_fast_volume: 0.35,
            overlay_fade: 0.5,
            overlay_debounce_secs: 0.0,
            scene_cue_volume_multiplier: 1.0,
            overlay_volume_multiplier: 1.0,
            default_stop_fade: 0.75,
            audible_epsilon: 0.01,
            scene_channels: 2,
            fade_curve: FadeCurve::Linear,
            load_timeout_secs: None,
            auto_apply_on_scene_load: true,
        }
    }
}

impl DirectorSettings {
    /// Clamp every value into its legal range
    pub fn validated(mut self) -> Self {
        self.duck_to = self.duck_to.clamp(0.0, 1.0);
        self.duck_fade = self.duck_fade.max(0.0);
        self.fast_forward_threshold = self.fast_forward_threshold.max(0.0);
        self.overlay_pause_volume = self.overlay_pause_volume.clamp(0.0, 1.0);
        self.overlay_fast_volume = self.overlay_fast_volume.clamp(0.0, 1.0);
        self.overlay_fade = self.overlay_fade.max(0.0);
        self.overlay_debounce_secs = self.overlay_debounce_secs.max(0.0);
        self.scene_cue_volume_multiplier = self.scene_cue_volume_multiplier.clamp(0.0, 1.0);
        self.overlay_volume_multiplier = self.overlay_volume_multiplier.clamp(0.0, 1.0);
        self.default_stop_fade = self.default_stop_fade.max(0.0);
        self.audible_epsilon = self.audible_epsilon.clamp(0.0, 1.0);
        if self.scene_channels < 2 {
            warn!(
                "scene_channels = {} is below the crossfade minimum, using 2",
                self.scene_channels
            );
            self.scene_channels = 2;
        }
        self.load_timeout_secs = self.load_timeout_secs.filter(|t| *t > 0.0);
        self
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub music_config: Option<PathBuf>,
    pub asset_root: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub music_config: Option<PathBuf>,
    pub asset_root: Option<PathBuf>,
    pub tick_rate_hz: u32,
    pub logging: LoggingConfig,
    pub director: DirectorSettings,
}

impl Config {
    /// Load configuration from TOML with command-line overrides
    ///
    /// `toml_path = None` uses the platform default location. A missing
    /// file logs a warning and falls back to defaults; an unreadable or
    /// malformed file is an error.
    pub fn load(toml_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let path = toml_path
            .map(Path::to_path_buf)
            .or_else(cuedeck_common::config::default_bootstrap_path);

        let toml_config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Failed to read config file {:?}: {}", path, e))
                })?;
                let parsed = Self::parse_toml(&content)?;
                info!("Loaded TOML configuration from {:?}", path);
                parsed
            }
            Some(path) => {
                warn!("Config file {:?} not found, using built-in defaults", path);
                TomlConfig::default_values()
            }
            None => {
                warn!("No config directory on this platform, using built-in defaults");
                TomlConfig::default_values()
            }
        };

        Ok(Self::from_toml(toml_config, overrides))
    }

    /// Parse TOML bootstrap content
    pub fn parse_toml(content: &str) -> Result<TomlConfig> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Apply overrides on top of parsed TOML
    pub fn from_toml(toml_config: TomlConfig, overrides: ConfigOverrides) -> Self {
        let mut logging = toml_config.logging;
        if let Some(level) = overrides.log_level {
            logging.level = level;
        }

        Self {
            music_config: overrides.music_config.or(toml_config.music_config),
            asset_root: overrides.asset_root.or(toml_config.asset_root),
            tick_rate_hz: toml_config.tick_rate_hz.clamp(1, 1000),
            logging,
            director: toml_config.director.validated(),
        }
    }
}

impl TomlConfig {
    /// Defaults as if an empty TOML file had been read
    pub fn default_values() -> Self {
        Self {
            tick_rate_hz: default_tick_rate(),
            ..Default::default()
        }
    }
}
