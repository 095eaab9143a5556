//! Music project configuration
//!
//! Models `music.json`: per-scene cue lists, the optional global ambient
//! playlist and named one-shot snippets. Field names on disk follow the
//! camelCase schema content authors already write; the director works on the
//! typed [`CueDefinition`] produced from each [`MusicCue`].
//!
//! # Resolution order
//!
//! 1. Explicit path (command line or bootstrap TOML)
//! 2. `CUEDECK_MUSIC_CONFIG` environment variable
//! 3. Persistent data directory (`<data_local_dir>/cuedeck/music.json`)
//! 4. Bundled asset directory (`<asset_root>/music.json`)
//!
//! A missing or malformed file is never fatal: the provider logs a warning and
//! hands out an empty configuration, which the director treats as "no cues".

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Environment variable consulted for an explicit music.json path
pub const MUSIC_CONFIG_ENV: &str = "CUEDECK_MUSIC_CONFIG";

/// File name looked up in the persistent and bundled directories
pub const MUSIC_CONFIG_FILE: &str = "music.json";

/// Reserved scene names whose cue lists double as the global playlist
pub const GLOBAL_PLAYLIST_SCENES: [&str; 2] = ["_GLOBAL_", "_PLAYLIST_"];

/// Root of music.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MusicProjectConfig {
    /// Per-scene cue lists
    pub scenes: Vec<SceneMusicConfig>,

    /// Optional global playlist used by the pause/fast-forward overlay
    pub playlist: Vec<MusicCue>,

    /// Named one-shot sounds
    pub snippets: HashMap<String, SnippetDef>,
}

/// Cue list for one scene
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneMusicConfig {
    pub name: String,
    pub cues: Vec<MusicCue>,
}

/// One cue as written in music.json
///
/// Negative times mean "unset".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MusicCue {
    /// Path, Windows drive path, file:/// URL or http(s) URL
    pub file: String,
    pub start_on_scene_load: bool,
    pub start_at_video_time: f64,
    pub stop_at_video_time: f64,
    pub volume: f32,
    pub fade_in: f64,
    pub fade_out: f64,
    #[serde(rename = "loop")]
    pub looping: bool,
}

impl Default for MusicCue {
    fn default() -> Self {
        Self {
            file: String::new(),
            start_on_scene_load: false,
            start_at_video_time: -1.0,
            stop_at_video_time: -1.0,
            volume: 1.0,
            fade_in: 0.75,
            fade_out: 0.75,
            looping: true,
        }
    }
}

/// Named one-shot sound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnippetDef {
    pub file: String,
    pub volume: f32,
}

impl Default for SnippetDef {
    fn default() -> Self {
        Self {
            file: String::new(),
            volume: 1.0,
        }
    }
}

/// When a cue starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CueTrigger {
    /// As soon as the scene is activated
    OnSceneLoad,

    /// Once the timeline reaches the given position (seconds)
    AtTimelinePosition(f64),
}

/// Static definition of a scene cue
///
/// Immutable once loaded; the scheduler pairs it with runtime state.
#[derive(Debug, Clone, PartialEq)]
pub struct CueDefinition {
    /// Resource locator handed to the clip loader
    pub locator: String,

    /// Loop the clip until stopped
    pub looping: bool,

    /// Base volume (0.0-1.0)
    pub volume: f32,

    /// Fade-in duration in seconds
    pub fade_in: f64,

    /// Fade-out duration in seconds
    pub fade_out: f64,

    /// Start condition; `None` never starts
    pub trigger: Option<CueTrigger>,

    /// Timeline position (seconds) at which the cue fades out
    pub stop_at: Option<f64>,
}

impl CueDefinition {
    /// Create a looping full-volume cue with no trigger
    pub fn new<S: Into<String>>(locator: S) -> Self {
        Self {
            locator: locator.into(),
            looping: true,
            volume: 1.0,
            fade_in: 0.75,
            fade_out: 0.75,
            trigger: None,
            stop_at: None,
        }
    }

    /// Start when the scene activates
    pub fn on_scene_load(mut self) -> Self {
        self.trigger = Some(CueTrigger::OnSceneLoad);
        self
    }

    /// Start when the timeline reaches `seconds`
    pub fn at(mut self, seconds: f64) -> Self {
        self.trigger = Some(CueTrigger::AtTimelinePosition(seconds));
        self
    }

    /// Fade out when the timeline reaches `seconds`
    pub fn stop_at(mut self, seconds: f64) -> Self {
        self.stop_at = (seconds > 0.0).then_some(seconds);
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    pub fn with_fade_in(mut self, seconds: f64) -> Self {
        self.fade_in = seconds.max(0.0);
        self
    }

    pub fn with_fade_out(mut self, seconds: f64) -> Self {
        self.fade_out = seconds.max(0.0);
        self
    }

    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
}

impl From<&MusicCue> for CueDefinition {
    fn from(cue: &MusicCue) -> Self {
        let trigger = if cue.start_on_scene_load {
            Some(CueTrigger::OnSceneLoad)
        } else if cue.start_at_video_time >= 0.0 {
            Some(CueTrigger::AtTimelinePosition(cue.start_at_video_time))
        } else {
            None
        };

        Self {
            locator: cue.file.trim().to_string(),
            looping: cue.looping,
            volume: cue.volume.clamp(0.0, 1.0),
            fade_in: cue.fade_in.max(0.0),
            fade_out: cue.fade_out.max(0.0),
            trigger,
            stop_at: (cue.stop_at_video_time > 0.0).then_some(cue.stop_at_video_time),
        }
    }
}

impl MusicProjectConfig {
    /// Parse music.json content
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a music.json file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Find a scene by name (case-insensitive)
    pub fn scene(&self, name: &str) -> Option<&SceneMusicConfig> {
        self.scenes
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Typed cue list for a scene; empty when the scene is not configured
    pub fn scene_cues(&self, name: &str) -> Vec<CueDefinition> {
        self.scene(name)
            .map(|s| s.cues.iter().map(CueDefinition::from).collect())
            .unwrap_or_default()
    }

    /// Ambient playlist for the overlay
    ///
    /// The explicit `playlist` wins; otherwise the cue list of a reserved
    /// `_GLOBAL_` / `_PLAYLIST_` scene is used.
    pub fn global_playlist(&self) -> Vec<CueDefinition> {
        if !self.playlist.is_empty() {
            return self.playlist.iter().map(CueDefinition::from).collect();
        }

        GLOBAL_PLAYLIST_SCENES
            .iter()
            .find_map(|name| self.scene(name).filter(|s| !s.cues.is_empty()))
            .map(|s| s.cues.iter().map(CueDefinition::from).collect())
            .unwrap_or_default()
    }

    /// Look up a named snippet
    pub fn snippet(&self, name: &str) -> Option<&SnippetDef> {
        self.snippets.get(name)
    }
}

/// Locates music.json following the documented priority order
#[derive(Debug, Clone, Default)]
pub struct MusicConfigResolver {
    explicit: Option<PathBuf>,
    persistent_dir: Option<PathBuf>,
    bundled_dir: Option<PathBuf>,
}

impl MusicConfigResolver {
    /// Resolver using the platform data directory and `asset_root`
    pub fn new(asset_root: Option<PathBuf>) -> Self {
        Self {
            explicit: None,
            persistent_dir: default_persistent_dir(),
            bundled_dir: asset_root,
        }
    }

    /// Highest-priority path (CLI or TOML)
    pub fn with_explicit(mut self, path: Option<PathBuf>) -> Self {
        self.explicit = path;
        self
    }

    /// Override the persistent data directory
    pub fn with_persistent_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.persistent_dir = dir;
        self
    }

    /// Candidate paths in priority order
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        if let Some(path) = &self.explicit {
            out.push(path.clone());
        }
        if let Ok(path) = std::env::var(MUSIC_CONFIG_ENV) {
            if !path.trim().is_empty() {
                out.push(PathBuf::from(path));
            }
        }
        if let Some(dir) = &self.persistent_dir {
            out.push(dir.join(MUSIC_CONFIG_FILE));
        }
        if let Some(dir) = &self.bundled_dir {
            out.push(dir.join(MUSIC_CONFIG_FILE));
        }
        out
    }

    /// First candidate that exists on disk
    pub fn resolve(&self) -> Option<PathBuf> {
        self.candidates().into_iter().find(|p| p.is_file())
    }
}

/// Platform default for user-writable music.json overrides
pub fn default_persistent_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("cuedeck"))
}

/// Platform default location of the bootstrap TOML (`<config_dir>/cuedeck/cuedeck.toml`)
pub fn default_bootstrap_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cuedeck").join("cuedeck.toml"))
}

/// Shared loader/cache for music.json
///
/// The director and the one-shot player read the same configuration through
/// one provider, so an `invalidate()` is seen by both on their next `load()`.
#[derive(Debug, Clone)]
pub struct MusicConfigProvider {
    resolver: MusicConfigResolver,
    cached: Arc<RwLock<Option<Arc<MusicProjectConfig>>>>,
    fixed: Option<Arc<MusicProjectConfig>>,
}

impl MusicConfigProvider {
    pub fn new(resolver: MusicConfigResolver) -> Self {
        Self {
            resolver,
            cached: Arc::new(RwLock::new(None)),
            fixed: None,
        }
    }

    /// Provider that always returns the given configuration
    pub fn fixed(config: MusicProjectConfig) -> Self {
        let config = Arc::new(config);
        Self {
            resolver: MusicConfigResolver::default(),
            cached: Arc::new(RwLock::new(Some(Arc::clone(&config)))),
            fixed: Some(config),
        }
    }

    /// Cached configuration, loading it on first use
    pub fn load(&self) -> Arc<MusicProjectConfig> {
        if let Ok(guard) = self.cached.read() {
            if let Some(config) = guard.as_ref() {
                return Arc::clone(config);
            }
        }

        let config = Arc::new(self.load_uncached());
        if let Ok(mut guard) = self.cached.write() {
            *guard = Some(Arc::clone(&config));
        }
        config
    }

    /// Drop the cache; the next `load()` re-reads from disk
    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.cached.write() {
            *guard = None;
        }
    }

    fn load_uncached(&self) -> MusicProjectConfig {
        if let Some(config) = &self.fixed {
            return MusicProjectConfig::clone(config);
        }

        let Some(path) = self.resolver.resolve() else {
            info!("No music.json found, using empty music configuration");
            return MusicProjectConfig::default();
        };

        match MusicProjectConfig::load_from_path(&path) {
            Ok(config) => {
                info!(
                    "Loaded music configuration from {} ({} scenes, {} playlist entries)",
                    path.display(),
                    config.scenes.len(),
                    config.playlist.len()
                );
                config
            }
            Err(e) => {
                warn!("Failed to load music configuration {}: {}", path.display(), e);
                MusicProjectConfig::default()
            }
        }
    }
}

/// Read a required music.json, surfacing errors to the caller
pub fn load_music_config(path: &Path) -> Result<MusicProjectConfig> {
    if !path.exists() {
        return Err(Error::NotFound(format!("{}", path.display())));
    }
    MusicProjectConfig::load_from_path(path)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}
