//! CueDeck Music Director library
//!
//! Audio cue scheduling and mix control for interactive video: per-scene
//! music cues keyed to the video timeline, crossfaded scene channels, ducking
//! of the video's own audio, and an ambient playlist overlay while the video
//! is paused or fast-forwarding.
//!
//! The host owns the frame loop and the video player; it implements
//! [`host::VideoHost`], picks a [`loader::ClipLoader`] and calls
//! [`director::MusicDirector::tick`] once per frame.

pub mod config;
pub mod director;
pub mod error;
pub mod host;
pub mod loader;
pub mod playback;
pub mod scene;

pub use config::{Config, ConfigOverrides, DirectorSettings};
pub use director::{DirectorSnapshot, MusicDirector};
pub use error::{Error, HostError, Result};
pub use host::{SimulatedHost, VideoHost};
pub use loader::{ClipBuffer, ClipLoader, LoadHandle, ManualLoader, StandardClipLoader};
pub use scene::{SceneSignals, SceneSubscription};
