//! Ducking controller
//!
//! Lowers the primary video's own audio (track 0) while scene music is
//! audible and restores it afterwards.
//!
//! - Engaging snapshots the host volume once; the snapshot survives until the
//!   duck is released and is what the release restores.
//! - An unreadable host volume (unsupported platform, call failure) is
//!   treated as full volume. Write failures are logged and ignored.
//! - Every change starts a tween from the current interpolated value, so
//!   reversing mid-fade never jumps.

use super::channel::VolumeRamp;
use crate::config::DirectorSettings;
use crate::host::{VideoHost, PRIMARY_AUDIO_TRACK};
use chrono::Utc;
use cuedeck_common::events::{DirectorEvent, EventBus};
use serde::Serialize;
use tracing::debug;

/// Snapshot used when the host cannot report its volume
const FALLBACK_VOLUME: f32 = 1.0;

/// Observable ducking state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DuckState {
    pub engaged: bool,
    /// Pre-duck host volume, valid while engaged
    pub snapshot: Option<f32>,
    /// Audible scene channels seen by the last evaluation
    pub audible_scene_channels: usize,
}

/// Drives the host's audio track volume
#[derive(Debug, Clone, Default)]
pub struct DuckingController {
    state: DuckState,
    tween: Option<VolumeRamp>,
}

impl DuckingController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether ducking should be engaged
    ///
    /// Engaged iff ducking is enabled, at least one scene channel is audible
    /// and the overlay is not active. Calling again with unchanged inputs
    /// changes nothing.
    pub fn evaluate(
        &mut self,
        audible_scene_channels: usize,
        overlay_active: bool,
        settings: &DirectorSettings,
        host: &dyn VideoHost,
        events: &EventBus,
    ) {
        self.state.audible_scene_channels = audible_scene_channels;
        let wanted = settings.enable_ducking && audible_scene_channels > 0 && !overlay_active;

        if wanted && !self.state.engaged {
            self.engage(settings, host, events);
        } else if !wanted && self.state.engaged {
            self.release(settings, host, events);
        }
    }

    /// Release unconditionally (overlay took over)
    pub fn force_release(
        &mut self,
        settings: &DirectorSettings,
        host: &dyn VideoHost,
        events: &EventBus,
    ) {
        if self.state.engaged {
            self.release(settings, host, events);
        }
    }

    /// Step the tween and write the result to the host
    pub fn apply(&mut self, dt: f64, host: &mut dyn VideoHost) {
        let Some(tween) = self.tween.as_mut() else {
            return;
        };

        let volume = tween.advance(dt);
        if let Err(e) = host.set_audio_volume(PRIMARY_AUDIO_TRACK, volume) {
            debug!("Host volume write failed: {}", e);
        }
        if tween.is_complete() {
            self.tween = None;
        }
    }

    pub fn state(&self) -> &DuckState {
        &self.state
    }

    pub fn is_engaged(&self) -> bool {
        self.state.engaged
    }

    /// A tween is still moving the host volume
    pub fn is_tweening(&self) -> bool {
        self.tween.is_some()
    }

    fn engage(&mut self, settings: &DirectorSettings, host: &dyn VideoHost, events: &EventBus) {
        // Mid-release the host reads a partly restored value; the release
        // target is the real pre-duck level.
        let snapshot = match self.tween {
            Some(tween) => tween.target(),
            None => read_host_volume(host),
        };
        let current = self.current_volume(host);
        let target = settings.duck_to.clamp(0.0, 1.0);

        self.tween = Some(VolumeRamp::new(
            current,
            target,
            settings.duck_fade,
            settings.fade_curve,
        ));
        self.state.engaged = true;
        self.state.snapshot = Some(snapshot);

        debug!("Ducking engaged: {:.2} -> {:.2}", snapshot, target);
        events.emit_lossy(DirectorEvent::DuckEngaged {
            snapshot,
            target,
            timestamp: Utc::now(),
        });
    }

    fn release(&mut self, settings: &DirectorSettings, host: &dyn VideoHost, events: &EventBus) {
        let restore_to = self.state.snapshot.take().unwrap_or(FALLBACK_VOLUME);
        let current = self.current_volume(host);

        self.tween = Some(VolumeRamp::new(
            current,
            restore_to,
            settings.duck_fade,
            settings.fade_curve,
        ));
        self.state.engaged = false;

        debug!("Ducking released: restoring {:.2}", restore_to);
        events.emit_lossy(DirectorEvent::DuckReleased {
            restore_to,
            timestamp: Utc::now(),
        });
    }

    fn current_volume(&self, host: &dyn VideoHost) -> f32 {
        match self.tween {
            Some(tween) => tween.value(),
            None => read_host_volume(host),
        }
    }
}

fn read_host_volume(host: &dyn VideoHost) -> f32 {
    match host.audio_volume(PRIMARY_AUDIO_TRACK) {
        Ok(v) if v > 0.0 => v.min(1.0),
        Ok(_) => FALLBACK_VOLUME,
        Err(e) => {
            debug!("Host volume unreadable ({}), assuming full volume", e);
            FALLBACK_VOLUME
        }
    }
}
