//! Playlist overlay arbitrator
//!
//! While the primary video is paused (or crawling) or fast-forwarding, scene
//! cues step aside and an ambient playlist plays on the overlay channel.
//!
//! ```text
//! Inactive ──wants overlay──> Active ──normal playback──> Inactive
//! ```
//!
//! Activation suspends sounding scene channels in place (fade to 0, then hold
//! the playhead) and starts or resumes the playlist. Deactivation fades and
//! pauses the overlay track and brings the suspended scene channels back to
//! their configured volume. Playlist entries that fail to load are skipped;
//! once every entry has failed in a row the arbitrator stops asking until the
//! next activation.

use super::channel::{ChannelId, ChannelPool, Loan};
use crate::config::DirectorSettings;
use crate::host::VideoHost;
use crate::loader::{ClipLoader, LoadHandle, LoadPoll};
use chrono::Utc;
use cuedeck_common::config::CueDefinition;
use cuedeck_common::events::{DirectorEvent, EventBus, OverlayReason};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Playback rate at or below which the video counts as paused
const STALLED_RATE: f32 = 0.01;

/// Smallest target change worth a re-fade
const RETARGET_THRESHOLD: f32 = 0.01;

/// Observable overlay state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverlayState {
    pub active: bool,
    pub reason: Option<OverlayReason>,
    pub target_volume: f32,
    /// Next (or current) playlist entry
    pub playlist_index: usize,
    /// Overlay channel while active
    pub channel: Option<ChannelId>,
    /// Every playlist entry failed; no retries until reactivation
    pub exhausted: bool,
}

/// Outcome of one overlay evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayTransition {
    Unchanged,
    Activate(OverlayReason),
    Deactivate,
    /// Still active, reason changed
    Retarget(OverlayReason),
}

/// Overlay state machine and playlist player
#[derive(Debug, Default)]
pub struct OverlayArbitrator {
    state: OverlayState,
    playlist: Vec<CueDefinition>,
    pending: Option<(usize, LoadHandle)>,
    consecutive_failures: usize,
    /// Debounce: the differing decision and when it was first seen
    candidate: Option<(bool, f64)>,
}

impl OverlayArbitrator {
    pub fn new(playlist: Vec<CueDefinition>) -> Self {
        Self {
            playlist,
            ..Default::default()
        }
    }

    /// Replace the playlist and restart from its first entry
    pub fn set_playlist(&mut self, playlist: Vec<CueDefinition>) {
        self.playlist = playlist;
        self.pending = None;
        self.consecutive_failures = 0;
        self.state.playlist_index = 0;
        self.state.exhausted = false;
    }

    /// Why the overlay should be active right now, if it should
    pub fn desired_reason(host: &dyn VideoHost, settings: &DirectorSettings) -> Option<OverlayReason> {
        if !settings.enable_playlist_overlay || !host.is_ready() {
            return None;
        }

        let rate = host.playback_rate();
        let paused = host.is_paused() || rate <= STALLED_RATE;
        let wants_pause = settings.overlay_on_pause && paused;
        let wants_fast = rate > settings.fast_forward_threshold;

        // Fast-forward wins when both hold
        if wants_fast {
            Some(OverlayReason::FastForward)
        } else if wants_pause {
            Some(OverlayReason::Paused)
        } else {
            None
        }
    }

    /// Overlay volume for `reason`
    pub fn volume_for(reason: OverlayReason, settings: &DirectorSettings) -> f32 {
        let base = match reason {
            OverlayReason::Paused => settings.overlay_pause_volume,
            OverlayReason::FastForward => settings.overlay_fast_volume,
        };
        (base * settings.overlay_volume_multiplier).clamp(0.0, 1.0)
    }

    /// Compare the host's playback state with the current mode
    ///
    /// An empty playlist never activates the overlay and ends an active one.
    /// With `overlay_debounce_secs > 0` a new decision must hold that long
    /// (director clock `now`) before it is reported.
    pub fn evaluate(
        &mut self,
        now: f64,
        host: &dyn VideoHost,
        settings: &DirectorSettings,
    ) -> OverlayTransition {
        // Nothing to play: scene music keeps sounding
        if self.playlist.is_empty() {
            self.candidate = None;
            return if self.state.active {
                OverlayTransition::Deactivate
            } else {
                OverlayTransition::Unchanged
            };
        }

        let desired = Self::desired_reason(host, settings);
        let wants = desired.is_some();

        if wants == self.state.active {
            self.candidate = None;
            return match desired {
                Some(reason) if self.state.reason != Some(reason) => {
                    OverlayTransition::Retarget(reason)
                }
                _ => OverlayTransition::Unchanged,
            };
        }

        if settings.overlay_debounce_secs > 0.0 {
            let since = match self.candidate {
                Some((candidate, since)) if candidate == wants => since,
                _ => {
                    self.candidate = Some((wants, now));
                    now
                }
            };
            if now - since < settings.overlay_debounce_secs {
                return OverlayTransition::Unchanged;
            }
        }

        self.candidate = None;
        match desired {
            Some(reason) => OverlayTransition::Activate(reason),
            None => OverlayTransition::Deactivate,
        }
    }

    /// Enter overlay mode
    pub fn activate(
        &mut self,
        reason: OverlayReason,
        pool: &mut ChannelPool,
        settings: &DirectorSettings,
        events: &EventBus,
    ) {
        let target = Self::volume_for(reason, settings);
        let curve = settings.fade_curve;

        self.state.active = true;
        self.state.reason = Some(reason);
        self.state.target_volume = target;
        self.state.exhausted = false;
        self.consecutive_failures = 0;

        let scene_ids: Vec<ChannelId> = pool.scene_ids().collect();
        for id in scene_ids {
            let channel = pool.channel_mut(id);
            if channel.has_clip() && channel.is_playing() && !channel.is_stopping() {
                channel.suspend(settings.overlay_fade, curve);
            }
        }

        let overlay = pool.overlay_id();
        if pool.channel(overlay).loan() == Loan::Free {
            if let Err(e) = pool.loan(overlay, Loan::Overlay) {
                warn!("Overlay channel unavailable: {}", e);
            }
        }
        self.state.channel = Some(overlay);

        if pool.channel(overlay).has_clip() {
            pool.channel_mut(overlay)
                .resume(target, settings.overlay_fade, curve);
        }

        info!("Playlist overlay activated ({:?}, volume {:.2})", reason, target);
        events.emit_lossy(DirectorEvent::OverlayActivated {
            reason,
            target_volume: target,
            timestamp: Utc::now(),
        });
    }

    /// Leave overlay mode and hand back to scene cues
    pub fn deactivate(&mut self, pool: &mut ChannelPool, settings: &DirectorSettings, events: &EventBus) {
        let curve = settings.fade_curve;

        self.state.active = false;
        self.state.reason = None;
        self.pending = None;

        let overlay = pool.overlay_id();
        if pool.channel(overlay).has_clip() {
            pool.channel_mut(overlay).suspend(settings.overlay_fade, curve);
        }
        pool.release(overlay);
        self.state.channel = None;

        let scene_ids: Vec<ChannelId> = pool.scene_ids().collect();
        for id in scene_ids {
            let channel = pool.channel_mut(id);
            if channel.has_clip() && channel.is_suspended() {
                let volume = channel.configured_volume();
                channel.resume(volume, settings.overlay_fade, curve);
            }
        }

        info!("Playlist overlay deactivated");
        events.emit_lossy(DirectorEvent::OverlayDeactivated {
            timestamp: Utc::now(),
        });
    }

    /// Switch between pause and fast-forward volume while active
    pub fn retarget(&mut self, reason: OverlayReason, pool: &mut ChannelPool, settings: &DirectorSettings) {
        self.state.reason = Some(reason);
        let target = Self::volume_for(reason, settings);
        if (target - self.state.target_volume).abs() <= RETARGET_THRESHOLD {
            return;
        }

        debug!(
            "Overlay retarget {:?}: {:.2} -> {:.2}",
            reason, self.state.target_volume, target
        );
        self.state.target_volume = target;

        let overlay = pool.channel_mut(pool.overlay_id());
        if overlay.has_clip() && overlay.is_playing() {
            overlay.fade_to(target, settings.overlay_fade, settings.fade_curve);
        }
    }

    /// Keep a playlist track on the overlay channel while active
    pub fn service(
        &mut self,
        pool: &mut ChannelPool,
        loader: &dyn ClipLoader,
        settings: &DirectorSettings,
        events: &EventBus,
    ) {
        if !self.state.active || self.state.exhausted || self.playlist.is_empty() {
            return;
        }

        let overlay = pool.overlay_id();
        let len = self.playlist.len();

        loop {
            if let Some((index, handle)) = self.pending.as_mut() {
                let index = *index;
                match handle.poll() {
                    LoadPoll::Pending => return,
                    LoadPoll::Ready(Ok(clip)) => {
                        self.pending = None;
                        self.consecutive_failures = 0;
                        let locator = clip.locator().to_string();
                        pool.channel_mut(overlay).play(
                            clip,
                            false,
                            self.state.target_volume,
                            settings.overlay_fade,
                            settings.fade_curve,
                        );
                        debug!("Overlay playing playlist entry {} ({})", index, locator);
                        events.emit_lossy(DirectorEvent::PlaylistTrackStarted {
                            index,
                            locator,
                            timestamp: Utc::now(),
                        });
                        return;
                    }
                    LoadPoll::Ready(Err(e)) => {
                        self.pending = None;
                        self.consecutive_failures += 1;
                        self.state.playlist_index = (index + 1) % len;
                        warn!("Skipping playlist entry {}: {}", index, e);
                        events.emit_lossy(DirectorEvent::PlaylistTrackSkipped {
                            index,
                            locator: self.playlist[index].locator.clone(),
                            reason: e.to_string(),
                            timestamp: Utc::now(),
                        });

                        if self.consecutive_failures >= len {
                            warn!(
                                "All {} playlist entries failed, overlay stays silent until reactivated",
                                len
                            );
                            self.state.exhausted = true;
                            return;
                        }
                        continue;
                    }
                }
            }

            if pool.channel(overlay).has_clip() {
                return;
            }

            let index = self.state.playlist_index % len;
            let locator = &self.playlist[index].locator;
            debug!("Overlay requesting playlist entry {} ({})", index, locator);
            self.pending = Some((index, loader.load(locator)));
        }
    }

    /// The overlay track played to its end
    pub fn track_ended(&mut self) {
        if !self.playlist.is_empty() {
            self.state.playlist_index = (self.state.playlist_index + 1) % self.playlist.len();
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    pub fn playlist(&self) -> &[CueDefinition] {
        &self.playlist
    }

    /// Playlist load in flight
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }
}
