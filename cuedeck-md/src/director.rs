//! Music director
//!
//! The one service object that owns the mix. Hosts construct it once and
//! call [`MusicDirector::tick`] from their frame loop. Everything is
//! single-threaded and cooperative: clip loads are the only suspension points
//! and are polled, never awaited.
//!
//! # Tick order
//!
//! 1. Drain scene-load announcements (auto-apply)
//! 2. Resolve finished cue loads
//! 3. Scheduler trigger evaluation (starts suppressed while overlay is active)
//! 4. Fade and playhead advancement, channel release
//! 5. Ducking evaluation
//! 6. Overlay evaluation and playlist service
//! 7. One-shot starts
//! 8. Ducking tween written to the host

use crate::config::DirectorSettings;
use crate::host::VideoHost;
use crate::loader::ClipLoader;
use crate::playback::{
    ChannelId, ChannelNotice, ChannelPool, ChannelRole, CrossfadeMixer, CueAction, CuePhase,
    CueScheduler, DuckState, DuckingController, Loan, MixContext, OneShotPlayer,
    OverlayArbitrator, OverlayState, OverlayTransition,
};
use crate::scene::{SceneSignals, SceneSubscription};
use chrono::Utc;
use cuedeck_common::config::{CueDefinition, MusicConfigProvider};
use cuedeck_common::events::{DirectorEvent, EventBus};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

/// Read-only view of one scheduled cue
#[derive(Debug, Clone, Serialize)]
pub struct CueSnapshot {
    pub index: usize,
    pub locator: String,
    pub phase: CuePhase,
    pub channel: Option<ChannelId>,
}

/// Read-only view of one channel
#[derive(Debug, Clone, Serialize)]
pub struct ChannelSnapshot {
    pub id: ChannelId,
    pub role: ChannelRole,
    pub loan: Loan,
    pub locator: Option<String>,
    pub volume: f32,
    pub target_volume: f32,
    pub playing: bool,
    pub looping: bool,
    pub suspended: bool,
    pub position: f64,
}

/// Director state for HUD/debug views
#[derive(Debug, Clone, Serialize)]
pub struct DirectorSnapshot {
    pub scene: Option<String>,
    pub activation_id: Uuid,
    /// Unscaled seconds since the director was created
    pub clock_secs: f64,
    pub timeline_position: Option<f64>,
    pub cues: Vec<CueSnapshot>,
    pub channels: Vec<ChannelSnapshot>,
    pub duck: DuckState,
    pub overlay: OverlayState,
    pub loads_in_flight: usize,
}

/// Audio cue scheduling and mix-control engine
pub struct MusicDirector {
    settings: DirectorSettings,
    config: MusicConfigProvider,
    loader: Arc<dyn ClipLoader>,
    events: EventBus,
    pool: ChannelPool,
    scheduler: CueScheduler,
    mixer: CrossfadeMixer,
    ducking: DuckingController,
    overlay: OverlayArbitrator,
    one_shots: OneShotPlayer,
    scene_subscription: Option<SceneSubscription>,
    clock: f64,
    last_position: Option<f64>,
}

impl MusicDirector {
    /// Create a director with no active scene
    ///
    /// The overlay playlist is taken from the music configuration now;
    /// [`reload_config`](Self::reload_config) refreshes it.
    pub fn new(
        settings: DirectorSettings,
        config: MusicConfigProvider,
        loader: Arc<dyn ClipLoader>,
        events: EventBus,
    ) -> Self {
        let settings = settings.validated();
        let playlist = config.load().global_playlist();
        info!(
            "Music director ready: {} scene channel(s), {} playlist entr{}",
            settings.scene_channels,
            playlist.len(),
            if playlist.len() == 1 { "y" } else { "ies" }
        );

        Self {
            pool: ChannelPool::new(settings.scene_channels),
            settings,
            config,
            loader,
            events,
            scheduler: CueScheduler::new(),
            mixer: CrossfadeMixer::new(),
            ducking: DuckingController::new(),
            overlay: OverlayArbitrator::new(playlist),
            one_shots: OneShotPlayer::new(),
            scene_subscription: None,
            clock: 0.0,
            last_position: None,
        }
    }

    /// Activate the cue list configured for `scene`
    ///
    /// A scene without a cue list activates as empty: whatever was playing
    /// fades out.
    pub fn activate_scene(&mut self, scene: &str) -> Uuid {
        let config = self.config.load();
        if config.scene(scene).is_none() {
            debug!("Scene '{}' has no music configuration", scene);
        }
        let cues = config.scene_cues(scene);
        self.activate_cues(scene, cues)
    }

    /// Replace the active cue list
    ///
    /// Cancels every in-flight load and returns every scene-channel loan
    /// before the new cues exist. Channels still sounding fade out over
    /// `default_stop_fade` without an owner.
    pub fn activate_cues(&mut self, scene: &str, cues: Vec<CueDefinition>) -> Uuid {
        let cancelled = self.mixer.cancel_all();
        let curve = self.settings.fade_curve;

        let scene_ids: Vec<ChannelId> = self.pool.scene_ids().collect();
        for id in scene_ids {
            self.pool.release(id);
            let channel = self.pool.channel_mut(id);
            if !channel.has_clip() {
                continue;
            }
            if !channel.is_playing() {
                channel.stop();
            } else if !channel.is_stopping() {
                channel.fade_out_and_stop(self.settings.default_stop_fade, curve);
            }
        }

        let cue_count = cues.len();
        let activation_id = self.scheduler.activate(scene, cues);

        info!(
            "Activated scene '{}' ({} cue(s), {} load(s) cancelled)",
            scene, cue_count, cancelled
        );
        self.events.emit_lossy(DirectorEvent::SceneActivated {
            activation_id,
            scene: scene.to_string(),
            cue_count,
            timestamp: Utc::now(),
        });

        activation_id
    }

    /// Run one director pass
    ///
    /// `dt` is unscaled frame time; fades advance by it even while the video
    /// is paused.
    pub fn tick(&mut self, host: &mut dyn VideoHost, dt: Duration) {
        let dt = dt.as_secs_f64();
        self.clock += dt;

        self.apply_scene_signals();

        let position = host.is_ready().then(|| host.position());
        self.last_position = position;
        let overlay_active = self.overlay.is_active();

        {
            let mut ctx = MixContext {
                pool: &mut self.pool,
                scheduler: &mut self.scheduler,
                events: &self.events,
                settings: &self.settings,
                now: self.clock,
                position,
                suspended: overlay_active,
            };

            self.mixer.poll_loads(&mut ctx);

            for action in ctx.scheduler.advance(position, overlay_active) {
                match action {
                    CueAction::Start(index) => {
                        self.mixer.start_cue(index, self.loader.as_ref(), &mut ctx)
                    }
                    CueAction::Stop(index) => self.mixer.stop_cue(index, &mut ctx),
                }
            }

            for notice in ctx.pool.advance(dt) {
                let id = notice.channel();
                match ctx.pool.channel(id).role() {
                    ChannelRole::Scene => self.mixer.channel_finished(id, &mut ctx),
                    ChannelRole::Overlay => {
                        if let ChannelNotice::Ended(_) = notice {
                            self.overlay.track_ended();
                        }
                    }
                    ChannelRole::OneShot => self.one_shots.channel_finished(&mut *ctx.pool),
                }
            }
        }

        let epsilon = self.settings.audible_epsilon;
        self.ducking.evaluate(
            self.pool.audible_scene_count(epsilon),
            self.overlay.is_active(),
            &self.settings,
            &*host,
            &self.events,
        );

        match self.overlay.evaluate(self.clock, &*host, &self.settings) {
            OverlayTransition::Activate(reason) => {
                self.overlay
                    .activate(reason, &mut self.pool, &self.settings, &self.events);
                self.ducking
                    .force_release(&self.settings, &*host, &self.events);
            }
            OverlayTransition::Deactivate => {
                self.overlay
                    .deactivate(&mut self.pool, &self.settings, &self.events);
                self.ducking.evaluate(
                    self.pool.audible_scene_count(epsilon),
                    false,
                    &self.settings,
                    &*host,
                    &self.events,
                );
            }
            OverlayTransition::Retarget(reason) => {
                self.overlay.retarget(reason, &mut self.pool, &self.settings)
            }
            OverlayTransition::Unchanged => {}
        }
        self.overlay.service(
            &mut self.pool,
            self.loader.as_ref(),
            &self.settings,
            &self.events,
        );

        self.one_shots.poll(&mut self.pool, &self.events);
        self.ducking.apply(dt, host);
    }

    /// Play `locator` once on the one-shot channel
    pub fn play_one_shot(&mut self, locator: &str, volume: f32) -> bool {
        self.one_shots
            .play_one_shot(locator, volume, self.loader.as_ref())
    }

    /// Play a named snippet from the music configuration
    pub fn play_snippet(&mut self, name: &str) -> bool {
        let config = self.config.load();
        self.one_shots
            .play_snippet(name, &config, self.loader.as_ref())
    }

    /// Listen for scene-load announcements
    ///
    /// Replaces (and thereby unregisters) any previous binding.
    pub fn bind_scene_signals(&mut self, signals: &SceneSignals) {
        self.scene_subscription = Some(signals.subscribe());
    }

    /// Stop listening for scene-load announcements
    pub fn unbind_scene_signals(&mut self) {
        self.scene_subscription = None;
    }

    /// Re-read music.json and refresh the overlay playlist
    pub fn reload_config(&mut self) {
        self.config.invalidate();
        let playlist = self.config.load().global_playlist();
        debug!("Reloaded music configuration ({} playlist entries)", playlist.len());
        self.overlay.set_playlist(playlist);
    }

    /// Silence everything and restore the host volume
    pub fn shutdown(&mut self, host: &mut dyn VideoHost) {
        self.mixer.cancel_all();
        let ids: Vec<ChannelId> = self.pool.channels().iter().map(|c| c.id()).collect();
        for id in ids {
            self.pool.channel_mut(id).stop();
            self.pool.release(id);
        }
        self.scheduler.clear();
        self.scene_subscription = None;

        self.ducking
            .force_release(&self.settings, &*host, &self.events);
        self.ducking.apply(self.settings.duck_fade, host);
        info!("Music director shut down");
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DirectorEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn settings(&self) -> &DirectorSettings {
        &self.settings
    }

    pub fn pool(&self) -> &ChannelPool {
        &self.pool
    }

    pub fn scheduler(&self) -> &CueScheduler {
        &self.scheduler
    }

    pub fn duck_state(&self) -> &DuckState {
        self.ducking.state()
    }

    pub fn overlay_state(&self) -> &OverlayState {
        self.overlay.state()
    }

    /// Phase of cue `index` in the active scene
    pub fn cue_phase(&self, index: usize) -> Option<CuePhase> {
        self.scheduler.cue(index).map(|c| c.phase)
    }

    /// Channel held by cue `index` in the active scene
    pub fn cue_channel(&self, index: usize) -> Option<ChannelId> {
        self.scheduler.cue(index).and_then(|c| c.channel)
    }

    /// Unscaled seconds since creation
    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn snapshot(&self) -> DirectorSnapshot {
        DirectorSnapshot {
            scene: self.scheduler.scene().map(str::to_string),
            activation_id: self.scheduler.activation_id(),
            clock_secs: self.clock,
            timeline_position: self.last_position,
            cues: self
                .scheduler
                .cues()
                .iter()
                .map(|c| CueSnapshot {
                    index: c.key.index,
                    locator: c.definition.locator.clone(),
                    phase: c.phase,
                    channel: c.channel,
                })
                .collect(),
            channels: self
                .pool
                .channels()
                .iter()
                .map(|c| ChannelSnapshot {
                    id: c.id(),
                    role: c.role(),
                    loan: c.loan(),
                    locator: c.clip().map(|clip| clip.locator().to_string()),
                    volume: c.volume(),
                    target_volume: c.target_volume(),
                    playing: c.is_playing(),
                    looping: c.is_looping(),
                    suspended: c.is_suspended(),
                    position: c.position(),
                })
                .collect(),
            duck: self.ducking.state().clone(),
            overlay: self.overlay.state().clone(),
            loads_in_flight: self.mixer.in_flight()
                + self.one_shots.in_flight()
                + usize::from(self.overlay.is_loading()),
        }
    }

    fn apply_scene_signals(&mut self) {
        let Some(subscription) = self.scene_subscription.as_mut() else {
            return;
        };
        let scenes = subscription.drain();
        if scenes.is_empty() {
            return;
        }

        if !self.settings.auto_apply_on_scene_load {
            debug!("Ignoring {} scene announcement(s): auto-apply disabled", scenes.len());
            return;
        }
        for scene in scenes {
            self.activate_scene(&scene);
        }
    }
}

impl std::fmt::Debug for MusicDirector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MusicDirector")
            .field("scene", &self.scheduler.scene())
            .field("clock", &self.clock)
            .field("mixer", &self.mixer)
            .field("duck", self.ducking.state())
            .field("overlay", self.overlay.state())
            .finish()
    }
}
