//! Crossfade mixer
//!
//! Places triggered cues on scene channels. Starting a cue:
//! 1. Loans a free scene channel, never the one holding the most recently
//!    started cue while another is free (least recently used otherwise).
//! 2. Requests the clip and leaves the cue `Loading` with the loan held.
//! 3. On success ramps the new channel 0 → target over the cue's fade-in and
//!    fades every other sounding scene channel to 0 over the *outgoing* cue's
//!    fade-out; those channels are released once silent.
//! 4. On failure marks the cue `Failed` and returns the loan.
//!
//! If every scene channel is on loan, the least recently loaned one that is
//! not the newest cue's is reclaimed: its cue is stopped hard first.

use super::channel::{ChannelId, ChannelPool, CueKey, Loan};
use super::scheduler::{CuePhase, CueScheduler};
use crate::config::DirectorSettings;
use crate::error::{Error, Result};
use crate::loader::{ClipBuffer, ClipLoader, LoadHandle, LoadPoll};
use chrono::Utc;
use cuedeck_common::events::{DirectorEvent, EventBus};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Borrowed director state the mixer works on during one tick
pub struct MixContext<'a> {
    pub pool: &'a mut ChannelPool,
    pub scheduler: &'a mut CueScheduler,
    pub events: &'a EventBus,
    pub settings: &'a DirectorSettings,
    /// Director clock, unscaled seconds
    pub now: f64,
    /// Timeline position, `None` while the video is not ready
    pub position: Option<f64>,
    /// Overlay active: newly loaded cues start silent and paused
    pub suspended: bool,
}

struct PendingLoad {
    key: CueKey,
    channel: ChannelId,
    handle: LoadHandle,
    requested_at: f64,
}

/// Scene-channel allocation and crossfades
#[derive(Default)]
pub struct CrossfadeMixer {
    pending: Vec<PendingLoad>,
    last_started: Option<ChannelId>,
}

impl CrossfadeMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a channel for cue `index` and request its clip
    ///
    /// No-op unless the cue is `Idle`. An already resolved load completes
    /// immediately, so a cached clip reaches `Playing` in the same tick.
    pub fn start_cue(&mut self, index: usize, loader: &dyn ClipLoader, ctx: &mut MixContext<'_>) {
        let (key, locator) = match ctx.scheduler.cue(index) {
            Some(cue) if cue.phase == CuePhase::Idle => (cue.key, cue.definition.locator.clone()),
            _ => return,
        };

        let channel = match self.claim_channel(ctx) {
            Some(channel) => channel,
            None => {
                warn!("No scene channel available for cue {} ({})", index, locator);
                return;
            }
        };

        if let Err(e) = ctx.pool.loan(channel, Loan::Cue(key)) {
            warn!("Cue {} could not take {}: {}", index, channel, e);
            return;
        }

        if let Some(cue) = ctx.scheduler.cue_mut(index) {
            cue.phase = CuePhase::Loading;
            cue.channel = Some(channel);
        }

        debug!("Cue {} loading {} on {}", index, locator, channel);
        ctx.events.emit_lossy(DirectorEvent::CueLoading {
            activation_id: key.activation_id,
            cue_index: index,
            locator: locator.clone(),
            channel: channel.0,
            timestamp: Utc::now(),
        });

        let mut pending = PendingLoad {
            key,
            channel,
            handle: loader.load(&locator),
            requested_at: ctx.now,
        };

        match pending.handle.poll() {
            LoadPoll::Pending => self.pending.push(pending),
            LoadPoll::Ready(result) => self.complete(pending.key, pending.channel, result, ctx),
        }
    }

    /// Resolve finished or timed-out loads
    pub fn poll_loads(&mut self, ctx: &mut MixContext<'_>) {
        let mut still_pending = Vec::with_capacity(self.pending.len());

        for mut load in std::mem::take(&mut self.pending) {
            match load.handle.poll() {
                LoadPoll::Ready(result) => self.complete(load.key, load.channel, result, ctx),
                LoadPoll::Pending => match ctx.settings.load_timeout_secs {
                    Some(limit) if ctx.now - load.requested_at >= limit => {
                        let locator = load.handle.locator().to_string();
                        load.handle.cancel();
                        let timeout = Error::LoadTimeout {
                            locator,
                            secs: limit,
                        };
                        self.complete(load.key, load.channel, Err(timeout), ctx);
                    }
                    _ => still_pending.push(load),
                },
            }
        }

        // complete() never queues, so nothing was added meanwhile
        self.pending = still_pending;
    }

    /// Fade out a cue that reached its stop position
    pub fn stop_cue(&mut self, index: usize, ctx: &mut MixContext<'_>) {
        let Some(cue) = ctx.scheduler.cue_mut(index) else {
            return;
        };

        match cue.channel {
            Some(channel) => {
                let fade_out = cue.definition.fade_out;
                let key = cue.key;
                ctx.pool
                    .channel_mut(channel)
                    .fade_out_and_stop(fade_out, ctx.settings.fade_curve);
                debug!("Cue {} fading out over {:.2}s", index, fade_out);
                ctx.events.emit_lossy(DirectorEvent::CueStopping {
                    activation_id: key.activation_id,
                    cue_index: index,
                    channel: channel.0,
                    timestamp: Utc::now(),
                });
            }
            None => cue.phase = CuePhase::Stopped,
        }
    }

    /// A scene channel went idle: finish its cue and return the loan
    pub fn channel_finished(&mut self, channel: ChannelId, ctx: &mut MixContext<'_>) {
        if let Loan::Cue(key) = ctx.pool.channel(channel).loan() {
            self.finish_cue(key, ctx);
        }
        ctx.pool.release(channel);
    }

    /// Drop every in-flight load; late results are discarded
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        self.last_started = None;
        cancelled
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Channel of the most recently started cue
    pub fn last_started(&self) -> Option<ChannelId> {
        self.last_started
    }

    fn claim_channel(&mut self, ctx: &mut MixContext<'_>) -> Option<ChannelId> {
        let channel = match ctx.pool.allocate_scene(self.last_started) {
            Some(channel) => channel,
            None => {
                let victim = ctx.pool.eviction_candidate(self.last_started)?;
                self.evict(victim, ctx);
                victim
            }
        };

        // Unowned tail from a previous scene
        if ctx.pool.channel(channel).has_clip() {
            ctx.pool.channel_mut(channel).stop();
        }
        Some(channel)
    }

    fn evict(&mut self, channel: ChannelId, ctx: &mut MixContext<'_>) {
        if let Loan::Cue(key) = ctx.pool.channel(channel).loan() {
            info!("Reclaiming {} from cue {}", channel, key.index);
            self.pending.retain(|p| p.key != key);
            self.finish_cue(key, ctx);
        }
        ctx.pool.channel_mut(channel).stop();
        ctx.pool.release(channel);
    }

    fn finish_cue(&mut self, key: CueKey, ctx: &mut MixContext<'_>) {
        if let Some(cue) = ctx.scheduler.by_key_mut(key) {
            if cue.phase.is_active() {
                cue.phase = CuePhase::Stopped;
            }
            cue.channel = None;
            ctx.events.emit_lossy(DirectorEvent::CueStopped {
                activation_id: key.activation_id,
                cue_index: key.index,
                timestamp: Utc::now(),
            });
        }
    }

    fn complete(
        &mut self,
        key: CueKey,
        channel: ChannelId,
        result: Result<Arc<ClipBuffer>>,
        ctx: &mut MixContext<'_>,
    ) {
        let Some(cue) = ctx.scheduler.by_key_mut(key) else {
            debug!("Discarding load for superseded activation {}", key.activation_id);
            return;
        };
        if cue.phase != CuePhase::Loading || cue.channel != Some(channel) {
            return;
        }

        let clip = match result {
            Ok(clip) => clip,
            Err(e) => {
                warn!("Cue {} failed: {}", key.index, e);
                cue.phase = CuePhase::Failed;
                cue.channel = None;
                let locator = cue.definition.locator.clone();
                ctx.pool.release(channel);
                ctx.events.emit_lossy(DirectorEvent::CueFailed {
                    activation_id: key.activation_id,
                    cue_index: key.index,
                    locator,
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                });
                return;
            }
        };

        let definition = cue.definition.clone();
        cue.phase = CuePhase::Playing;
        cue.started_at = Some(ctx.now);
        cue.started_at_position = ctx.position;

        let target =
            (definition.volume * ctx.settings.scene_cue_volume_multiplier).clamp(0.0, 1.0);
        let curve = ctx.settings.fade_curve;

        let outgoing: Vec<ChannelId> = ctx
            .pool
            .scene_ids()
            .filter(|id| *id != channel)
            .filter(|id| {
                let c = ctx.pool.channel(*id);
                c.has_clip() && !c.is_stopping()
            })
            .collect();

        for from in outgoing {
            let fade_out = match ctx.pool.channel(from).loan() {
                Loan::Cue(out_key) => match ctx.scheduler.by_key_mut(out_key) {
                    Some(out) => {
                        if out.phase == CuePhase::Playing {
                            out.phase = CuePhase::FadingOut;
                            ctx.events.emit_lossy(DirectorEvent::CueStopping {
                                activation_id: out_key.activation_id,
                                cue_index: out_key.index,
                                channel: from.0,
                                timestamp: Utc::now(),
                            });
                        }
                        out.definition.fade_out
                    }
                    None => ctx.settings.default_stop_fade,
                },
                _ => ctx.settings.default_stop_fade,
            };

            ctx.pool.channel_mut(from).fade_out_and_stop(fade_out, curve);
            debug!(
                "Crossfade {} -> {} (out {:.2}s, in {:.2}s)",
                from, channel, fade_out, definition.fade_in
            );
            ctx.events.emit_lossy(DirectorEvent::CrossfadeStarted {
                from_channel: from.0,
                to_channel: channel.0,
                fade_out_secs: fade_out,
                fade_in_secs: definition.fade_in,
                timestamp: Utc::now(),
            });
        }

        let playback = ctx.pool.channel_mut(channel);
        if ctx.suspended {
            playback.cue_suspended(clip, definition.looping, target);
        } else {
            playback.play(clip, definition.looping, target, definition.fade_in, curve);
        }
        self.last_started = Some(channel);

        info!(
            "Cue {} playing {} on {} (volume {:.2}{})",
            key.index,
            definition.locator,
            channel,
            target,
            if ctx.suspended { ", suspended" } else { "" }
        );
        ctx.events.emit_lossy(DirectorEvent::CueStarted {
            activation_id: key.activation_id,
            cue_index: key.index,
            channel: channel.0,
            target_volume: target,
            timestamp: Utc::now(),
        });
    }
}

impl std::fmt::Debug for CrossfadeMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossfadeMixer")
            .field("in_flight", &self.pending.len())
            .field("last_started", &self.last_started)
            .finish()
    }
}
