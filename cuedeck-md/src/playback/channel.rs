//! Playback channel pool
//!
//! A fixed arena of output slots: `scene_channels` scene channels for
//! crossfading scheduled cues, one overlay channel and one one-shot channel.
//! The pool is the only owner of channel state. Cues and the overlay borrow a
//! channel through a [`Loan`]; [`ChannelPool::loan`] refuses a second loan of
//! the same channel, so double assignment is impossible by construction.
//!
//! Channels keep a playhead and a volume ramp but do not render samples: the
//! host's audio engine reads [`PlaybackChannel::clip`] and
//! [`PlaybackChannel::volume`] each frame.

use crate::error::{Error, Result};
use crate::loader::ClipBuffer;
use cuedeck_common::FadeCurve;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Index of a channel in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ChannelId(pub usize);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// What a channel is reserved for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChannelRole {
    Scene,
    Overlay,
    OneShot,
}

/// Identity of a scheduled cue across scene activations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CueKey {
    pub activation_id: Uuid,
    pub index: usize,
}

/// Current borrower of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Loan {
    Free,
    Cue(CueKey),
    Overlay,
    OneShot,
}

/// Time-driven volume ramp
///
/// Advanced with unscaled seconds, so fades finish even while the video is
/// paused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeRamp {
    from: f32,
    to: f32,
    elapsed: f64,
    duration: f64,
    curve: FadeCurve,
}

impl VolumeRamp {
    /// Ramp from `from` to `to` over `duration` seconds
    ///
    /// Both ends are clamped to [0, 1]; a non-positive duration completes
    /// immediately.
    pub fn new(from: f32, to: f32, duration: f64, curve: FadeCurve) -> Self {
        Self {
            from: from.clamp(0.0, 1.0),
            to: to.clamp(0.0, 1.0),
            elapsed: 0.0,
            duration: duration.max(0.0),
            curve,
        }
    }

    /// Completed ramp holding `value`
    pub fn hold(value: f32) -> Self {
        Self::new(value, value, 0.0, FadeCurve::Linear)
    }

    /// Current interpolated value
    pub fn value(&self) -> f32 {
        if self.is_complete() {
            return self.to;
        }
        let t = (self.elapsed / self.duration) as f32;
        self.curve.interpolate(self.from, self.to, t)
    }

    /// Move forward by `dt` seconds and return the new value
    pub fn advance(&mut self, dt: f64) -> f32 {
        self.elapsed = (self.elapsed + dt.max(0.0)).min(self.duration);
        self.value()
    }

    pub fn is_complete(&self) -> bool {
        self.elapsed >= self.duration
    }

    pub fn target(&self) -> f32 {
        self.to
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }
}

/// What a channel does once its ramp lands on silence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SilenceAction {
    /// Keep playing at zero volume
    Continue,
    /// Drop the clip and go idle
    Stop,
    /// Hold the playhead (suspended under the overlay)
    Pause,
}

/// Channel state change reported by [`ChannelPool::advance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelNotice {
    /// A stop fade reached silence and the channel went idle
    Silenced(ChannelId),
    /// A non-looping clip played to its end and the channel went idle
    Ended(ChannelId),
}

impl ChannelNotice {
    pub fn channel(&self) -> ChannelId {
        match self {
            ChannelNotice::Silenced(id) | ChannelNotice::Ended(id) => *id,
        }
    }
}

/// One audio output slot
#[derive(Debug, Clone)]
pub struct PlaybackChannel {
    id: ChannelId,
    role: ChannelRole,
    clip: Option<Arc<ClipBuffer>>,
    looping: bool,
    playing: bool,
    /// Playhead in seconds
    cursor: f64,
    ramp: VolumeRamp,
    on_silence: SilenceAction,
    /// Volume to restore after an overlay suspension
    configured_volume: f32,
    suspended: bool,
    loan: Loan,
    /// Pool sequence number of the most recent loan (LRU allocation)
    last_loaned: u64,
}

impl PlaybackChannel {
    fn new(id: ChannelId, role: ChannelRole) -> Self {
        Self {
            id,
            role,
            clip: None,
            looping: false,
            playing: false,
            cursor: 0.0,
            ramp: VolumeRamp::hold(0.0),
            on_silence: SilenceAction::Continue,
            configured_volume: 0.0,
            suspended: false,
            loan: Loan::Free,
            last_loaned: 0,
        }
    }

    /// Start `clip` from the top, ramping 0 → `volume` over `fade_in`
    pub fn play(
        &mut self,
        clip: Arc<ClipBuffer>,
        looping: bool,
        volume: f32,
        fade_in: f64,
        curve: FadeCurve,
    ) {
        self.clip = Some(clip);
        self.looping = looping;
        self.playing = true;
        self.cursor = 0.0;
        self.configured_volume = volume.clamp(0.0, 1.0);
        self.suspended = false;
        self.on_silence = SilenceAction::Continue;
        self.ramp = VolumeRamp::new(0.0, volume, fade_in, curve);
    }

    /// Place `clip` silent and paused, to be brought in by [`resume`](Self::resume)
    pub fn cue_suspended(&mut self, clip: Arc<ClipBuffer>, looping: bool, volume: f32) {
        self.clip = Some(clip);
        self.looping = looping;
        self.playing = false;
        self.cursor = 0.0;
        self.configured_volume = volume.clamp(0.0, 1.0);
        self.suspended = true;
        self.on_silence = SilenceAction::Continue;
        self.ramp = VolumeRamp::hold(0.0);
    }

    /// Ramp from the current value to `volume`
    pub fn fade_to(&mut self, volume: f32, seconds: f64, curve: FadeCurve) {
        self.ramp = VolumeRamp::new(self.volume(), volume, seconds, curve);
        self.on_silence = SilenceAction::Continue;
    }

    /// Fade to silence, then drop the clip
    pub fn fade_out_and_stop(&mut self, seconds: f64, curve: FadeCurve) {
        self.fade_to(0.0, seconds, curve);
        self.on_silence = SilenceAction::Stop;
        self.suspended = false;
    }

    /// Fade to silence, then hold the playhead until resumed
    pub fn suspend(&mut self, seconds: f64, curve: FadeCurve) {
        self.fade_to(0.0, seconds, curve);
        self.on_silence = SilenceAction::Pause;
        self.suspended = true;
    }

    /// Continue from the held playhead, ramping to `volume`
    pub fn resume(&mut self, volume: f32, seconds: f64, curve: FadeCurve) {
        if self.clip.is_none() {
            return;
        }
        self.playing = true;
        self.suspended = false;
        self.fade_to(volume, seconds, curve);
    }

    /// Drop the clip immediately
    pub fn stop(&mut self) {
        self.clip = None;
        self.playing = false;
        self.cursor = 0.0;
        self.suspended = false;
        self.on_silence = SilenceAction::Continue;
        self.ramp = VolumeRamp::hold(0.0);
    }

    /// Advance playhead and ramp by `dt` seconds
    fn advance(&mut self, dt: f64) -> Option<ChannelNotice> {
        let volume = self.ramp.advance(dt);

        if self.playing {
            if let Some(clip) = &self.clip {
                let length = clip.duration().as_secs_f64();
                self.cursor += dt;
                if self.cursor >= length {
                    if self.looping && length > 0.0 {
                        self.cursor %= length;
                    } else {
                        debug!("{} reached end of {}", self.id, clip.locator());
                        self.stop();
                        return Some(ChannelNotice::Ended(self.id));
                    }
                }
            }
        }

        if self.ramp.is_complete() && volume <= 0.0 {
            match self.on_silence {
                SilenceAction::Stop if self.clip.is_some() => {
                    self.stop();
                    return Some(ChannelNotice::Silenced(self.id));
                }
                SilenceAction::Pause => {
                    self.playing = false;
                    self.on_silence = SilenceAction::Continue;
                }
                _ => {}
            }
        }

        None
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn role(&self) -> ChannelRole {
        self.role
    }

    pub fn clip(&self) -> Option<&Arc<ClipBuffer>> {
        self.clip.as_ref()
    }

    pub fn has_clip(&self) -> bool {
        self.clip.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Fading out toward a stop
    pub fn is_stopping(&self) -> bool {
        self.on_silence == SilenceAction::Stop
    }

    pub fn position(&self) -> f64 {
        self.cursor
    }

    pub fn volume(&self) -> f32 {
        self.ramp.value()
    }

    pub fn target_volume(&self) -> f32 {
        self.ramp.target()
    }

    pub fn configured_volume(&self) -> f32 {
        self.configured_volume
    }

    pub fn loan(&self) -> Loan {
        self.loan
    }

    /// Holds a buffer, is playing, and is louder than `epsilon`
    pub fn is_audible(&self, epsilon: f32) -> bool {
        self.clip.is_some() && self.playing && self.volume() > epsilon
    }
}

/// Fixed set of playback channels
#[derive(Debug, Clone)]
pub struct ChannelPool {
    channels: Vec<PlaybackChannel>,
    scene_count: usize,
    loan_seq: u64,
}

impl ChannelPool {
    /// Create `scene_channels` scene channels (at least 2) plus overlay and one-shot
    pub fn new(scene_channels: usize) -> Self {
        let scene_count = scene_channels.max(2);
        let mut channels: Vec<PlaybackChannel> = (0..scene_count)
            .map(|i| PlaybackChannel::new(ChannelId(i), ChannelRole::Scene))
            .collect();
        channels.push(PlaybackChannel::new(ChannelId(scene_count), ChannelRole::Overlay));
        channels.push(PlaybackChannel::new(
            ChannelId(scene_count + 1),
            ChannelRole::OneShot,
        ));

        Self {
            channels,
            scene_count,
            loan_seq: 0,
        }
    }

    pub fn scene_ids(&self) -> impl Iterator<Item = ChannelId> {
        (0..self.scene_count).map(ChannelId)
    }

    pub fn overlay_id(&self) -> ChannelId {
        ChannelId(self.scene_count)
    }

    pub fn one_shot_id(&self) -> ChannelId {
        ChannelId(self.scene_count + 1)
    }

    pub fn channel(&self, id: ChannelId) -> &PlaybackChannel {
        &self.channels[id.0]
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> &mut PlaybackChannel {
        &mut self.channels[id.0]
    }

    pub fn channels(&self) -> &[PlaybackChannel] {
        &self.channels
    }

    /// Pick a free scene channel
    ///
    /// Never returns `avoid` (the most recently started cue's channel) while
    /// another free channel exists. Silent channels win over channels still
    /// finishing an unowned fade; ties go to the least recently loaned.
    pub fn allocate_scene(&self, avoid: Option<ChannelId>) -> Option<ChannelId> {
        self.channels[..self.scene_count]
            .iter()
            .filter(|c| c.loan == Loan::Free)
            .min_by_key(|c| (Some(c.id) == avoid, c.has_clip(), c.last_loaned))
            .map(|c| c.id)
    }

    /// Occupied scene channel to reclaim when none is free
    ///
    /// Least recently loaned, excluding `avoid`.
    pub fn eviction_candidate(&self, avoid: Option<ChannelId>) -> Option<ChannelId> {
        self.channels[..self.scene_count]
            .iter()
            .filter(|c| c.loan != Loan::Free && Some(c.id) != avoid)
            .min_by_key(|c| c.last_loaned)
            .map(|c| c.id)
    }

    /// Hand `id` to `loan`
    ///
    /// Fails if the channel is already loaned or the loan does not match the
    /// channel's role.
    pub fn loan(&mut self, id: ChannelId, loan: Loan) -> Result<()> {
        let channel = self
            .channels
            .get_mut(id.0)
            .ok_or_else(|| Error::Channel(format!("no channel {}", id)))?;

        if channel.loan != Loan::Free {
            return Err(Error::Channel(format!(
                "{} already loaned to {:?}",
                id, channel.loan
            )));
        }

        let role_matches = matches!(
            (channel.role, loan),
            (ChannelRole::Scene, Loan::Cue(_))
                | (ChannelRole::Overlay, Loan::Overlay)
                | (ChannelRole::OneShot, Loan::OneShot)
        );
        if !role_matches {
            return Err(Error::Channel(format!(
                "{} ({:?}) cannot take {:?}",
                id, channel.role, loan
            )));
        }

        self.loan_seq += 1;
        channel.loan = loan;
        channel.last_loaned = self.loan_seq;
        Ok(())
    }

    /// Return `id` to the pool; playback state is untouched
    pub fn release(&mut self, id: ChannelId) {
        if let Some(channel) = self.channels.get_mut(id.0) {
            channel.loan = Loan::Free;
        }
    }

    /// Channel currently loaned to `loan`
    pub fn find_loan(&self, loan: Loan) -> Option<ChannelId> {
        self.channels.iter().find(|c| c.loan == loan).map(|c| c.id)
    }

    /// Number of channels currently on loan
    pub fn loan_count(&self) -> usize {
        self.channels.iter().filter(|c| c.loan != Loan::Free).count()
    }

    /// Scene channels above `epsilon`
    pub fn audible_scene_count(&self, epsilon: f32) -> usize {
        self.channels[..self.scene_count]
            .iter()
            .filter(|c| c.is_audible(epsilon))
            .count()
    }

    /// Advance every channel by `dt` seconds
    pub fn advance(&mut self, dt: f64) -> Vec<ChannelNotice> {
        self.channels
            .iter_mut()
            .filter_map(|c| c.advance(dt))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn clip(secs: f64) -> Arc<ClipBuffer> {
        Arc::new(ClipBuffer::silent("test.ogg", Duration::from_secs_f64(secs)))
    }

    fn key(index: usize) -> Loan {
        Loan::Cue(CueKey {
            activation_id: Uuid::nil(),
            index,
        })
    }

    #[test]
    fn test_ramp_linear_midpoint() {
        let mut ramp = VolumeRamp::new(0.0, 0.8, 0.5, FadeCurve::Linear);
        assert!((ramp.advance(0.25) - 0.4).abs() < 1e-6);
        assert_eq!(ramp.advance(1.0), 0.8);
        assert!(ramp.is_complete());
    }

    #[test]
    fn test_zero_length_ramp_is_instant() {
        let ramp = VolumeRamp::new(1.0, 0.3, 0.0, FadeCurve::SCurve);
        assert!(ramp.is_complete());
        assert_eq!(ramp.value(), 0.3);
    }

    #[test]
    fn test_ramp_clamps() {
        let ramp = VolumeRamp::new(-1.0, 2.0, 0.0, FadeCurve::Linear);
        assert_eq!(ramp.value(), 1.0);
    }

    #[test]
    fn test_pool_layout() {
        let pool = ChannelPool::new(1);
        assert_eq!(pool.scene_ids().count(), 2);
        assert_eq!(pool.channel(pool.overlay_id()).role(), ChannelRole::Overlay);
        assert_eq!(pool.channel(pool.one_shot_id()).role(), ChannelRole::OneShot);
    }

    #[test]
    fn test_double_loan_refused() {
        let mut pool = ChannelPool::new(2);
        pool.loan(ChannelId(0), key(0)).unwrap();
        assert!(matches!(pool.loan(ChannelId(0), key(1)), Err(Error::Channel(_))));
        assert_eq!(pool.loan_count(), 1);

        pool.release(ChannelId(0));
        assert!(pool.loan(ChannelId(0), key(1)).is_ok());
    }

    #[test]
    fn test_wrong_role_refused() {
        let mut pool = ChannelPool::new(2);
        let overlay = pool.overlay_id();
        assert!(pool.loan(overlay, key(0)).is_err());
        assert!(pool.loan(ChannelId(0), Loan::Overlay).is_err());
        assert!(pool.loan(overlay, Loan::Overlay).is_ok());
    }

    #[test]
    fn test_allocation_avoids_most_recent() {
        let mut pool = ChannelPool::new(2);
        pool.loan(ChannelId(0), key(0)).unwrap();
        pool.release(ChannelId(0));

        // Channel 0 is free again but was the last one started
        assert_eq!(pool.allocate_scene(Some(ChannelId(0))), Some(ChannelId(1)));
        assert_eq!(pool.allocate_scene(Some(ChannelId(1))), Some(ChannelId(0)));
    }

    #[test]
    fn test_allocation_prefers_least_recent() {
        let mut pool = ChannelPool::new(3);
        for i in [2, 0, 1] {
            pool.loan(ChannelId(i), key(i)).unwrap();
            pool.release(ChannelId(i));
        }
        assert_eq!(pool.allocate_scene(None), Some(ChannelId(2)));
    }

    #[test]
    fn test_allocation_none_when_all_loaned() {
        let mut pool = ChannelPool::new(2);
        pool.loan(ChannelId(0), key(0)).unwrap();
        pool.loan(ChannelId(1), key(1)).unwrap();
        assert_eq!(pool.allocate_scene(None), None);
        assert_eq!(pool.eviction_candidate(Some(ChannelId(1))), Some(ChannelId(0)));
    }

    #[test]
    fn test_fade_out_and_stop_reports_silence() {
        let mut pool = ChannelPool::new(2);
        let ch = ChannelId(0);
        pool.channel_mut(ch).play(clip(60.0), true, 1.0, 0.0, FadeCurve::Linear);
        pool.channel_mut(ch).fade_out_and_stop(0.3, FadeCurve::Linear);

        assert!(pool.advance(0.2).is_empty());
        assert!(pool.channel(ch).is_audible(0.01));
        assert_eq!(pool.advance(0.2), vec![ChannelNotice::Silenced(ch)]);
        assert!(!pool.channel(ch).has_clip());
    }

    #[test]
    fn test_non_looping_clip_ends() {
        let mut pool = ChannelPool::new(2);
        let ch = ChannelId(1);
        pool.channel_mut(ch).play(clip(1.0), false, 0.5, 0.0, FadeCurve::Linear);

        assert!(pool.advance(0.6).is_empty());
        assert_eq!(pool.advance(0.6), vec![ChannelNotice::Ended(ch)]);
        assert!(!pool.channel(ch).is_playing());
    }

    #[test]
    fn test_looping_clip_wraps() {
        let mut pool = ChannelPool::new(2);
        let ch = ChannelId(0);
        pool.channel_mut(ch).play(clip(1.0), true, 0.5, 0.0, FadeCurve::Linear);

        assert!(pool.advance(1.5).is_empty());
        assert!((pool.channel(ch).position() - 0.5).abs() < 1e-9);
        assert!(pool.channel(ch).is_playing());
    }

    #[test]
    fn test_suspend_and_resume_keeps_playhead() {
        let mut pool = ChannelPool::new(2);
        let ch = ChannelId(0);
        pool.channel_mut(ch).play(clip(60.0), true, 0.8, 0.0, FadeCurve::Linear);
        pool.advance(2.0);

        pool.channel_mut(ch).suspend(0.5, FadeCurve::Linear);
        pool.advance(0.5);
        let held = pool.channel(ch).position();
        assert!(!pool.channel(ch).is_playing());
        assert!(pool.channel(ch).has_clip());

        pool.advance(3.0);
        assert_eq!(pool.channel(ch).position(), held);

        let restore = pool.channel(ch).configured_volume();
        pool.channel_mut(ch).resume(restore, 0.5, FadeCurve::Linear);
        pool.advance(0.5);
        assert_eq!(pool.channel(ch).volume(), 0.8);
        assert!(pool.channel(ch).is_audible(0.01));
    }

    #[test]
    fn test_audible_requires_volume_above_epsilon() {
        let mut pool = ChannelPool::new(2);
        pool.channel_mut(ChannelId(0))
            .play(clip(60.0), true, 0.005, 0.0, FadeCurve::Linear);
        assert_eq!(pool.audible_scene_count(0.01), 0);

        pool.channel_mut(ChannelId(1))
            .play(clip(60.0), true, 0.5, 0.0, FadeCurve::Linear);
        assert_eq!(pool.audible_scene_count(0.01), 1);
    }
}
