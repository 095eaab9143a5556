//! One-shot / snippet player
//!
//! Fire-and-forget sounds on the dedicated one-shot channel. Independent of
//! the scheduler: scene changes do not cancel them and they never count toward
//! ducking. Each completed load replaces whatever the channel was playing.

use super::channel::{ChannelPool, Loan};
use crate::loader::{ClipLoader, LoadHandle, LoadPoll};
use chrono::Utc;
use cuedeck_common::config::MusicProjectConfig;
use cuedeck_common::events::{DirectorEvent, EventBus};
use tracing::{debug, warn};

#[derive(Debug)]
struct PendingShot {
    handle: LoadHandle,
    volume: f32,
}

/// Plays one-shots in request order as their loads complete
#[derive(Debug, Default)]
pub struct OneShotPlayer {
    pending: Vec<PendingShot>,
}

impl OneShotPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request `locator` at `volume` (clamped to [0, 1])
    ///
    /// Returns false for an empty locator, which is ignored.
    pub fn play_one_shot(&mut self, locator: &str, volume: f32, loader: &dyn ClipLoader) -> bool {
        let locator = locator.trim();
        if locator.is_empty() {
            debug!("Ignoring one-shot with empty locator");
            return false;
        }

        self.pending.push(PendingShot {
            handle: loader.load(locator),
            volume: volume.clamp(0.0, 1.0),
        });
        true
    }

    /// Request the snippet `name` from the music configuration
    ///
    /// Unknown names are logged and ignored.
    pub fn play_snippet(
        &mut self,
        name: &str,
        config: &MusicProjectConfig,
        loader: &dyn ClipLoader,
    ) -> bool {
        match config.snippet(name) {
            Some(snippet) => self.play_one_shot(&snippet.file, snippet.volume, loader),
            None => {
                warn!("Unknown snippet '{}'", name);
                false
            }
        }
    }

    /// Start every one-shot whose clip has arrived
    pub fn poll(&mut self, pool: &mut ChannelPool, events: &EventBus) {
        if self.pending.is_empty() {
            return;
        }

        let channel = pool.one_shot_id();
        let mut still_pending = Vec::with_capacity(self.pending.len());

        for mut shot in std::mem::take(&mut self.pending) {
            match shot.handle.poll() {
                LoadPoll::Pending => still_pending.push(shot),
                LoadPoll::Ready(Ok(clip)) => {
                    let locator = clip.locator().to_string();
                    if pool.channel(channel).loan() == Loan::Free {
                        if let Err(e) = pool.loan(channel, Loan::OneShot) {
                            warn!("One-shot channel unavailable: {}", e);
                        }
                    }
                    pool.channel_mut(channel).play(
                        clip,
                        false,
                        shot.volume,
                        0.0,
                        cuedeck_common::FadeCurve::Linear,
                    );
                    debug!("One-shot {} at {:.2}", locator, shot.volume);
                    events.emit_lossy(DirectorEvent::OneShotPlayed {
                        locator,
                        volume: shot.volume,
                        timestamp: Utc::now(),
                    });
                }
                LoadPoll::Ready(Err(e)) => {
                    warn!("One-shot failed: {}", e);
                    events.emit_lossy(DirectorEvent::OneShotFailed {
                        locator: shot.handle.locator().to_string(),
                        reason: e.to_string(),
                        timestamp: Utc::now(),
                    });
                }
            }
        }

        self.pending = still_pending;
    }

    /// One-shot channel finished its clip
    pub fn channel_finished(&self, pool: &mut ChannelPool) {
        pool.release(pool.one_shot_id());
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}
