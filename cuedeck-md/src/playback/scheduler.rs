//! Cue scheduler
//!
//! Holds the active scene's cue list and walks each cue through its
//! lifecycle:
//!
//! ```text
//! Idle ──trigger──> Loading ──clip ready──> Playing ──stop position──> FadingOut ──silent──> Stopped
//!                      │                       │                                          ▲
//!                      └──load failed──> Failed └──clip ended / evicted───────────────────┘
//! ```
//!
//! The scheduler only decides *when*; starting goes through the crossfade
//! mixer and stopping through the occupied channel. Phase guards make trigger
//! evaluation happen at most once per cue per activation.

use super::channel::{ChannelId, CueKey};
use cuedeck_common::config::{CueDefinition, CueTrigger};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// Lifecycle phase of a scheduled cue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CuePhase {
    /// Waiting for its trigger
    Idle,
    /// Clip requested; holds its channel loan
    Loading,
    Playing,
    /// Fading toward silence before release
    FadingOut,
    Stopped,
    /// Load failed; not retried for this activation
    Failed,
}

impl CuePhase {
    /// Loading, playing or fading out
    pub fn is_active(&self) -> bool {
        matches!(self, CuePhase::Loading | CuePhase::Playing | CuePhase::FadingOut)
    }
}

/// A cue definition paired with its runtime state
#[derive(Debug, Clone)]
pub struct ScheduledCue {
    pub key: CueKey,
    pub definition: CueDefinition,
    pub phase: CuePhase,
    /// Channel held while Loading/Playing/FadingOut
    pub channel: Option<ChannelId>,
    /// Director clock (unscaled seconds) when playback began
    pub started_at: Option<f64>,
    /// Timeline position when playback began, if the video was ready
    pub started_at_position: Option<f64>,
}

/// What the director must do for a cue this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueAction {
    /// Trigger met; hand the cue to the mixer
    Start(usize),
    /// Stop position reached; fade out the cue's channel
    Stop(usize),
}

/// Active scene's cues
#[derive(Debug, Clone)]
pub struct CueScheduler {
    activation_id: Uuid,
    scene: Option<String>,
    cues: Vec<ScheduledCue>,
}

impl Default for CueScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl CueScheduler {
    pub fn new() -> Self {
        Self {
            activation_id: Uuid::nil(),
            scene: None,
            cues: Vec::new(),
        }
    }

    /// Replace all cues with a fresh `Idle` cue per definition
    ///
    /// Returns the new activation id. Channel loans and in-flight loads of the
    /// previous activation are the caller's to release.
    pub fn activate(&mut self, scene: &str, definitions: Vec<CueDefinition>) -> Uuid {
        self.activation_id = Uuid::new_v4();
        self.scene = Some(scene.to_string());
        self.cues = definitions
            .into_iter()
            .enumerate()
            .map(|(index, definition)| ScheduledCue {
                key: CueKey {
                    activation_id: self.activation_id,
                    index,
                },
                definition,
                phase: CuePhase::Idle,
                channel: None,
                started_at: None,
                started_at_position: None,
            })
            .collect();

        debug!(
            "Scheduler activated scene '{}' with {} cue(s) ({})",
            scene,
            self.cues.len(),
            self.activation_id
        );
        self.activation_id
    }

    /// Evaluate triggers and stop positions
    ///
    /// `position` is `None` while the video is not ready: scene-load cues
    /// still fire but timeline triggers and stop positions wait. With
    /// `suppress_starts` set (overlay active) idle cues stay idle even if
    /// their trigger is met.
    ///
    /// Cues returned in `Stop` actions are moved to `FadingOut` here; cues in
    /// `Start` actions stay `Idle` until the mixer claims them.
    pub fn advance(&mut self, position: Option<f64>, suppress_starts: bool) -> Vec<CueAction> {
        let mut actions = Vec::new();

        for (index, cue) in self.cues.iter_mut().enumerate() {
            match cue.phase {
                CuePhase::Idle if !suppress_starts => {
                    let due = match cue.definition.trigger {
                        Some(CueTrigger::OnSceneLoad) => true,
                        Some(CueTrigger::AtTimelinePosition(t)) => {
                            position.map_or(false, |p| p >= t)
                        }
                        None => false,
                    };
                    if due {
                        actions.push(CueAction::Start(index));
                    }
                }
                CuePhase::Playing => {
                    let stop_due = match (cue.definition.stop_at, position) {
                        (Some(s), Some(p)) => s > 0.0 && p >= s,
                        _ => false,
                    };
                    if stop_due {
                        cue.phase = CuePhase::FadingOut;
                        actions.push(CueAction::Stop(index));
                    }
                }
                _ => {}
            }
        }

        actions
    }

    /// Drop every cue (process teardown)
    pub fn clear(&mut self) {
        self.cues.clear();
        self.scene = None;
        self.activation_id = Uuid::nil();
    }

    pub fn activation_id(&self) -> Uuid {
        self.activation_id
    }

    pub fn scene(&self) -> Option<&str> {
        self.scene.as_deref()
    }

    pub fn cues(&self) -> &[ScheduledCue] {
        &self.cues
    }

    pub fn cue(&self, index: usize) -> Option<&ScheduledCue> {
        self.cues.get(index)
    }

    pub fn cue_mut(&mut self, index: usize) -> Option<&mut ScheduledCue> {
        self.cues.get_mut(index)
    }

    /// Cue of the current activation identified by `key`
    pub fn by_key_mut(&mut self, key: CueKey) -> Option<&mut ScheduledCue> {
        if key.activation_id != self.activation_id {
            return None;
        }
        self.cues.get_mut(key.index)
    }

    /// Number of cues in `phase`
    pub fn count_in(&self, phase: CuePhase) -> usize {
        self.cues.iter().filter(|c| c.phase == phase).count()
    }
}
