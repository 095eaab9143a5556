//! Playback components driven by the director's tick
//!
//! Leaves first: [`channel`] (pool and ramps), [`scheduler`] (cue lifecycle),
//! [`mixer`] (channel allocation and crossfades), [`ducking`] (host volume),
//! [`overlay`] (pause/fast-forward playlist) and [`oneshot`] (snippets).

pub mod channel;
pub mod ducking;
pub mod mixer;
pub mod oneshot;
pub mod overlay;
pub mod scheduler;

pub use channel::{
    ChannelId, ChannelNotice, ChannelPool, ChannelRole, CueKey, Loan, PlaybackChannel,
    VolumeRamp,
};
pub use ducking::{DuckState, DuckingController};
pub use mixer::{CrossfadeMixer, MixContext};
pub use oneshot::OneShotPlayer;
pub use overlay::{OverlayArbitrator, OverlayState, OverlayTransition};
pub use scheduler::{CueAction, CuePhase, CueScheduler, ScheduledCue};
