//! Event types for the CueDeck event system
//!
//! The director reports lifecycle changes (cue starts and stops, crossfades,
//! ducking, overlay transitions, one-shots) on an [`EventBus`]. Subscribers are
//! HUD/debug views and loggers; the director never waits on them.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Why the playlist overlay is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayReason {
    /// Primary video paused (or stopped)
    Paused,

    /// Primary video running above the fast-forward threshold
    FastForward,
}

/// Director events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DirectorEvent {
    /// A scene's cue list replaced the previous one
    SceneActivated {
        activation_id: Uuid,
        scene: String,
        cue_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Clip requested for a cue
    CueLoading {
        activation_id: Uuid,
        cue_index: usize,
        locator: String,
        channel: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Cue clip loaded and fading in
    CueStarted {
        activation_id: Uuid,
        cue_index: usize,
        channel: usize,
        target_volume: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Cue clip failed to load; not retried for this activation
    CueFailed {
        activation_id: Uuid,
        cue_index: usize,
        locator: String,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Cue reached its stop position and is fading out
    CueStopping {
        activation_id: Uuid,
        cue_index: usize,
        channel: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Cue fully stopped; its channel is free again
    CueStopped {
        activation_id: Uuid,
        cue_index: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// New cue fading in while the previous scene channel fades out
    CrossfadeStarted {
        from_channel: usize,
        to_channel: usize,
        fade_out_secs: f64,
        fade_in_secs: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Primary video audio is being lowered
    DuckEngaged {
        snapshot: f32,
        target: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Primary video audio is being restored
    DuckReleased {
        restore_to: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Ambient playlist overlay took over
    OverlayActivated {
        reason: OverlayReason,
        target_volume: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Ambient playlist overlay handed back to scene cues
    OverlayDeactivated {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Overlay began a playlist entry
    PlaylistTrackStarted {
        index: usize,
        locator: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Overlay skipped a playlist entry that failed to load
    PlaylistTrackSkipped {
        index: usize,
        locator: String,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One-shot started on the one-shot channel
    OneShotPlayed {
        locator: String,
        volume: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One-shot could not be played
    OneShotFailed {
        locator: String,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl DirectorEvent {
    /// Short event name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            DirectorEvent::SceneActivated { .. } => "SceneActivated",
            DirectorEvent::CueLoading { .. } => "CueLoading",
            DirectorEvent::CueStarted { .. } => "CueStarted",
            DirectorEvent::CueFailed { .. } => "CueFailed",
            DirectorEvent::CueStopping { .. } => "CueStopping",
            DirectorEvent::CueStopped { .. } => "CueStopped",
            DirectorEvent::CrossfadeStarted { .. } => "CrossfadeStarted",
            DirectorEvent::DuckEngaged { .. } => "DuckEngaged",
            DirectorEvent::DuckReleased { .. } => "DuckReleased",
            DirectorEvent::OverlayActivated { .. } => "OverlayActivated",
            DirectorEvent::OverlayDeactivated { .. } => "OverlayDeactivated",
            DirectorEvent::PlaylistTrackStarted { .. } => "PlaylistTrackStarted",
            DirectorEvent::PlaylistTrackSkipped { .. } => "PlaylistTrackSkipped",
            DirectorEvent::OneShotPlayed { .. } => "OneShotPlayed",
            DirectorEvent::OneShotFailed { .. } => "OneShotFailed",
        }
    }
}

/// One-to-many event broadcaster
///
/// Cheap to clone; all clones feed the same channel. Events emitted while no
/// one is subscribed are dropped.
///
/// # Examples
///
/// ```
/// use cuedeck_common::events::{DirectorEvent, EventBus};
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
/// bus.emit_lossy(DirectorEvent::OverlayDeactivated { timestamp: chrono::Utc::now() });
/// assert!(matches!(rx.try_recv(), Ok(DirectorEvent::OverlayDeactivated { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DirectorEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per lagging subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<DirectorEvent> {
        self.tx.subscribe()
    }

    /// Emit an event
    ///
    /// Returns the subscriber count, or the event back when nobody listens.
    pub fn emit(
        &self,
        event: DirectorEvent,
    ) -> Result<usize, broadcast::error::SendError<DirectorEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring a missing audience
    pub fn emit_lossy(&self, event: DirectorEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_err() {
        let bus = EventBus::new(4);
        let result = bus.emit(DirectorEvent::OverlayDeactivated {
            timestamp: chrono::Utc::now(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_subscriber_receives() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit_lossy(DirectorEvent::DuckEngaged {
            snapshot: 1.0,
            target: 0.6,
            timestamp: chrono::Utc::now(),
        });

        match rx.try_recv().unwrap() {
            DirectorEvent::DuckEngaged { snapshot, target, .. } => {
                assert_eq!(snapshot, 1.0);
                assert_eq!(target, 0.6);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_serialized_tag() {
        let event = DirectorEvent::OverlayActivated {
            reason: OverlayReason::FastForward,
            target_volume: 0.35,
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"OverlayActivated\""));
        assert!(json.contains("\"FastForward\""));
        assert_eq!(event.event_type(), "OverlayActivated");
    }
}
