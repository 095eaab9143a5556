//! Primary video collaborator interface
//!
//! The director never owns the video player. Each tick it reads the timeline
//! position, readiness and playback-rate signals, and reads/writes the video's
//! own audio track volume (track 0) for ducking.

use crate::error::HostError;
use std::time::Duration;

/// Audio track of the primary video that ducking controls
pub const PRIMARY_AUDIO_TRACK: u16 = 0;

/// Primary video player as seen by the director
pub trait VideoHost {
    /// Video prepared and timeline position meaningful
    fn is_ready(&self) -> bool;

    /// Current timeline position in seconds
    fn position(&self) -> f64;

    /// Playback speed multiplier (1.0 = normal)
    fn playback_rate(&self) -> f32;

    /// Playback paused or stopped
    fn is_paused(&self) -> bool;

    /// Current volume of a video audio track (0.0-1.0)
    fn audio_volume(&self, track: u16) -> Result<f32, HostError>;

    /// Set the volume of a video audio track (0.0-1.0)
    fn set_audio_volume(&mut self, track: u16, volume: f32) -> Result<(), HostError>;
}

/// Scripted in-process video host
///
/// Used by the simulator binary and by tests. The timeline advances by
/// `dt * rate` while ready and not paused.
#[derive(Debug, Clone)]
pub struct SimulatedHost {
    position: f64,
    ready: bool,
    rate: f32,
    paused: bool,
    volume: f32,
    volume_supported: bool,
    volume_writes: usize,
}

impl SimulatedHost {
    /// Ready host at position 0, normal speed, full volume
    pub fn new() -> Self {
        Self {
            position: 0.0,
            ready: true,
            rate: 1.0,
            paused: false,
            volume: 1.0,
            volume_supported: true,
            volume_writes: 0,
        }
    }

    /// Advance the timeline by one frame
    pub fn advance(&mut self, dt: Duration) {
        if self.ready && !self.paused {
            self.position += dt.as_secs_f64() * self.rate as f64;
        }
    }

    pub fn seek(&mut self, position: f64) {
        self.position = position.max(0.0);
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate.max(0.0);
    }

    /// Simulate a platform without direct audio volume access
    pub fn set_volume_supported(&mut self, supported: bool) {
        self.volume_supported = supported;
    }

    /// Volume as last written, regardless of support
    pub fn raw_volume(&self) -> f32 {
        self.volume
    }

    /// Set the volume directly, bypassing support checks
    pub fn set_raw_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Number of successful volume writes
    pub fn volume_writes(&self) -> usize {
        self.volume_writes
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoHost for SimulatedHost {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn playback_rate(&self) -> f32 {
        self.rate
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn audio_volume(&self, track: u16) -> Result<f32, HostError> {
        if !self.volume_supported {
            return Err(HostError::Unsupported("direct audio volume".to_string()));
        }
        if track != PRIMARY_AUDIO_TRACK {
            return Err(HostError::Failed(format!("no audio track {}", track)));
        }
        Ok(self.volume)
    }

    fn set_audio_volume(&mut self, track: u16, volume: f32) -> Result<(), HostError> {
        if !self.volume_supported {
            return Err(HostError::Unsupported("direct audio volume".to_string()));
        }
        if track != PRIMARY_AUDIO_TRACK {
            return Err(HostError::Failed(format!("no audio track {}", track)));
        }
        self.volume = volume.clamp(0.0, 1.0);
        self.volume_writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_respects_pause_and_rate() {
        let mut host = SimulatedHost::new();
        host.advance(Duration::from_secs(1));
        assert!((host.position() - 1.0).abs() < 1e-9);

        host.set_rate(2.0);
        host.advance(Duration::from_millis(500));
        assert!((host.position() - 2.0).abs() < 1e-9);

        host.set_paused(true);
        host.advance(Duration::from_secs(5));
        assert!((host.position() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_not_ready_does_not_advance() {
        let mut host = SimulatedHost::new();
        host.set_ready(false);
        host.advance(Duration::from_secs(1));
        assert_eq!(host.position(), 0.0);
    }

    #[test]
    fn test_unsupported_volume() {
        let mut host = SimulatedHost::new();
        host.set_volume_supported(false);
        assert!(matches!(
            host.audio_volume(PRIMARY_AUDIO_TRACK),
            Err(HostError::Unsupported(_))
        ));
        assert!(host.set_audio_volume(PRIMARY_AUDIO_TRACK, 0.5).is_err());
        assert_eq!(host.raw_volume(), 1.0);
        assert_eq!(host.volume_writes(), 0);
    }

    #[test]
    fn test_volume_clamped() {
        let mut host = SimulatedHost::new();
        host.set_audio_volume(PRIMARY_AUDIO_TRACK, 1.7).unwrap();
        assert_eq!(host.audio_volume(PRIMARY_AUDIO_TRACK).unwrap(), 1.0);
    }
}
