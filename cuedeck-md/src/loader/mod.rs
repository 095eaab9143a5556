//! Clip loading
//!
//! A clip load is requested on one tick and resolves on a later one. The
//! director never blocks on it: it holds a [`LoadHandle`] and polls it once per
//! tick. Dropping or cancelling the handle aborts the load and discards any
//! late result, which is how scene changes cancel in-flight requests.

pub mod decoder;
pub mod manual;
pub mod standard;

use crate::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

pub use decoder::{ClipDecoder, DecodedAudio};
pub use manual::ManualLoader;
pub use standard::{resolve_locator, ClipSource, StandardClipLoader};

/// Decoded audio ready to be placed on a channel
#[derive(Debug, Clone)]
pub struct ClipBuffer {
    locator: String,
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
    duration: Duration,
}

impl ClipBuffer {
    /// Build from interleaved PCM samples
    pub fn from_samples<S: Into<String>>(
        locator: S,
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
    ) -> Self {
        let frames = if channels == 0 {
            0
        } else {
            samples.len() / channels as usize
        };
        let duration = if sample_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(frames as f64 / sample_rate as f64)
        };

        Self {
            locator: locator.into(),
            samples: samples.into(),
            sample_rate,
            channels,
            duration,
        }
    }

    /// Clip with a known length and no PCM data
    ///
    /// For hosts that render audio themselves and only need the director's
    /// timing decisions.
    pub fn silent<S: Into<String>>(locator: S, duration: Duration) -> Self {
        Self {
            locator: locator.into(),
            samples: Arc::from(Vec::<f32>::new()),
            sample_rate: 0,
            channels: 0,
            duration,
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Interleaved f32 samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// Asynchronous clip source
///
/// Must return immediately. Implementations may be called concurrently for
/// different locators.
pub trait ClipLoader: Send + Sync {
    fn load(&self, locator: &str) -> LoadHandle;
}

/// Result of polling a [`LoadHandle`]
#[derive(Debug)]
pub enum LoadPoll {
    /// Still in flight
    Pending,

    /// Resolved (success or failure)
    Ready(Result<Arc<ClipBuffer>>),
}

/// In-flight clip load
///
/// Polling is non-blocking. Dropping an unresolved handle aborts the task.
#[derive(Debug)]
pub struct LoadHandle {
    locator: String,
    rx: oneshot::Receiver<Result<ClipBuffer>>,
    abort: Option<AbortHandle>,
    resolved: bool,
}

impl LoadHandle {
    /// Wrap a receiver fed by a spawned task
    pub fn new(
        locator: String,
        rx: oneshot::Receiver<Result<ClipBuffer>>,
        abort: Option<AbortHandle>,
    ) -> Self {
        Self {
            locator,
            rx,
            abort,
            resolved: false,
        }
    }

    /// Handle resolved by whoever holds the returned [`LoadCompleter`]
    pub fn manual<S: Into<String>>(locator: S) -> (LoadCompleter, LoadHandle) {
        let (tx, rx) = oneshot::channel();
        (LoadCompleter { tx }, LoadHandle::new(locator.into(), rx, None))
    }

    /// Handle that is already resolved
    pub fn ready<S: Into<String>>(locator: S, result: Result<ClipBuffer>) -> LoadHandle {
        let (completer, handle) = LoadHandle::manual(locator);
        completer.complete(result);
        handle
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Check for completion without blocking
    pub fn poll(&mut self) -> LoadPoll {
        if self.resolved {
            return LoadPoll::Ready(Err(Error::LoadCancelled(format!(
                "{} (already resolved)",
                self.locator
            ))));
        }

        match self.rx.try_recv() {
            Ok(result) => {
                self.resolved = true;
                LoadPoll::Ready(result.map(Arc::new))
            }
            Err(oneshot::error::TryRecvError::Empty) => LoadPoll::Pending,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.resolved = true;
                LoadPoll::Ready(Err(Error::LoadCancelled(self.locator.clone())))
            }
        }
    }

    /// Abort the load; any later result is discarded
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for LoadHandle {
    fn drop(&mut self) {
        if !self.resolved {
            if let Some(abort) = self.abort.take() {
                abort.abort();
            }
        }
    }
}

/// Producer side of a manually resolved [`LoadHandle`]
#[derive(Debug)]
pub struct LoadCompleter {
    tx: oneshot::Sender<Result<ClipBuffer>>,
}

impl LoadCompleter {
    /// Deliver the result; returns false if the handle was already dropped
    pub fn complete(self, result: Result<ClipBuffer>) -> bool {
        self.tx.send(result).is_ok()
    }

    /// The handle has been cancelled or dropped
    pub fn is_cancelled(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_duration_from_samples() {
        let clip = ClipBuffer::from_samples("a.wav", vec![0.0; 44_100 * 2], 44_100, 2);
        assert_eq!(clip.duration(), Duration::from_secs(1));
        assert_eq!(clip.channels(), 2);
    }

    #[test]
    fn test_manual_handle_pending_then_ready() {
        let (completer, mut handle) = LoadHandle::manual("a.ogg");
        assert!(matches!(handle.poll(), LoadPoll::Pending));

        assert!(completer.complete(Ok(ClipBuffer::silent("a.ogg", Duration::from_secs(3)))));
        match handle.poll() {
            LoadPoll::Ready(Ok(clip)) => assert_eq!(clip.duration(), Duration::from_secs(3)),
            other => panic!("unexpected poll result {:?}", other),
        }
    }

    #[test]
    fn test_dropped_completer_reports_cancelled() {
        let (completer, mut handle) = LoadHandle::manual("a.ogg");
        drop(completer);
        assert!(matches!(
            handle.poll(),
            LoadPoll::Ready(Err(Error::LoadCancelled(_)))
        ));
    }

    #[test]
    fn test_cancelled_handle_discards_late_result() {
        let (completer, handle) = LoadHandle::manual("a.ogg");
        handle.cancel();
        assert!(completer.is_cancelled());
        assert!(!completer.complete(Ok(ClipBuffer::silent("a.ogg", Duration::from_secs(1)))));
    }

    #[test]
    fn test_ready_handle() {
        let mut handle = LoadHandle::ready(
            "missing.ogg",
            Err(Error::ClipLoad {
                locator: "missing.ogg".into(),
                reason: "not found".into(),
            }),
        );
        assert!(matches!(handle.poll(), LoadPoll::Ready(Err(Error::ClipLoad { .. }))));
    }
}
