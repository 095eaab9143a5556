//! Scripted clip loader
//!
//! Resolves loads from an in-memory table instead of disk or network. Hosts
//! that decode audio in their own engine use it to feed clip lengths to the
//! director; tests and benchmarks use it to script instant successes,
//! failures and loads that stay in flight until released.

use super::{ClipBuffer, ClipLoader, LoadCompleter, LoadHandle};
use crate::error::Error;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Outcome {
    Ready(Duration),
    Fail(String),
    Hold(Duration),
}

#[derive(Debug, Default)]
struct ManualState {
    outcomes: HashMap<String, Outcome>,
    held: Vec<(String, Duration, LoadCompleter)>,
    requests: Vec<String>,
}

/// Table-driven [`ClipLoader`]
///
/// Unknown locators fail as "not found".
#[derive(Debug, Default)]
pub struct ManualLoader {
    state: Mutex<ManualState>,
}

impl ManualLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads of `locator` resolve immediately with a clip of `duration`
    pub fn ready<S: Into<String>>(&self, locator: S, duration: Duration) -> &Self {
        self.set(locator.into(), Outcome::Ready(duration));
        self
    }

    /// Loads of `locator` fail immediately
    pub fn fail<S: Into<String>>(&self, locator: S, reason: &str) -> &Self {
        self.set(locator.into(), Outcome::Fail(reason.to_string()));
        self
    }

    /// Loads of `locator` stay pending until [`release`](Self::release)
    pub fn hold<S: Into<String>>(&self, locator: S, duration: Duration) -> &Self {
        self.set(locator.into(), Outcome::Hold(duration));
        self
    }

    /// Resolve every held load of `locator` successfully
    ///
    /// Returns how many live handles received the clip.
    pub fn release(&self, locator: &str) -> usize {
        self.drain_held(locator, |name, duration| Ok(ClipBuffer::silent(name, duration)))
    }

    /// Resolve every held load of `locator` with a failure
    pub fn release_failed(&self, locator: &str, reason: &str) -> usize {
        self.drain_held(locator, |name, _| {
            Err(Error::ClipLoad {
                locator: name.to_string(),
                reason: reason.to_string(),
            })
        })
    }

    /// All locators requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    /// How many times `locator` was requested
    pub fn request_count(&self, locator: &str) -> usize {
        self.lock().requests.iter().filter(|r| *r == locator).count()
    }

    /// Held loads whose handle is still alive
    pub fn pending_count(&self) -> usize {
        self.lock()
            .held
            .iter()
            .filter(|(_, _, c)| !c.is_cancelled())
            .count()
    }

    fn set(&self, locator: String, outcome: Outcome) {
        self.lock().outcomes.insert(locator, outcome);
    }

    fn drain_held<F>(&self, locator: &str, make: F) -> usize
    where
        F: Fn(&str, Duration) -> crate::error::Result<ClipBuffer>,
    {
        let mut state = self.lock();
        let (matching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut state.held)
            .into_iter()
            .partition(|(name, _, _)| name == locator);
        state.held = rest;
        drop(state);

        matching
            .into_iter()
            .map(|(name, duration, completer)| completer.complete(make(&name, duration)))
            .filter(|delivered| *delivered)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        // A panicking test thread must not poison every later assertion
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ClipLoader for ManualLoader {
    fn load(&self, locator: &str) -> LoadHandle {
        let mut state = self.lock();
        state.requests.push(locator.to_string());

        match state.outcomes.get(locator).cloned() {
            Some(Outcome::Ready(duration)) => {
                LoadHandle::ready(locator, Ok(ClipBuffer::silent(locator, duration)))
            }
            Some(Outcome::Fail(reason)) => LoadHandle::ready(
                locator,
                Err(Error::ClipLoad {
                    locator: locator.to_string(),
                    reason,
                }),
            ),
            Some(Outcome::Hold(duration)) => {
                let (completer, handle) = LoadHandle::manual(locator);
                state.held.push((locator.to_string(), duration, completer));
                handle
            }
            None => LoadHandle::ready(
                locator,
                Err(Error::ClipLoad {
                    locator: locator.to_string(),
                    reason: "not found".to_string(),
                }),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoadPoll;

    #[test]
    fn test_ready_and_unknown() {
        let loader = ManualLoader::new();
        loader.ready("a.ogg", Duration::from_secs(2));

        assert!(matches!(loader.load("a.ogg").poll(), LoadPoll::Ready(Ok(_))));
        assert!(matches!(loader.load("b.ogg").poll(), LoadPoll::Ready(Err(_))));
        assert_eq!(loader.requests(), vec!["a.ogg".to_string(), "b.ogg".to_string()]);
    }

    #[test]
    fn test_hold_and_release() {
        let loader = ManualLoader::new();
        loader.hold("slow.ogg", Duration::from_secs(5));

        let mut handle = loader.load("slow.ogg");
        assert!(matches!(handle.poll(), LoadPoll::Pending));
        assert_eq!(loader.pending_count(), 1);

        assert_eq!(loader.release("slow.ogg"), 1);
        assert!(matches!(handle.poll(), LoadPoll::Ready(Ok(_))));
    }

    #[test]
    fn test_release_after_cancel_delivers_nothing() {
        let loader = ManualLoader::new();
        loader.hold("slow.ogg", Duration::from_secs(5));

        let handle = loader.load("slow.ogg");
        handle.cancel();
        assert_eq!(loader.pending_count(), 0);
        assert_eq!(loader.release("slow.ogg"), 0);
    }
}
