//! Test helpers for cuedeck-md integration tests
//!
//! - [`Rig`]: director + simulated host + scripted loader, ticked at 60 Hz
//! - [`audio_generator`]: WAV fixtures for decoder tests

#![allow(dead_code)]

pub mod audio_generator;

use cuedeck_common::config::MusicProjectConfig;
use cuedeck_common::events::{DirectorEvent, EventBus};
use cuedeck_md::playback::{ChannelId, CuePhase, Loan, PlaybackChannel};
use cuedeck_md::{ClipLoader, DirectorSettings, ManualLoader, MusicDirector, SimulatedHost};
use cuedeck_common::config::MusicConfigProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Frame time used by every test (~60 Hz)
pub const DT: Duration = Duration::from_micros(16_667);

/// Length of every looping test clip
pub const LONG_CLIP: Duration = Duration::from_secs(600);

/// Director wired to a simulated host and a scripted loader
pub struct Rig {
    pub director: MusicDirector,
    pub host: SimulatedHost,
    pub loader: Arc<ManualLoader>,
    pub events: broadcast::Receiver<DirectorEvent>,
}

impl Rig {
    pub fn new(settings: DirectorSettings) -> Self {
        Self::with_config(settings, MusicProjectConfig::default())
    }

    pub fn with_config(settings: DirectorSettings, config: MusicProjectConfig) -> Self {
        let loader = Arc::new(ManualLoader::new());
        let dyn_loader: Arc<dyn ClipLoader> = loader.clone();
        let bus = EventBus::new(1024);
        let events = bus.subscribe();
        let director = MusicDirector::new(
            settings,
            MusicConfigProvider::fixed(config),
            dyn_loader,
            bus,
        );

        Self {
            director,
            host: SimulatedHost::new(),
            loader,
            events,
        }
    }

    /// One frame: advance the video, then the director
    pub fn tick(&mut self) {
        self.host.advance(DT);
        self.director.tick(&mut self.host, DT);
        assert_channel_exclusive(&self.director);
    }

    /// Tick for at least `secs` seconds
    pub fn run_for(&mut self, secs: f64) {
        let ticks = (secs / DT.as_secs_f64()).ceil() as usize;
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Tick until the timeline reaches `position`
    pub fn run_until_position(&mut self, position: f64) {
        let mut guard = 0;
        while self.host_position() < position {
            self.tick();
            guard += 1;
            assert!(guard < 1_000_000, "timeline never reached {}", position);
        }
    }

    pub fn host_position(&self) -> f64 {
        use cuedeck_md::VideoHost;
        self.host.position()
    }

    /// Events emitted since the last call
    pub fn drain_events(&mut self) -> Vec<DirectorEvent> {
        std::iter::from_fn(|| self.events.try_recv().ok()).collect()
    }

    pub fn phase(&self, index: usize) -> CuePhase {
        self.director
            .cue_phase(index)
            .unwrap_or_else(|| panic!("no cue {}", index))
    }

    pub fn channel_of(&self, index: usize) -> ChannelId {
        self.director
            .cue_channel(index)
            .unwrap_or_else(|| panic!("cue {} holds no channel", index))
    }

    pub fn channel(&self, id: ChannelId) -> &PlaybackChannel {
        self.director.pool().channel(id)
    }

    pub fn cue_volume(&self, index: usize) -> f32 {
        self.channel(self.channel_of(index)).volume()
    }

    pub fn overlay_channel(&self) -> &PlaybackChannel {
        let pool = self.director.pool();
        pool.channel(pool.overlay_id())
    }

    pub fn one_shot_channel(&self) -> &PlaybackChannel {
        let pool = self.director.pool();
        pool.channel(pool.one_shot_id())
    }

    pub fn scene_loans(&self) -> usize {
        let pool = self.director.pool();
        pool.scene_ids()
            .filter(|id| pool.channel(*id).loan() != Loan::Free)
            .count()
    }
}

/// No channel is claimed by two cues, and every cue loan points back at its cue
pub fn assert_channel_exclusive(director: &MusicDirector) {
    let pool = director.pool();
    let cues = director.scheduler().cues();

    for id in pool.scene_ids() {
        let holders = cues
            .iter()
            .filter(|c| c.phase.is_active() && c.channel == Some(id))
            .count();
        assert!(holders <= 1, "{} held by {} cues", id, holders);

        if let Loan::Cue(key) = pool.channel(id).loan() {
            let cue = &cues[key.index];
            assert_eq!(cue.key, key);
            assert_eq!(cue.channel, Some(id), "loan of {} not mirrored by its cue", id);
        }
    }
}

/// Count events of one type
pub fn count_events(events: &[DirectorEvent], event_type: &str) -> usize {
    events.iter().filter(|e| e.event_type() == event_type).count()
}
