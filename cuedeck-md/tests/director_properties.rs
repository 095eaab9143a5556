//! Director invariants under longer runs
//!
//! Channel exclusivity is asserted by `Rig::tick` on every frame; these tests
//! pick cue lists that stress it and check the remaining mix properties.

mod helpers;

use cuedeck_common::config::{CueDefinition, MusicCue, MusicProjectConfig};
use cuedeck_common::events::DirectorEvent;
use cuedeck_md::playback::{CuePhase, Loan};
use cuedeck_md::DirectorSettings;
use helpers::{count_events, Rig, LONG_CLIP};

fn playlist_config() -> MusicProjectConfig {
    MusicProjectConfig {
        playlist: vec![MusicCue {
            file: "ambient.ogg".to_string(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

#[test]
fn test_dense_timeline_keeps_channels_exclusive() {
    let mut rig = Rig::new(DirectorSettings::default());
    let cues: Vec<CueDefinition> = (0..12)
        .map(|i| {
            let locator = format!("cue{}.ogg", i);
            rig.loader.ready(locator.clone(), LONG_CLIP);
            CueDefinition::new(locator)
                .at(1.0 + i as f64 * 0.4)
                .with_fade_in(0.3)
                .with_fade_out(0.6)
        })
        .collect();

    rig.director.activate_cues("Montage", cues);
    rig.run_until_position(8.0);

    for i in 0..11 {
        assert_eq!(rig.phase(i), CuePhase::Stopped, "cue {}", i);
    }
    assert_eq!(rig.phase(11), CuePhase::Playing);
    assert_eq!(rig.scene_loans(), 1);
}

#[test]
fn test_exclusivity_with_three_channels_and_slow_loads() {
    let settings = DirectorSettings {
        scene_channels: 3,
        ..Default::default()
    };
    let mut rig = Rig::new(settings);
    rig.loader
        .hold("a.ogg", LONG_CLIP)
        .hold("b.ogg", LONG_CLIP)
        .ready("c.ogg", LONG_CLIP)
        .ready("d.ogg", LONG_CLIP);

    rig.director.activate_cues(
        "Scene",
        vec![
            CueDefinition::new("a.ogg").at(0.5),
            CueDefinition::new("b.ogg").at(0.6),
            CueDefinition::new("c.ogg").at(0.7),
            CueDefinition::new("d.ogg").at(0.8),
        ],
    );
    rig.run_until_position(1.0);

    // d had to reclaim the oldest loan (a, still loading)
    assert_eq!(rig.phase(0), CuePhase::Stopped);
    assert_eq!(rig.phase(1), CuePhase::Loading);
    assert_eq!(rig.phase(2), CuePhase::FadingOut);
    assert_eq!(rig.phase(3), CuePhase::Playing);

    assert_eq!(rig.loader.release("a.ogg"), 0);
    assert_eq!(rig.loader.release("b.ogg"), 1);
    rig.tick();
    assert_eq!(rig.phase(1), CuePhase::Playing);
    assert_eq!(rig.phase(3), CuePhase::FadingOut);

    rig.run_for(1.0);
    assert_eq!(rig.scene_loans(), 1);
}

#[test]
fn test_crossfade_volumes_are_continuous() {
    let mut rig = Rig::new(DirectorSettings::default());
    rig.loader
        .ready("a.ogg", LONG_CLIP)
        .ready("b.ogg", LONG_CLIP);

    rig.director.activate_cues(
        "Scene",
        vec![
            CueDefinition::new("a.ogg").on_scene_load().with_fade_in(0.5),
            CueDefinition::new("b.ogg")
                .at(2.0)
                .with_fade_in(1.0)
                .with_fade_out(0.8),
        ],
    );
    rig.run_until_position(1.9);
    let a = rig.channel_of(0);

    let mut previous_a = rig.channel(a).volume();
    let mut previous_b = 0.0_f32;
    let mut b = None;
    for _ in 0..90 {
        rig.tick();
        let va = rig.channel(a).volume();
        assert!(va <= previous_a + 1e-6, "outgoing volume rose");
        assert!(previous_a - va < 0.05, "outgoing volume jumped");
        previous_a = va;

        if let Some(id) = b.or_else(|| rig.director.cue_channel(1)) {
            b = Some(id);
            let vb = rig.channel(id).volume();
            assert!(vb >= previous_b - 1e-6, "incoming volume fell");
            assert!(vb - previous_b < 0.05, "incoming volume jumped");
            previous_b = vb;
        }
    }

    assert_eq!(previous_a, 0.0);
    assert!((previous_b - 1.0).abs() < 1e-4);
}

#[test]
fn test_ducking_engages_once() {
    let mut rig = Rig::new(DirectorSettings::default());
    rig.host.set_raw_volume(0.9);
    rig.loader
        .ready("a.ogg", LONG_CLIP)
        .ready("b.ogg", LONG_CLIP);

    rig.director.activate_cues(
        "Scene",
        vec![
            CueDefinition::new("a.ogg").on_scene_load(),
            CueDefinition::new("b.ogg").at(2.0),
        ],
    );
    rig.run_for(4.0);

    let events = rig.drain_events();
    assert_eq!(count_events(&events, "DuckEngaged"), 1);
    assert_eq!(count_events(&events, "DuckReleased"), 0);
    assert_eq!(rig.director.duck_state().snapshot, Some(0.9));
    assert!((rig.host.raw_volume() - 0.6).abs() < 1e-4);

    // Steady state writes nothing
    let writes = rig.host.volume_writes();
    rig.run_for(1.0);
    assert_eq!(rig.host.volume_writes(), writes);
}

#[test]
fn test_ducking_reengage_mid_release_keeps_original_snapshot() {
    let mut rig = Rig::new(DirectorSettings::default());
    rig.host.set_raw_volume(0.8);
    rig.loader
        .ready("a.ogg", LONG_CLIP)
        .ready("b.ogg", LONG_CLIP);

    rig.director.activate_cues(
        "Scene",
        vec![CueDefinition::new("a.ogg")
            .on_scene_load()
            .stop_at(2.0)
            .with_fade_out(0.1)],
    );
    rig.run_until_position(2.2);
    assert!(!rig.director.duck_state().engaged);

    // Half-way back up
    rig.run_for(0.2);
    let partial = rig.host.raw_volume();
    assert!(partial > 0.6 && partial < 0.8);

    rig.director
        .activate_cues("Next", vec![CueDefinition::new("b.ogg").on_scene_load()]);
    rig.tick();
    assert!(rig.director.duck_state().engaged);
    assert_eq!(rig.director.duck_state().snapshot, Some(0.8));

    rig.director.activate_cues("Silence", Vec::new());
    rig.run_for(2.0);
    assert!((rig.host.raw_volume() - 0.8).abs() < 1e-4);
}

#[test]
fn test_ducking_disabled_never_touches_host() {
    let settings = DirectorSettings {
        enable_ducking: false,
        ..Default::default()
    };
    let mut rig = Rig::new(settings);
    rig.loader.ready("a.ogg", LONG_CLIP);
    rig.director
        .activate_cues("Scene", vec![CueDefinition::new("a.ogg").on_scene_load()]);
    rig.run_for(2.0);

    assert!(!rig.director.duck_state().engaged);
    assert_eq!(rig.host.volume_writes(), 0);
}

#[test]
fn test_overlay_suppresses_cue_starts() {
    let mut rig = Rig::with_config(DirectorSettings::default(), playlist_config());
    rig.loader
        .ready("ambient.ogg", LONG_CLIP)
        .ready("late.ogg", LONG_CLIP);

    rig.director
        .activate_cues("Scene", vec![CueDefinition::new("late.ogg").at(1.0)]);
    rig.run_until_position(0.9);

    rig.host.set_paused(true);
    rig.tick();
    assert!(rig.director.overlay_state().active);

    // Jump past the trigger while the overlay plays
    rig.host.seek(1.5);
    rig.run_for(1.0);
    assert_eq!(rig.phase(0), CuePhase::Idle);
    assert_eq!(rig.loader.request_count("late.ogg"), 0);

    rig.host.set_paused(false);
    rig.tick();
    assert_eq!(rig.phase(0), CuePhase::Idle);
    rig.tick();
    assert_eq!(rig.phase(0), CuePhase::Playing);
    assert_eq!(rig.loader.request_count("late.ogg"), 1);
}

#[test]
fn test_load_finishing_under_overlay_starts_suspended() {
    let mut rig = Rig::with_config(DirectorSettings::default(), playlist_config());
    rig.loader
        .ready("ambient.ogg", LONG_CLIP)
        .hold("slow.ogg", LONG_CLIP);

    rig.director
        .activate_cues("Scene", vec![CueDefinition::new("slow.ogg").on_scene_load()]);
    rig.tick();
    assert_eq!(rig.phase(0), CuePhase::Loading);

    rig.host.set_paused(true);
    rig.tick();
    assert!(rig.director.overlay_state().active);

    rig.loader.release("slow.ogg");
    rig.tick();
    assert_eq!(rig.phase(0), CuePhase::Playing);
    let channel = rig.channel_of(0);
    assert!(rig.channel(channel).is_suspended());
    assert!(!rig.channel(channel).is_playing());
    assert_eq!(rig.channel(channel).volume(), 0.0);
    assert_eq!(rig.director.pool().audible_scene_count(0.01), 0);

    rig.host.set_paused(false);
    rig.run_for(0.6);
    assert!(rig.channel(channel).is_playing());
    assert!((rig.channel(channel).volume() - 1.0).abs() < 1e-4);
}

#[test]
fn test_failure_leaves_other_cues_untouched() {
    let mut rig = Rig::new(DirectorSettings::default());
    rig.loader
        .ready("good.ogg", LONG_CLIP)
        .fail("bad.ogg", "unsupported codec");

    rig.director.activate_cues(
        "Scene",
        vec![
            CueDefinition::new("good.ogg").on_scene_load(),
            CueDefinition::new("bad.ogg").at(1.0),
        ],
    );
    rig.run_for(0.8);
    let good = rig.channel_of(0);
    let volume = rig.channel(good).volume();

    rig.run_until_position(1.0);
    assert_eq!(rig.phase(1), CuePhase::Failed);
    assert_eq!(rig.phase(0), CuePhase::Playing);
    assert_eq!(rig.channel_of(0), good);
    assert!(!rig.channel(good).is_stopping());
    assert!(rig.channel(good).volume() >= volume);

    let events = rig.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, DirectorEvent::CueFailed { cue_index: 1, .. })));
    assert_eq!(count_events(&events, "CrossfadeStarted"), 0);
    assert_eq!(rig.scene_loans(), 1);
    for id in rig.director.pool().scene_ids() {
        if id != good {
            assert_eq!(rig.channel(id).loan(), Loan::Free);
        }
    }
}

#[test]
fn test_cue_without_trigger_never_starts() {
    let mut rig = Rig::new(DirectorSettings::default());
    rig.loader.ready("idle.ogg", LONG_CLIP);
    rig.director
        .activate_cues("Scene", vec![CueDefinition::new("idle.ogg")]);
    rig.run_for(3.0);

    assert_eq!(rig.phase(0), CuePhase::Idle);
    assert_eq!(rig.loader.request_count("idle.ogg"), 0);
}
