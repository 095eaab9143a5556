//! Tests for music.json resolution and graceful degradation
//!
//! Missing or malformed music.json must never abort startup: the provider
//! falls back to an empty configuration.
//!
//! Note: Uses serial_test to prevent environment variable races.
//! Tests that touch CUEDECK_MUSIC_CONFIG are marked with #[serial].

use cuedeck_common::config::{
    load_music_config, MusicConfigProvider, MusicConfigResolver, MUSIC_CONFIG_ENV,
};
use cuedeck_common::Error;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

const MINIMAL: &str = r#"{ "scenes": [ { "name": "Hall", "cues": [ { "file": "hall.ogg", "startOnSceneLoad": true } ] } ] }"#;

fn write_music_json(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("music.json");
    fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn test_resolver_prefers_explicit_path() {
    env::remove_var(MUSIC_CONFIG_ENV);
    let explicit_dir = TempDir::new().unwrap();
    let bundled_dir = TempDir::new().unwrap();
    let explicit = write_music_json(&explicit_dir, MINIMAL);
    write_music_json(&bundled_dir, MINIMAL);

    let resolver = MusicConfigResolver::new(Some(bundled_dir.path().to_path_buf()))
        .with_persistent_dir(None)
        .with_explicit(Some(explicit.clone()));

    assert_eq!(resolver.resolve(), Some(explicit));
}

#[test]
#[serial]
fn test_resolver_env_beats_persistent_and_bundled() {
    let env_dir = TempDir::new().unwrap();
    let persistent_dir = TempDir::new().unwrap();
    let env_path = write_music_json(&env_dir, MINIMAL);
    write_music_json(&persistent_dir, MINIMAL);

    env::set_var(MUSIC_CONFIG_ENV, &env_path);
    let resolver = MusicConfigResolver::new(None)
        .with_persistent_dir(Some(persistent_dir.path().to_path_buf()));
    let resolved = resolver.resolve();
    env::remove_var(MUSIC_CONFIG_ENV);

    assert_eq!(resolved, Some(env_path));
}

#[test]
#[serial]
fn test_resolver_persistent_beats_bundled() {
    env::remove_var(MUSIC_CONFIG_ENV);
    let persistent_dir = TempDir::new().unwrap();
    let bundled_dir = TempDir::new().unwrap();
    let persistent = write_music_json(&persistent_dir, MINIMAL);
    write_music_json(&bundled_dir, MINIMAL);

    let resolver = MusicConfigResolver::new(Some(bundled_dir.path().to_path_buf()))
        .with_persistent_dir(Some(persistent_dir.path().to_path_buf()));

    assert_eq!(resolver.resolve(), Some(persistent));
}

#[test]
#[serial]
fn test_provider_missing_file_yields_empty_config() {
    env::remove_var(MUSIC_CONFIG_ENV);
    let empty_dir = TempDir::new().unwrap();
    let resolver = MusicConfigResolver::new(Some(empty_dir.path().to_path_buf()))
        .with_persistent_dir(None);

    let provider = MusicConfigProvider::new(resolver);
    let config = provider.load();
    assert!(config.scenes.is_empty());
    assert!(config.global_playlist().is_empty());
}

#[test]
#[serial]
fn test_provider_malformed_file_yields_empty_config() {
    env::remove_var(MUSIC_CONFIG_ENV);
    let dir = TempDir::new().unwrap();
    write_music_json(&dir, "{ not json");
    let resolver =
        MusicConfigResolver::new(Some(dir.path().to_path_buf())).with_persistent_dir(None);

    let config = MusicConfigProvider::new(resolver).load();
    assert!(config.scenes.is_empty());
}

#[test]
#[serial]
fn test_provider_caches_until_invalidated() {
    env::remove_var(MUSIC_CONFIG_ENV);
    let dir = TempDir::new().unwrap();
    let path = write_music_json(&dir, MINIMAL);
    let resolver =
        MusicConfigResolver::new(Some(dir.path().to_path_buf())).with_persistent_dir(None);
    let provider = MusicConfigProvider::new(resolver);

    assert_eq!(provider.load().scenes.len(), 1);

    // Rewrite on disk: cache still serves the old content
    fs::write(&path, r#"{ "scenes": [] }"#).unwrap();
    assert_eq!(provider.load().scenes.len(), 1);

    provider.invalidate();
    assert_eq!(provider.load().scenes.len(), 0);
}

#[test]
fn test_load_music_config_reports_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = load_music_config(&dir.path().join("absent.json"));
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[test]
fn test_load_music_config_reports_malformed_file() {
    let dir = TempDir::new().unwrap();
    let path = write_music_json(&dir, "{ \"scenes\": [ ");
    let result = load_music_config(&path);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_load_music_config_reads_valid_file() {
    let dir = TempDir::new().unwrap();
    let path = write_music_json(&dir, MINIMAL);
    let config = load_music_config(&path).unwrap();
    assert_eq!(config.scene_cues("Hall").len(), 1);
}
