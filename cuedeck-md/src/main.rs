//! CueDeck Music Director (cuedeck-md) - simulator entry point
//!
//! Runs the director against a simulated video host so music.json cue lists
//! can be auditioned and debugged without the full application. Clips load
//! through the standard file/HTTP loader; director events are logged as JSON.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cuedeck_common::config::{load_music_config, MusicConfigProvider, MusicConfigResolver};
use cuedeck_common::events::EventBus;
use cuedeck_md::config::{Config, ConfigOverrides};
use cuedeck_md::{ClipLoader, MusicDirector, SceneSignals, SimulatedHost, StandardClipLoader};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for cuedeck-md
#[derive(Parser, Debug)]
#[command(name = "cuedeck-md")]
#[command(about = "Music director simulator for CueDeck scenes")]
#[command(version)]
struct Args {
    /// Bootstrap TOML (defaults to the platform config directory)
    #[arg(short, long, env = "CUEDECK_CONFIG")]
    config: Option<PathBuf>,

    /// music.json to use instead of the resolved one (must exist)
    #[arg(short, long)]
    music: Option<PathBuf>,

    /// Root for relative clip locators and bundled music.json
    #[arg(short, long, env = "CUEDECK_ASSET_ROOT")]
    asset_root: Option<PathBuf>,

    /// Scene to announce at startup
    #[arg(short, long)]
    scene: Option<String>,

    /// Seconds to run before stopping
    #[arg(short, long, default_value = "30")]
    duration: f64,

    /// Pause the simulated video after this many seconds
    #[arg(long)]
    pause_at: Option<f64>,

    /// Resume normal playback after this many seconds
    #[arg(long)]
    resume_at: Option<f64>,

    /// Start fast-forwarding after this many seconds
    #[arg(long)]
    fast_forward_at: Option<f64>,

    /// Playback rate used by --fast-forward-at
    #[arg(long, default_value = "4.0")]
    fast_rate: f32,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(
        args.config.as_deref(),
        ConfigOverrides {
            music_config: args.music.clone(),
            asset_root: args.asset_root.clone(),
            log_level: args.log_level.clone(),
        },
    )
    .context("Failed to load configuration")?;

    init_tracing(&config)?;

    info!("Starting CueDeck music director simulator");
    info!("Tick rate: {} Hz", config.tick_rate_hz);
    if let Some(root) = &config.asset_root {
        info!("Asset root: {}", root.display());
    }

    // A music.json named on the command line must exist and parse
    let provider = match &args.music {
        Some(path) => {
            let music = load_music_config(path).with_context(|| {
                format!("Failed to load music configuration {}", path.display())
            })?;
            MusicConfigProvider::fixed(music)
        }
        None => MusicConfigProvider::new(
            MusicConfigResolver::new(config.asset_root.clone())
                .with_explicit(config.music_config.clone()),
        ),
    };
    let loader: Arc<dyn ClipLoader> = Arc::new(StandardClipLoader::new(
        tokio::runtime::Handle::current(),
        config.asset_root.clone(),
    ));
    let events = EventBus::default();
    spawn_event_logger(&events);

    let mut director = MusicDirector::new(config.director.clone(), provider, loader, events);
    let signals = SceneSignals::new();
    director.bind_scene_signals(&signals);

    let mut host = SimulatedHost::new();
    if let Some(scene) = &args.scene {
        signals.announce(scene);
    }

    let tick = Duration::from_secs_f64(1.0 / config.tick_rate_hz as f64);
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let started = Instant::now();
    let mut last = started;
    let mut script = Script::from_args(&args);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => break,
        }

        let now = Instant::now();
        let dt = now - last;
        last = now;

        let elapsed = (now - started).as_secs_f64();
        script.apply(elapsed, &mut host);

        host.advance(dt);
        director.tick(&mut host, dt);

        if elapsed >= args.duration {
            info!("Simulation finished after {:.1}s", elapsed);
            break;
        }
    }

    let snapshot = director.snapshot();
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => info!("Final director state:\n{}", json),
        Err(e) => warn!("Could not serialize director state: {}", e),
    }

    director.shutdown(&mut host);
    info!("Shutdown complete");
    Ok(())
}

/// Timed playback-state changes for the simulated host
struct Script {
    steps: Vec<(f64, Step)>,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Pause,
    Resume,
    FastForward(f32),
}

impl Script {
    fn from_args(args: &Args) -> Self {
        let mut steps: Vec<(f64, Step)> = [
            args.pause_at.map(|t| (t, Step::Pause)),
            args.resume_at.map(|t| (t, Step::Resume)),
            args.fast_forward_at.map(|t| (t, Step::FastForward(args.fast_rate))),
        ]
        .into_iter()
        .flatten()
        .collect();
        steps.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { steps }
    }

    fn apply(&mut self, elapsed: f64, host: &mut SimulatedHost) {
        while let Some((at, step)) = self.steps.first().copied() {
            if elapsed < at {
                break;
            }
            self.steps.remove(0);
            info!("[{:.2}s] simulated video: {:?}", elapsed, step);
            match step {
                Step::Pause => host.set_paused(true),
                Step::Resume => {
                    host.set_paused(false);
                    host.set_rate(1.0);
                }
                Step::FastForward(rate) => {
                    host.set_paused(false);
                    host.set_rate(rate);
                }
            }
        }
    }
}

fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            Some(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
        }
        None => None,
    };
    let stderr_layer = file_layer.is_none().then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

/// Log every director event as JSON
fn spawn_event_logger(events: &EventBus) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => info!(event = event.event_type(), "{}", json),
                    Err(e) => warn!("Unserializable event {}: {}", event.event_type(), e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event logger lagged, {} event(s) skipped", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
