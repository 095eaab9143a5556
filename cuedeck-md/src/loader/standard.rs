//! Standard clip loader for local files and HTTP(S) URLs
//!
//! Locators follow what content authors put in music.json:
//! - plain paths (relative paths resolve against the asset root)
//! - Windows drive paths (`C:\music\intro.ogg`)
//! - `file:///` URLs
//! - `http://` / `https://` URLs
//!
//! Local files decode on tokio's blocking pool; remote clips are fetched with
//! reqwest and decoded from memory. Each load is one spawned task whose abort
//! handle lives in the returned [`LoadHandle`].

use super::{ClipBuffer, ClipDecoder, ClipLoader, DecodedAudio, LoadHandle};
use crate::error::{Error, Result};
use reqwest::Url;
use std::path::{Path, PathBuf};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Where a locator points
#[derive(Debug, Clone, PartialEq)]
pub enum ClipSource {
    File(PathBuf),
    Remote(Url),
}

/// Classify a locator
pub fn resolve_locator(locator: &str, asset_root: Option<&Path>) -> Result<ClipSource> {
    let locator = locator.trim();
    if locator.is_empty() {
        return Err(Error::UnsupportedLocator("empty locator".to_string()));
    }

    let lower = locator.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        let url = Url::parse(locator)
            .map_err(|e| Error::UnsupportedLocator(format!("{}: {}", locator, e)))?;
        return Ok(ClipSource::Remote(url));
    }

    if lower.starts_with("file:") {
        let url = Url::parse(locator)
            .map_err(|e| Error::UnsupportedLocator(format!("{}: {}", locator, e)))?;
        let path = url
            .to_file_path()
            .map_err(|_| Error::UnsupportedLocator(locator.to_string()))?;
        return Ok(ClipSource::File(path));
    }

    let bytes = locator.as_bytes();
    let is_drive_path = bytes.len() > 1 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic();
    let path = PathBuf::from(locator);
    if is_drive_path || path.is_absolute() {
        return Ok(ClipSource::File(path));
    }

    Ok(ClipSource::File(match asset_root {
        Some(root) => root.join(path),
        None => path,
    }))
}

/// Loader for file and HTTP locators
#[derive(Debug, Clone)]
pub struct StandardClipLoader {
    runtime: Handle,
    asset_root: Option<PathBuf>,
    http: reqwest::Client,
}

impl StandardClipLoader {
    /// Create a loader spawning onto `runtime`
    pub fn new(runtime: Handle, asset_root: Option<PathBuf>) -> Self {
        Self {
            runtime,
            asset_root,
            http: reqwest::Client::new(),
        }
    }

    pub fn asset_root(&self) -> Option<&Path> {
        self.asset_root.as_deref()
    }
}

impl ClipLoader for StandardClipLoader {
    fn load(&self, locator: &str) -> LoadHandle {
        let source = match resolve_locator(locator, self.asset_root.as_deref()) {
            Ok(source) => source,
            Err(e) => return LoadHandle::ready(locator, Err(e)),
        };

        debug!("Loading clip {} from {:?}", locator, source);

        let (tx, rx) = oneshot::channel();
        let name = locator.to_string();
        let http = self.http.clone();

        let task = self.runtime.spawn(async move {
            let result = match source {
                ClipSource::File(path) => decode_file_blocking(path).await,
                ClipSource::Remote(url) => fetch_and_decode(http, url).await,
            };

            let clip = result
                .map(|audio| ClipBuffer::from_samples(name.clone(), audio.samples, audio.sample_rate, audio.channels))
                .map_err(|e| match e {
                    Error::ClipLoad { .. } | Error::LoadCancelled(_) => e,
                    other => Error::ClipLoad {
                        locator: name.clone(),
                        reason: other.to_string(),
                    },
                });

            if let Err(e) = &clip {
                warn!("Clip load failed: {}", e);
            }

            // Receiver gone means the load was cancelled
            let _ = tx.send(clip);
        });

        LoadHandle::new(locator.to_string(), rx, Some(task.abort_handle()))
    }
}

async fn decode_file_blocking(path: PathBuf) -> Result<DecodedAudio> {
    tokio::task::spawn_blocking(move || ClipDecoder::decode_file(&path))
        .await
        .map_err(|e| Error::LoadCancelled(format!("decode task: {}", e)))?
}

async fn fetch_and_decode(http: reqwest::Client, url: Url) -> Result<DecodedAudio> {
    let extension = Path::new(url.path())
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_string());

    let response = http
        .get(url.clone())
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| Error::ClipLoad {
            locator: url.to_string(),
            reason: e.to_string(),
        })?;

    let bytes = response.bytes().await.map_err(|e| Error::ClipLoad {
        locator: url.to_string(),
        reason: e.to_string(),
    })?;

    tokio::task::spawn_blocking(move || ClipDecoder::decode_bytes(bytes.to_vec(), extension.as_deref()))
        .await
        .map_err(|e| Error::LoadCancelled(format!("decode task: {}", e)))?
}
