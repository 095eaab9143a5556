//! # CueDeck Common Library
//!
//! Shared code for the CueDeck music director and its hosts:
//! - Music project configuration (music.json model, resolution, shared cache)
//! - Director event types and the broadcast `EventBus`
//! - Fade curve definitions and calculations
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod fade_curves;

pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
