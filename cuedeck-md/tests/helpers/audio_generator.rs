//! WAV fixture generation
//!
//! Deterministic clips with known length for decoder and loader tests.

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::path::Path;

/// Standard test sample rate (44.1 kHz)
pub const TEST_SAMPLE_RATE: u32 = 44100;

/// Generate a stereo 16-bit sine WAV
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    frequency: f32,
    duration_ms: u64,
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: TEST_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    let total_frames = (TEST_SAMPLE_RATE as u64 * duration_ms) / 1000;

    for n in 0..total_frames {
        let t = n as f32 / TEST_SAMPLE_RATE as f32;
        let sample = ((2.0 * PI * frequency * t).sin() * 0.5 * i16::MAX as f32) as i16;
        writer.write_sample(sample)?;
        writer.write_sample(sample)?;
    }

    writer.finalize()?;
    Ok(())
}
