//! Audio level sensing for voice-activity detection
//!
//! Computes windowed RMS energy once per analysis tick and applies the
//! exponential density response curve used for silence thresholding.

use serde::Serialize;

/// Steepness of the density response curve.
///
/// Higher values compress the quiet end of the amplitude range harder,
/// spreading out the loud end where speech lives.
const DENSITY_K: f32 = 5.0;

/// Level reading produced once per analysis tick
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LevelReading {
    /// RMS (root mean square) level, normalised 0.0-1.0
    pub rms: f32,
    /// Density-transformed RMS, normalised 0.0-1.0
    pub density: f32,
}

/// Calculate RMS level for a buffer of samples
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Calculate peak level for a buffer of samples
pub fn calculate_peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

/// Apply the density response curve to a normalised amplitude.
///
/// `d(a) = exp(-K·(1-a))`. The curve maps 1.0 to 1.0 and squashes small
/// amplitudes towards zero, so a fixed threshold discriminates speech from
/// room noise more sharply than raw RMS would.
pub fn density(amplitude: f32) -> f32 {
    (-DENSITY_K * (1.0 - amplitude.clamp(0.0, 1.0))).exp()
}

/// Voice level detector
///
/// Pure: each reading is a function of the supplied frame window only.
/// The configured threshold is passed through the same density transform as
/// the signal, keeping the comparison symmetric.
#[derive(Debug, Clone)]
pub struct LevelDetector {
    threshold: f32,
}

impl LevelDetector {
    /// Create a detector with the given pre-transform silence threshold
    pub fn new(silence_threshold: f32) -> Self {
        Self {
            threshold: silence_threshold.clamp(0.0, 1.0),
        }
    }

    /// The configured pre-transform threshold
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Replace the threshold (settings reload)
    pub fn set_threshold(&mut self, silence_threshold: f32) {
        self.threshold = silence_threshold.clamp(0.0, 1.0);
    }

    /// Read the current frame window
    pub fn reading(&self, frame: &[f32]) -> LevelReading {
        let rms = calculate_rms(frame);
        LevelReading {
            rms: rms.min(1.0),
            density: density(rms),
        }
    }

    /// Whether the frame window reads as voice (above the silence threshold)
    pub fn is_voice(&self, frame: &[f32]) -> bool {
        self.reading(frame).density > density(self.threshold)
    }
}
