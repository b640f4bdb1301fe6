//! Energy-based voice activity gate.
//!
//! A frame is voice when the mean absolute amplitude of its signed 16-bit
//! little-endian samples is strictly greater than
//! `base_threshold * (1 + noise)`.

use tracing::trace;

use crate::config::NoiseConfig;
use crate::core::constants::{BYTES_PER_SAMPLE, MAX_NOISE_LEVEL};

/// Background noise estimate scaling the gate threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoiseEstimate {
    /// Constant level.
    Fixed(f32),
    /// Exponential moving average of the normalized energy of silent frames.
    Adaptive {
        /// Smoothing factor in (0, 1].
        alpha: f32,
        /// Current estimate.
        level: f32,
    },
}

impl NoiseEstimate {
    /// Current noise level.
    pub fn level(&self) -> f32 {
        match *self {
            NoiseEstimate::Fixed(level) => level,
            NoiseEstimate::Adaptive { level, .. } => level,
        }
    }

    fn observe_silence(&mut self, mean: f32, base: f32) {
        if let NoiseEstimate::Adaptive { alpha, level } = self {
            if base > 0.0 {
                let sample = mean / base;
                *level = ((1.0 - *alpha) * *level + *alpha * sample).clamp(0.0, MAX_NOISE_LEVEL);
            }
        }
    }
}

impl From<NoiseConfig> for NoiseEstimate {
    fn from(config: NoiseConfig) -> Self {
        match config {
            NoiseConfig::Fixed { level } => NoiseEstimate::Fixed(level),
            NoiseConfig::Adaptive { alpha, initial } => NoiseEstimate::Adaptive {
                alpha,
                level: initial.clamp(0.0, MAX_NOISE_LEVEL),
            },
        }
    }
}

/// Decides whether a captured frame is worth transmitting.
#[derive(Debug, Clone)]
pub struct VoiceActivityGate {
    base_threshold: f32,
    noise: NoiseEstimate,
}

impl VoiceActivityGate {
    /// Create a gate.
    pub fn new(base_threshold: f32, noise: NoiseEstimate) -> Self {
        Self {
            base_threshold,
            noise,
        }
    }

    /// Current effective threshold.
    pub fn threshold(&self) -> f32 {
        self.base_threshold * (1.0 + self.noise.level())
    }

    /// Current noise estimate.
    pub fn noise(&self) -> NoiseEstimate {
        self.noise
    }

    /// Classify a frame. Empty or odd-length frames are never voice.
    ///
    /// With an adaptive estimate, frames classified as silence update it.
    pub fn is_voice(&mut self, frame: &[u8]) -> bool {
        let Some(mean) = mean_amplitude(frame) else {
            trace!(len = frame.len(), "malformed frame rejected");
            return false;
        };

        let threshold = self.threshold();
        let voice = mean > threshold;
        trace!(mean, threshold, voice, "frame classified");
        if !voice {
            self.noise.observe_silence(mean, self.base_threshold);
        }
        voice
    }
}

/// Mean absolute amplitude of a frame of signed 16-bit little-endian
/// samples, or `None` when the frame is empty or has a dangling byte.
pub fn mean_amplitude(frame: &[u8]) -> Option<f32> {
    if frame.is_empty() || frame.len() % BYTES_PER_SAMPLE != 0 {
        return None;
    }

    let sum: u64 = frame
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|s| i32::from(i16::from_le_bytes([s[0], s[1]])).unsigned_abs() as u64)
        .sum();
    let samples = (frame.len() / BYTES_PER_SAMPLE) as f64;
    Some((sum as f64 / samples) as f32)
}
