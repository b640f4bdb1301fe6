//! Audio capture and voice activity gating.

mod source;
mod vad;

pub use source::PcmReader;
pub use vad::{NoiseEstimate, VoiceActivityGate, mean_amplitude};
