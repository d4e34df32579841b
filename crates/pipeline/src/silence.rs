//! Silence segment generation

use voxcard_core::AudioSegment;

/// Produces all-zero segments of an exact requested duration.
///
/// Pure and deterministic: identical arguments yield identical output.
pub struct SilenceGenerator;

impl SilenceGenerator {
    /// Generate `duration_ms` of silence at the given format.
    ///
    /// Sample count is `round(duration_ms / 1000 * sample_rate) * channels`.
    /// A zero duration is a caller contract violation, not a runtime
    /// error to recover from.
    pub fn generate(duration_ms: u64, sample_rate: u32, channels: u16) -> AudioSegment {
        assert!(duration_ms > 0, "silence duration must be positive");

        let frames = (duration_ms * sample_rate as u64 + 500) / 1000;
        let samples = vec![0.0f32; frames as usize * channels as usize];
        AudioSegment::new(samples, sample_rate, channels)
    }
}
