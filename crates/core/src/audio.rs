//! Audio segment and encoding types

use serde::{Deserialize, Serialize};

/// A finite span of interleaved audio samples with a known format.
///
/// Segments are fully materialized: a provider returns one only after
/// the complete waveform is available. Ownership moves downstream with
/// the segment; the stitcher consumes its inputs and produces a new,
/// independently-owned output.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioSegment {
    /// Create a segment from interleaved samples.
    ///
    /// `sample_rate` and `channels` must be non-zero; a segment with an
    /// unknowable format is a programming error, not a runtime state.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        assert!(sample_rate > 0, "sample rate must be non-zero");
        assert!(channels > 0, "channel count must be non-zero");
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of sample frames (one frame spans all channels).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in milliseconds, rounded to the nearest millisecond.
    pub fn duration_ms(&self) -> u64 {
        (self.frames() as u64 * 1000 + self.sample_rate as u64 / 2) / self.sample_rate as u64
    }
}

/// Delivery encoding for artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoding {
    Wav,
    Mp3,
}

impl AudioEncoding {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioEncoding::Wav => "wav",
            AudioEncoding::Mp3 => "mp3",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            AudioEncoding::Wav => "audio/wav",
            AudioEncoding::Mp3 => "audio/mpeg",
        }
    }
}

impl Default for AudioEncoding {
    fn default() -> Self {
        AudioEncoding::Wav
    }
}
