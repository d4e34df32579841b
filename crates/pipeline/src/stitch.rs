//! Segment normalization, concatenation, and delivery encoding

use std::io::Cursor;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use voxcard_config::AudioConfig;
use voxcard_core::{AudioEncoding, AudioSegment, StitchError};

/// Concatenates heterogeneous segments into one normalized segment and
/// encodes it to the delivery format.
///
/// Inputs may arrive in different sample rates and channel layouts
/// (different providers emit different native formats); every segment
/// is converted to the working format before concatenation. Raw
/// byte-level concatenation of mismatched formats never happens.
pub struct AudioStitcher {
    sample_rate: u32,
    channels: u16,
    bitrate_kbps: u32,
}

impl AudioStitcher {
    pub fn new(audio: &AudioConfig) -> Self {
        Self {
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            bitrate_kbps: audio.bitrate_kbps,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Concatenate segments in caller-supplied order, normalizing each
    /// to the working format first. Takes ownership of all inputs and
    /// produces a new, independently-owned output segment.
    pub fn stitch(&self, segments: Vec<AudioSegment>) -> Result<AudioSegment, StitchError> {
        if segments.is_empty() {
            return Err(StitchError::Empty);
        }

        let mut out = Vec::new();
        for segment in segments {
            let normalized = self.normalize(segment)?;
            out.extend_from_slice(normalized.samples());
        }
        Ok(AudioSegment::new(out, self.sample_rate, self.channels))
    }

    /// Convert a segment to the working sample rate and channel layout.
    fn normalize(&self, segment: AudioSegment) -> Result<AudioSegment, StitchError> {
        if segment.channels() > 2 {
            return Err(StitchError::FormatMismatch(format!(
                "{} channels unsupported",
                segment.channels()
            )));
        }

        let segment = if segment.channels() == self.channels {
            segment
        } else {
            remix_channels(segment, self.channels)
        };

        if segment.sample_rate() == self.sample_rate {
            return Ok(segment);
        }
        Ok(resample(segment, self.sample_rate))
    }

    /// Encode a stitched segment to the delivery format.
    pub async fn encode(
        &self,
        segment: &AudioSegment,
        encoding: AudioEncoding,
    ) -> Result<Vec<u8>, StitchError> {
        match encoding {
            AudioEncoding::Wav => self.encode_wav(segment),
            AudioEncoding::Mp3 => self.encode_mp3(segment).await,
        }
    }

    fn encode_wav(&self, segment: &AudioSegment) -> Result<Vec<u8>, StitchError> {
        let spec = hound::WavSpec {
            channels: segment.channels(),
            sample_rate: segment.sample_rate(),
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| StitchError::Codec(format!("wav writer: {e}")))?;
            for &sample in segment.samples() {
                writer
                    .write_sample(to_i16(sample))
                    .map_err(|e| StitchError::Codec(format!("wav write: {e}")))?;
            }
            writer
                .finalize()
                .map_err(|e| StitchError::Codec(format!("wav finalize: {e}")))?;
        }
        Ok(cursor.into_inner())
    }

    /// Lossy encoding is delegated to an external ffmpeg process. A
    /// missing or failing codec maps to a codec error, never a crash.
    async fn encode_mp3(&self, segment: &AudioSegment) -> Result<Vec<u8>, StitchError> {
        let pcm: Vec<u8> = segment
            .samples()
            .iter()
            .flat_map(|&s| to_i16(s).to_le_bytes())
            .collect();

        let mut child = Command::new("ffmpeg")
            .args([
                "-f",
                "s16le",
                "-ar",
                &segment.sample_rate().to_string(),
                "-ac",
                &segment.channels().to_string(),
                "-i",
                "pipe:0",
                "-b:a",
                &format!("{}k", self.bitrate_kbps),
                "-f",
                "mp3",
                "pipe:1",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StitchError::Codec(format!("ffmpeg unavailable: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| StitchError::Codec("ffmpeg stdin unavailable".to_string()))?;
        // Feed stdin from a task so a full stdout pipe cannot deadlock us.
        let writer = tokio::spawn(async move {
            let _ = stdin.write_all(&pcm).await;
            let _ = stdin.shutdown().await;
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| StitchError::Codec(format!("ffmpeg wait: {e}")))?;
        let _ = writer.await;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StitchError::Codec(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.lines().last().unwrap_or("")
            )));
        }
        if output.stdout.is_empty() {
            return Err(StitchError::Codec("ffmpeg produced no output".to_string()));
        }
        Ok(output.stdout)
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Downmix to mono by averaging, or duplicate mono into stereo.
fn remix_channels(segment: AudioSegment, target: u16) -> AudioSegment {
    let rate = segment.sample_rate();
    let from = segment.channels() as usize;
    let samples = segment.into_samples();

    let out = match (from, target) {
        (2, 1) => samples
            .chunks_exact(2)
            .map(|frame| (frame[0] + frame[1]) * 0.5)
            .collect(),
        (1, 2) => samples.iter().flat_map(|&s| [s, s]).collect(),
        _ => samples,
    };
    AudioSegment::new(out, rate, target)
}

/// Linear-interpolation resampling, per channel.
fn resample(segment: AudioSegment, target_rate: u32) -> AudioSegment {
    let from_rate = segment.sample_rate();
    let channels = segment.channels() as usize;
    let in_frames = segment.frames();
    let samples = segment.into_samples();

    if in_frames == 0 {
        return AudioSegment::new(Vec::new(), target_rate, channels as u16);
    }

    let out_frames = ((in_frames as u64 * target_rate as u64 + from_rate as u64 / 2)
        / from_rate as u64) as usize;
    let step = from_rate as f64 / target_rate as f64;

    let mut out = vec![0.0f32; out_frames * channels];
    for frame in 0..out_frames {
        let pos = frame as f64 * step;
        let i = pos as usize;
        let frac = (pos - i as f64) as f32;
        let j = (i + 1).min(in_frames - 1);
        for ch in 0..channels {
            let a = samples[i * channels + ch];
            let b = samples[j * channels + ch];
            out[frame * channels + ch] = a + (b - a) * frac;
        }
    }
    AudioSegment::new(out, target_rate, channels as u16)
}
