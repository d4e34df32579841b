//! Speech provider abstraction
//!
//! One trait, several interchangeable backends. The concrete backend is
//! bound once during startup from configuration and injected into the
//! orchestrator; selection never happens per request.

mod local;
mod offline;
mod remote;
mod streaming;
mod stub;

pub use local::LocalEngineProvider;
pub use offline::OfflineModelProvider;
pub use remote::RemoteApiProvider;
pub use streaming::StreamingProvider;
pub use stub::StubProvider;

use std::sync::Arc;

use async_trait::async_trait;

use voxcard_config::{ProviderBackend, Settings};
use voxcard_core::{AudioSegment, ProviderError, SynthesisRequest};

/// A swappable strategy that turns text plus a voice selection into a
/// finite audio segment.
///
/// The full segment is materialized before return, even when the
/// underlying transport streams internally; no partial results cross
/// this boundary.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Backend name for diagnostics.
    fn name(&self) -> &str;

    /// Synthesize one request into a complete audio segment.
    ///
    /// Pacing applies per call, independent of voice selection, even on
    /// engines that hold rate as session state.
    async fn synthesize(&self, request: &SynthesisRequest)
        -> Result<AudioSegment, ProviderError>;
}

/// Bind the configured backend. Called once at startup; a missing
/// credential fails here rather than on the first request.
pub async fn build_provider(
    settings: &Settings,
) -> Result<Arc<dyn SpeechProvider>, ProviderError> {
    let provider: Arc<dyn SpeechProvider> = match settings.provider.backend {
        ProviderBackend::Remote => Arc::new(RemoteApiProvider::new(
            &settings.provider,
            settings.audio.sample_rate,
        )?),
        ProviderBackend::Offline => Arc::new(OfflineModelProvider::load(
            &settings.provider.model_path,
            settings.audio.sample_rate,
        )),
        ProviderBackend::Streaming => Arc::new(StreamingProvider::spawn(
            &settings.provider,
            settings.audio.sample_rate,
        )?),
        ProviderBackend::Local => {
            Arc::new(LocalEngineProvider::detect(&settings.provider).await?)
        }
        ProviderBackend::Stub => Arc::new(StubProvider::new(settings.audio.sample_rate)),
    };
    tracing::info!(backend = provider.name(), "speech provider bound");
    Ok(provider)
}

/// Decode little-endian 16-bit PCM into a segment.
///
/// An odd byte count means the upstream body was cut mid-sample; the
/// partial sample is discarded with a warning rather than misaligning
/// everything after it.
pub(crate) fn pcm16_to_segment(
    bytes: &[u8],
    sample_rate: u32,
    channels: u16,
) -> AudioSegment {
    if bytes.len() % 2 != 0 {
        tracing::warn!(
            bytes = bytes.len(),
            "pcm body has a trailing partial sample; upstream likely truncated"
        );
    }
    let samples = bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / i16::MAX as f32)
        .collect();
    AudioSegment::new(samples, sample_rate, channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_decoding() {
        let bytes = [0x00, 0x00, 0xFF, 0x7F, 0x01, 0x80];
        let seg = pcm16_to_segment(&bytes, 16000, 1);
        assert_eq!(seg.samples().len(), 3);
        assert_eq!(seg.samples()[0], 0.0);
        assert!((seg.samples()[1] - 1.0).abs() < 1e-6);
        assert!(seg.samples()[2] < -0.99);
    }

    #[test]
    fn truncated_pcm_drops_only_the_partial_sample() {
        let bytes = [0x00, 0x00, 0xFF, 0x7F, 0x42];
        let seg = pcm16_to_segment(&bytes, 16000, 1);
        assert_eq!(seg.samples().len(), 2);
        assert!((seg.samples()[1] - 1.0).abs() < 1e-6);
    }
}
