//! Streaming-protocol provider
//!
//! Synthesis is driven by a chunked transfer from the upstream service.
//! The stream is drained on a dedicated single-threaded runtime owned
//! by a worker thread; callers hand work over a channel and await the
//! materialized segment. The caller observes an ordinary blocking call:
//! nothing returns until the whole stream has been drained.
//!
//! Precondition: the bridge must not be re-entered from its own worker
//! context. Giving the stream its own execution context is what makes
//! that impossible from the outside.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};

use voxcard_config::ProviderConfig;
use voxcard_core::{AudioSegment, ProviderError, SynthesisRequest, VoiceGender, VoiceSelector};

use super::{pcm16_to_segment, SpeechProvider};

struct Work {
    request: SynthesisRequest,
    reply: oneshot::Sender<Result<AudioSegment, ProviderError>>,
}

pub struct StreamingProvider {
    work_tx: mpsc::Sender<Work>,
}

impl StreamingProvider {
    /// Validates the credential, then spawns the worker thread that
    /// owns the stream-draining runtime for the life of the provider.
    pub fn spawn(config: &ProviderConfig, sample_rate: u32) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ProviderError::AuthMissing)?
            .to_string();

        let worker = Worker {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            model_id: config.model_id.clone(),
            voice_male: config.voice_male.clone(),
            voice_female: config.voice_female.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            sample_rate,
        };

        let (work_tx, work_rx) = mpsc::channel::<Work>(16);
        std::thread::Builder::new()
            .name("stream-synth".to_string())
            .spawn(move || worker.run(work_rx))
            .map_err(|e| ProviderError::TransportFailure {
                status: None,
                detail: format!("spawning synthesis worker: {e}"),
            })?;

        Ok(Self { work_tx })
    }
}

#[async_trait]
impl SpeechProvider for StreamingProvider {
    fn name(&self) -> &str {
        "streaming"
    }

    async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<AudioSegment, ProviderError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.work_tx
            .send(Work {
                request: request.clone(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| ProviderError::TransportFailure {
                status: None,
                detail: "synthesis worker terminated".to_string(),
            })?;

        reply_rx.await.map_err(|_| ProviderError::TransportFailure {
            status: None,
            detail: "synthesis worker dropped the request".to_string(),
        })?
    }
}

struct Worker {
    endpoint: String,
    api_key: String,
    model_id: String,
    voice_male: String,
    voice_female: String,
    timeout: Duration,
    sample_rate: u32,
}

impl Worker {
    /// Worker loop: owns a current-thread runtime, processes one
    /// synthesis at a time, exits when the provider is dropped.
    fn run(self, mut work_rx: mpsc::Receiver<Work>) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!(error = %e, "failed to build streaming synthesis runtime");
                return;
            }
        };

        runtime.block_on(async {
            let client = reqwest::Client::new();
            while let Some(work) = work_rx.recv().await {
                let result = self.drain_stream(&client, &work.request).await;
                let _ = work.reply.send(result);
            }
        });
    }

    fn voice_id<'a>(&'a self, selector: &'a VoiceSelector) -> &'a str {
        match selector {
            VoiceSelector::Gender(VoiceGender::Male) => &self.voice_male,
            VoiceSelector::Gender(VoiceGender::Female) => &self.voice_female,
            VoiceSelector::Id(id) => id,
        }
    }

    /// Drain the chunked response to completion. The write proceeds
    /// incrementally but nothing is surfaced until the stream ends.
    async fn drain_stream(
        &self,
        client: &reqwest::Client,
        request: &SynthesisRequest,
    ) -> Result<AudioSegment, ProviderError> {
        let url = format!(
            "{}/v1/text-to-speech/{}/stream?output_format=pcm_{}",
            self.endpoint,
            self.voice_id(request.voice()),
            self.sample_rate,
        );

        let response = client
            .post(&url)
            .timeout(self.timeout)
            .header("xi-api-key", &self.api_key)
            .json(&json!({
                "text": request.text(),
                "model_id": self.model_id,
                "voice_settings": { "speed": request.pace().multiplier() },
            }))
            .send()
            .await
            .map_err(|e| ProviderError::TransportFailure {
                status: None,
                detail: e.to_string(),
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            return Err(ProviderError::TransportFailure {
                status: Some(status.as_u16()),
                detail: "streaming synthesis rejected".to_string(),
            });
        }

        let mut buf = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ProviderError::TransportFailure {
                status: None,
                detail: format!("mid-stream: {e}"),
            })?;
            buf.extend_from_slice(&chunk);
        }

        if buf.is_empty() {
            return Err(ProviderError::EmptyOutput);
        }
        Ok(pcm16_to_segment(&buf, self.sample_rate, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_fails_at_spawn() {
        let config = ProviderConfig::default();
        assert!(matches!(
            StreamingProvider::spawn(&config, 22050),
            Err(ProviderError::AuthMissing)
        ));
    }

    #[tokio::test]
    async fn worker_reports_transport_failure_for_unreachable_endpoint() {
        let mut config = ProviderConfig::default();
        config.api_key = Some("key".to_string());
        config.endpoint = "http://127.0.0.1:1".to_string();
        config.timeout_secs = 2;

        let provider = StreamingProvider::spawn(&config, 22050).unwrap();
        let request = SynthesisRequest::new(
            "hello",
            VoiceSelector::default(),
            voxcard_core::Pace::Normal,
        )
        .unwrap();

        let err = provider.synthesize(&request).await.unwrap_err();
        assert!(matches!(err, ProviderError::TransportFailure { .. }));
    }
}
