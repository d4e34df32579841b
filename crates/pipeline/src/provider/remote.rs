//! Remote cloud synthesis API provider
//!
//! Issues one synchronous REST call per synthesis, carrying text, a
//! voice id, and a model id. Audio is requested as raw PCM so no codec
//! is needed on this side of the wire.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use voxcard_config::ProviderConfig;
use voxcard_core::{AudioSegment, ProviderError, SynthesisRequest, VoiceGender, VoiceSelector};

use super::{pcm16_to_segment, SpeechProvider};

/// How much upstream error body is kept for diagnostics.
const MAX_ERROR_BODY: usize = 512;

pub struct RemoteApiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model_id: String,
    voice_male: String,
    voice_female: String,
    sample_rate: u32,
}

impl RemoteApiProvider {
    /// Fails fast when no credential is configured: the provider must
    /// never silently operate without the ability to authenticate.
    /// Validated once here, not per request.
    pub fn new(config: &ProviderConfig, sample_rate: u32) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ProviderError::AuthMissing)?
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::TransportFailure {
                status: None,
                detail: format!("http client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            model_id: config.model_id.clone(),
            voice_male: config.voice_male.clone(),
            voice_female: config.voice_female.clone(),
            sample_rate,
        })
    }

    fn voice_id<'a>(&'a self, selector: &'a VoiceSelector) -> &'a str {
        match selector {
            VoiceSelector::Gender(VoiceGender::Male) => &self.voice_male,
            VoiceSelector::Gender(VoiceGender::Female) => &self.voice_female,
            VoiceSelector::Id(id) => id,
        }
    }

    fn output_format(&self) -> String {
        format!("pcm_{}", self.sample_rate)
    }
}

#[async_trait]
impl SpeechProvider for RemoteApiProvider {
    fn name(&self) -> &str {
        "remote"
    }

    async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<AudioSegment, ProviderError> {
        let voice_id = self.voice_id(request.voice());
        let url = format!(
            "{}/v1/text-to-speech/{}?output_format={}",
            self.endpoint,
            voice_id,
            self.output_format()
        );

        tracing::debug!(voice_id, text_len = request.text().len(), "remote synthesis call");

        let response = self
            .client
            .post(&url)
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
                detail: if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(MAX_ERROR_BODY);
            return Err(ProviderError::TransportFailure {
                status: Some(status.as_u16()),
                detail: body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::TransportFailure {
                status: None,
                detail: format!("reading body: {e}"),
            })?;
        if bytes.is_empty() {
            return Err(ProviderError::EmptyOutput);
        }

        Ok(pcm16_to_segment(&bytes, self.sample_rate, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxcard_core::Pace;

    #[test]
    fn missing_key_fails_at_construction() {
        let config = ProviderConfig::default();
        assert!(matches!(
            RemoteApiProvider::new(&config, 22050),
            Err(ProviderError::AuthMissing)
        ));

        let mut blank = ProviderConfig::default();
        blank.api_key = Some("   ".to_string());
        assert!(matches!(
            RemoteApiProvider::new(&blank, 22050),
            Err(ProviderError::AuthMissing)
        ));
    }

    #[test]
    fn gender_maps_to_configured_voice_ids() {
        let mut config = ProviderConfig::default();
        config.api_key = Some("key".to_string());
        let provider = RemoteApiProvider::new(&config, 22050).unwrap();

        assert_eq!(
            provider.voice_id(&VoiceSelector::Gender(VoiceGender::Male)),
            config.voice_male
        );
        assert_eq!(
            provider.voice_id(&VoiceSelector::Gender(VoiceGender::Female)),
            config.voice_female
        );
        assert_eq!(
            provider.voice_id(&VoiceSelector::Id("custom".to_string())),
            "custom"
        );
    }

    #[test]
    fn pcm_output_format_tracks_working_rate() {
        let mut config = ProviderConfig::default();
        config.api_key = Some("key".to_string());
        let provider = RemoteApiProvider::new(&config, 16000).unwrap();
        assert_eq!(provider.output_format(), "pcm_16000");
        // pace is per request, not per provider
        let req = SynthesisRequest::new("hi", VoiceSelector::default(), Pace::Fast).unwrap();
        assert_eq!(req.pace().multiplier(), 1.25);
    }
}
