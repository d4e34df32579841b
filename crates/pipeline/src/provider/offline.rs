//! Offline neural model provider
//!
//! Loads an ONNX synthesis model into process memory exactly once at
//! startup. If loading fails, the provider enters a permanently
//! degraded state: the service stays reachable and every synthesis
//! call reports the model as unavailable, rather than retrying the
//! load per request.

use async_trait::async_trait;

use voxcard_core::{AudioSegment, ProviderError, SynthesisRequest};

use super::SpeechProvider;

#[cfg(feature = "onnx")]
use parking_lot::Mutex;

pub struct OfflineModelProvider {
    state: ModelState,
    sample_rate: u32,
}

enum ModelState {
    #[cfg(feature = "onnx")]
    Ready(Mutex<ort::session::Session>),
    Degraded(String),
}

impl OfflineModelProvider {
    /// Blocking, singular initialization. Never returns an error:
    /// failure is recorded and reported per call as `ModelUnavailable`.
    #[cfg(feature = "onnx")]
    pub fn load(model_path: &str, sample_rate: u32) -> Self {
        use ort::session::builder::GraphOptimizationLevel;
        use ort::session::Session;

        let result = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(2))
            .and_then(|b| b.commit_from_file(model_path));

        let state = match result {
            Ok(session) => {
                tracing::info!(model_path, "offline synthesis model loaded");
                ModelState::Ready(Mutex::new(session))
            }
            Err(e) => {
                tracing::error!(model_path, error = %e, "offline model failed to load; provider degraded");
                ModelState::Degraded(format!("model load failed: {e}"))
            }
        };

        Self { state, sample_rate }
    }

    #[cfg(not(feature = "onnx"))]
    pub fn load(model_path: &str, sample_rate: u32) -> Self {
        tracing::error!(
            model_path,
            "built without the 'onnx' feature; offline provider degraded"
        );
        Self {
            state: ModelState::Degraded("built without the 'onnx' feature".to_string()),
            sample_rate,
        }
    }

    #[cfg(feature = "onnx")]
    fn run_model(
        &self,
        session: &Mutex<ort::session::Session>,
        request: &SynthesisRequest,
    ) -> Result<Vec<f32>, ProviderError> {
        use ndarray::Array2;
        use ort::inputs;
        use ort::value::TensorRef;

        let model_err =
            |e: &dyn std::fmt::Display| ProviderError::ModelUnavailable(e.to_string());

        let text_ids: Vec<i64> = request.text().chars().map(|c| c as i64).collect();
        let input = Array2::from_shape_vec((1, text_ids.len()), text_ids)
            .map_err(|e| model_err(&e))?;
        let input_lengths = Array2::from_shape_vec((1, 1), vec![request.text().chars().count() as i64])
            .map_err(|e| model_err(&e))?;
        // VITS-style scales: [noise, length (inverse of speed), noise_w]
        let scales = Array2::from_shape_vec(
            (1, 3),
            vec![0.667, 1.0 / request.pace().multiplier(), 0.8],
        )
        .map_err(|e| model_err(&e))?;

        let mut session = session.lock();
        let outputs = session
            .run(
                inputs![
                    "input" => TensorRef::from_array_view(input.view()).map_err(|e| model_err(&e))?,
                    "input_lengths" => TensorRef::from_array_view(input_lengths.view()).map_err(|e| model_err(&e))?,
                    "scales" => TensorRef::from_array_view(scales.view()).map_err(|e| model_err(&e))?,
                ],
            )
            .map_err(|e| model_err(&e))?;

        let waveform = outputs
            .iter()
            .next()
            .ok_or_else(|| ProviderError::ModelUnavailable("model produced no output".to_string()))?
            .1
            .try_extract_array::<f32>()
            .map_err(|e| model_err(&e))?;

        Ok(waveform.iter().copied().collect())
    }
}

#[async_trait]
impl SpeechProvider for OfflineModelProvider {
    fn name(&self) -> &str {
        "offline"
    }

    async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<AudioSegment, ProviderError> {
        match &self.state {
            ModelState::Degraded(reason) => {
                Err(ProviderError::ModelUnavailable(reason.clone()))
            }
            #[cfg(feature = "onnx")]
            ModelState::Ready(session) => {
                let samples = self.run_model(session, request)?;
                if samples.is_empty() {
                    return Err(ProviderError::EmptyOutput);
                }
                Ok(AudioSegment::new(samples, self.sample_rate, 1))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxcard_core::{Pace, VoiceSelector};

    #[tokio::test]
    async fn missing_model_degrades_instead_of_erroring_at_startup() {
        let provider = OfflineModelProvider::load("/nonexistent/model.onnx", 22050);
        let request =
            SynthesisRequest::new("hello", VoiceSelector::default(), Pace::Normal).unwrap();

        // every call fails the same way; the load is never retried
        for _ in 0..2 {
            let err = provider.synthesize(&request).await.unwrap_err();
            assert!(matches!(err, ProviderError::ModelUnavailable(_)));
        }
    }
}
