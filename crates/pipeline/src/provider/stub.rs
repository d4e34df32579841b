//! Deterministic stub provider for development and tests

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use voxcard_core::{AudioSegment, ProviderError, SynthesisRequest};

use super::SpeechProvider;

/// Synthesizes a quiet tone of a predictable duration instead of
/// speech. Useful as a development backend and as the deterministic
/// provider for pipeline tests: call counts and per-call durations are
/// fully controlled.
pub struct StubProvider {
    sample_rate: u32,
    /// Durations returned per call, cycled. Empty means text-derived.
    durations_ms: Vec<u64>,
    calls: AtomicUsize,
    failure: Mutex<Option<FailurePlan>>,
}

struct FailurePlan {
    on_call: usize,
    remaining: bool,
}

impl StubProvider {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            durations_ms: Vec::new(),
            calls: AtomicUsize::new(0),
            failure: Mutex::new(None),
        }
    }

    /// Fix the duration of each successive call, cycling when exhausted.
    pub fn with_durations(sample_rate: u32, durations_ms: Vec<u64>) -> Self {
        assert!(!durations_ms.is_empty());
        Self {
            durations_ms,
            ..Self::new(sample_rate)
        }
    }

    /// Make the zero-based `call` fail with a transport error.
    pub fn fail_on_call(self, call: usize) -> Self {
        *self.failure.lock() = Some(FailurePlan {
            on_call: call,
            remaining: true,
        });
        self
    }

    /// Number of synthesize calls observed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn duration_for(&self, call: usize, text: &str) -> u64 {
        if self.durations_ms.is_empty() {
            // ~60ms per character keeps stub output roughly speech-length
            (text.chars().count() as u64).max(1) * 60
        } else {
            self.durations_ms[call % self.durations_ms.len()]
        }
    }
}

#[async_trait]
impl SpeechProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<AudioSegment, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(plan) = self.failure.lock().as_mut() {
            if plan.remaining && plan.on_call == call {
                plan.remaining = false;
                return Err(ProviderError::TransportFailure {
                    status: Some(500),
                    detail: "injected stub failure".to_string(),
                });
            }
        }

        // Pace shortens or lengthens the output like a real engine would.
        let duration_ms = (self.duration_for(call, request.text()) as f32
            / request.pace().multiplier()) as u64;
        let frames = (duration_ms * self.sample_rate as u64 + 500) / 1000;

        let samples = (0..frames)
            .map(|i| (TAU * 440.0 * i as f32 / self.sample_rate as f32).sin() * 0.2)
            .collect();
        Ok(AudioSegment::new(samples, self.sample_rate, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxcard_core::{Pace, VoiceSelector};

    fn request(text: &str, pace: Pace) -> SynthesisRequest {
        SynthesisRequest::new(text, VoiceSelector::default(), pace).unwrap()
    }

    #[tokio::test]
    async fn fixed_durations_cycle_per_call() {
        let stub = StubProvider::with_durations(22050, vec![1200, 400]);
        let a = stub.synthesize(&request("q", Pace::Normal)).await.unwrap();
        let b = stub.synthesize(&request("a", Pace::Normal)).await.unwrap();
        assert_eq!(a.duration_ms(), 1200);
        assert_eq!(b.duration_ms(), 400);
        assert_eq!(stub.calls(), 2);
    }

    #[tokio::test]
    async fn injected_failure_hits_the_chosen_call() {
        let stub = StubProvider::with_durations(22050, vec![100]).fail_on_call(0);
        assert!(stub.synthesize(&request("q", Pace::Normal)).await.is_err());
        assert!(stub.synthesize(&request("a", Pace::Normal)).await.is_ok());
    }

    #[tokio::test]
    async fn pace_changes_duration() {
        let stub = StubProvider::with_durations(22050, vec![1000]);
        let fast = stub.synthesize(&request("x", Pace::Fast)).await.unwrap();
        assert_eq!(fast.duration_ms(), 800);
    }
}
