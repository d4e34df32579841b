//! Paced synthesis orchestrator
//!
//! Coordinates providers, silence generation, stitching, encoding, and
//! artifact storage for one job. A job moves strictly forward through
//! its stages; any failure lands in a terminal failed state carrying
//! the stage it was attempting, after scratch cleanup has run. There
//! are no automatic retries: a caller-level retry is a fresh job with a
//! fresh id.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use voxcard_config::{PacingConfig, Settings};
use voxcard_core::{
    Artifact, AudioEncoding, AudioSegment, Error, GapPlan, PacedAudioJob, ProviderError,
    SynthesisRequest, ValidationError, VoiceSelector,
};

use crate::artifact::ArtifactStore;
use crate::provider::SpeechProvider;
use crate::scratch::JobScratch;
use crate::silence::SilenceGenerator;
use crate::stitch::AudioStitcher;

/// Forward-only job stages. `Failed{stage}` is modeled by
/// `PipelineError::Job` carrying the stage that was being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobStage {
    Received,
    QuestionSynthesized,
    AnswerSynthesized,
    Stitched,
    Encoded,
    Stored,
    Done,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStage::Received => "received",
            JobStage::QuestionSynthesized => "question-synthesis",
            JobStage::AnswerSynthesized => "answer-synthesis",
            JobStage::Stitched => "stitching",
            JobStage::Encoded => "encoding",
            JobStage::Stored => "storage",
            JobStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Rejected before a job started; zero side effects.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The job failed at `stage`. Cleanup has already run.
    #[error("job {job_id} failed during {stage}: {source}")]
    Job {
        job_id: Uuid,
        stage: JobStage,
        #[source]
        source: Error,
    },
}

impl PipelineError {
    /// The provider failure underneath, if that is what sank the job.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            PipelineError::Job {
                source: Error::Provider(e),
                ..
            } => Some(e),
            _ => None,
        }
    }
}

/// The core workflow: two independently-paced synthesis calls, a
/// calibrated gap, one stitched and encoded artifact.
pub struct PacedSynthesisPipeline {
    provider: Arc<dyn SpeechProvider>,
    stitcher: AudioStitcher,
    store: ArtifactStore,
    pacing: PacingConfig,
    encoding: AudioEncoding,
    call_timeout: Duration,
}

impl PacedSynthesisPipeline {
    pub fn new(
        provider: Arc<dyn SpeechProvider>,
        settings: &Settings,
    ) -> Result<Self, voxcard_core::StorageError> {
        let store = ArtifactStore::new(
            &settings.audio.dir,
            settings.server.public_base_url.clone(),
        )?;
        Ok(Self {
            provider,
            stitcher: AudioStitcher::new(&settings.audio),
            store,
            pacing: settings.pacing.clone(),
            encoding: settings.audio.encoding,
            call_timeout: Duration::from_secs(settings.provider.timeout_secs),
        })
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run a paced question/answer job to completion.
    ///
    /// Empty question or answer text is rejected before any provider
    /// call is made. The two synthesis calls have no ordering
    /// dependency and run concurrently; stitching waits for both.
    pub async fn run_paced(
        &self,
        question: &str,
        answer: &str,
        voice: VoiceSelector,
    ) -> Result<Artifact, PipelineError> {
        let question =
            SynthesisRequest::new(question, voice.clone(), self.pacing.question_pace)?;
        let answer = SynthesisRequest::new(answer, voice, self.pacing.answer_pace)?;
        let gap = GapPlan {
            lead_ms: self.pacing.lead_silence_ms,
            gap_ms: self.pacing.gap_ms,
        };
        let job = PacedAudioJob::new(question, answer, gap);
        let job_id = job.id();

        tracing::info!(%job_id, stage = %JobStage::Received, "paced job received");
        let mut scratch = JobScratch::new(job_id);

        let (question_audio, answer_audio) = tokio::join!(
            self.synthesize(job.question()),
            self.synthesize(job.answer()),
        );
        // Both calls have run by now; a failure on either still ends the
        // job with its scratch released.
        let question_audio =
            question_audio.map_err(|e| self.fail(job_id, JobStage::QuestionSynthesized, e))?;
        let answer_audio =
            answer_audio.map_err(|e| self.fail(job_id, JobStage::AnswerSynthesized, e))?;

        let rate = self.stitcher.sample_rate();
        let channels = self.stitcher.channels();
        let mut segments = Vec::with_capacity(4);
        if let Some(lead_ms) = job.gap().lead_ms {
            segments.push(SilenceGenerator::generate(lead_ms, rate, channels));
        }
        segments.push(question_audio);
        segments.push(SilenceGenerator::generate(job.gap().gap_ms, rate, channels));
        segments.push(answer_audio);

        self.finish(&mut scratch, job_id, segments).await
    }

    /// Run a single-segment synthesis job: one reading, no gaps.
    pub async fn run_single(
        &self,
        text: &str,
        voice: VoiceSelector,
    ) -> Result<Artifact, PipelineError> {
        let request = SynthesisRequest::new(text, voice, self.pacing.question_pace)?;
        let job_id = Uuid::new_v4();

        tracing::info!(%job_id, stage = %JobStage::Received, "single job received");
        let mut scratch = JobScratch::new(job_id);

        let audio = self
            .synthesize(&request)
            .await
            .map_err(|e| self.fail(job_id, JobStage::QuestionSynthesized, e))?;

        self.finish(&mut scratch, job_id, vec![audio]).await
    }

    /// One provider call with the configured timeout. A zero-length
    /// result is an empty-output failure, never valid silent audio.
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioSegment, Error> {
        let segment = tokio::time::timeout(self.call_timeout, self.provider.synthesize(request))
            .await
            .map_err(|_| {
                ProviderError::TransportFailure {
                    status: None,
                    detail: format!("no response within {:?}", self.call_timeout),
                }
            })??;

        if segment.is_empty() {
            return Err(ProviderError::EmptyOutput.into());
        }
        Ok(segment)
    }

    /// Shared tail: stitch, encode, store.
    async fn finish(
        &self,
        scratch: &mut JobScratch,
        job_id: Uuid,
        segments: Vec<AudioSegment>,
    ) -> Result<Artifact, PipelineError> {
        let stitched = self
            .stitcher
            .stitch(segments)
            .map_err(|e| self.fail(job_id, JobStage::Stitched, e.into()))?;
        tracing::debug!(%job_id, duration_ms = stitched.duration_ms(), "segments stitched");

        let bytes = self
            .stitcher
            .encode(&stitched, self.encoding)
            .await
            .map_err(|e| self.fail(job_id, JobStage::Encoded, e.into()))?;

        let artifact = self
            .store
            .store(scratch, job_id, &bytes, self.encoding)
            .await
            .map_err(|e| self.fail(job_id, JobStage::Stored, e.into()))?;

        tracing::info!(
            %job_id,
            stage = %JobStage::Done,
            artifact = %artifact.file_name,
            "job done"
        );
        Ok(artifact)
    }

    /// Terminal failure for `job_id` while attempting `stage`. Scratch
    /// cleanup happens when the caller's `JobScratch` drops; this only
    /// shapes the single aggregated error reported to the boundary.
    fn fail(&self, job_id: Uuid, stage: JobStage, source: Error) -> PipelineError {
        tracing::error!(%job_id, %stage, error = %source, "job failed");
        PipelineError::Job {
            job_id,
            stage,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StubProvider;
    use voxcard_config::ProviderBackend;

    fn test_settings(dir: &std::path::Path) -> Settings {
        let mut settings = Settings::default();
        settings.provider.backend = ProviderBackend::Stub;
        settings.audio.dir = dir.display().to_string();
        settings.audio.encoding = AudioEncoding::Wav;
        settings
    }

    fn pipeline_with(
        provider: Arc<StubProvider>,
        settings: &Settings,
    ) -> PacedSynthesisPipeline {
        PacedSynthesisPipeline::new(provider, settings).unwrap()
    }

    #[test]
    fn stages_are_ordered_and_distinctly_named() {
        let lifecycle = [
            JobStage::Received,
            JobStage::QuestionSynthesized,
            JobStage::AnswerSynthesized,
            JobStage::Stitched,
            JobStage::Encoded,
            JobStage::Stored,
            JobStage::Done,
        ];
        for pair in lifecycle.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_ne!(pair[0].to_string(), pair[1].to_string());
        }
        assert_eq!(JobStage::Received.to_string(), "received");
        assert_eq!(JobStage::Done.to_string(), "done");
    }

    #[tokio::test]
    async fn paced_job_produces_expected_duration() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(dir.path());
        // fixed pace so stub durations pass through unchanged
        settings.pacing.question_pace = voxcard_core::Pace::Rate(1.0);
        settings.pacing.answer_pace = voxcard_core::Pace::Rate(1.0);

        let provider = Arc::new(StubProvider::with_durations(22050, vec![1200, 400]));
        let pipeline = pipeline_with(provider.clone(), &settings);

        let artifact = pipeline
            .run_paced(
                "What is 2+2?",
                "4",
                VoiceSelector::Gender(voxcard_core::VoiceGender::Male),
            )
            .await
            .unwrap();

        assert_eq!(provider.calls(), 2);
        assert!(artifact.file_name.ends_with(".wav"));

        let reader = hound::WavReader::open(&artifact.path).unwrap();
        let duration_ms =
            reader.duration() as u64 * 1000 / reader.spec().sample_rate as u64;
        // 1200 + 2000 + 400, within rounding
        assert!((duration_ms as i64 - 3600).abs() <= 1, "got {duration_ms}ms");
    }

    #[tokio::test]
    async fn leading_silence_is_a_configuration_choice() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(dir.path());
        settings.pacing.lead_silence_ms = Some(1000);
        settings.pacing.question_pace = voxcard_core::Pace::Rate(1.0);
        settings.pacing.answer_pace = voxcard_core::Pace::Rate(1.0);

        let provider = Arc::new(StubProvider::with_durations(22050, vec![1200, 400]));
        let pipeline = pipeline_with(provider, &settings);

        let artifact = pipeline
            .run_paced("q", "a", VoiceSelector::default())
            .await
            .unwrap();

        let reader = hound::WavReader::open(&artifact.path).unwrap();
        let duration_ms =
            reader.duration() as u64 * 1000 / reader.spec().sample_rate as u64;
        assert!((duration_ms as i64 - 4600).abs() <= 1, "got {duration_ms}ms");
    }

    #[tokio::test]
    async fn empty_text_is_rejected_before_any_provider_call() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());
        let provider = Arc::new(StubProvider::new(22050));
        let pipeline = pipeline_with(provider.clone(), &settings);

        let err = pipeline
            .run_paced("", "an answer", VoiceSelector::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));

        let err = pipeline
            .run_paced("a question", "   ", VoiceSelector::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));

        // zero side effects: no provider call, no files
        assert_eq!(provider.calls(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn provider_failure_fails_the_job_and_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());
        let provider =
            Arc::new(StubProvider::with_durations(22050, vec![500]).fail_on_call(0));
        let pipeline = pipeline_with(provider.clone(), &settings);

        let err = pipeline
            .run_paced("q", "a", VoiceSelector::default())
            .await
            .unwrap_err();

        let PipelineError::Job { job_id, stage, .. } = &err else {
            panic!("expected job failure, got {err:?}");
        };
        assert_eq!(*stage, JobStage::QuestionSynthesized);

        // no ordering dependency: the answer call still ran
        assert_eq!(provider.calls(), 2);

        // nothing named after this job survives
        let id = job_id.to_string();
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(&id))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn single_job_yields_retrievable_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());
        let provider = Arc::new(StubProvider::new(22050));
        let pipeline = pipeline_with(provider, &settings);

        let artifact = pipeline
            .run_single("hello world", VoiceSelector::default())
            .await
            .unwrap();

        assert!(artifact.path.exists());
        let url = pipeline.store().public_url(&artifact);
        assert!(url.ends_with(&format!("{}.wav", artifact.id)));
    }

    #[tokio::test]
    async fn model_unavailable_surfaces_through_provider_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());
        let provider = crate::provider::OfflineModelProvider::load("/missing.onnx", 22050);
        let pipeline =
            PacedSynthesisPipeline::new(Arc::new(provider), &settings).unwrap();

        let err = pipeline
            .run_single("text", VoiceSelector::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err.provider_error(),
            Some(ProviderError::ModelUnavailable(_))
        ));
    }
}
