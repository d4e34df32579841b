//! Paced audio synthesis pipeline
//!
//! This crate provides the core workflow of the service:
//! - `SpeechProvider` abstraction with interchangeable backends
//!   (remote API, offline model, streaming protocol, local engine)
//! - Silence generation and format-normalizing segment stitching
//! - Flat-directory artifact store
//! - The `PacedSynthesisPipeline` orchestrator with job-scoped
//!   temp-file lifecycle

pub mod artifact;
pub mod orchestrator;
pub mod provider;
pub mod scratch;
pub mod silence;
pub mod stitch;

pub use artifact::ArtifactStore;
pub use orchestrator::{JobStage, PacedSynthesisPipeline, PipelineError};
pub use provider::{build_provider, SpeechProvider, StubProvider};
pub use scratch::JobScratch;
pub use silence::SilenceGenerator;
pub use stitch::AudioStitcher;
