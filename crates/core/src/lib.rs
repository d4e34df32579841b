//! Core types for the voxcard paced-audio service
//!
//! This crate provides the foundational types used across all other
//! crates:
//! - Audio segment and encoding types
//! - Synthesis request, job, and artifact data model
//! - Error taxonomy

pub mod audio;
pub mod error;
pub mod request;

pub use audio::{AudioEncoding, AudioSegment};
pub use error::{
    Error, ProviderError, Result, StitchError, StorageError, ValidationError,
};
pub use request::{
    Artifact, GapPlan, Pace, PacedAudioJob, SynthesisRequest, VoiceGender, VoiceSelector,
};
