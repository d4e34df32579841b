//! Synthesis request, job, and artifact model

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::audio::AudioEncoding;
use crate::error::ValidationError;

/// Requested voice gender, when no explicit voice id is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    Male,
    Female,
}

/// Voice selection: a gender hint resolved by the provider, or an
/// explicit provider-specific voice id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceSelector {
    Gender(VoiceGender),
    Id(String),
}

impl Default for VoiceSelector {
    fn default() -> Self {
        VoiceSelector::Gender(VoiceGender::Female)
    }
}

/// Speech pacing: a named hint or an explicit rate multiplier
/// (1.0 = the engine's normal rate).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pace {
    Fast,
    Normal,
    Slow,
    Rate(f32),
}

impl Pace {
    /// Rate multiplier applied to the engine's normal speaking rate,
    /// clamped to the range every backend accepts.
    pub fn multiplier(&self) -> f32 {
        let raw = match self {
            Pace::Fast => 1.25,
            Pace::Normal => 1.0,
            Pace::Slow => 0.85,
            Pace::Rate(r) => *r,
        };
        raw.clamp(0.5, 2.0)
    }
}

impl Default for Pace {
    fn default() -> Self {
        Pace::Normal
    }
}

// Accepts "fast" | "normal" | "slow" or a bare number in settings files.
impl Serialize for Pace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Pace::Fast => serializer.serialize_str("fast"),
            Pace::Normal => serializer.serialize_str("normal"),
            Pace::Slow => serializer.serialize_str("slow"),
            Pace::Rate(r) => serializer.serialize_f32(*r),
        }
    }
}

impl<'de> Deserialize<'de> for Pace {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PaceVisitor;

        impl<'de> Visitor<'de> for PaceVisitor {
            type Value = Pace;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("\"fast\", \"normal\", \"slow\", or a rate multiplier")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Pace, E> {
                match v {
                    "fast" => Ok(Pace::Fast),
                    "normal" => Ok(Pace::Normal),
                    "slow" => Ok(Pace::Slow),
                    other => other
                        .parse::<f32>()
                        .map(Pace::Rate)
                        .map_err(|_| E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Pace, E> {
                Ok(Pace::Rate(v as f32))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Pace, E> {
                Ok(Pace::Rate(v as f32))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Pace, E> {
                Ok(Pace::Rate(v as f32))
            }
        }

        deserializer.deserialize_any(PaceVisitor)
    }
}

/// One validated synthesis input. Immutable once constructed; the
/// pipeline builds one per provider call.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    text: String,
    voice: VoiceSelector,
    pace: Pace,
}

impl SynthesisRequest {
    /// Validates that `text` is non-empty after trimming. Empty text is
    /// rejected here, before any provider is involved.
    pub fn new(
        text: impl Into<String>,
        voice: VoiceSelector,
        pace: Pace,
    ) -> Result<Self, ValidationError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyText);
        }
        Ok(Self { text, voice, pace })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn voice(&self) -> &VoiceSelector {
        &self.voice
    }

    pub fn pace(&self) -> Pace {
        self.pace
    }
}

/// Silence placement for a paced artifact. Whether a leading silence
/// exists is a configuration choice; the stitcher never decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapPlan {
    /// Optional silence before the question.
    #[serde(default)]
    pub lead_ms: Option<u64>,
    /// Silence between question and answer.
    #[serde(default = "default_gap_ms")]
    pub gap_ms: u64,
}

fn default_gap_ms() -> u64 {
    2000
}

impl Default for GapPlan {
    fn default() -> Self {
        Self {
            lead_ms: None,
            gap_ms: default_gap_ms(),
        }
    }
}

/// One question/answer synthesis job. Created per request, destroyed
/// when the response is returned; never persisted.
#[derive(Debug)]
pub struct PacedAudioJob {
    id: Uuid,
    question: SynthesisRequest,
    answer: SynthesisRequest,
    gap: GapPlan,
}

impl PacedAudioJob {
    pub fn new(question: SynthesisRequest, answer: SynthesisRequest, gap: GapPlan) -> Self {
        Self {
            id: Uuid::new_v4(),
            question,
            answer,
            gap,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn question(&self) -> &SynthesisRequest {
        &self.question
    }

    pub fn answer(&self) -> &SynthesisRequest {
        &self.answer
    }

    pub fn gap(&self) -> GapPlan {
        self.gap
    }
}

/// A persisted, encoded audio file. Outlives the job that produced it;
/// retained until external cleanup removes it.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub id: Uuid,
    pub file_name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub encoding: AudioEncoding,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_rejected() {
        let err = SynthesisRequest::new("  ", VoiceSelector::default(), Pace::Normal);
        assert_eq!(err.unwrap_err(), ValidationError::EmptyText);
    }

    #[test]
    fn pace_multiplier_is_clamped() {
        assert_eq!(Pace::Rate(10.0).multiplier(), 2.0);
        assert_eq!(Pace::Rate(0.1).multiplier(), 0.5);
        assert_eq!(Pace::Normal.multiplier(), 1.0);
    }

    #[test]
    fn pace_deserializes_from_hint_or_number() {
        let fast: Pace = serde_json::from_str("\"fast\"").unwrap();
        assert_eq!(fast, Pace::Fast);
        let rate: Pace = serde_json::from_str("1.2").unwrap();
        assert_eq!(rate, Pace::Rate(1.2));
    }

    #[test]
    fn jobs_get_unique_ids() {
        let req = |t: &str| {
            SynthesisRequest::new(t, VoiceSelector::default(), Pace::Normal).unwrap()
        };
        let a = PacedAudioJob::new(req("q"), req("a"), GapPlan::default());
        let b = PacedAudioJob::new(req("q"), req("a"), GapPlan::default());
        assert_ne!(a.id(), b.id());
    }
}
