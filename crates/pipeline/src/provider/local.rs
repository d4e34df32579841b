//! Local OS speech engine provider (espeak)
//!
//! Wraps the synchronous espeak engine. The voice catalog is enumerated
//! at call time; selection picks the first voice whose language and
//! gender match the request, falling back to the first available voice
//! with a logged warning. A voice-matching miss never fails a request.
//!
//! The engine holds voice and rate as session state, so configure +
//! synthesize + read runs under one lock: a concurrent job cannot
//! overwrite this job's pacing before it is used.

use std::io::Cursor;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tokio::sync::Mutex;

use voxcard_config::ProviderConfig;
use voxcard_core::{AudioSegment, ProviderError, SynthesisRequest, VoiceGender, VoiceSelector};

use super::SpeechProvider;

/// espeak's default speaking rate in words per minute.
const BASE_RATE_WPM: f32 = 175.0;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EngineVoice {
    pub id: String,
    pub language: String,
    pub gender: Option<VoiceGender>,
}

/// Mutable engine session state, guarded as one unit.
struct EngineSession {
    voice: Option<String>,
    rate_wpm: u32,
}

pub struct LocalEngineProvider {
    command: String,
    language: String,
    session: Mutex<EngineSession>,
}

impl LocalEngineProvider {
    /// Locate the engine binary. Absence is a startup failure; a
    /// provider that cannot ever synthesize is not bound.
    pub async fn detect(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let command = Self::find_command().await.ok_or_else(|| {
            ProviderError::TransportFailure {
                status: None,
                detail: "espeak not found; install espeak or espeak-ng".to_string(),
            }
        })?;

        Ok(Self {
            command,
            language: config.language.clone(),
            session: Mutex::new(EngineSession {
                voice: None,
                rate_wpm: BASE_RATE_WPM as u32,
            }),
        })
    }

    async fn find_command() -> Option<String> {
        for candidate in ["espeak-ng", "espeak"] {
            if Command::new(candidate)
                .arg("--version")
                .output()
                .await
                .is_ok()
            {
                return Some(candidate.to_string());
            }
        }
        None
    }

    /// Enumerate the engine's voice catalog. Done per call: the catalog
    /// can change underneath a long-lived process.
    async fn list_voices(&self) -> Result<Vec<EngineVoice>, ProviderError> {
        let output = Command::new(&self.command)
            .arg("--voices")
            .output()
            .await
            .map_err(|e| ProviderError::TransportFailure {
                status: None,
                detail: format!("listing voices: {e}"),
            })?;

        Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
    }

    fn resolve_voice(&self, voices: &[EngineVoice], selector: &VoiceSelector) -> Option<String> {
        match selector {
            VoiceSelector::Id(id) => Some(id.clone()),
            VoiceSelector::Gender(gender) => {
                if let Some(voice) = voices.iter().find(|v| {
                    v.language.starts_with(&self.language) && v.gender == Some(*gender)
                }) {
                    return Some(voice.id.clone());
                }
                // Fallback policy: never fail the request on a
                // voice-matching miss.
                let fallback = voices.first().map(|v| v.id.clone());
                tracing::warn!(
                    language = %self.language,
                    requested = ?gender,
                    fallback = ?fallback,
                    "no matching engine voice; falling back to first available"
                );
                fallback
            }
        }
    }
}

#[async_trait]
impl SpeechProvider for LocalEngineProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<AudioSegment, ProviderError> {
        // Lock covers configure + synthesize + read.
        let mut session = self.session.lock().await;

        let voices = self.list_voices().await?;
        session.voice = self.resolve_voice(&voices, request.voice());
        session.rate_wpm = (BASE_RATE_WPM * request.pace().multiplier()) as u32;

        let mut cmd = Command::new(&self.command);
        cmd.arg("--stdout");
        if let Some(voice) = &session.voice {
            cmd.args(["-v", voice]);
        }
        cmd.args(["-s", &session.rate_wpm.to_string()]);
        cmd.arg(request.text());

        let output = cmd
            .output()
            .await
            .map_err(|e| ProviderError::TransportFailure {
                status: None,
                detail: format!("engine execution: {e}"),
            })?;

        if !output.status.success() {
            return Err(ProviderError::TransportFailure {
                status: output.status.code().map(|c| c as u16),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if output.stdout.is_empty() {
            return Err(ProviderError::EmptyOutput);
        }

        decode_wav(&output.stdout)
    }
}

/// Parse espeak's `--voices` table.
///
/// Format: `Pty Language Age/Gender VoiceName File Other`, e.g.
/// ` 5  en-gb          M  english             other/en-gb`.
fn parse_voice_list(output: &str) -> Vec<EngineVoice> {
    let voice_regex = Regex::new(r"^\s*\d+\s+([\w-]+)\s+(?:-|\d*)?([MF-])?\s*([\w\-+]+)\s+")
        .expect("voice table pattern");

    output
        .lines()
        .skip(1) // header
        .filter_map(|line| {
            let captures = voice_regex.captures(line)?;
            let language = captures.get(1)?.as_str().to_string();
            let gender = match captures.get(2).map(|m| m.as_str()) {
                Some("M") => Some(VoiceGender::Male),
                Some("F") => Some(VoiceGender::Female),
                _ => None,
            };
            let id = captures.get(3)?.as_str().to_string();
            Some(EngineVoice {
                id,
                language,
                gender,
            })
        })
        .collect()
}

/// The engine emits 16-bit mono WAV on stdout.
fn decode_wav(bytes: &[u8]) -> Result<AudioSegment, ProviderError> {
    let reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| ProviderError::TransportFailure {
            status: None,
            detail: format!("engine wav output: {e}"),
        })?;
    let spec = reader.spec();

    let samples: Vec<f32> = reader
        .into_samples::<i16>()
        .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
        .collect::<Result<_, _>>()
        .map_err(|e| ProviderError::TransportFailure {
            status: None,
            detail: format!("engine wav samples: {e}"),
        })?;

    if samples.is_empty() {
        return Err(ProviderError::EmptyOutput);
    }
    Ok(AudioSegment::new(samples, spec.sample_rate, spec.channels))
}
