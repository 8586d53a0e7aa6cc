//! Speech synthesis backends.
//!
//! Both produce bare mono 16-bit little-endian PCM at 24kHz, ready for
//! [`crate::wav::assemble_wav`].

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::backend::{SpeechRequest, SpeechSynthesizer};
use crate::error::DebateError;

#[derive(Serialize)]
struct SpeechBody<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    response_format: &'static str,
}

/// OpenAI-compatible `/audio/speech` client asking for raw PCM.
pub struct OpenAiSpeech {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiSpeech {
    pub fn new(
        api_base: &str,
        api_key: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DebateError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                DebateError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, DebateError> {
        let body = SpeechBody {
            model: &self.model,
            input: &request.text,
            voice: &request.voice,
            instructions: Some(request.style.as_str()).filter(|s| !s.is_empty()),
            response_format: "pcm",
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error()
            && status != reqwest::StatusCode::TOO_MANY_REQUESTS
            && status != reqwest::StatusCode::REQUEST_TIMEOUT
        {
            let detail = response.text().await.unwrap_or_default();
            return Err(DebateError::SpeechRejected(format!("{status}: {detail}")));
        }
        if !status.is_success() {
            return Err(DebateError::TtsError(format!("speech endpoint returned {status}")));
        }

        let audio = response.bytes().await?;
        debug!(voice = %request.voice, bytes = audio.len(), "speech segment received");
        if audio.is_empty() {
            return Err(DebateError::TtsError("empty audio response".to_string()));
        }
        Ok(audio.to_vec())
    }
}

/// Split text into chunks that are safe for TTS synthesis.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current_chunk = String::new();

    for sentence in text.split_inclusive(&['.', '!', '?', ';'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if current_chunk.len() + sentence.len() > max_chars && !current_chunk.is_empty() {
            chunks.push(current_chunk.trim().to_string());
            current_chunk.clear();
        }

        if sentence.len() > max_chars {
            // Overlong sentence: break on commas instead.
            for part in sentence.split_inclusive(',') {
                if current_chunk.len() + part.len() > max_chars && !current_chunk.is_empty() {
                    chunks.push(current_chunk.trim().to_string());
                    current_chunk.clear();
                }
                current_chunk.push_str(part.trim_start());
                current_chunk.push(' ');
            }
        } else {
            current_chunk.push_str(sentence);
            current_chunk.push(' ');
        }
    }

    if !current_chunk.trim().is_empty() {
        chunks.push(current_chunk.trim().to_string());
    }

    chunks
}

#[cfg(feature = "kokoro")]
pub use local::KokoroSpeech;

#[cfg(feature = "kokoro")]
mod local {
    use super::*;
    use kokoro_tiny::TtsEngine;
    use std::sync::Mutex;

    use crate::wav::f32_to_pcm16;

    /// Kokoro has a strict input limit, so text goes in small pieces.
    const CHUNK_CHARS: usize = 200;
    /// 0.3 seconds at 24kHz between chunks so words don't get clipped.
    const CHUNK_GAP_SAMPLES: usize = 7200;

    /// Offline synthesis with kokoro-tiny (downloads the model on first run).
    pub struct KokoroSpeech {
        engine: Mutex<TtsEngine>,
        available_voices: Vec<String>,
    }

    impl KokoroSpeech {
        pub async fn new() -> Result<Self, DebateError> {
            let engine = TtsEngine::new()
                .await
                .map_err(|e| DebateError::TtsError(format!("Failed to initialize TTS: {}", e)))?;
            let available_voices = engine.voices();
            Ok(Self {
                engine: Mutex::new(engine),
                available_voices,
            })
        }

        pub fn available_voices(&self) -> &[String] {
            &self.available_voices
        }

        fn validate_voice(&self, voice: &str) -> Result<(), DebateError> {
            if self.available_voices.iter().any(|v| v == voice) {
                return Ok(());
            }
            Err(DebateError::SpeechRejected(format!(
                "unknown voice '{}', available: {}",
                voice,
                self.available_voices.join(", ")
            )))
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for KokoroSpeech {
        async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, DebateError> {
            self.validate_voice(&request.voice)?;
            let mut engine = self
                .engine
                .lock()
                .map_err(|_| DebateError::TtsError("TTS engine lock poisoned".to_string()))?;

            let mut samples = Vec::new();
            for chunk in split_into_chunks(&request.text, CHUNK_CHARS) {
                let audio = engine
                    .synthesize(&chunk, Some(request.voice.as_str()))
                    .map_err(|e| DebateError::TtsError(format!("Synthesis failed: {}", e)))?;
                samples.extend(audio);
                samples.extend(std::iter::repeat_n(0.0, CHUNK_GAP_SAMPLES));
            }
            Ok(f32_to_pcm16(&samples))
        }
    }
}
