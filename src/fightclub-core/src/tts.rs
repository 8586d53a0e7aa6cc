//! Audio rendering for a finished transcript.
//!
//! Every non-empty turn is spoken with its role's voice, one call at a time
//! and in transcript order. A segment that still fails after its retries is
//! skipped with a warning; only a render where nothing succeeded is an error.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::backend::{SpeechRequest, SpeechSynthesizer};
use crate::config::AudioConfig;
use crate::error::DebateError;
use crate::participant::Roster;
use crate::retry::RetryPolicy;
use crate::turn::Turn;
use crate::wav::{PcmFormat, assemble_wav};

/// A turn left out of the audio, with the last error it hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSegment {
    pub turn_id: String,
    pub speaker: String,
    pub error: String,
}

/// Outcome of a render that produced at least one segment.
#[derive(Debug, Clone)]
pub struct AudioReport {
    /// Complete WAV container.
    pub wav: Vec<u8>,
    /// Segments assembled into `wav`.
    pub segments: usize,
    /// Turns that were eligible for audio.
    pub total: usize,
    pub skipped: Vec<SkippedSegment>,
}

impl AudioReport {
    /// True when some turns are missing from the audio.
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Drives a [`SpeechSynthesizer`] over a transcript.
pub struct AudioRenderer {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    retry: RetryPolicy,
    pacing: Duration,
    timeout: Duration,
    format: PcmFormat,
}

impl AudioRenderer {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self::from_config(synthesizer, &AudioConfig::default())
    }

    pub fn from_config(synthesizer: Arc<dyn SpeechSynthesizer>, config: &AudioConfig) -> Self {
        Self {
            synthesizer,
            retry: config.retry_policy(),
            pacing: config.pacing(),
            timeout: config.timeout(),
            format: config.format(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Upper bound for a single synthesis attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Render `turns` into one WAV container.
    ///
    /// `on_progress` is called with `(processed, total)` after every eligible
    /// turn, skipped ones included.
    pub async fn render<F>(
        &self,
        turns: &[Turn],
        roster: &Roster,
        mut on_progress: F,
    ) -> Result<AudioReport, DebateError>
    where
        F: FnMut(usize, usize),
    {
        let eligible: Vec<&Turn> = turns.iter().filter(|t| !t.text.trim().is_empty()).collect();
        let total = eligible.len();
        if total == 0 {
            return Err(DebateError::NoAudio { attempted: 0 });
        }

        let mut segments: Vec<Vec<u8>> = Vec::with_capacity(total);
        let mut skipped = Vec::new();

        for (index, turn) in eligible.iter().enumerate() {
            if index > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            let profile = roster.get(turn.role);
            let request = SpeechRequest {
                text: turn.text.clone(),
                voice: profile.voice.clone(),
                style: profile.speech_style.clone(),
            };
            let operation = format!("speech for {}", turn.speaker);

            match self
                .retry
                .run_if(
                    &operation,
                    || self.synthesize_once(&request),
                    DebateError::is_transient,
                )
                .await
            {
                Ok(pcm) => segments.push(pcm),
                Err(e) => {
                    warn!(speaker = %turn.speaker, turn = %turn.id, error = %e, "skipping audio segment");
                    skipped.push(SkippedSegment {
                        turn_id: turn.id.clone(),
                        speaker: turn.speaker.clone(),
                        error: e.to_string(),
                    });
                }
            }

            on_progress(index + 1, total);
        }

        if segments.is_empty() {
            return Err(DebateError::NoAudio { attempted: total });
        }

        info!(
            segments = segments.len(),
            skipped = skipped.len(),
            "audio assembled"
        );
        Ok(AudioReport {
            wav: assemble_wav(&segments, self.format)?,
            segments: segments.len(),
            total,
            skipped,
        })
    }

    async fn synthesize_once(&self, request: &SpeechRequest) -> Result<Vec<u8>, DebateError> {
        tokio::time::timeout(self.timeout, self.synthesizer.synthesize(request))
            .await
            .map_err(|_| DebateError::Timeout {
                operation: "speech synthesis".to_string(),
                seconds: self.timeout.as_secs(),
            })?
    }
}
