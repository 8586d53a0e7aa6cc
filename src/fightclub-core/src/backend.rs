//! Capabilities the debate depends on but does not implement.
//!
//! Text generation, speech synthesis and highlight analysis are opaque
//! request/response services. The scheduler, scorer and audio renderer only
//! ever talk to these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DebateError;
use crate::prompt::{GenerationRequest, TranscriptEntry};
use crate::turn::Source;

/// What a text backend hands back for one turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedTurn {
    /// Spoken text. Empty is a valid answer.
    pub text: String,
    pub sources: Vec<Source>,
}

impl GeneratedTurn {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = sources;
        self
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedTurn, DebateError>;
}

/// One utterance to synthesize.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    pub style: String,
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns raw mono 16-bit little-endian PCM at the backend's fixed rate.
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, DebateError>;
}

/// A quoted moment of the debate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Highlight {
    pub speaker: String,
    pub quote: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Highlights {
    pub takedown: Highlight,
    pub non_sequitur: Highlight,
}

#[async_trait]
pub trait HighlightAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        topic: &str,
        transcript: &[TranscriptEntry],
    ) -> Result<Highlights, DebateError>;
}
