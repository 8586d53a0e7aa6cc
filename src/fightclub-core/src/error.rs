//! Error types for the debate system.

use thiserror::Error;

use crate::turn::DebatePhase;

#[derive(Error, Debug)]
pub enum DebateError {
    #[error("Topic too short: need at least {min} characters, got {actual}")]
    TopicTooShort { min: usize, actual: usize },

    #[error("Invalid round count: {0} (must be at least 1)")]
    InvalidRoundCount(u32),

    #[error("No debate is active")]
    NoActiveDebate,

    #[error("Debate halted: {0}")]
    Halted(String),

    #[error("Cannot score before the verdict (debate is {phase})")]
    NotFinished { phase: DebatePhase },

    #[error("Scoring is already in progress")]
    ScoringInProgress,

    #[error("Unknown turn id: {0}")]
    UnknownTurn(String),

    #[error("Failed to get response from {speaker}: {reason}")]
    Generation { speaker: String, reason: String },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("TTS error: {0}")]
    TtsError(String),

    #[error("Speech request rejected: {0}")]
    SpeechRejected(String),

    #[error("Audio rendering failed: none of the {attempted} segments could be synthesized")]
    NoAudio { attempted: usize },

    #[error("Highlight analysis failed: {0}")]
    Analysis(String),

    #[error("Invalid WAV data: {0}")]
    InvalidWav(String),

    #[error("OpenAI API error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DebateError {
    /// Whether a retry of the same call could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DebateError::Timeout { .. }
            | DebateError::TtsError(_)
            | DebateError::Http(_)
            | DebateError::OpenAIError(_)
            | DebateError::Generation { .. }
            | DebateError::Analysis(_) => true,
            DebateError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}
