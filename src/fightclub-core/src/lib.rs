//! Fight Club Core Library
//!
//! Turn scheduling for a four-seat AI debate, scoring of the finished
//! transcript, and rendering it to a single WAV file.

pub mod backend;
pub mod config;
pub mod error;
pub mod export;
pub mod openai;
pub mod orchestrator;
pub mod participant;
pub mod prompt;
pub mod retry;
pub mod scheduler;
pub mod scoring;
pub mod speech;
pub mod tts;
pub mod turn;
pub mod wav;

pub use backend::{
    GeneratedTurn, Highlight, HighlightAnalyzer, Highlights, SpeechRequest, SpeechSynthesizer,
    TextGenerator,
};
pub use config::{AudioConfig, Config, DebateConfiguration, DebateSettings, SpeechBackendKind};
pub use error::DebateError;
pub use openai::OpenAiBackend;
pub use orchestrator::{DebateCallback, DebateEvent, DebateOrchestrator, TickOutcome};
pub use participant::{AgentProfile, RoleSlot, Roster};
pub use retry::RetryPolicy;
pub use scheduler::DebateScheduler;
pub use scoring::Scorecard;
#[cfg(feature = "kokoro")]
pub use speech::KokoroSpeech;
pub use speech::OpenAiSpeech;
pub use tts::{AudioRenderer, AudioReport, SkippedSegment};
pub use turn::{DebatePhase, Source, Turn, TurnKind};
