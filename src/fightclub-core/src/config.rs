//! Configuration module for loading TOML config files.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::DebateError;
use crate::participant::{AgentProfile, Roster};
use crate::retry::RetryPolicy;
use crate::wav::PcmFormat;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub debate: DebateSettings,
    #[serde(default)]
    pub agents: Roster,
    #[serde(default)]
    pub audio: AudioConfig,
}

/// How a debate runs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DebateSettings {
    pub rounds: u32,
    pub language: String,
    pub allow_strong_language: bool,
    /// Pause while a speaker is announced, before their turn is requested.
    pub announce_ms: u64,
    pub generation_timeout_secs: u64,
}

impl Default for DebateSettings {
    fn default() -> Self {
        Self {
            rounds: 6,
            language: "English".to_string(),
            allow_strong_language: false,
            announce_ms: 500,
            generation_timeout_secs: 120,
        }
    }
}

impl DebateSettings {
    pub fn announce_delay(&self) -> Duration {
        Duration::from_millis(self.announce_ms)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechBackendKind {
    /// OpenAI-compatible `/audio/speech` endpoint.
    OpenAi,
    /// Local kokoro model (needs the `kokoro` feature).
    Kokoro,
}

/// Audio rendering settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioConfig {
    pub backend: SpeechBackendKind,
    pub model: String,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Pause between consecutive synthesis calls.
    pub pacing_ms: u64,
    pub sample_rate: u32,
    pub timeout_secs: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            backend: SpeechBackendKind::OpenAi,
            model: "gpt-4o-mini-tts".to_string(),
            max_attempts: 3,
            base_delay_ms: 1000,
            pacing_ms: 500,
            sample_rate: 24_000,
            timeout_secs: 60,
        }
    }
}

impl AudioConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn format(&self) -> PcmFormat {
        PcmFormat::mono16(self.sample_rate)
    }
}

/// Everything fixed for the lifetime of one debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateConfiguration {
    pub topic: String,
    pub rounds: u32,
    pub language: String,
    pub allow_strong_language: bool,
    pub roster: Roster,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DebateError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| DebateError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, DebateError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| DebateError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DebateError> {
        if self.debate.rounds < 1 {
            return Err(DebateError::InvalidRoundCount(self.debate.rounds));
        }
        if self.audio.sample_rate == 0 {
            return Err(DebateError::ConfigError(
                "audio.sample_rate must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Draft for the next debate; the topic is filled in at start.
    pub fn debate_configuration(&self) -> DebateConfiguration {
        DebateConfiguration {
            topic: String::new(),
            rounds: self.debate.rounds,
            language: self.debate.language.clone(),
            allow_strong_language: self.debate.allow_strong_language,
            roster: self.agents.clone(),
        }
    }
}

impl Default for Roster {
    fn default() -> Self {
        Roster {
            moderator: AgentProfile::new("The Orchestrator", DEFAULT_MODEL)
                .with_persona("A cynical, chaos-loving ringmaster who lives for the drama.")
                .with_voice("onyx")
                .with_speech_style("Booming arena announcer, relishing every word."),
            proponent: AgentProfile::new("The Advocate", DEFAULT_MODEL)
                .with_persona("A zealous true believer who treats every point as a holy crusade.")
                .with_voice("nova")
                .with_speech_style("Passionate and fast, rising to a crescendo."),
            opponent: AgentProfile::new("The Dissenter", DEFAULT_MODEL)
                .with_persona("An ice-cold contrarian with a scalpel for a tongue.")
                .with_voice("echo")
                .with_speech_style("Calm, dry and cutting."),
            disruptor: AgentProfile::new("The Wildcard", DEFAULT_MODEL)
                .with_persona("A baffling agent of chaos who only half follows the conversation.")
                .with_voice("fable")
                .with_speech_style("Scattered and gleeful, with sudden tangents."),
        }
    }
}

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::RoleSlot;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.debate.rounds, 6);
        assert_eq!(config.debate.announce_ms, 500);
        assert_eq!(config.agents.get(RoleSlot::Disruptor).name, "The Wildcard");
        assert_eq!(config.audio.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_str(
            r#"
[debate]
rounds = 2
language = "French"
allow_strong_language = true

[agents.proponent]
name = "Le Champion"
persona = "Tres passionne"
model = "mistral-large"
voice = "alloy"

[audio]
backend = "kokoro"
max_attempts = 5
"#,
        )
        .unwrap();

        assert_eq!(config.debate.rounds, 2);
        assert!(config.debate.allow_strong_language);
        assert_eq!(config.debate.generation_timeout_secs, 120);
        assert_eq!(config.agents.proponent.name, "Le Champion");
        assert_eq!(config.agents.proponent.speech_style, "");
        assert_eq!(config.agents.opponent.name, "The Dissenter");
        assert_eq!(config.audio.backend, SpeechBackendKind::Kokoro);
        assert_eq!(config.audio.max_attempts, 5);
        assert_eq!(config.audio.pacing_ms, 500);

        let draft = config.debate_configuration();
        assert_eq!(draft.language, "French");
        assert!(draft.topic.is_empty());
    }

    #[test]
    fn test_zero_rounds_rejected() {
        let err = Config::from_str("[debate]\nrounds = 0\n").unwrap_err();
        assert!(matches!(err, DebateError::InvalidRoundCount(0)));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = Config::from_str("[debate\nrounds = ").unwrap_err();
        assert!(matches!(err, DebateError::ConfigError(_)));
    }
}
