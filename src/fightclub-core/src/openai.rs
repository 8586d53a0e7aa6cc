//! OpenAI-compatible chat backend for turns and highlight analysis.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;
use tracing::debug;

use crate::backend::{GeneratedTurn, HighlightAnalyzer, Highlights, TextGenerator};
use crate::error::DebateError;
use crate::prompt::{GenerationRequest, TranscriptEntry, render_transcript};
use crate::turn::Source;

const MARKDOWN_LINK: &str = r"\[([^\]\n]+)\]\((https?://[^\s)]+)\)";

const ANALYSIS_MAX_TOKENS: u32 = 600;

/// Chat-completions client shared by every agent; the model is per request.
#[derive(Clone)]
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    analysis_model: String,
}

impl OpenAiBackend {
    pub fn new(api_base: &str, api_key: &str) -> Result<Self, DebateError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                DebateError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client),
            analysis_model: "gpt-4o-mini".to_string(),
        })
    }

    /// Model used for the post-debate highlight pass.
    pub fn with_analysis_model(mut self, model: impl Into<String>) -> Self {
        self.analysis_model = model.into();
        self
    }

    async fn complete(
        &self,
        model: &str,
        system: String,
        user: String,
        max_tokens: u32,
    ) -> Result<String, DebateError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: system.into(),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: user.into(),
                name: None,
            }),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .max_completion_tokens(max_tokens)
            .messages(messages)
            .build()?;

        let response = self.client.chat().create(request).await?;
        // A missing message body counts as an empty turn.
        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl TextGenerator for OpenAiBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedTurn, DebateError> {
        let prompt = request.prompt();
        debug!(speaker = %request.speaker, model = %request.model, ?prompt, "requesting turn");

        let raw = self
            .complete(
                &request.model,
                prompt.system_prompt(request),
                prompt.render(request),
                prompt.max_tokens(),
            )
            .await
            .map_err(|e| DebateError::Generation {
                speaker: request.speaker.clone(),
                reason: e.to_string(),
            })?;

        let (text, sources) = extract_sources(&raw);
        Ok(GeneratedTurn { text, sources })
    }
}

#[async_trait]
impl HighlightAnalyzer for OpenAiBackend {
    async fn analyze(
        &self,
        topic: &str,
        transcript: &[TranscriptEntry],
    ) -> Result<Highlights, DebateError> {
        let system = "You are a ruthless sports commentator reviewing a finished debate. \
            Reply with JSON only, no commentary."
            .to_string();
        let user = format!(
            "Debate topic: \"{topic}\"\n\nTranscript:\n{}\n\nPick the single most savage takedown and the single wildest non-sequitur. Quote each verbatim from the transcript. Respond exactly in this shape:\n{{\"takedown\": {{\"speaker\": \"...\", \"quote\": \"...\"}}, \"non_sequitur\": {{\"speaker\": \"...\", \"quote\": \"...\"}}}}",
            render_transcript(transcript)
        );

        let raw = self
            .complete(&self.analysis_model, system, user, ANALYSIS_MAX_TOKENS)
            .await
            .map_err(|e| DebateError::Analysis(e.to_string()))?;
        parse_highlights(&raw)
    }
}

/// Pull markdown links out of a response, returning the remaining text and
/// the linked sources in order of appearance.
pub fn extract_sources(raw: &str) -> (String, Vec<Source>) {
    let Ok(link_re) = Regex::new(MARKDOWN_LINK) else {
        return (raw.trim().to_string(), Vec::new());
    };
    let sources = link_re
        .captures_iter(raw)
        .map(|c| Source::new(&c[2], c[1].trim()))
        .collect();
    let text = link_re.replace_all(raw, "").trim().to_string();
    (text, sources)
}

/// Parse the analyzer's JSON, tolerating code fences and chatter around it.
pub fn parse_highlights(raw: &str) -> Result<Highlights, DebateError> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &raw[s..=e],
        _ => {
            return Err(DebateError::Analysis(format!(
                "no JSON object in response: {}",
                raw.chars().take(80).collect::<String>()
            )));
        }
    };
    serde_json::from_str(json).map_err(|e| DebateError::Analysis(e.to_string()))
}
