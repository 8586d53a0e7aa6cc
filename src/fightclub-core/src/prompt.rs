//! Generation requests and the prompts rendered from them.
//!
//! A request is a structured value; the wording lives entirely in
//! [`TurnPrompt::render`], so backends never see a half-built template.

use serde::{Deserialize, Serialize};

use crate::participant::RoleSlot;
use crate::turn::Turn;

/// One line of the transcript as shown to the next speaker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptEntry {
    pub speaker: String,
    pub text: String,
}

impl From<&Turn> for TranscriptEntry {
    fn from(turn: &Turn) -> Self {
        Self {
            speaker: turn.speaker.clone(),
            text: turn.text.clone(),
        }
    }
}

/// Everything a text backend needs to produce one turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    pub role: RoleSlot,
    pub speaker: String,
    pub persona: String,
    pub model: String,
    pub topic: String,
    pub transcript: Vec<TranscriptEntry>,
    pub round: u32,
    pub total_rounds: u32,
    pub is_verdict: bool,
    pub language: String,
    pub allow_strong_language: bool,
}

impl GenerationRequest {
    pub fn prompt(&self) -> TurnPrompt {
        TurnPrompt::for_request(self)
    }

    pub fn transcript_text(&self) -> String {
        render_transcript(&self.transcript)
    }
}

pub fn render_transcript(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}: {}", e.speaker, e.text))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// The closed set of things an agent can be asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPrompt {
    ModeratorOpening,
    ModeratorRecap,
    Proponent,
    Opponent,
    Disruptor,
    Verdict,
}

impl TurnPrompt {
    pub fn for_request(request: &GenerationRequest) -> TurnPrompt {
        if request.is_verdict {
            return TurnPrompt::Verdict;
        }
        match request.role {
            RoleSlot::Moderator if request.round <= 1 => TurnPrompt::ModeratorOpening,
            RoleSlot::Moderator => TurnPrompt::ModeratorRecap,
            RoleSlot::Proponent => TurnPrompt::Proponent,
            RoleSlot::Opponent => TurnPrompt::Opponent,
            RoleSlot::Disruptor => TurnPrompt::Disruptor,
        }
    }

    /// Response size cap for this kind of turn.
    pub fn max_tokens(&self) -> u32 {
        match self {
            TurnPrompt::Verdict => 900,
            TurnPrompt::ModeratorOpening | TurnPrompt::ModeratorRecap => 600,
            _ => 500,
        }
    }

    pub fn system_prompt(&self, request: &GenerationRequest) -> String {
        let language_rule = if request.allow_strong_language {
            "Strong language and profanity are allowed when they land a punch."
        } else {
            "Keep it clean: no profanity or slurs, however heated it gets."
        };
        format!(
            r#"You are an AI agent in the AI AGENT FIGHT CLUB, a no-holds-barred verbal brawl. Your persona is over-the-top, theatrical, and aggressive. This is entertainment, so be sensational.

Your assigned name is "{name}". Your specific persona is: "{persona}". Embody this persona completely in your response.

Respond in {language}. {language_rule}

IMPORTANT: Your entire response must be a single block of text suitable for text-to-speech. Do not use any markdown formatting. Write as if you are speaking directly. Do not read out your sources. If you rely on a source, append it after your speech as a markdown link [title](url); links are stripped before anyone hears you. Land your verbal punches quickly and concisely. No rambling."#,
            name = request.speaker,
            persona = request.persona,
            language = request.language,
        )
    }

    pub fn render(&self, request: &GenerationRequest) -> String {
        let topic = &request.topic;
        let round = request.round;
        let total = request.total_rounds;
        let history = request.transcript_text();
        match self {
            TurnPrompt::Verdict => format!(
                "The bloody debate on \"{topic}\" has concluded after {total} brutal rounds. The transcript of the entire intellectual slaughter is below:\n{history}\n\nAct as the ultimate judge. Review the entire debate and deliver a final, dramatic verdict. Announce the winner. Do not be impartial: decide on who was most entertaining, savage, or gloriously absurd. This is your grand finale."
            ),
            TurnPrompt::ModeratorOpening => format!(
                "You are the master of ceremonies in this digital coliseum. The topic is: \"{topic}\". Announce the topic with the gravity of a gladiatorial match, hype up the crowd and command the first debater to land the first blow. Keep it under 120 words."
            ),
            TurnPrompt::ModeratorRecap => format!(
                "The arena is hot over \"{topic}\". We're entering Round {round}/{total}. Here's the carnage so far:\n{history}\n\nRecap the last round with relish, then throw gasoline on the fire with a new, incendiary question. Keep it under 120 words."
            ),
            TurnPrompt::Proponent => format!(
                "You are a zealous champion FOR the topic: \"{topic}\". It's Round {round}/{total}. The conversation so far:\n{history}\n\nUnleash a furious, passionate defense. If your opponent has spoken, tear their arguments apart. Keep it under 100 words."
            ),
            TurnPrompt::Opponent => format!(
                "You are a ruthless saboteur arguing AGAINST the topic: \"{topic}\". It's Round {round}/{total}. The conversation so far:\n{history}\n\nObliterate the other side's points with cold logic and searing wit. Expose their fallacies. Keep it under 100 words."
            ),
            TurnPrompt::Disruptor => format!(
                "You are an agent of pure, baffling chaos in the debate on \"{topic}\". It's Round {round}/{total}. The conversation so far:\n{history}\n\nDerail the debate. Latch onto an irrelevant detail and blow it out of proportion, or ask a question so bizarre it stops everyone in their tracks. Keep it under 100 words."
            ),
        }
    }
}

/// Sanitize AI response by stripping reasoning tokens and XML-like tags.
///
/// Removes patterns like <thinking>...</thinking>, <reflection>...</reflection>, etc.
pub fn sanitize_response(response: &str) -> String {
    let tags_to_strip = [
        "thinking",
        "think",
        "reflection",
        "reflect",
        "internal",
        "reasoning",
        "thought",
        "scratchpad",
        "analysis",
    ];

    let mut result = response.to_string();

    for tag in &tags_to_strip {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>", tag = tag);
        if let Ok(re) = regex::Regex::new(&pattern) {
            result = re.replace_all(&result, "").to_string();
        }
    }

    if let Ok(orphan_re) = regex::Regex::new(r"</?[\w]+[^>]*>") {
        result = orphan_re.replace_all(&result, "").to_string();
    }

    result = result.replace('*', "");

    if let Ok(ws_re) = regex::Regex::new(r"\s+") {
        result = ws_re.replace_all(&result, " ").to_string();
    }

    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(role: RoleSlot, round: u32, is_verdict: bool) -> GenerationRequest {
        GenerationRequest {
            role,
            speaker: "The Advocate".into(),
            persona: "A fiery preacher".into(),
            model: "gpt-4o-mini".into(),
            topic: "Is cereal a soup?".into(),
            transcript: vec![
                TranscriptEntry {
                    speaker: "A".into(),
                    text: "first".into(),
                },
                TranscriptEntry {
                    speaker: "B".into(),
                    text: "second".into(),
                },
            ],
            round,
            total_rounds: 3,
            is_verdict,
            language: "English".into(),
            allow_strong_language: false,
        }
    }

    #[test]
    fn test_prompt_variant_selection() {
        assert_eq!(
            request(RoleSlot::Moderator, 1, false).prompt(),
            TurnPrompt::ModeratorOpening
        );
        assert_eq!(
            request(RoleSlot::Moderator, 2, false).prompt(),
            TurnPrompt::ModeratorRecap
        );
        assert_eq!(
            request(RoleSlot::Moderator, 3, true).prompt(),
            TurnPrompt::Verdict
        );
        assert_eq!(
            request(RoleSlot::Disruptor, 2, false).prompt(),
            TurnPrompt::Disruptor
        );
    }

    #[test]
    fn test_max_tokens_by_kind() {
        assert_eq!(TurnPrompt::Verdict.max_tokens(), 900);
        assert_eq!(TurnPrompt::ModeratorRecap.max_tokens(), 600);
        assert_eq!(TurnPrompt::Opponent.max_tokens(), 500);
    }

    #[test]
    fn test_render_includes_round_and_history() {
        let req = request(RoleSlot::Proponent, 2, false);
        let text = req.prompt().render(&req);
        assert!(text.contains("Round 2/3"));
        assert!(text.contains("A: first\n\n---\n\nB: second"));
        assert!(text.contains("Is cereal a soup?"));
    }

    #[test]
    fn test_system_prompt_language_rules() {
        let mut req = request(RoleSlot::Opponent, 1, false);
        req.language = "German".into();
        let clean = req.prompt().system_prompt(&req);
        assert!(clean.contains("Respond in German"));
        assert!(clean.contains("Keep it clean"));
        req.allow_strong_language = true;
        assert!(req.prompt().system_prompt(&req).contains("Strong language"));
    }

    #[test]
    fn test_sanitize_response_thinking_tags() {
        let input = "<thinking>Let me think about this...</thinking>The answer is 42.";
        assert_eq!(sanitize_response(input), "The answer is 42.");
    }

    #[test]
    fn test_sanitize_response_strips_markdown_and_whitespace() {
        let input = "  **Boom.**\n\n  Take   that! ";
        assert_eq!(sanitize_response(input), "Boom. Take that!");
    }

    #[test]
    fn test_sanitize_response_empty_stays_empty() {
        assert_eq!(sanitize_response(""), "");
        assert_eq!(sanitize_response("<think>only thoughts</think>"), "");
    }
}
