//! Debate orchestration logic.
//!
//! Drives the [`DebateScheduler`] against a text backend: announce the next
//! speaker, generate their turn, append it. The scheduler lives behind a
//! mutex that is only ever held for synchronous bookkeeping, never across a
//! backend call, so `reset` and other operator actions stay responsive while a
//! request is in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::backend::{GeneratedTurn, HighlightAnalyzer, TextGenerator};
use crate::config::{Config, DebateConfiguration};
use crate::error::DebateError;
use crate::participant::{AgentProfile, RoleSlot};
use crate::prompt::sanitize_response;
use crate::scheduler::{Completion, Cycle, DebateScheduler, ScoringDecision, Ticket};
use crate::scoring::{Scorecard, score_transcript};
use crate::turn::{DebatePhase, Slot, Source, Turn};

/// Callback for debate events.
pub type DebateCallback = Box<dyn Fn(DebateEvent) + Send + Sync>;

/// Events emitted during a debate.
#[derive(Debug, Clone)]
pub enum DebateEvent {
    /// A new debate is starting.
    DebateStart { topic: String, rounds: u32 },
    /// A new round is starting.
    RoundStart { round: u32, total: u32 },
    /// A participant is about to speak.
    SpeakerStart {
        name: String,
        role: RoleSlot,
        verdict: bool,
    },
    /// A participant has finished speaking.
    SpeakerMessage { turn: Turn },
    /// Generation failed and the debate stopped advancing.
    Halted { reason: String },
    /// The final verdict is in.
    DebateEnd,
}

/// Result of a single scheduling cycle.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    Appended(Turn),
    Verdict(Turn),
    /// Another cycle already has a request outstanding.
    Busy,
    Inactive,
    Finished,
    /// The debate was reset while this cycle's request was in flight.
    Discarded,
}

/// Orchestrates the debate between AI participants.
pub struct DebateOrchestrator {
    state: Mutex<DebateScheduler>,
    generator: Arc<dyn TextGenerator>,
    announce: Duration,
    generation_timeout: Duration,
    /// Event callback.
    callback: Option<DebateCallback>,
}

impl DebateOrchestrator {
    /// Create a new orchestrator with the given draft configuration.
    pub fn new(draft: DebateConfiguration, generator: Arc<dyn TextGenerator>) -> Self {
        let defaults = Config::default();
        Self {
            state: Mutex::new(DebateScheduler::new(draft)),
            generator,
            announce: defaults.debate.announce_delay(),
            generation_timeout: defaults.debate.generation_timeout(),
            callback: None,
        }
    }

    pub fn from_config(config: &Config, generator: Arc<dyn TextGenerator>) -> Self {
        Self::new(config.debate_configuration(), generator)
            .with_announce_delay(config.debate.announce_delay())
            .with_generation_timeout(config.debate.generation_timeout())
    }

    /// Set a callback for debate events.
    pub fn with_callback(mut self, callback: DebateCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn with_announce_delay(mut self, delay: Duration) -> Self {
        self.announce = delay;
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub async fn start(&self, topic: &str) -> Result<(), DebateError> {
        let mut state = self.state.lock().await;
        state.start(topic)?;
        let event = started_event(&state);
        drop(state);
        self.emit_event(event);
        Ok(())
    }

    /// Abandon the debate. A request already in flight completes, but its
    /// result is thrown away.
    pub async fn reset(&self) {
        self.state.lock().await.reset();
    }

    pub async fn rematch(&self, swap_sides: bool) -> Result<(), DebateError> {
        let mut state = self.state.lock().await;
        state.rematch(swap_sides)?;
        let event = started_event(&state);
        drop(state);
        self.emit_event(event);
        Ok(())
    }

    /// Clear a generation failure so the next cycle retries the same slot.
    pub async fn resume(&self) -> Result<(), DebateError> {
        self.state.lock().await.resume()
    }

    pub async fn set_round_count(&self, rounds: u32) -> Result<(), DebateError> {
        self.state.lock().await.set_round_count(rounds)
    }

    pub async fn set_profile(&self, role: RoleSlot, profile: AgentProfile) {
        self.state.lock().await.set_profile(role, profile);
    }

    /// Register one audience approval for a turn.
    pub async fn approve(&self, turn_id: &str) -> Result<u32, DebateError> {
        self.state.lock().await.approve(turn_id)
    }

    pub async fn phase(&self) -> DebatePhase {
        self.state.lock().await.phase()
    }

    pub async fn config(&self) -> Option<DebateConfiguration> {
        self.state.lock().await.config().cloned()
    }

    /// Get the full transcript.
    pub async fn transcript(&self) -> Vec<Turn> {
        self.state.lock().await.log().turns().to_vec()
    }

    pub async fn scorecard(&self) -> Option<Scorecard> {
        self.state.lock().await.scorecard().cloned()
    }

    /// Run one scheduling cycle.
    pub async fn tick(&self) -> Result<TickOutcome, DebateError> {
        let (ticket, round_start) = {
            let mut state = self.state.lock().await;
            match state.begin_cycle() {
                Cycle::Generate(ticket) => {
                    let round_start = match ticket.slot {
                        Slot::Ordinary { role, round } if role == RoleSlot::Moderator => {
                            Some((round, ticket.request.total_rounds))
                        }
                        _ => None,
                    };
                    (ticket, round_start)
                }
                Cycle::Busy => return Ok(TickOutcome::Busy),
                Cycle::Inactive => return Ok(TickOutcome::Inactive),
                Cycle::Finished => return Ok(TickOutcome::Finished),
                Cycle::Halted(reason) => return Err(DebateError::Halted(reason)),
            }
        };

        if let Some((round, total)) = round_start {
            self.emit_event(DebateEvent::RoundStart { round, total });
        }
        self.emit_event(DebateEvent::SpeakerStart {
            name: ticket.request.speaker.clone(),
            role: ticket.slot.role(),
            verdict: ticket.slot.is_verdict(),
        });
        if !self.announce.is_zero() {
            tokio::time::sleep(self.announce).await;
            if !self.state.lock().await.is_current(&ticket) {
                debug!(
                    speaker = %ticket.request.speaker,
                    "debate reset during announcement, not generating"
                );
                return Ok(TickOutcome::Discarded);
            }
        }

        let result = self.generate(&ticket).await;

        let completion = self.state.lock().await.complete(ticket, result);
        match completion {
            Ok(Completion::Appended(turn)) => {
                self.emit_event(DebateEvent::SpeakerMessage { turn: turn.clone() });
                Ok(TickOutcome::Appended(turn))
            }
            Ok(Completion::Verdict(turn)) => {
                self.emit_event(DebateEvent::SpeakerMessage { turn: turn.clone() });
                self.emit_event(DebateEvent::DebateEnd);
                Ok(TickOutcome::Verdict(turn))
            }
            Ok(Completion::Discarded) => Ok(TickOutcome::Discarded),
            Err(e) => {
                self.emit_event(DebateEvent::Halted {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Run the full debate, through the verdict.
    pub async fn run(&self) -> Result<Vec<Turn>, DebateError> {
        loop {
            match self.tick().await? {
                TickOutcome::Appended(_) => {}
                TickOutcome::Verdict(_) | TickOutcome::Finished => break,
                TickOutcome::Busy => {
                    debug!("another cycle is generating, waiting");
                    tokio::time::sleep(self.announce.max(Duration::from_millis(50))).await;
                }
                TickOutcome::Inactive | TickOutcome::Discarded => {
                    return Err(DebateError::NoActiveDebate);
                }
            }
        }
        Ok(self.transcript().await)
    }

    /// Produce the scorecard once the verdict is in. Later calls return the
    /// stored card without consulting the analyzer again.
    pub async fn score(&self, analyzer: &dyn HighlightAnalyzer) -> Result<Scorecard, DebateError> {
        let job = match self.state.lock().await.begin_scoring()? {
            ScoringDecision::Run(job) => job,
            ScoringDecision::AlreadyScored(card) => return Ok(card),
            ScoringDecision::InProgress => return Err(DebateError::ScoringInProgress),
        };

        let card = score_transcript(&job.topic, &job.turns, analyzer).await;
        if !self.state.lock().await.finish_scoring(job.epoch, card.clone()) {
            info!("debate reset during scoring, scorecard dropped");
            return Err(DebateError::NoActiveDebate);
        }
        Ok(card)
    }

    async fn generate(&self, ticket: &Ticket) -> Result<GeneratedTurn, DebateError> {
        let speaker = &ticket.request.speaker;
        let call = self.generator.generate(&ticket.request);
        let generated = match tokio::time::timeout(self.generation_timeout, call).await {
            Ok(Ok(generated)) => generated,
            Ok(Err(e @ DebateError::Generation { .. })) => return Err(e),
            Ok(Err(e)) => {
                return Err(DebateError::Generation {
                    speaker: speaker.clone(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(DebateError::Timeout {
                    operation: format!("turn for {speaker}"),
                    seconds: self.generation_timeout.as_secs(),
                });
            }
        };

        Ok(GeneratedTurn {
            text: sanitize_response(&generated.text),
            sources: dedupe_sources(generated.sources),
        })
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: DebateEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}

fn started_event(state: &DebateScheduler) -> DebateEvent {
    let (topic, rounds) = state
        .config()
        .map(|c| (c.topic.clone(), c.rounds))
        .unwrap_or_default();
    DebateEvent::DebateStart { topic, rounds }
}

/// Keep the first occurrence of each URI.
pub fn dedupe_sources(sources: Vec<Source>) -> Vec<Source> {
    let mut seen = std::collections::HashSet::new();
    sources
        .into_iter()
        .filter(|s| seen.insert(s.uri.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Highlight, Highlights};
    use crate::config::default_config;
    use crate::participant::ROTATION;
    use crate::backend::{SpeechRequest, SpeechSynthesizer};
    use crate::prompt::{GenerationRequest, TranscriptEntry};
    use crate::tts::AudioRenderer;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    const TOPIC: &str = "Should pineapple go on pizza?";

    /// Answers every request, recording what it was asked.
    #[derive(Default)]
    struct ScriptedGenerator {
        calls: AtomicUsize,
        fail_on: Option<usize>,
        empty_on: Option<usize>,
        delay: Duration,
        requests: StdMutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedTurn, DebateError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail_on == Some(n) {
                return Err(DebateError::Io(std::io::Error::other("connection reset")));
            }
            if self.empty_on == Some(n) {
                return Ok(GeneratedTurn::new(""));
            }
            Ok(GeneratedTurn::new(format!("<think>hmm</think>**{}** speaks #{n}", request.speaker))
                .with_sources(vec![
                    Source::new("https://a.example", "A"),
                    Source::new("https://a.example", "A again"),
                ]))
        }
    }

    #[derive(Default)]
    struct CountingAnalyzer {
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl HighlightAnalyzer for CountingAnalyzer {
        async fn analyze(
            &self,
            _topic: &str,
            transcript: &[TranscriptEntry],
        ) -> Result<Highlights, DebateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let h = Highlight {
                speaker: transcript[1].speaker.clone(),
                quote: transcript[1].text.clone(),
            };
            Ok(Highlights {
                takedown: h.clone(),
                non_sequitur: h,
            })
        }
    }

    /// One byte per character of the spoken text.
    struct LengthSpeech;

    #[async_trait]
    impl SpeechSynthesizer for LengthSpeech {
        async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, DebateError> {
            Ok(vec![0; request.text.len()])
        }
    }

    fn orchestrator(rounds: u32, generator: Arc<ScriptedGenerator>) -> DebateOrchestrator {
        let mut draft = default_config().debate_configuration();
        draft.rounds = rounds;
        DebateOrchestrator::new(draft, generator).with_announce_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_run_produces_rotation_then_verdict() {
        let generator = Arc::new(ScriptedGenerator::default());
        let orch = orchestrator(2, generator.clone());
        orch.start(TOPIC).await.unwrap();

        let transcript = orch.run().await.unwrap();

        assert_eq!(transcript.len(), 9);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 9);
        for (i, turn) in transcript[..8].iter().enumerate() {
            assert_eq!(turn.role, ROTATION[i % 4]);
        }
        assert!(transcript[8].is_verdict());
        assert_eq!(transcript[1].text, "The Advocate speaks #1");
        assert_eq!(transcript[1].sources.len(), 1);
        assert_eq!(orch.phase().await, DebatePhase::Scored);
        assert!(matches!(orch.tick().await.unwrap(), TickOutcome::Finished));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_ticks_issue_one_request() {
        let generator = Arc::new(ScriptedGenerator {
            delay: Duration::from_secs(1),
            ..Default::default()
        });
        let orch = orchestrator(1, generator.clone());
        orch.start(TOPIC).await.unwrap();

        let (a, b, c) = tokio::join!(orch.tick(), orch.tick(), orch.tick());
        let outcomes = [a.unwrap(), b.unwrap(), c.unwrap()];

        let appended = outcomes
            .iter()
            .filter(|o| matches!(o, TickOutcome::Appended(_)))
            .count();
        let busy = outcomes
            .iter()
            .filter(|o| matches!(o, TickOutcome::Busy))
            .count();
        assert_eq!((appended, busy), (1, 2));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(orch.transcript().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_announcement_blocks_other_cycles() {
        let generator = Arc::new(ScriptedGenerator::default());
        let mut draft = default_config().debate_configuration();
        draft.rounds = 1;
        let orch = DebateOrchestrator::new(draft, generator.clone())
            .with_announce_delay(Duration::from_millis(500));
        orch.start(TOPIC).await.unwrap();

        let first = orch.tick();
        let second = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            orch.tick().await
        };
        let (first, second) = tokio::join!(first, second);

        assert!(matches!(first.unwrap(), TickOutcome::Appended(_)));
        assert!(matches!(second.unwrap(), TickOutcome::Busy));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_halts_and_preserves_turns() {
        let generator = Arc::new(ScriptedGenerator {
            fail_on: Some(2),
            ..Default::default()
        });
        let orch = orchestrator(1, generator.clone());
        orch.start(TOPIC).await.unwrap();

        let err = orch.run().await.unwrap_err();
        assert!(matches!(err, DebateError::Generation { ref speaker, .. } if speaker == "The Dissenter"));
        assert_eq!(orch.transcript().await.len(), 2);

        assert!(matches!(orch.tick().await, Err(DebateError::Halted(_))));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);

        orch.resume().await.unwrap();
        let transcript = orch.run().await.unwrap();
        assert_eq!(transcript.len(), 5);
        assert_eq!(transcript[2].role, RoleSlot::Opponent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_timeout_halts() {
        let generator = Arc::new(ScriptedGenerator {
            delay: Duration::from_secs(600),
            ..Default::default()
        });
        let orch = orchestrator(1, generator).with_generation_timeout(Duration::from_secs(5));
        orch.start(TOPIC).await.unwrap();

        let err = orch.tick().await.unwrap_err();
        assert!(matches!(err, DebateError::Timeout { seconds: 5, .. }));
        assert!(orch.transcript().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_discards_result_in_flight() {
        let generator = Arc::new(ScriptedGenerator {
            delay: Duration::from_secs(2),
            ..Default::default()
        });
        let orch = orchestrator(1, generator);
        orch.start(TOPIC).await.unwrap();

        let tick = orch.tick();
        let reset = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            orch.reset().await;
        };
        let (outcome, ()) = tokio::join!(tick, reset);

        assert!(matches!(outcome.unwrap(), TickOutcome::Discarded));
        assert!(orch.transcript().await.is_empty());
        assert_eq!(orch.phase().await, DebatePhase::AwaitingStart);
        assert!(matches!(orch.tick().await.unwrap(), TickOutcome::Inactive));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_announcement_skips_generation() {
        let generator = Arc::new(ScriptedGenerator::default());
        let mut draft = default_config().debate_configuration();
        draft.rounds = 1;
        let orch = DebateOrchestrator::new(draft, generator.clone())
            .with_announce_delay(Duration::from_millis(500));
        orch.start(TOPIC).await.unwrap();

        let tick = orch.tick();
        let reset = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            orch.reset().await;
        };
        let (outcome, ()) = tokio::join!(tick, reset);

        assert!(matches!(outcome.unwrap(), TickOutcome::Discarded));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        assert!(orch.transcript().await.is_empty());
        assert!(matches!(orch.tick().await.unwrap(), TickOutcome::Inactive));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_response_is_kept_and_skipped_in_audio() {
        let generator = Arc::new(ScriptedGenerator {
            empty_on: Some(1),
            ..Default::default()
        });
        let orch = orchestrator(1, generator.clone());
        orch.start(TOPIC).await.unwrap();

        let transcript = orch.run().await.unwrap();
        assert_eq!(transcript.len(), 5);
        assert_eq!(transcript[1].speaker, "The Advocate");
        assert_eq!(transcript[1].text, "");
        assert!(transcript[1].sources.is_empty());

        {
            let requests = generator.requests.lock().unwrap();
            let seen = &requests[2].transcript;
            assert_eq!(seen.len(), 2);
            assert_eq!(seen[1].speaker, "The Advocate");
            assert_eq!(seen[1].text, "");
            assert_eq!(requests[4].transcript[1].text, "");
        }

        let roster = orch.config().await.unwrap().roster;
        let mut progress = Vec::new();
        let report = AudioRenderer::new(Arc::new(LengthSpeech))
            .with_pacing(Duration::ZERO)
            .render(&transcript, &roster, |done, total| progress.push((done, total)))
            .await
            .unwrap();
        assert_eq!(report.total, 4);
        assert_eq!(report.segments, 4);
        assert!(report.skipped.is_empty());
        assert_eq!(progress.last(), Some(&(4, 4)));
    }

    #[tokio::test]
    async fn test_events_follow_debate() {
        let events = Arc::new(StdMutex::new(Vec::new()));
        let sink = events.clone();
        let generator = Arc::new(ScriptedGenerator::default());
        let orch = orchestrator(1, generator).with_callback(Box::new(move |e| {
            let label = match e {
                DebateEvent::DebateStart { .. } => "start".to_string(),
                DebateEvent::RoundStart { round, .. } => format!("round{round}"),
                DebateEvent::SpeakerStart { verdict: true, .. } => "verdict".to_string(),
                DebateEvent::SpeakerStart { role, .. } => format!("speak:{role}"),
                DebateEvent::SpeakerMessage { .. } => "msg".to_string(),
                DebateEvent::Halted { .. } => "halted".to_string(),
                DebateEvent::DebateEnd => "end".to_string(),
            };
            sink.lock().unwrap().push(label);
        }));
        orch.start(TOPIC).await.unwrap();
        orch.run().await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events[0], "start");
        assert_eq!(events[1], "round1");
        assert_eq!(events[2], "speak:MODERATOR");
        assert_eq!(events.iter().filter(|e| *e == "msg").count(), 5);
        assert_eq!(events[events.len() - 3], "verdict");
        assert_eq!(events.last().unwrap(), "end");
    }

    #[tokio::test]
    async fn test_score_once_after_verdict() {
        let orch = orchestrator(1, Arc::new(ScriptedGenerator::default()));
        let analyzer = CountingAnalyzer::default();
        orch.start(TOPIC).await.unwrap();
        assert!(matches!(
            orch.score(&analyzer).await,
            Err(DebateError::NotFinished {
                phase: DebatePhase::AwaitingStart
            })
        ));

        let transcript = orch.run().await.unwrap();
        orch.approve(&transcript[3].id).await.unwrap();

        let first = orch.score(&analyzer).await.unwrap();
        let second = orch.score(&analyzer).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
        let favorite = first.audience_favorite.unwrap();
        assert_eq!(favorite.speaker, "The Wildcard");
        assert!(!favorite.by_fallback);
        assert_eq!(first.most_cited.unwrap().speaker, "The Orchestrator");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_score_is_rejected_while_running() {
        let orch = orchestrator(1, Arc::new(ScriptedGenerator::default()));
        let analyzer = CountingAnalyzer {
            delay: Duration::from_secs(1),
            ..Default::default()
        };
        orch.start(TOPIC).await.unwrap();
        orch.run().await.unwrap();

        let (first, second) = tokio::join!(orch.score(&analyzer), orch.score(&analyzer));

        assert!(first.is_ok());
        assert!(matches!(second, Err(DebateError::ScoringInProgress)));
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
        assert!(orch.score(&analyzer).await.is_ok());
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rematch_swaps_sides() {
        let generator = Arc::new(ScriptedGenerator::default());
        let orch = orchestrator(1, generator.clone());
        orch.start(TOPIC).await.unwrap();
        orch.run().await.unwrap();

        orch.rematch(true).await.unwrap();
        orch.run().await.unwrap();

        let requests = generator.requests.lock().unwrap();
        assert_eq!(requests[1].speaker, "The Advocate");
        assert_eq!(requests[6].speaker, "The Dissenter");
        assert_eq!(requests[6].role, RoleSlot::Proponent);
    }

    #[test]
    fn test_dedupe_sources_keeps_first() {
        let sources = dedupe_sources(vec![
            Source::new("u1", "first"),
            Source::new("u2", "other"),
            Source::new("u1", "second"),
        ]);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].title, "first");
    }
}
