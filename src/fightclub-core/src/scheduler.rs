//! Turn scheduling state machine.
//!
//! The scheduler never awaits. A cycle is split in two halves around the
//! generation call: [`DebateScheduler::begin_cycle`] claims the next slot and
//! hands out a [`Ticket`], [`DebateScheduler::complete`] appends the result.
//! While a ticket is outstanding every other cycle is a no-op, so for any log
//! state there is at most one generation request in flight, and completing it
//! appends exactly one turn.

use tracing::{debug, info, warn};

use crate::backend::GeneratedTurn;
use crate::config::DebateConfiguration;
use crate::error::DebateError;
use crate::participant::{AgentProfile, RoleSlot};
use crate::prompt::{GenerationRequest, TranscriptEntry};
use crate::scoring::Scorecard;
use crate::turn::{DebatePhase, Slot, Turn, TurnLog};

pub const MIN_TOPIC_CHARS: usize = 10;

/// A claim on one slot of one debate.
#[derive(Debug, Clone)]
pub struct Ticket {
    /// Debate instance the ticket belongs to; bumped on start, reset and rematch.
    pub epoch: u64,
    /// Log length at claim time, i.e. the index the new turn will take.
    pub index: usize,
    pub slot: Slot,
    pub request: GenerationRequest,
}

/// What a cycle decided to do.
#[derive(Debug, Clone)]
pub enum Cycle {
    Generate(Ticket),
    /// A request is already outstanding.
    Busy,
    /// A previous generation failed; waiting for the operator.
    Halted(String),
    Inactive,
    /// The verdict is in.
    Finished,
}

/// What happened to a ticket's result.
#[derive(Debug, Clone)]
pub enum Completion {
    Appended(Turn),
    Verdict(Turn),
    /// The debate was reset or restarted while the request was in flight.
    Discarded,
}

/// Input for a scoring pass.
#[derive(Debug, Clone)]
pub struct ScoringJob {
    pub epoch: u64,
    pub topic: String,
    pub turns: Vec<Turn>,
}

#[derive(Debug, Clone)]
pub enum ScoringDecision {
    Run(ScoringJob),
    AlreadyScored(Scorecard),
    InProgress,
}

#[derive(Debug)]
pub struct DebateScheduler {
    /// Settings for the next debate. Edits land here.
    draft: DebateConfiguration,
    /// Snapshot of the running debate.
    active: Option<DebateConfiguration>,
    log: TurnLog,
    epoch: u64,
    in_flight: Option<usize>,
    halted: Option<String>,
    scoring: bool,
    scorecard: Option<Scorecard>,
}

impl DebateScheduler {
    pub fn new(draft: DebateConfiguration) -> Self {
        Self {
            draft,
            active: None,
            log: TurnLog::new(),
            epoch: 0,
            in_flight: None,
            halted: None,
            scoring: false,
            scorecard: None,
        }
    }

    pub fn draft(&self) -> &DebateConfiguration {
        &self.draft
    }

    pub fn config(&self) -> Option<&DebateConfiguration> {
        self.active.as_ref()
    }

    pub fn log(&self) -> &TurnLog {
        &self.log
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn halted(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    pub fn scorecard(&self) -> Option<&Scorecard> {
        self.scorecard.as_ref()
    }

    pub fn phase(&self) -> DebatePhase {
        match &self.active {
            Some(config) => self.log.phase(config.rounds),
            None => DebatePhase::AwaitingStart,
        }
    }

    /// Begin a new debate on `topic` with a snapshot of the current draft.
    pub fn start(&mut self, topic: &str) -> Result<(), DebateError> {
        let topic = topic.trim();
        let chars = topic.chars().count();
        if chars < MIN_TOPIC_CHARS {
            return Err(DebateError::TopicTooShort {
                min: MIN_TOPIC_CHARS,
                actual: chars,
            });
        }
        if self.draft.rounds < 1 {
            return Err(DebateError::InvalidRoundCount(self.draft.rounds));
        }

        let mut snapshot = self.draft.clone();
        snapshot.topic = topic.to_string();
        self.clear();
        info!(
            epoch = self.epoch,
            topic = %snapshot.topic,
            rounds = snapshot.rounds,
            "debate started"
        );
        self.active = Some(snapshot);
        Ok(())
    }

    /// Abandon the running debate. Results still in flight will be discarded.
    pub fn reset(&mut self) {
        if self.active.is_some() {
            info!(epoch = self.epoch, turns = self.log.len(), "debate reset");
        }
        self.clear();
    }

    /// Restart on the same topic with the latest draft, optionally swapping
    /// the debaters' sides.
    pub fn rematch(&mut self, swap_sides: bool) -> Result<(), DebateError> {
        let topic = self
            .active
            .as_ref()
            .map(|c| c.topic.clone())
            .ok_or(DebateError::NoActiveDebate)?;
        if swap_sides {
            self.draft.roster.swap_sides();
        }
        self.start(&topic)
    }

    /// Clear a halt so the failed slot can be attempted again.
    pub fn resume(&mut self) -> Result<(), DebateError> {
        if self.active.is_none() {
            return Err(DebateError::NoActiveDebate);
        }
        if let Some(reason) = self.halted.take() {
            info!(epoch = self.epoch, %reason, "resuming halted debate");
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.epoch += 1;
        self.active = None;
        self.log = TurnLog::new();
        self.in_flight = None;
        self.halted = None;
        self.scoring = false;
        self.scorecard = None;
    }

    /// Change the round count of the next debate. The running one keeps its
    /// snapshot.
    pub fn set_round_count(&mut self, rounds: u32) -> Result<(), DebateError> {
        if rounds < 1 {
            return Err(DebateError::InvalidRoundCount(rounds));
        }
        if self.is_active() {
            debug!(rounds, "round count change deferred to next debate");
        }
        self.draft.rounds = rounds;
        Ok(())
    }

    pub fn set_profile(&mut self, role: RoleSlot, profile: AgentProfile) {
        if self.is_active() {
            debug!(%role, "profile change deferred to next debate");
        }
        *self.draft.roster.get_mut(role) = profile;
    }

    pub fn approve(&mut self, turn_id: &str) -> Result<u32, DebateError> {
        self.log
            .approve(turn_id)
            .ok_or_else(|| DebateError::UnknownTurn(turn_id.to_string()))
    }

    /// Claim the next slot if nothing else is in flight.
    pub fn begin_cycle(&mut self) -> Cycle {
        let Some(config) = &self.active else {
            return Cycle::Inactive;
        };
        if let Some(reason) = &self.halted {
            return Cycle::Halted(reason.clone());
        }
        if self.in_flight.is_some() {
            debug!(epoch = self.epoch, "generation in flight, skipping cycle");
            return Cycle::Busy;
        }
        let Some(slot) = self.log.next_slot(config.rounds) else {
            return Cycle::Finished;
        };

        let index = self.log.len();
        let request = build_request(config, &self.log, slot);
        self.in_flight = Some(index);
        debug!(epoch = self.epoch, index, speaker = %request.speaker, "slot claimed");

        Cycle::Generate(Ticket {
            epoch: self.epoch,
            index,
            slot,
            request,
        })
    }

    /// Whether `ticket` still holds the in-flight slot of the running debate.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.epoch == self.epoch && self.in_flight == Some(ticket.index)
    }

    /// Settle a ticket. Failures halt the debate and are handed back.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        result: Result<GeneratedTurn, DebateError>,
    ) -> Result<Completion, DebateError> {
        if !self.is_current(&ticket) {
            warn!(
                ticket_epoch = ticket.epoch,
                epoch = self.epoch,
                speaker = %ticket.request.speaker,
                "discarding stale generation result"
            );
            return Ok(Completion::Discarded);
        }
        self.in_flight = None;

        let generated = match result {
            Ok(generated) => generated,
            Err(e) => {
                warn!(
                    epoch = self.epoch,
                    index = ticket.index,
                    error = %e,
                    "generation failed, halting debate"
                );
                self.halted = Some(e.to_string());
                return Err(e);
            }
        };

        let turn = Turn::new(
            ticket.slot,
            ticket.request.speaker,
            generated.text,
            generated.sources,
        );
        self.log.push(turn.clone());
        info!(
            epoch = self.epoch,
            index = ticket.index,
            speaker = %turn.speaker,
            citations = turn.sources.len(),
            "turn appended"
        );

        Ok(if ticket.slot.is_verdict() {
            Completion::Verdict(turn)
        } else {
            Completion::Appended(turn)
        })
    }

    /// Decide whether a scoring pass should run now.
    pub fn begin_scoring(&mut self) -> Result<ScoringDecision, DebateError> {
        if let Some(card) = &self.scorecard {
            return Ok(ScoringDecision::AlreadyScored(card.clone()));
        }
        let config = self.active.as_ref().ok_or(DebateError::NoActiveDebate)?;
        if self.phase() != DebatePhase::Scored {
            return Err(DebateError::NotFinished {
                phase: self.phase(),
            });
        }
        if self.scoring {
            return Ok(ScoringDecision::InProgress);
        }
        self.scoring = true;
        Ok(ScoringDecision::Run(ScoringJob {
            epoch: self.epoch,
            topic: config.topic.clone(),
            turns: self.log.turns().to_vec(),
        }))
    }

    /// Store a finished scorecard. Returns `false` if the debate moved on.
    pub fn finish_scoring(&mut self, epoch: u64, card: Scorecard) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.scoring = false;
        self.scorecard = Some(card);
        true
    }
}

fn build_request(config: &DebateConfiguration, log: &TurnLog, slot: Slot) -> GenerationRequest {
    let role = slot.role();
    let profile = config.roster.get(role);
    let round = match slot {
        Slot::Ordinary { round, .. } => round,
        Slot::Verdict => config.rounds,
    };
    GenerationRequest {
        role,
        speaker: profile.name.clone(),
        persona: profile.persona.clone(),
        model: profile.model.clone(),
        topic: config.topic.clone(),
        transcript: log.turns().iter().map(TranscriptEntry::from).collect(),
        round,
        total_rounds: config.rounds,
        is_verdict: slot.is_verdict(),
        language: config.language.clone(),
        allow_strong_language: config.allow_strong_language,
    }
}
