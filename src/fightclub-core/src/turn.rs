//! The turn log and everything derived from it.
//!
//! The log is the single source of truth for debate progress: the phase and
//! the next slot are always recomputed from its length, never stored.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::participant::{ROTATION, RoleSlot};

/// A cited web source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub uri: String,
    pub title: String,
}

impl Source {
    pub fn new(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            title: title.into(),
        }
    }
}

/// Whether a turn belongs to the rotation or closes the debate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TurnKind {
    Ordinary { round: u32 },
    Verdict,
}

/// One generated contribution. Text and sources never change after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub id: String,
    pub role: RoleSlot,
    pub speaker: String,
    pub text: String,
    pub sources: Vec<Source>,
    pub approvals: u32,
    #[serde(flatten)]
    pub kind: TurnKind,
}

impl Turn {
    pub fn new(
        slot: Slot,
        speaker: impl Into<String>,
        text: impl Into<String>,
        sources: Vec<Source>,
    ) -> Self {
        let kind = match slot {
            Slot::Ordinary { round, .. } => TurnKind::Ordinary { round },
            Slot::Verdict => TurnKind::Verdict,
        };
        Self {
            id: Uuid::new_v4().to_string(),
            role: slot.role(),
            speaker: speaker.into(),
            text: text.into(),
            sources,
            approvals: 0,
            kind,
        }
    }

    pub fn is_verdict(&self) -> bool {
        matches!(self.kind, TurnKind::Verdict)
    }
}

/// The next position to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Ordinary { role: RoleSlot, round: u32 },
    Verdict,
}

impl Slot {
    pub fn role(&self) -> RoleSlot {
        match self {
            Slot::Ordinary { role, .. } => *role,
            Slot::Verdict => RoleSlot::Moderator,
        }
    }

    pub fn is_verdict(&self) -> bool {
        matches!(self, Slot::Verdict)
    }
}

/// Debate phase, derived from the log length and the round count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebatePhase {
    AwaitingStart,
    InRound,
    AwaitingVerdict,
    Scored,
}

impl DebatePhase {
    pub fn of(log_len: usize, rounds: u32) -> DebatePhase {
        let ordinary = ordinary_turns(rounds);
        if log_len == 0 {
            DebatePhase::AwaitingStart
        } else if log_len < ordinary {
            DebatePhase::InRound
        } else if log_len == ordinary {
            DebatePhase::AwaitingVerdict
        } else {
            DebatePhase::Scored
        }
    }
}

impl fmt::Display for DebatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebatePhase::AwaitingStart => write!(f, "AwaitingStart"),
            DebatePhase::InRound => write!(f, "InRound"),
            DebatePhase::AwaitingVerdict => write!(f, "AwaitingVerdict"),
            DebatePhase::Scored => write!(f, "Scored"),
        }
    }
}

/// Number of rotation turns for a debate of `rounds` rounds.
pub fn ordinary_turns(rounds: u32) -> usize {
    rounds as usize * ROTATION.len()
}

/// Ordered log of completed turns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnLog {
    turns: Vec<Turn>,
}

impl TurnLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn phase(&self, rounds: u32) -> DebatePhase {
        DebatePhase::of(self.len(), rounds)
    }

    /// The slot that the next appended turn must fill, or `None` once the
    /// verdict exists.
    pub fn next_slot(&self, rounds: u32) -> Option<Slot> {
        let len = self.len();
        let ordinary = ordinary_turns(rounds);
        if len < ordinary {
            Some(Slot::Ordinary {
                role: RoleSlot::for_index(len),
                round: (len / ROTATION.len()) as u32 + 1,
            })
        } else if len == ordinary {
            Some(Slot::Verdict)
        } else {
            None
        }
    }

    /// Round shown to the audience, capped at the final round.
    pub fn current_round(&self, rounds: u32) -> u32 {
        ((self.len() / ROTATION.len()) as u32 + 1).min(rounds)
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Bump the audience approval counter of a turn. Returns the new count.
    pub fn approve(&mut self, id: &str) -> Option<u32> {
        let turn = self.turns.iter_mut().find(|t| t.id == id)?;
        turn.approvals += 1;
        Some(turn.approvals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(log: &mut TurnLog, rounds: u32) {
        while let Some(slot) = log.next_slot(rounds) {
            log.push(Turn::new(slot, "x", "text", vec![]));
        }
    }

    #[test]
    fn test_phase_progression() {
        assert_eq!(DebatePhase::of(0, 2), DebatePhase::AwaitingStart);
        assert_eq!(DebatePhase::of(1, 2), DebatePhase::InRound);
        assert_eq!(DebatePhase::of(7, 2), DebatePhase::InRound);
        assert_eq!(DebatePhase::of(8, 2), DebatePhase::AwaitingVerdict);
        assert_eq!(DebatePhase::of(9, 2), DebatePhase::Scored);
    }

    #[test]
    fn test_next_slot_follows_rotation_then_verdict() {
        let mut log = TurnLog::new();
        fill(&mut log, 2);
        assert_eq!(log.len(), 9);
        let roles: Vec<RoleSlot> = log.turns().iter().map(|t| t.role).collect();
        assert_eq!(&roles[..4], &ROTATION);
        assert_eq!(&roles[4..8], &ROTATION);
        assert!(log.turns()[8].is_verdict());
        assert_eq!(log.turns()[8].role, RoleSlot::Moderator);
        assert_eq!(log.turns()[5].kind, TurnKind::Ordinary { round: 2 });
        assert!(log.next_slot(2).is_none());
    }

    #[test]
    fn test_current_round_caps_at_total() {
        let mut log = TurnLog::new();
        assert_eq!(log.current_round(1), 1);
        fill(&mut log, 1);
        assert_eq!(log.current_round(1), 1);
    }

    #[test]
    fn test_approve_increments_only_target() {
        let mut log = TurnLog::new();
        fill(&mut log, 1);
        let id = log.turns()[2].id.clone();
        assert_eq!(log.approve(&id), Some(1));
        assert_eq!(log.approve(&id), Some(2));
        assert_eq!(log.turns()[1].approvals, 0);
        assert_eq!(log.approve("missing"), None);
    }

    #[test]
    fn test_turn_ids_are_unique() {
        let mut log = TurnLog::new();
        fill(&mut log, 3);
        let mut ids: Vec<&str> = log.turns().iter().map(|t| t.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 13);
    }
}
