//! Debate roles and the agent profiles that fill them.
//!
//! The four roles speak in a fixed cyclic order. The verdict is always spoken
//! by the moderator but sits outside the rotation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four seats in the debate rotation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RoleSlot {
    /// Runs the show: opens each round and delivers the verdict.
    Moderator,
    /// Argues in favor of the topic.
    Proponent,
    /// Argues against the topic.
    Opponent,
    /// Derails everything with non-sequiturs.
    Disruptor,
}

/// The fixed speaking order within a round.
pub const ROTATION: [RoleSlot; 4] = [
    RoleSlot::Moderator,
    RoleSlot::Proponent,
    RoleSlot::Opponent,
    RoleSlot::Disruptor,
];

impl RoleSlot {
    pub fn display_name(&self) -> &'static str {
        match self {
            RoleSlot::Moderator => "MODERATOR",
            RoleSlot::Proponent => "FOR",
            RoleSlot::Opponent => "AGAINST",
            RoleSlot::Disruptor => "WILDCARD",
        }
    }

    /// Role that speaks at the given position of the turn log.
    pub fn for_index(index: usize) -> RoleSlot {
        ROTATION[index % ROTATION.len()]
    }
}

impl fmt::Display for RoleSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The agent occupying a role: who it is and how it sounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentProfile {
    /// Display name for this agent.
    pub name: String,
    /// Free-form persona the agent must embody.
    pub persona: String,
    /// The LLM model to use (e.g., "gpt-4o-mini", "llama3:8b").
    pub model: String,
    /// Voice ID for speech synthesis.
    pub voice: String,
    /// Delivery hint passed to the speech backend.
    #[serde(default)]
    pub speech_style: String,
}

impl AgentProfile {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            persona: String::new(),
            model: model.into(),
            voice: String::new(),
            speech_style: String::new(),
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_speech_style(mut self, style: impl Into<String>) -> Self {
        self.speech_style = style.into();
        self
    }

    /// Get the full display name with role.
    pub fn display_name_with_role(&self, role: RoleSlot) -> String {
        format!("{} ({})", self.name, role.display_name())
    }
}

/// One profile per role. Missing roles fall back to the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Roster {
    pub moderator: AgentProfile,
    pub proponent: AgentProfile,
    pub opponent: AgentProfile,
    pub disruptor: AgentProfile,
}

impl Roster {
    pub fn get(&self, role: RoleSlot) -> &AgentProfile {
        match role {
            RoleSlot::Moderator => &self.moderator,
            RoleSlot::Proponent => &self.proponent,
            RoleSlot::Opponent => &self.opponent,
            RoleSlot::Disruptor => &self.disruptor,
        }
    }

    pub fn get_mut(&mut self, role: RoleSlot) -> &mut AgentProfile {
        match role {
            RoleSlot::Moderator => &mut self.moderator,
            RoleSlot::Proponent => &mut self.proponent,
            RoleSlot::Opponent => &mut self.opponent,
            RoleSlot::Disruptor => &mut self.disruptor,
        }
    }

    /// Exchange the two debaters so each argues the other side.
    pub fn swap_sides(&mut self) {
        std::mem::swap(&mut self.proponent, &mut self.opponent);
    }

    /// Override the model of every agent.
    pub fn set_model_for_all(&mut self, model: &str) {
        for role in ROTATION {
            self.get_mut(role).model = model.to_string();
        }
    }
}
