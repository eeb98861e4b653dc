//! Conversation Turns
//!
//! Role-tagged turns made of ordered parts. A model turn that requests tools
//! is answered by exactly one user turn carrying the results, correlated with
//! the calls by position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::{ToolCall, ToolResponse};

/// Role of a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User input and tool results
    User,
    /// Model output: text or tool calls
    Model,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Model => write!(f, "model"),
        }
    }
}

/// One part of a turn
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    ToolCall(ToolCall),
    ToolResult(ToolResponse),
}

impl Part {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// A single role-tagged unit of conversation history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,

    #[serde(default)]
    pub parts: Vec<Part>,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            role,
            parts,
            timestamp: Utc::now(),
        }
    }

    /// User instruction
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::Text(text.into())])
    }

    /// Model text reply
    pub fn model_text(text: impl Into<String>) -> Self {
        Self::new(Role::Model, vec![Part::Text(text.into())])
    }

    /// Model turn carrying every call of one response
    pub fn model_calls(calls: Vec<ToolCall>) -> Self {
        Self::new(Role::Model, calls.into_iter().map(Part::ToolCall).collect())
    }

    /// User turn answering the preceding call turn
    pub fn tool_results(results: Vec<ToolResponse>) -> Self {
        Self::new(Role::User, results.into_iter().map(Part::ToolResult).collect())
    }

    pub fn has_tool_calls(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::ToolCall(_)))
    }

    pub fn has_tool_results(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::ToolResult(_)))
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.parts.iter().filter_map(|p| match p {
            Part::ToolCall(call) => Some(call),
            _ => None,
        })
    }

    pub fn tool_responses(&self) -> impl Iterator<Item = &ToolResponse> {
        self.parts.iter().filter_map(|p| match p {
            Part::ToolResult(result) => Some(result),
            _ => None,
        })
    }

    /// A user turn that is not a tool-result turn
    pub fn is_instruction(&self) -> bool {
        self.role == Role::User && !self.has_tool_results() && !self.parts.is_empty()
    }

    /// Concatenated text parts
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Structural validity independent of neighbours
    ///
    /// Non-empty; tool calls only in model turns; tool results only in user
    /// turns and never mixed with other parts.
    pub fn is_well_formed(&self) -> bool {
        if self.parts.is_empty() {
            return false;
        }
        match self.role {
            Role::Model => !self.has_tool_results(),
            Role::User => {
                if self.has_tool_calls() {
                    return false;
                }
                !self.has_tool_results()
                    || self.parts.iter().all(|p| matches!(p, Part::ToolResult(_)))
            }
        }
    }
}

/// Conversation history with utility methods
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a turn
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Get all turns
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Get the last turn
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Replace the whole history
    pub fn replace(&mut self, turns: Vec<Turn>) {
        self.turns = turns;
    }

    /// Abandon history and restart from a single seed turn
    pub fn reset_to(&mut self, seed: Turn) {
        self.turns.clear();
        self.turns.push(seed);
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Bound history to `max_turns`, returning how many turns were dropped.
    ///
    /// The current exchange (the `anchor` instruction and everything after
    /// it) is kept. Without a matching anchor the latest instruction starts
    /// the exchange. Remaining room is filled with the newest earlier turns,
    /// starting on an instruction so no tool result loses its call. When the
    /// current exchange alone is too long, the anchor is kept with the
    /// newest turns after it, starting on a model turn.
    pub fn truncate_to(&mut self, max_turns: usize, anchor: &Turn) -> usize {
        let len = self.turns.len();
        if max_turns == 0 || len <= max_turns {
            return 0;
        }

        let seed = self
            .turns
            .iter()
            .rposition(|t| t == anchor)
            .or_else(|| self.turns.iter().rposition(Turn::is_instruction));

        let kept: Vec<Turn> = match seed {
            Some(seed_idx) if len - seed_idx >= max_turns => {
                let after = &self.turns[seed_idx + 1..];
                let mut start = after.len().saturating_sub(max_turns - 1);
                while start < after.len() && after[start].role != Role::Model {
                    start += 1;
                }
                std::iter::once(self.turns[seed_idx].clone())
                    .chain(after[start..].iter().cloned())
                    .collect()
            }
            Some(seed_idx) => {
                let budget = max_turns - (len - seed_idx);
                let prior = &self.turns[..seed_idx];
                let mut start = prior.len().saturating_sub(budget);
                while start < prior.len() && !prior[start].is_instruction() {
                    start += 1;
                }
                prior[start..]
                    .iter()
                    .chain(self.turns[seed_idx..].iter())
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        };

        let dropped = len - kept.len();
        self.turns = kept;
        dropped
    }

    /// Number of turns
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
