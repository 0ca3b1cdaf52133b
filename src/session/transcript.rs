//! Transcript turns

use crate::contract::Button;
use crate::state_machine::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    User,
    System,
}

/// One processed event. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    pub stage_before: Stage,
    pub stage_after: Stage,
    pub raw_input: String,
    pub buttons: Vec<Button>,
    pub reply: String,
}

impl Turn {
    pub fn user(
        stage_before: Stage,
        stage_after: Stage,
        raw_input: impl Into<String>,
        reply: impl Into<String>,
        buttons: Vec<Button>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            actor: Actor::User,
            stage_before,
            stage_after,
            raw_input: raw_input.into(),
            buttons,
            reply: reply.into(),
        }
    }

    /// A turn the system produced without user input (greeting)
    pub fn system(stage: Stage, reply: impl Into<String>, buttons: Vec<Button>) -> Self {
        Self {
            timestamp: Utc::now(),
            actor: Actor::System,
            stage_before: stage,
            stage_after: stage,
            raw_input: "[start]".to_string(),
            buttons,
            reply: reply.into(),
        }
    }
}
