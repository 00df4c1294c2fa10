use crate::types::{ChatTurn, TurnOrigin};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl From<TurnOrigin> for Role {
    fn from(origin: TurnOrigin) -> Self {
        match origin {
            TurnOrigin::User => Role::User,
            TurnOrigin::Assistant => Role::Assistant,
        }
    }
}

/// A role-tagged line of conversation as handed to a responder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
}

/// Builds the ordered role-tagged transcript for a list of turns.
pub fn build_transcript(turns: &[ChatTurn]) -> Vec<TranscriptEntry> {
    turns
        .iter()
        .map(|t| TranscriptEntry {
            role: t.origin.into(),
            content: t.content.clone(),
        })
        .collect()
}
