use mentesana_core::types::{ChatTurn, TurnOrigin};
use serde::{Deserialize, Serialize};

/// What the view may render controls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub voice_supported: bool,
    pub emotion_analysis_enabled: bool,
    pub voice_output_enabled: bool,
}

/// Read-only view of a chat session, republished after every mutation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatSnapshot {
    pub turns: Vec<ChatTurn>,
    pub is_loading: bool,
    pub is_recording: bool,
    pub is_speaking: bool,
    pub error: Option<String>,
    pub capabilities: Capabilities,
}

impl ChatSnapshot {
    /// The most recent assistant answer, if any.
    pub fn last_reply(&self) -> Option<&ChatTurn> {
        self.turns.iter().rev().find(|t| t.origin == TurnOrigin::Assistant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_reply_skips_trailing_user_turns() {
        let snap = ChatSnapshot {
            turns: vec![
                ChatTurn::user("a", false),
                ChatTurn::assistant("b"),
                ChatTurn::user("c", true),
            ],
            ..Default::default()
        };
        assert_eq!(snap.last_reply().map(|t| t.content.as_str()), Some("b"));
        assert_eq!(ChatSnapshot::default().last_reply(), None);
    }
}
