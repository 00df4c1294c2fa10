use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

static NEXT_TURN_SEQ: AtomicU64 = AtomicU64::new(1);

/// Identity of a single chat turn.
///
/// `seq` is process-wide and strictly increasing, so ids created one after
/// another never collide and sort in creation order. The UUID keeps ids
/// distinct across processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TurnId {
    pub seq: u64,
    pub uuid: Uuid,
}

impl TurnId {
    pub fn new() -> Self {
        Self {
            seq: NEXT_TURN_SEQ.fetch_add(1, Ordering::Relaxed),
            uuid: Uuid::new_v4(),
        }
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.seq, self.uuid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOrigin {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Joy,
    Sadness,
    Anger,
    Fear,
    Anxiety,
    Surprise,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Anxiety,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Anxiety => "anxiety",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }

    /// Maps a free-form classifier label onto the known set.
    ///
    /// Accepts English and Spanish labels in any case. Anything unknown is `Neutral`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "joy" | "happy" | "happiness" | "alegria" | "alegría" | "feliz" => Emotion::Joy,
            "sadness" | "sad" | "tristeza" | "triste" => Emotion::Sadness,
            "anger" | "angry" | "enojo" | "ira" | "enfado" => Emotion::Anger,
            "fear" | "afraid" | "miedo" => Emotion::Fear,
            "anxiety" | "anxious" | "ansiedad" | "stress" | "estrés" | "estres" => {
                Emotion::Anxiety
            }
            "surprise" | "surprised" | "sorpresa" => Emotion::Surprise,
            _ => Emotion::Neutral,
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message exchanged in a chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: TurnId,
    pub content: String,
    pub origin: TurnOrigin,
    pub created_at_unix_ms: i64,
    pub is_voice: bool,
    pub audio_url: Option<String>,
    pub emotion: Option<Emotion>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>, is_voice: bool) -> Self {
        Self::new(TurnOrigin::User, content.into(), is_voice)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnOrigin::Assistant, content.into(), false)
    }

    fn new(origin: TurnOrigin, content: String, is_voice: bool) -> Self {
        Self {
            id: TurnId::new(),
            content,
            origin,
            created_at_unix_ms: now_unix_ms(),
            is_voice,
            audio_url: None,
            emotion: None,
        }
    }

    pub fn with_emotion(mut self, emotion: Option<Emotion>) -> Self {
        self.emotion = emotion;
        self
    }

    pub fn with_audio_url(mut self, audio_url: Option<String>) -> Self {
        self.audio_url = audio_url;
        self
    }

    pub fn is_user(&self) -> bool {
        self.origin == TurnOrigin::User
    }
}

pub fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
