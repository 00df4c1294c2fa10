use async_trait::async_trait;
use mentesana_core::transcript::TranscriptEntry;
use mentesana_core::types::Emotion;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionAnalysis {
    pub emotion: Emotion,
    pub confidence: Option<f32>,
}

/// Everything a responder needs to answer the latest user turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRequest {
    // Full conversation, oldest first, ending with the new user content.
    pub transcript: Vec<TranscriptEntry>,
    pub emotion: Option<Emotion>,
}

/// A finished microphone capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub audio: Vec<u8>,
    pub mime_type: String,
    pub sample_rate_hz: u32,

    // Where the capture can be replayed from, if the device keeps it around.
    pub url: Option<String>,
}

#[async_trait]
pub trait AiResponder: Send + Sync {
    async fn analyze_emotion(&self, text: &str) -> anyhow::Result<EmotionAnalysis>;

    /// Generates the assistant answer.
    ///
    /// Implementations should stop work once `cancel` fires; the orchestrator discards
    /// the result of a cancelled call either way.
    async fn respond(
        &self,
        request: &ResponseRequest,
        cancel: CancellationToken,
    ) -> anyhow::Result<String>;
}

#[async_trait]
pub trait VoiceService: Send + Sync {
    /// Whether capture and playback can work in this environment.
    fn is_supported(&self) -> bool;

    async fn start_recording(&self) -> anyhow::Result<()>;
    async fn stop_recording(&self) -> anyhow::Result<Recording>;
    async fn transcribe(&self, recording: &Recording) -> anyhow::Result<String>;

    /// Resolves when playback ends or is stopped through `stop_speaking`.
    async fn speak(&self, text: &str) -> anyhow::Result<()>;
    fn stop_speaking(&self);

    /// Releases microphone and speaker handles.
    fn cleanup(&self);
}
