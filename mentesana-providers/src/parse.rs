use anyhow::{Context, anyhow};
use mentesana_core::types::Emotion;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ElevenLabsTranscriptionResponse {
    pub text: String,
}

pub fn parse_elevenlabs_transcription(body: &[u8]) -> anyhow::Result<String> {
    let resp: ElevenLabsTranscriptionResponse =
        serde_json::from_slice(body).context("decode ElevenLabs JSON")?;
    Ok(resp.text)
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

pub fn parse_openai_chat_completion(body: &[u8]) -> anyhow::Result<String> {
    let resp: OpenAiChatResponse = serde_json::from_slice(body).context("decode chat JSON")?;
    let content = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| anyhow!("no content in chat completion response"))?;
    Ok(content)
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmotionClassification {
    pub emotion: Emotion,
    pub confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct EmotionPayload {
    emotion: String,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Reads the classifier's answer.
///
/// Models sometimes wrap the JSON in a code fence or answer with a bare label; both are
/// accepted. An empty answer is an error.
pub fn parse_emotion_classification(content: &str) -> anyhow::Result<EmotionClassification> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if trimmed.is_empty() {
        return Err(anyhow!("empty emotion classification"));
    }

    if trimmed.starts_with('{') {
        let payload: EmotionPayload =
            serde_json::from_str(trimmed).context("decode emotion JSON")?;
        return Ok(EmotionClassification {
            emotion: Emotion::from_label(&payload.emotion),
            confidence: payload.confidence.map(|c| c.clamp(0.0, 1.0)),
        });
    }

    Ok(EmotionClassification {
        emotion: Emotion::from_label(trimmed.trim_matches('"')),
        confidence: None,
    })
}
