use crate::request::{HttpRequest, join_url};
use mentesana_core::transcript::TranscriptEntry;
use mentesana_core::types::Emotion;
use serde_json::json;

pub const DEFAULT_SYSTEM_PROMPT: &str = "Eres Mente Sana, un acompañante de apoyo emocional. \
Responde con calidez y empatía, en el idioma del usuario, con frases breves. \
No diagnostiques ni recetes. Si el usuario menciona riesgo para su vida, \
anímale a contactar de inmediato a los servicios de emergencia o a una línea de crisis.";

pub const EMOTION_CLASSIFIER_PROMPT: &str = "Classify the dominant emotion of the user's message. \
Answer with JSON only, shaped as {\"emotion\": \"<label>\", \"confidence\": <0..1>}. \
Allowed labels: joy, sadness, anger, fear, anxiety, surprise, neutral.";

#[derive(Clone, PartialEq)]
pub struct OpenAiCompatibleChatConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

impl std::fmt::Debug for OpenAiCompatibleChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleChatConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

pub fn build_chat_completions_request(
    cfg: &OpenAiCompatibleChatConfig,
    messages: &[ChatMessage],
) -> HttpRequest {
    let payload = json!({
        "model": cfg.model,
        "messages": messages.iter().map(|m| json!({"role": m.role, "content": m.content})).collect::<Vec<_>>(),
        "temperature": cfg.temperature,
    });

    HttpRequest::post_json(join_url(&cfg.base_url, "/chat/completions"), &payload)
        .with_header("Authorization", format!("Bearer {}", cfg.api_key))
}

/// Prompt for answering the conversation: system prompt, an optional note about the
/// user's detected emotion, then the role-tagged transcript.
pub fn build_response_messages(
    system_prompt: &str,
    emotion: Option<Emotion>,
    transcript: &[TranscriptEntry],
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(transcript.len() + 2);
    messages.push(ChatMessage::system(system_prompt));

    if let Some(emotion) = emotion {
        messages.push(ChatMessage::system(format!(
            "The user's latest message was classified with the emotion \"{emotion}\". \
             Acknowledge it gently if it is relevant."
        )));
    }

    messages.extend(transcript.iter().map(|e| ChatMessage {
        role: e.role.as_str().into(),
        content: e.content.clone(),
    }));
    messages
}

pub fn build_emotion_messages(text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(EMOTION_CLASSIFIER_PROMPT),
        ChatMessage::user(text),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Body;
    use mentesana_core::transcript::Role;

    fn cfg() -> OpenAiCompatibleChatConfig {
        OpenAiCompatibleChatConfig {
            base_url: "https://api.example.com/v1".into(),
            api_key: "k".into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
        }
    }

    #[test]
    fn builds_authorized_json_request() {
        let req = build_chat_completions_request(&cfg(), &[ChatMessage::user("hola")]);

        assert_eq!(req.method, "POST");
        assert_eq!(req.url, "https://api.example.com/v1/chat/completions");
        assert_eq!(req.header("authorization"), Some("Bearer k"));
        match req.body {
            Body::Json(s) => {
                let v: serde_json::Value = serde_json::from_str(&s).unwrap();
                assert_eq!(v["model"], "gpt-4o-mini");
                assert_eq!(v["messages"][0]["content"], "hola");
            }
            _ => panic!("expected json"),
        }
    }

    #[test]
    fn response_messages_keep_transcript_order_and_note_emotion() {
        let transcript = vec![
            TranscriptEntry {
                role: Role::User,
                content: "Hola".into(),
            },
            TranscriptEntry {
                role: Role::Assistant,
                content: "Hola, ¿cómo te sientes?".into(),
            },
            TranscriptEntry {
                role: Role::User,
                content: "Triste".into(),
            },
        ];

        let messages = build_response_messages("sys", Some(Emotion::Sadness), &transcript);
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].content, "sys");
        assert!(messages[1].content.contains("sadness"));
        let roles: Vec<_> = messages[2..].iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
    }

    #[test]
    fn response_messages_without_emotion_skip_note() {
        let messages = build_response_messages("sys", None, &[]);
        assert_eq!(messages, vec![ChatMessage::system("sys")]);
    }

    #[test]
    fn debug_redacts_api_key() {
        let s = format!("{:?}", cfg());
        assert!(!s.contains("\"k\""));
        assert!(s.contains("[REDACTED]"));
    }
}
