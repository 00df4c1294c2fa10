use anyhow::anyhow;
use mentesana_core::config::LlmSettings;
use mentesana_core::text::filter_model_output;
use mentesana_engine::traits::{AiResponder, EmotionAnalysis, ResponseRequest};
use mentesana_providers::openai_compatible::{
    DEFAULT_SYSTEM_PROMPT, OpenAiCompatibleChatConfig, build_chat_completions_request,
    build_emotion_messages, build_response_messages,
};
use mentesana_providers::parse::{parse_emotion_classification, parse_openai_chat_completion};
use mentesana_providers::runtime::HttpClient;
use tokio_util::sync::CancellationToken;

/// AI responder backed by any OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct OpenAiCompatibleResponder {
    client: HttpClient,
    chat: OpenAiCompatibleChatConfig,
    system_prompt: String,
}

impl std::fmt::Debug for OpenAiCompatibleResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleResponder")
            .field("chat", &self.chat)
            .finish()
    }
}

impl OpenAiCompatibleResponder {
    pub fn new(
        client: HttpClient,
        settings: &LlmSettings,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            chat: OpenAiCompatibleChatConfig {
                base_url: settings.base_url.clone(),
                api_key: api_key.into(),
                model: settings.model.clone(),
                temperature: settings.temperature,
            },
            system_prompt: settings
                .system_prompt
                .clone()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }

    async fn complete(
        &self,
        cfg: &OpenAiCompatibleChatConfig,
        messages: &[mentesana_providers::openai_compatible::ChatMessage],
    ) -> anyhow::Result<String> {
        let req = build_chat_completions_request(cfg, messages);
        let resp = self
            .client
            .execute(&req)
            .await?
            .error_for_status("OpenAI-compatible")?;
        parse_openai_chat_completion(&resp.body)
    }
}

#[async_trait::async_trait]
impl AiResponder for OpenAiCompatibleResponder {
    async fn analyze_emotion(&self, text: &str) -> anyhow::Result<EmotionAnalysis> {
        // Classification should be stable for the same message.
        let cfg = OpenAiCompatibleChatConfig {
            temperature: 0.0,
            ..self.chat.clone()
        };

        let content = self.complete(&cfg, &build_emotion_messages(text)).await?;
        let parsed = parse_emotion_classification(&content)?;
        Ok(EmotionAnalysis {
            emotion: parsed.emotion,
            confidence: parsed.confidence,
        })
    }

    async fn respond(
        &self,
        request: &ResponseRequest,
        cancel: CancellationToken,
    ) -> anyhow::Result<String> {
        let messages =
            build_response_messages(&self.system_prompt, request.emotion, &request.transcript);

        // Dropping the HTTP future closes the connection.
        let content = tokio::select! {
            _ = cancel.cancelled() => return Err(anyhow!("chat completion aborted")),
            res = self.complete(&self.chat, &messages) => res?,
        };

        let text = filter_model_output(&content);
        if text.is_empty() {
            return Err(anyhow!("chat completion was empty"));
        }
        Ok(text)
    }
}
