use std::sync::Arc;

use mentesana_core::config::AppConfig;
use mentesana_engine::orchestrator::ChatOrchestrator;
use mentesana_engine::traits::{AiResponder, VoiceService};
use mentesana_providers::elevenlabs::ElevenLabsConfig;
use mentesana_providers::runtime::HttpClient;

use crate::responder::OpenAiCompatibleResponder;
use crate::secrets::{SecretKey, resolve_secret};
use crate::voice::{AudioDevice, CloudVoiceService};

/// API keys for the external services; empty when not configured.
#[derive(Clone, Default)]
pub struct ServiceKeys {
    pub llm: String,
    pub elevenlabs: String,
}

impl std::fmt::Debug for ServiceKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceKeys")
            .field("llm_present", &!self.llm.is_empty())
            .field("elevenlabs_present", &!self.elevenlabs.is_empty())
            .finish()
    }
}

impl ServiceKeys {
    /// Reads keys from the OS keyring, falling back to environment variables.
    pub fn resolve() -> Self {
        Self {
            llm: resolve_secret(SecretKey::LlmApiKey).unwrap_or_default(),
            elevenlabs: resolve_secret(SecretKey::ElevenLabsApiKey).unwrap_or_default(),
        }
    }
}

/// Builds a chat session wired to the configured AI and voice services.
///
/// Each call returns an independent session; the view owns it and must `dispose` it.
pub fn build_chat_from_config<D>(
    cfg: &AppConfig,
    keys: &ServiceKeys,
    device: D,
) -> anyhow::Result<ChatOrchestrator>
where
    D: AudioDevice + 'static,
{
    let client = HttpClient::new()?;

    if keys.llm.trim().is_empty() {
        log::warn!("no LLM API key configured; requests to {} will likely fail", cfg.llm.base_url);
    }

    let ai: Arc<dyn AiResponder> = Arc::new(OpenAiCompatibleResponder::new(
        client.clone(),
        &cfg.llm,
        keys.llm.clone(),
    ));

    let voice: Arc<dyn VoiceService> = Arc::new(CloudVoiceService::new(
        device,
        client,
        ElevenLabsConfig::production(keys.elevenlabs.clone()),
        cfg.voice.clone(),
    ));

    let chat = ChatOrchestrator::new(cfg.chat.clone(), ai, voice);
    log::info!("chat session ready: {:?}", chat.capabilities());
    Ok(chat)
}
