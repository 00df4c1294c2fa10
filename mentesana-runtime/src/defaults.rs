use mentesana_core::config::{
    AppConfig, ChatConfig, DEFAULT_TTS_OUTPUT_FORMAT, LlmSettings, VoiceSettings,
};

pub fn default_llm_settings() -> LlmSettings {
    LlmSettings {
        base_url: "https://api.openai.com/v1".into(),
        model: "gpt-4o-mini".into(),
        temperature: 0.7,
        system_prompt: None,
    }
}

pub fn default_voice_settings() -> VoiceSettings {
    VoiceSettings {
        stt_model: "scribe_v1".into(),
        tts_model: "eleven_multilingual_v2".into(),
        // ElevenLabs stock multilingual voice.
        voice_id: "21m00Tcm4TlvDq8ikWAM".into(),
        language: "es".into(),
        tts_output_format: DEFAULT_TTS_OUTPUT_FORMAT.into(),
    }
}

pub fn default_app_config() -> AppConfig {
    AppConfig {
        chat: ChatConfig::default(),
        llm: default_llm_settings(),
        voice: default_voice_settings(),
    }
}
