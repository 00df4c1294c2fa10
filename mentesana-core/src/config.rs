use serde::{Deserialize, Serialize};

/// Per-session behavior of the chat orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    pub enable_emotion_analysis: bool,

    // Speak every assistant answer aloud once it arrives.
    pub enable_voice_output: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enable_emotion_analysis: false,
            enable_voice_output: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

pub const DEFAULT_TTS_OUTPUT_FORMAT: &str = "pcm_24000";

fn default_tts_output_format() -> String {
    DEFAULT_TTS_OUTPUT_FORMAT.into()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub stt_model: String,
    pub tts_model: String,
    pub voice_id: String,
    pub language: String,

    // `pcm_<rate>` is raw 16-bit mono and can be played without a decoder.
    #[serde(default = "default_tts_output_format")]
    pub tts_output_format: String,
}

impl VoiceSettings {
    /// Sample rate of raw PCM speech, or `None` for encoded formats like mp3.
    pub fn tts_pcm_rate_hz(&self) -> Option<u32> {
        self.tts_output_format.strip_prefix("pcm_")?.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub chat: ChatConfig,
    pub llm: LlmSettings,
    pub voice: VoiceSettings,
}
