use anyhow::anyhow;
use async_trait::async_trait;
use mentesana_core::config::VoiceSettings;
use mentesana_core::text::filter_transcription_output;
use mentesana_engine::traits::{Recording, VoiceService};
use mentesana_providers::elevenlabs::{AudioFile, ElevenLabsConfig, build_stt_request, build_tts_request};
use mentesana_providers::parse::parse_elevenlabs_transcription;
use mentesana_providers::runtime::HttpClient;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Mono PCM captured from a microphone.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedAudio {
    pub samples: Vec<f32>,
    pub sample_rate_hz: u32,
}

/// Microphone and speaker access for one platform.
#[async_trait]
pub trait AudioDevice: Send + Sync {
    fn is_available(&self) -> bool;
    async fn start_capture(&self) -> anyhow::Result<()>;
    async fn stop_capture(&self) -> anyhow::Result<CapturedAudio>;

    /// Plays encoded audio; resolves when playback ends or `stop_playback` is called.
    async fn play(&self, audio: &[u8], mime_type: &str) -> anyhow::Result<()>;
    fn stop_playback(&self);
    fn release(&self);
}

/// Device for environments without audio hardware.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAudioDevice;

#[async_trait]
impl AudioDevice for NoAudioDevice {
    fn is_available(&self) -> bool {
        false
    }

    async fn start_capture(&self) -> anyhow::Result<()> {
        Err(anyhow!("voice capture is not supported on this device"))
    }

    async fn stop_capture(&self) -> anyhow::Result<CapturedAudio> {
        Err(anyhow!("voice capture is not supported on this device"))
    }

    async fn play(&self, _audio: &[u8], _mime_type: &str) -> anyhow::Result<()> {
        Err(anyhow!("audio playback is not supported on this device"))
    }

    fn stop_playback(&self) {}

    fn release(&self) {}
}

pub fn encode_wav_mono_f32le(samples: &[f32], sample_rate_hz: u32) -> Vec<u8> {
    // 32-bit float PCM, mono. Accepted by the speech-to-text upload.
    let num_channels: u16 = 1;
    let bits_per_sample: u16 = 32;
    let audio_format: u16 = 3; // IEEE float

    let byte_rate = sample_rate_hz * num_channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = num_channels * (bits_per_sample / 8);
    let data_len = samples.len() as u32 * 4;

    let mut out = Vec::with_capacity((44 + data_len) as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&audio_format.to_le_bytes());
    out.extend_from_slice(&num_channels.to_le_bytes());
    out.extend_from_slice(&sample_rate_hz.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }

    out
}

/// MIME type for raw 16-bit little-endian mono PCM at `rate_hz`.
pub fn pcm_mime(rate_hz: u32) -> String {
    format!("audio/pcm;rate={rate_hz}")
}

/// Inverse of [`pcm_mime`].
pub fn pcm_rate_from_mime(mime: &str) -> Option<u32> {
    let (kind, params) = mime.split_once(';')?;
    if !kind.trim().eq_ignore_ascii_case("audio/pcm") {
        return None;
    }
    params
        .split(';')
        .filter_map(|p| p.trim().strip_prefix("rate="))
        .find_map(|r| r.parse().ok())
}

pub fn decode_pcm_s16le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect()
}

/// Voice service that captures and plays locally and uses ElevenLabs for
/// speech-to-text and text-to-speech.
pub struct CloudVoiceService<D> {
    device: D,
    client: HttpClient,
    elevenlabs: ElevenLabsConfig,
    settings: VoiceSettings,

    // Cancels the synthesis request of the playback in progress.
    speech_cancel: Mutex<CancellationToken>,
}

impl<D> std::fmt::Debug for CloudVoiceService<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudVoiceService")
            .field("elevenlabs", &self.elevenlabs)
            .field("settings", &self.settings)
            .finish()
    }
}

impl<D: AudioDevice> CloudVoiceService<D> {
    pub fn new(
        device: D,
        client: HttpClient,
        elevenlabs: ElevenLabsConfig,
        settings: VoiceSettings,
    ) -> Self {
        Self {
            device,
            client,
            elevenlabs,
            settings,
            speech_cancel: Mutex::new(CancellationToken::new()),
        }
    }

    fn fresh_speech_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut guard = match self.speech_cancel.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.cancel();
        *guard = token.clone();
        token
    }

    async fn synthesize_and_play(&self, text: &str) -> anyhow::Result<()> {
        let req = build_tts_request(
            &self.elevenlabs,
            &self.settings.voice_id,
            &self.settings.tts_model,
            &self.settings.tts_output_format,
            text,
        );
        let resp = self
            .client
            .execute(&req)
            .await?
            .error_for_status("ElevenLabs TTS")?;

        // Raw PCM comes back without a useful content type; describe it for the device.
        let mime = match self.settings.tts_pcm_rate_hz() {
            Some(rate) => pcm_mime(rate),
            None => resp
                .content_type
                .clone()
                .unwrap_or_else(|| "audio/mpeg".into()),
        };
        self.device.play(&resp.body, &mime).await
    }
}

#[async_trait]
impl<D: AudioDevice> VoiceService for CloudVoiceService<D> {
    fn is_supported(&self) -> bool {
        self.device.is_available() && !self.elevenlabs.api_key.trim().is_empty()
    }

    async fn start_recording(&self) -> anyhow::Result<()> {
        self.device.start_capture().await
    }

    async fn stop_recording(&self) -> anyhow::Result<Recording> {
        let captured = self.device.stop_capture().await?;
        Ok(Recording {
            audio: encode_wav_mono_f32le(&captured.samples, captured.sample_rate_hz),
            mime_type: "audio/wav".into(),
            sample_rate_hz: captured.sample_rate_hz,
            url: None,
        })
    }

    async fn transcribe(&self, recording: &Recording) -> anyhow::Result<String> {
        if self.elevenlabs.api_key.trim().is_empty() {
            return Err(anyhow!("missing ElevenLabs API key"));
        }

        let req = build_stt_request(
            &self.elevenlabs,
            &self.settings.stt_model,
            Some(self.settings.language.as_str()),
            &AudioFile {
                filename: "input.wav".into(),
                mime_type: recording.mime_type.clone(),
                bytes: recording.audio.clone(),
            },
        );

        let resp = self
            .client
            .execute(&req)
            .await?
            .error_for_status("ElevenLabs STT")?;
        let raw = parse_elevenlabs_transcription(&resp.body)?;
        Ok(filter_transcription_output(&raw))
    }

    async fn speak(&self, text: &str) -> anyhow::Result<()> {
        let cancel = self.fresh_speech_token();
        tokio::select! {
            // Stopped by the user: a clean end of playback.
            _ = cancel.cancelled() => Ok(()),
            res = self.synthesize_and_play(text) => res,
        }
    }

    fn stop_speaking(&self) {
        let guard = match self.speech_cancel.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.cancel();
        self.device.stop_playback();
    }

    fn cleanup(&self) {
        self.stop_speaking();
        self.device.release();
    }
}
