use crate::request::{Body, HttpRequest, join_url};
use serde_json::json;

pub const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";

/// Account-level settings shared by the speech-to-text and text-to-speech endpoints.
#[derive(Clone, PartialEq, Eq)]
pub struct ElevenLabsConfig {
    pub base_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for ElevenLabsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevenLabsConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl ElevenLabsConfig {
    pub fn production(api_key: impl Into<String>) -> Self {
        Self {
            base_url: ELEVENLABS_BASE_URL.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

pub fn build_stt_request(
    cfg: &ElevenLabsConfig,
    model_id: &str,
    language_code: Option<&str>,
    audio: &AudioFile,
) -> HttpRequest {
    let mut form = MultipartForm::new();
    form.file("file", audio);
    form.text("model_id", model_id);
    form.text("tag_audio_events", "false");
    form.text("timestamps_granularity", "none");

    // "auto" lets the service detect the language.
    if let Some(lang) = language_code.filter(|s| !s.trim().is_empty() && *s != "auto") {
        form.text("language_code", lang);
    }

    let content_type = form.content_type();
    HttpRequest {
        method: "POST".into(),
        url: join_url(&cfg.base_url, "/v1/speech-to-text"),
        headers: Vec::new(),
        body: form.finish(),
    }
    .with_header("Content-Type", content_type)
    .with_header("Accept", "application/json")
    .with_header("xi-api-key", cfg.api_key.clone())
}

pub fn build_tts_request(
    cfg: &ElevenLabsConfig,
    voice_id: &str,
    model_id: &str,
    output_format: &str,
    text: &str,
) -> HttpRequest {
    let payload = json!({
        "text": text,
        "model_id": model_id,
    });

    let mut url = join_url(&cfg.base_url, &format!("/v1/text-to-speech/{voice_id}"));
    if !output_format.trim().is_empty() {
        url.push_str(&format!("?output_format={}", output_format.trim()));
    }

    HttpRequest::post_json(url, &payload)
        .with_header("Accept", "audio/*")
        .with_header("xi-api-key", cfg.api_key.clone())
}

/// Minimal `multipart/form-data` writer; parts are written in insertion order.
struct MultipartForm {
    boundary: String,
    buf: Vec<u8>,
}

impl MultipartForm {
    fn new() -> Self {
        Self {
            boundary: format!("mentesana-{}", uuid::Uuid::new_v4().simple()),
            buf: Vec::new(),
        }
    }

    fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    fn part_header(&mut self, disposition: String, content_type: Option<&str>) {
        let mut head = format!("--{}\r\nContent-Disposition: {disposition}\r\n", self.boundary);
        if let Some(ct) = content_type {
            head.push_str(&format!("Content-Type: {ct}\r\n"));
        }
        head.push_str("\r\n");
        self.buf.extend_from_slice(head.as_bytes());
    }

    fn text(&mut self, name: &str, value: &str) {
        self.part_header(format!("form-data; name=\"{name}\""), None);
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.extend_from_slice(b"\r\n");
    }

    fn file(&mut self, name: &str, file: &AudioFile) {
        self.part_header(
            format!("form-data; name=\"{name}\"; filename=\"{}\"", file.filename),
            Some(&file.mime_type),
        );
        self.buf.extend_from_slice(&file.bytes);
        self.buf.extend_from_slice(b"\r\n");
    }

    fn finish(mut self) -> Body {
        let closing = format!("--{}--\r\n", self.boundary);
        self.buf.extend_from_slice(closing.as_bytes());
        Body::MultipartFormData {
            boundary: self.boundary,
            bytes: self.buf,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stt_request_is_multipart_with_language() {
        let cfg = ElevenLabsConfig::production("k");
        let audio = AudioFile {
            filename: "input.wav".into(),
            mime_type: "audio/wav".into(),
            bytes: vec![1, 2, 3],
        };
        let req = build_stt_request(&cfg, "scribe_v1", Some("es"), &audio);
        assert_eq!(req.url, "https://api.elevenlabs.io/v1/speech-to-text");
        assert_eq!(req.header("xi-api-key"), Some("k"));

        match req.body {
            Body::MultipartFormData { bytes, boundary } => {
                let s = String::from_utf8_lossy(&bytes);
                assert!(s.contains("filename=\"input.wav\""));
                assert!(s.contains("name=\"model_id\"\r\n\r\nscribe_v1"));
                assert!(s.contains("name=\"language_code\"\r\n\r\nes"));
                assert!(s.ends_with(&format!("--{boundary}--\r\n")));
            }
            _ => panic!("expected multipart"),
        }
    }

    #[test]
    fn stt_request_omits_auto_language() {
        let cfg = ElevenLabsConfig::production("k");
        let audio = AudioFile {
            filename: "input.wav".into(),
            mime_type: "audio/wav".into(),
            bytes: vec![],
        };
        let req = build_stt_request(&cfg, "scribe_v1", Some("auto"), &audio);
        match req.body {
            Body::MultipartFormData { bytes, .. } => {
                assert!(!String::from_utf8_lossy(&bytes).contains("language_code"));
            }
            _ => panic!("expected multipart"),
        }
    }

    #[test]
    fn tts_request_targets_voice_and_format() {
        let cfg = ElevenLabsConfig {
            base_url: "http://localhost:9999/".into(),
            api_key: "k".into(),
        };
        let req = build_tts_request(&cfg, "voice-1", "eleven_multilingual_v2", "pcm_24000", "Hola");
        assert_eq!(
            req.url,
            "http://localhost:9999/v1/text-to-speech/voice-1?output_format=pcm_24000"
        );
        assert_eq!(req.header("accept"), Some("audio/*"));
        match req.body {
            Body::Json(s) => {
                let v: serde_json::Value = serde_json::from_str(&s).unwrap();
                assert_eq!(v["text"], "Hola");
                assert_eq!(v["model_id"], "eleven_multilingual_v2");
            }
            _ => panic!("expected json"),
        }

        let req = build_tts_request(&cfg, "voice-1", "eleven_multilingual_v2", "", "Hola");
        assert_eq!(req.url, "http://localhost:9999/v1/text-to-speech/voice-1");
    }
}
