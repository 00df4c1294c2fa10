use crate::session::{Capabilities, ChatSnapshot};
use crate::traits::{AiResponder, ResponseRequest, VoiceService};
use mentesana_core::config::ChatConfig;
use mentesana_core::text::non_empty_trimmed;
use mentesana_core::transcript::{TranscriptEntry, build_transcript};
use mentesana_core::types::{ChatTurn, Emotion};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const MSG_RESPONSE_FAILED: &str = "No pude obtener una respuesta. Por favor, inténtalo de nuevo.";
const MSG_EMOTION_FAILED: &str = "No pude analizar tu mensaje. Por favor, inténtalo de nuevo.";
const MSG_MIC_BLOCKED: &str =
    "El acceso al micrófono está bloqueado. Revisa los permisos del navegador o del sistema.";
const MSG_RECORDING_START_FAILED: &str = "No se pudo iniciar la grabación.";
const MSG_RECORDING_STOP_FAILED: &str = "No se pudo procesar la grabación.";
const MSG_TRANSCRIPTION_FAILED: &str =
    "No se pudo transcribir el audio. Por favor, inténtalo de nuevo.";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("request cancelled")]
    Aborted,
    #[error("emotion analysis failed: {0:#}")]
    Emotion(anyhow::Error),
    #[error("AI response failed: {0:#}")]
    Response(anyhow::Error),
    #[error("AI responder returned an empty answer")]
    EmptyResponse,
    #[error("could not start recording: {0:#}")]
    RecordingStart(anyhow::Error),
    #[error("could not finish recording: {0:#}")]
    RecordingStop(anyhow::Error),
    #[error("transcription failed: {0:#}")]
    Transcription(anyhow::Error),
}

impl ChatError {
    /// The single line shown to the user. Details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Aborted => String::new(),
            ChatError::Emotion(_) => MSG_EMOTION_FAILED.into(),
            ChatError::Response(_) | ChatError::EmptyResponse => MSG_RESPONSE_FAILED.into(),
            ChatError::RecordingStart(e) => {
                let raw = format!("{e:#}").to_lowercase();
                if raw.contains("permission") || raw.contains("denied") || raw.contains("not allowed")
                {
                    MSG_MIC_BLOCKED.into()
                } else {
                    MSG_RECORDING_START_FAILED.into()
                }
            }
            ChatError::RecordingStop(_) => MSG_RECORDING_STOP_FAILED.into(),
            ChatError::Transcription(_) => MSG_TRANSCRIPTION_FAILED.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Capture {
    #[default]
    Idle,
    Starting,
    Recording,
    Finalizing,
}

struct ActiveRequest {
    id: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Inner {
    turns: Vec<ChatTurn>,
    error: Option<String>,
    capture: Capture,
    // A stop that arrived while the device was still opening.
    stop_pending: bool,

    // `Some` while a send is in flight; this is the loading flag.
    request: Option<ActiveRequest>,
    next_request_id: u64,

    is_speaking: bool,
    // Bumped whenever playback starts or is stopped, so a stale completion can't
    // clear the flag of a newer playback.
    speech_generation: u64,
    speech_task: Option<JoinHandle<()>>,

    disposed: bool,
}

/// Coordinates one chat session: the turn list, the AI round trip, and voice in/out.
///
/// Clones share the same session. No operation returns an error; failures land in
/// [`ChatSnapshot::error`].
#[derive(Clone)]
pub struct ChatOrchestrator {
    cfg: ChatConfig,
    capabilities: Capabilities,
    ai: Arc<dyn AiResponder>,
    voice: Arc<dyn VoiceService>,
    inner: Arc<Mutex<Inner>>,
    updates: Arc<watch::Sender<ChatSnapshot>>,
}

impl ChatOrchestrator {
    pub fn new(cfg: ChatConfig, ai: Arc<dyn AiResponder>, voice: Arc<dyn VoiceService>) -> Self {
        let capabilities = Capabilities {
            voice_supported: voice.is_supported(),
            emotion_analysis_enabled: cfg.enable_emotion_analysis,
            voice_output_enabled: cfg.enable_voice_output,
        };

        let (updates, _) = watch::channel(ChatSnapshot {
            capabilities,
            ..Default::default()
        });

        Self {
            cfg,
            capabilities,
            ai,
            voice,
            inner: Arc::new(Mutex::new(Inner::default())),
            updates: Arc::new(updates),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// The latest published state.
    pub fn snapshot(&self) -> ChatSnapshot {
        self.updates.borrow().clone()
    }

    /// Receives a new snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.updates.subscribe()
    }

    fn publish(&self, inner: &Inner) {
        self.updates.send_replace(ChatSnapshot {
            turns: inner.turns.clone(),
            is_loading: inner.request.is_some(),
            is_recording: matches!(inner.capture, Capture::Recording | Capture::Finalizing),
            is_speaking: inner.is_speaking,
            error: inner.error.clone(),
            capabilities: self.capabilities,
        });
    }

    async fn fail(&self, err: ChatError) {
        log::error!("chat error: {err}");
        let mut inner = self.inner.lock().await;
        inner.error = Some(err.user_message());
        self.publish(&inner);
    }

    pub async fn send_message(&self, content: &str, is_voice: bool) {
        self.send_turn(content, is_voice, None).await;
    }

    async fn send_turn(&self, content: &str, is_voice: bool, audio_url: Option<String>) {
        let Some(content) = non_empty_trimmed(content) else {
            return;
        };

        let (request_id, cancel, transcript) = {
            let mut inner = self.inner.lock().await;
            if inner.disposed {
                return;
            }
            if inner.request.is_some() {
                log::debug!("send ignored: a request is already in flight");
                return;
            }

            inner.error = None;
            inner
                .turns
                .push(ChatTurn::user(content, is_voice).with_audio_url(audio_url));

            // Read the conversation now; later turns belong to later requests.
            let transcript = build_transcript(&inner.turns);

            inner.next_request_id += 1;
            let id = inner.next_request_id;
            let cancel = CancellationToken::new();
            inner.request = Some(ActiveRequest {
                id,
                cancel: cancel.clone(),
            });
            self.publish(&inner);
            (id, cancel, transcript)
        };

        log::info!("request {request_id}: sending {} turns", transcript.len());
        let outcome = self.request_response(content, transcript, &cancel).await;

        let mut inner = self.inner.lock().await;
        // Cancelling always detaches the request, so a stale id covers aborts too.
        let current = inner.request.as_ref().is_some_and(|r| r.id == request_id);
        if !current {
            log::info!("request {request_id}: superseded, result discarded");
            return;
        }

        match outcome {
            Ok((text, emotion)) => {
                inner
                    .turns
                    .push(ChatTurn::assistant(text.clone()).with_emotion(emotion));
                if self.cfg.enable_voice_output {
                    self.start_auto_speech(&mut inner, text);
                    self.publish(&inner);
                }
                log::info!("request {request_id}: answered");
            }
            Err(e) => {
                log::error!("request {request_id}: {e}");
                inner.error = Some(e.user_message());
            }
        }

        inner.request = None;
        self.publish(&inner);
    }

    async fn request_response(
        &self,
        content: &str,
        transcript: Vec<TranscriptEntry>,
        cancel: &CancellationToken,
    ) -> Result<(String, Option<Emotion>), ChatError> {
        // An analysis that already finished still counts, even if the answer is aborted.
        let emotion = if self.cfg.enable_emotion_analysis {
            let analysis = self
                .ai
                .analyze_emotion(content)
                .await
                .map_err(ChatError::Emotion)?;
            log::debug!("emotion: {} ({:?})", analysis.emotion, analysis.confidence);
            Some(analysis.emotion)
        } else {
            None
        };

        if cancel.is_cancelled() {
            return Err(ChatError::Aborted);
        }

        let request = ResponseRequest {
            transcript,
            emotion,
        };

        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChatError::Aborted),
            res = self.ai.respond(&request, cancel.clone()) => res.map_err(ChatError::Response)?,
        };

        if cancel.is_cancelled() {
            return Err(ChatError::Aborted);
        }
        if text.trim().is_empty() {
            return Err(ChatError::EmptyResponse);
        }

        Ok((text, emotion))
    }

    pub async fn cancel_current_request(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(request) = inner.request.take() {
            request.cancel.cancel();
            log::info!("request {}: cancel requested", request.id);
        }
        self.publish(&inner);
    }

    /// Resends the most recent user turn as a new turn.
    pub async fn retry_last_message(&self) {
        let last = {
            let inner = self.inner.lock().await;
            inner
                .turns
                .iter()
                .rev()
                .find(|t| t.is_user())
                .map(|t| (t.content.clone(), t.is_voice, t.audio_url.clone()))
        };

        if let Some((content, is_voice, audio_url)) = last {
            self.send_turn(&content, is_voice, audio_url).await;
        }
    }

    /// Drops the conversation and the error.
    ///
    /// A pending answer belongs to the dropped conversation, so it is cancelled too.
    /// Recording and playback keep going.
    pub async fn clear_messages(&self) {
        let mut inner = self.inner.lock().await;
        inner.turns.clear();
        inner.error = None;
        if let Some(request) = inner.request.take() {
            request.cancel.cancel();
        }
        self.publish(&inner);
    }

    pub async fn start_recording(&self) {
        {
            let mut inner = self.inner.lock().await;
            if inner.disposed || inner.capture != Capture::Idle {
                return;
            }
            inner.capture = Capture::Starting;
            inner.stop_pending = false;
            inner.error = None;
            self.publish(&inner);
        }

        let started = self.voice.start_recording().await;

        let mut inner = self.inner.lock().await;
        match started {
            Ok(()) if inner.disposed => {
                // Torn down while the device was opening; release it again.
                inner.stop_pending = false;
                drop(inner);
                if let Err(e) = self.voice.stop_recording().await {
                    log::warn!("discarding capture after dispose failed: {e:#}");
                }
                self.voice.cleanup();
            }
            Ok(()) => {
                inner.capture = Capture::Recording;
                log::info!("recording started");
                self.publish(&inner);

                if std::mem::take(&mut inner.stop_pending) {
                    drop(inner);
                    log::info!("stop requested during startup; finishing now");
                    self.stop_recording().await;
                }
            }
            Err(e) => {
                let err = ChatError::RecordingStart(e);
                log::error!("{err}");
                inner.capture = Capture::Idle;
                inner.stop_pending = false;
                inner.error = Some(err.user_message());
                self.publish(&inner);
            }
        }
    }

    pub async fn stop_recording(&self) {
        {
            let mut inner = self.inner.lock().await;
            if inner.capture == Capture::Starting {
                inner.stop_pending = true;
                return;
            }
            if inner.capture != Capture::Recording {
                return;
            }
            inner.capture = Capture::Finalizing;
            self.publish(&inner);
        }

        let finished = self.voice.stop_recording().await;
        {
            let mut inner = self.inner.lock().await;
            if inner.capture == Capture::Finalizing {
                inner.capture = Capture::Idle;
            }
            self.publish(&inner);
        }

        let recording = match finished {
            Ok(r) => r,
            Err(e) => {
                self.fail(ChatError::RecordingStop(e)).await;
                return;
            }
        };
        log::info!("recording stopped ({} bytes)", recording.audio.len());

        let transcript = match self.voice.transcribe(&recording).await {
            Ok(t) => t,
            Err(e) => {
                self.fail(ChatError::Transcription(e)).await;
                return;
            }
        };

        match non_empty_trimmed(&transcript) {
            Some(text) => self.send_turn(text, true, recording.url.clone()).await,
            None => log::info!("empty transcript; nothing to send"),
        }
    }

    /// Toggles playback: stops if something is playing, otherwise speaks `text`.
    ///
    /// Playback failures are logged and never shown to the user.
    pub async fn speak_message(&self, text: &str) {
        let generation = {
            let mut inner = self.inner.lock().await;
            if inner.is_speaking {
                self.stop_speech(&mut inner);
                self.publish(&inner);
                return;
            }
            if inner.disposed || text.trim().is_empty() {
                return;
            }
            let generation = Self::begin_speech(&mut inner);
            self.publish(&inner);
            generation
        };

        self.play(generation, text.to_string()).await;
    }

    fn begin_speech(inner: &mut Inner) -> u64 {
        inner.speech_generation += 1;
        inner.is_speaking = true;
        inner.speech_generation
    }

    fn stop_speech(&self, inner: &mut Inner) {
        self.voice.stop_speaking();
        inner.is_speaking = false;
        inner.speech_generation += 1;
    }

    // Speaks an answer on a detached task. The send that produced it does not wait for
    // playback; the task reports its own failures to the log.
    fn start_auto_speech(&self, inner: &mut Inner, text: String) {
        if !self.capabilities.voice_supported {
            log::debug!("voice output enabled but unsupported here; not speaking");
            return;
        }
        if inner.is_speaking {
            self.stop_speech(inner);
        }
        if let Some(task) = inner.speech_task.take() {
            task.abort();
        }

        let generation = Self::begin_speech(inner);
        let this = self.clone();
        inner.speech_task = Some(tokio::spawn(async move {
            this.play(generation, text).await;
        }));
    }

    async fn play(&self, generation: u64, text: String) {
        if let Err(e) = self.voice.speak(&text).await {
            log::warn!("speech playback failed: {e:#}");
        }

        let mut inner = self.inner.lock().await;
        if inner.speech_generation == generation && inner.is_speaking {
            inner.is_speaking = false;
            self.publish(&inner);
        }
    }

    /// Tears the session down: aborts the pending request, discards any capture,
    /// stops playback, and releases the voice service.
    pub async fn dispose(&self) {
        let was_capturing = {
            let mut inner = self.inner.lock().await;
            if inner.disposed {
                return;
            }
            inner.disposed = true;

            if let Some(request) = inner.request.take() {
                request.cancel.cancel();
            }
            if let Some(task) = inner.speech_task.take() {
                task.abort();
            }
            if inner.is_speaking {
                self.stop_speech(&mut inner);
            }

            let was_capturing = inner.capture == Capture::Recording;
            inner.capture = Capture::Idle;
            self.publish(&inner);
            was_capturing
        };

        if was_capturing {
            if let Err(e) = self.voice.stop_recording().await {
                log::warn!("discarding capture on dispose failed: {e:#}");
            }
        }
        self.voice.cleanup();
        log::info!("chat session disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_errors_get_a_dedicated_message() {
        let err = ChatError::RecordingStart(anyhow::anyhow!("NotAllowedError: Permission denied"));
        assert_eq!(err.user_message(), MSG_MIC_BLOCKED);

        let err = ChatError::RecordingStart(anyhow::anyhow!("no input device"));
        assert_eq!(err.user_message(), MSG_RECORDING_START_FAILED);
    }

    #[test]
    fn aborts_are_silent_and_failures_are_generic() {
        assert_eq!(ChatError::Aborted.user_message(), "");
        assert_eq!(ChatError::EmptyResponse.user_message(), MSG_RESPONSE_FAILED);
        assert_eq!(
            ChatError::Response(anyhow::anyhow!("timeout")).user_message(),
            MSG_RESPONSE_FAILED
        );
    }
}
