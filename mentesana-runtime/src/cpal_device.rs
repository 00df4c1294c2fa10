//
// CPAL-backed microphone and speaker.
//
// `cpal::Stream` is not `Send`, so every stream lives on its own worker thread and is
// controlled through channels and flags.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat, SizedSample, Stream};
use tokio::sync::oneshot;

use crate::voice::{AudioDevice, CapturedAudio, decode_pcm_s16le, pcm_rate_from_mime};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(2);

struct ActiveCapture {
    stop_tx: mpsc::Sender<()>,
    worker: std::thread::JoinHandle<()>,
    samples: Arc<Mutex<Vec<f32>>>,
    sample_rate_hz: u32,
}

/// Default input and output devices of the default host.
#[derive(Default)]
pub struct CpalAudioDevice {
    capture: Mutex<Option<ActiveCapture>>,
    // Raised to end the playback in progress.
    playback_stop: Mutex<Option<Arc<AtomicBool>>>,
}

impl CpalAudioDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_capture(&self) -> Option<ActiveCapture> {
        match self.capture.lock() {
            Ok(mut g) => g.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn replace_playback_flag(&self, flag: Option<Arc<AtomicBool>>) {
        let mut guard = match self.playback_stop.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = std::mem::replace(&mut *guard, flag) {
            previous.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl AudioDevice for CpalAudioDevice {
    fn is_available(&self) -> bool {
        cpal::default_host().default_input_device().is_some()
    }

    async fn start_capture(&self) -> anyhow::Result<()> {
        if let Some(stale) = self.take_capture() {
            log::warn!("capture already running; restarting it");
            let _ = stale.stop_tx.send(());
            let _ = stale.worker.join();
        }

        let samples = Arc::new(Mutex::new(Vec::new()));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = oneshot::channel::<anyhow::Result<u32>>();

        let sink = samples.clone();
        let worker = std::thread::spawn(move || {
            let (stream, rate_hz) = match open_input(sink) {
                Ok(opened) => opened,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(rate_hz));

            // Keep the stream alive until stopped or the device is dropped.
            let _ = stop_rx.recv();
            drop(stream);
        });

        let sample_rate_hz = tokio::time::timeout(STARTUP_TIMEOUT, ready_rx)
            .await
            .context("audio input startup timed out")?
            .map_err(|_| anyhow!("audio input worker exited"))??;

        log::info!("capturing at {sample_rate_hz} Hz");
        let mut guard = match self.capture.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(ActiveCapture {
            stop_tx,
            worker,
            samples,
            sample_rate_hz,
        });
        Ok(())
    }

    async fn stop_capture(&self) -> anyhow::Result<CapturedAudio> {
        let ActiveCapture {
            stop_tx,
            worker,
            samples,
            sample_rate_hz,
        } = self
            .take_capture()
            .ok_or_else(|| anyhow!("recording not started"))?;

        let _ = stop_tx.send(());
        tokio::task::spawn_blocking(move || worker.join())
            .await
            .context("join audio input worker")?
            .map_err(|_| anyhow!("audio input worker panicked"))?;

        let samples = match samples.lock() {
            Ok(mut g) => std::mem::take(&mut *g),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        Ok(CapturedAudio {
            samples,
            sample_rate_hz,
        })
    }

    async fn play(&self, audio: &[u8], mime_type: &str) -> anyhow::Result<()> {
        let rate_hz = pcm_rate_from_mime(mime_type)
            .ok_or_else(|| anyhow!("unsupported audio format for playback: {mime_type}"))?;
        let samples = decode_pcm_s16le(audio);

        let stop = Arc::new(AtomicBool::new(false));
        self.replace_playback_flag(Some(stop.clone()));

        let (done_tx, done_rx) = oneshot::channel();
        std::thread::spawn(move || {
            let _ = done_tx.send(run_playback(samples, rate_hz, &stop));
        });

        done_rx
            .await
            .map_err(|_| anyhow!("audio output worker exited"))?
    }

    fn stop_playback(&self) {
        self.replace_playback_flag(None);
    }

    fn release(&self) {
        self.stop_playback();
        if let Some(capture) = self.take_capture() {
            let _ = capture.stop_tx.send(());
        }
    }
}

fn open_input(sink: Arc<Mutex<Vec<f32>>>) -> anyhow::Result<(Stream, u32)> {
    let device = cpal::default_host()
        .default_input_device()
        .ok_or_else(|| anyhow!("no input device found"))?;
    let config = device
        .default_input_config()
        .context("query default input config")?;
    let sample_rate_hz = config.sample_rate().0;
    let channels = config.channels() as usize;
    let stream_cfg: cpal::StreamConfig = config.clone().into();

    let stream = match config.sample_format() {
        SampleFormat::I16 => build_input_stream::<i16>(&device, &stream_cfg, channels, sink),
        SampleFormat::U16 => build_input_stream::<u16>(&device, &stream_cfg, channels, sink),
        SampleFormat::I32 => build_input_stream::<i32>(&device, &stream_cfg, channels, sink),
        _ => build_input_stream::<f32>(&device, &stream_cfg, channels, sink),
    }
    .context("build input stream")?;

    stream.play().context("start input stream")?;
    Ok((stream, sample_rate_hz))
}

fn build_input_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    sink: Arc<Mutex<Vec<f32>>>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: Sample + SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let cb = move |data: &[T], _: &cpal::InputCallbackInfo| {
        let mut buf = match sink.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if channels <= 1 {
            buf.extend(data.iter().map(|&s| s.to_sample::<f32>()));
        } else {
            for frame in data.chunks_exact(channels) {
                let sum: f32 = frame.iter().map(|&s| s.to_sample::<f32>()).sum();
                buf.push(sum / channels as f32);
            }
        }
    };

    device.build_input_stream(
        config,
        cb,
        |err| log::error!("audio input stream error: {err}"),
        None,
    )
}

fn run_playback(samples: Vec<f32>, rate_hz: u32, stop: &AtomicBool) -> anyhow::Result<()> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| anyhow!("no output device found"))?;
    let default_cfg = device
        .default_output_config()
        .context("query default output config")?;
    let channels = default_cfg.channels() as usize;
    let config = cpal::StreamConfig {
        channels: default_cfg.channels(),
        sample_rate: cpal::SampleRate(rate_hz),
        buffer_size: cpal::BufferSize::Default,
    };

    let finished = Arc::new(AtomicBool::new(false));
    let done = finished.clone();
    let mut pos = 0usize;
    let cb = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        for frame in data.chunks_mut(channels.max(1)) {
            let s = match samples.get(pos) {
                Some(&s) => s,
                None => {
                    done.store(true, Ordering::SeqCst);
                    0.0
                }
            };
            pos += 1;
            frame.fill(s);
        }
    };

    let stream = device
        .build_output_stream(
            &config,
            cb,
            |err| log::error!("audio output stream error: {err}"),
            None,
        )
        .context("build output stream")?;
    stream.play().context("start output stream")?;

    while !finished.load(Ordering::SeqCst) && !stop.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(20));
    }
    drop(stream);
    Ok(())
}
