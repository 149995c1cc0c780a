//! Desktop capture engine using cpal
//!
//! The cpal stream is not `Send`, so it is created, played and dropped on a
//! dedicated thread. The stream callback converts every buffer to float
//! frames at the output layout and hands them over a channel to that same
//! thread, which appends them to a WAV file as they arrive. FLAC output is
//! transcoded from the finished WAV on stop.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex as StdMutex};
use std::thread::JoinHandle;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::flac_encoder::{transcode_wav_to_flac, PcmLayout};
use super::wav_writer::WavSink;
use crate::application::ports::{CaptureEngine, CaptureError};
use crate::domain::recording::{AudioFormat, RecordingConfiguration};

/// How often the capture thread checks whether it should stop
const THREAD_POLL: StdDuration = StdDuration::from_millis(20);

/// State shared with the capture thread and the stream callback
struct CaptureShared {
    /// Stream thread should keep running
    running: AtomicBool,
    /// Callbacks are discarded while set
    paused: AtomicBool,
    /// Peak of the last callback buffer, stored as f32 bits
    level: AtomicU32,
    /// First stream or write error of the current capture
    failure: StdMutex<Option<String>>,
}

impl CaptureShared {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            level: AtomicU32::new(0.0f32.to_bits()),
            failure: StdMutex::new(None),
        }
    }

    fn set_level(&self, level: f32) {
        self.level.store(level.to_bits(), Ordering::Relaxed);
    }

    fn level(&self) -> f32 {
        f32::from_bits(self.level.load(Ordering::Relaxed))
    }

    fn record_failure(&self, reason: String) {
        let mut failure = self.failure.lock().unwrap_or_else(|e| e.into_inner());
        if failure.is_none() {
            *failure = Some(reason);
        }
    }

    fn failure(&self) -> Option<String> {
        self.failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn reset(&self) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.paused.store(false, Ordering::SeqCst);
        self.set_level(0.0);
    }

    /// Callback body: remap to the output layout and keep the peak.
    /// Returns `None` while paused.
    fn frames(&self, data: &[f32], device_channels: u16, output_channels: u16) -> Option<Vec<f32>> {
        if self.paused.load(Ordering::SeqCst) {
            self.set_level(0.0);
            return None;
        }
        let frames = remap_channels(data, device_channels, output_channels);
        self.set_level(peak_level(&frames));
        Some(frames)
    }
}

/// What the capture thread should open and where it writes
struct CaptureRequest {
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
    spool: PathBuf,
}

/// One in-flight capture
struct ActiveCapture {
    thread: JoinHandle<Result<u64, CaptureError>>,
    path: PathBuf,
    /// File the capture thread writes; equals `path` for WAV output
    spool: PathBuf,
    format: AudioFormat,
}

impl ActiveCapture {
    fn has_separate_spool(&self) -> bool {
        self.spool != self.path
    }
}

/// Audio capture engine for desktop platforms
pub struct CpalCaptureEngine {
    shared: Arc<CaptureShared>,
    active: StdMutex<Option<ActiveCapture>>,
    initialized: AtomicBool,
    disposed: AtomicBool,
}

impl CpalCaptureEngine {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(CaptureShared::new()),
            active: StdMutex::new(None),
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    fn input_device() -> Result<cpal::Device, CaptureError> {
        cpal::default_host()
            .default_input_device()
            .ok_or(CaptureError::NoAudioDevice)
    }

    /// Pick a stream config close to the requested sample rate.
    ///
    /// Prefers a range containing `target_rate`, then the fewest channels
    /// that still satisfy `channels`.
    fn input_config(
        device: &cpal::Device,
        target_rate: u32,
        channels: u16,
    ) -> Result<(StreamConfig, SampleFormat), CaptureError> {
        let supported = device
            .supported_input_configs()
            .map_err(|e| CaptureError::StartFailed(format!("Failed to get configs: {}", e)))?;

        let mut best: Option<cpal::SupportedStreamConfigRange> = None;
        for range in supported {
            if range.sample_format() != SampleFormat::I16
                && range.sample_format() != SampleFormat::F32
            {
                continue;
            }

            let includes_target = range.min_sample_rate().0 <= target_rate
                && range.max_sample_rate().0 >= target_rate;
            let is_better = match &best {
                None => true,
                Some(current) => {
                    let current_includes = current.min_sample_rate().0 <= target_rate
                        && current.max_sample_rate().0 >= target_rate;
                    let closer_channels = range.channels() >= channels
                        && range.channels() < current.channels();
                    (includes_target && !current_includes)
                        || (includes_target == current_includes && closer_channels)
                }
            };
            if is_better {
                best = Some(range);
            }
        }

        let range = best.ok_or(CaptureError::StartFailed(
            "No suitable input config found".into(),
        ))?;

        let sample_rate = if range.min_sample_rate().0 <= target_rate
            && range.max_sample_rate().0 >= target_rate
        {
            SampleRate(target_rate)
        } else if range.min_sample_rate().0 > target_rate {
            range.min_sample_rate()
        } else {
            range.max_sample_rate()
        };

        let sample_format = range.sample_format();
        let config = StreamConfig {
            channels: range.channels(),
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        Ok((config, sample_format))
    }

    /// Build (but do not play) an input stream that sends float frames to `tx`.
    fn open_stream(
        shared: &Arc<CaptureShared>,
        target_rate: u32,
        output_channels: u16,
        tx: mpsc::Sender<Vec<f32>>,
    ) -> Result<(cpal::Stream, u32), CaptureError> {
        let device = Self::input_device()?;
        let (config, sample_format) = Self::input_config(&device, target_rate, output_channels)?;
        let device_channels = config.channels;

        let failing = Arc::clone(shared);
        let on_error = move |err: cpal::StreamError| {
            error!("Audio stream error: {}", err);
            failing.record_failure(format!("Audio stream error: {}", err));
        };

        let stream = match sample_format {
            SampleFormat::I16 => {
                let shared = Arc::clone(shared);
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let pcm: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                        if let Some(frames) = shared.frames(&pcm, device_channels, output_channels) {
                            let _ = tx.send(frames);
                        }
                    },
                    on_error,
                    None,
                )
            }
            SampleFormat::F32 => {
                let shared = Arc::clone(shared);
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if let Some(frames) = shared.frames(data, device_channels, output_channels) {
                            let _ = tx.send(frames);
                        }
                    },
                    on_error,
                    None,
                )
            }
            other => {
                return Err(CaptureError::StartFailed(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        }
        .map_err(|e| CaptureError::StartFailed(e.to_string()))?;

        Ok((stream, config.sample_rate.0))
    }

    /// Capture thread body: open the stream and the WAV sink, then append
    /// frames until `shared.running` is cleared. Returns the samples written.
    fn run_capture(
        shared: Arc<CaptureShared>,
        request: CaptureRequest,
        ready: oneshot::Sender<Result<u32, CaptureError>>,
    ) -> Result<u64, CaptureError> {
        let (tx, rx) = mpsc::channel::<Vec<f32>>();

        let opened = Self::open_stream(&shared, request.sample_rate, request.channels, tx)
            .and_then(|(stream, rate)| {
                let layout = PcmLayout {
                    channels: request.channels,
                    bits_per_sample: request.bits_per_sample,
                    sample_rate: rate,
                };
                let sink = WavSink::create(&request.spool, layout)
                    .map_err(|e| CaptureError::StartFailed(e.to_string()))?;
                stream
                    .play()
                    .map_err(|e| CaptureError::StartFailed(e.to_string()))?;
                Ok((stream, sink, rate))
            });

        let (stream, mut sink) = match opened {
            Ok((stream, sink, rate)) => {
                let _ = ready.send(Ok(rate));
                (stream, sink)
            }
            Err(e) => {
                shared.running.store(false, Ordering::SeqCst);
                let _ = ready.send(Err(e.clone()));
                return Err(e);
            }
        };

        let mut append = |frames: &[f32]| match sink.write(frames) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to append audio: {}", e);
                shared.record_failure(e.to_string());
                false
            }
        };

        let mut healthy = true;
        while healthy && shared.running.load(Ordering::SeqCst) {
            match rx.recv_timeout(THREAD_POLL) {
                Ok(frames) => healthy = append(&frames),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        drop(stream);
        if healthy {
            for frames in rx.try_iter() {
                if !append(&frames) {
                    break;
                }
            }
        }

        let written = sink
            .finalize()
            .map_err(|e| CaptureError::WriteFailed(e.to_string()))?;
        debug!(written, "Capture thread finished");
        Ok(written)
    }

    fn ensure_usable(&self) -> Result<(), CaptureError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(CaptureError::Disposed);
        }
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(CaptureError::NotInitialized);
        }
        Ok(())
    }

    fn take_active(&self) -> Option<ActiveCapture> {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Stop the capture thread and collect what it wrote.
    async fn halt(&self, thread: JoinHandle<Result<u64, CaptureError>>) -> Result<u64, CaptureError> {
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.paused.store(false, Ordering::SeqCst);
        self.shared.set_level(0.0);

        match tokio::task::spawn_blocking(move || thread.join()).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(CaptureError::CaptureFailed("Capture thread panicked".into())),
            Err(e) => Err(CaptureError::CaptureFailed(format!(
                "Failed to join capture thread: {}",
                e
            ))),
        }
    }
}

impl Default for CpalCaptureEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureEngine for CpalCaptureEngine {
    async fn initialize(&self) -> Result<(), CaptureError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(CaptureError::Disposed);
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn dispose(&self) -> Result<(), CaptureError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(capture) = self.take_active() {
            self.cancel_capture(capture).await;
        }
        self.initialized.store(false, Ordering::SeqCst);
        debug!("cpal capture engine disposed");
        Ok(())
    }

    async fn start_capture(
        &self,
        path: &Path,
        configuration: &RecordingConfiguration,
    ) -> Result<(), CaptureError> {
        self.ensure_usable()?;
        if !self.supported_formats().contains(&configuration.format) {
            return Err(CaptureError::UnsupportedFormat(configuration.format));
        }
        if self.is_capturing() {
            return Err(CaptureError::AlreadyCapturing);
        }

        self.shared.reset();
        self.shared.running.store(true, Ordering::SeqCst);

        let channels = configuration.channels.clamp(1, 2);
        let spool = spool_path(path, configuration.format);
        let request = CaptureRequest {
            sample_rate: configuration.sample_rate(),
            channels,
            bits_per_sample: configuration.bit_depth(),
            spool: spool.clone(),
        };
        let target_rate = request.sample_rate;
        let (ready_tx, ready_rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        let thread = std::thread::Builder::new()
            .name("smart-recorder-capture".into())
            .spawn(move || Self::run_capture(shared, request, ready_tx))
            .map_err(|e| CaptureError::StartFailed(e.to_string()))?;

        let device_rate = match ready_rx.await {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => {
                let _ = tokio::task::spawn_blocking(move || thread.join()).await;
                return Err(e);
            }
            Err(_) => {
                self.shared.running.store(false, Ordering::SeqCst);
                return Err(CaptureError::StartFailed(
                    "Capture thread exited before the stream opened".into(),
                ));
            }
        };

        if device_rate != target_rate {
            debug!(device_rate, target_rate, "Device does not support requested rate");
        }

        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = Some(ActiveCapture {
            thread,
            path: path.to_path_buf(),
            spool,
            format: configuration.format,
        });

        info!(path = %path.display(), rate = device_rate, channels, "cpal capture started");
        Ok(())
    }

    async fn pause(&self) -> Result<(), CaptureError> {
        if !self.is_capturing() {
            return Err(CaptureError::NotCapturing);
        }
        self.shared.paused.store(true, Ordering::SeqCst);
        self.shared.set_level(0.0);
        Ok(())
    }

    async fn resume(&self) -> Result<(), CaptureError> {
        if !self.is_capturing() {
            return Err(CaptureError::NotCapturing);
        }
        self.shared.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<Option<PathBuf>, CaptureError> {
        let Some(capture) = self.take_active() else {
            return Ok(None);
        };
        let ActiveCapture {
            thread,
            path,
            spool,
            format,
        } = capture;
        let outcome = self.halt(thread).await;

        if let Some(reason) = self.shared.failure() {
            return Err(CaptureError::CaptureFailed(reason));
        }
        if outcome? == 0 {
            return Err(CaptureError::CaptureFailed("No audio data captured".into()));
        }

        if format == AudioFormat::Flac {
            let (source, dest) = (spool.clone(), path.clone());
            tokio::task::spawn_blocking(move || transcode_wav_to_flac(&source, &dest))
                .await
                .map_err(|e| CaptureError::WriteFailed(format!("Encode task error: {}", e)))?
                .map_err(|e| CaptureError::WriteFailed(e.to_string()))?;
            if let Err(e) = tokio::fs::remove_file(&spool).await {
                warn!(spool = %spool.display(), "Failed to remove WAV spool: {}", e);
            }
        }

        info!(path = %path.display(), "cpal capture finalized");
        Ok(Some(path))
    }

    async fn cancel(&self) -> Result<(), CaptureError> {
        if let Some(capture) = self.take_active() {
            self.cancel_capture(capture).await;
            debug!("cpal capture cancelled");
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    async fn health(&self) -> Result<(), CaptureError> {
        match self.shared.failure() {
            Some(reason) if self.is_capturing() => Err(CaptureError::CaptureFailed(reason)),
            _ => Ok(()),
        }
    }

    async fn amplitude(&self) -> Result<f32, CaptureError> {
        if !self.is_capturing() {
            return Ok(0.0);
        }
        Ok(self.shared.level())
    }

    async fn has_permission(&self) -> Result<bool, CaptureError> {
        // Desktop OSes gate the device itself; an input device we can see
        // is one we can open.
        tokio::task::spawn_blocking(|| Self::input_device().is_ok())
            .await
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))
    }

    async fn request_permission(&self) -> Result<bool, CaptureError> {
        self.has_permission().await
    }

    fn supported_formats(&self) -> Vec<AudioFormat> {
        vec![AudioFormat::Wav, AudioFormat::Flac]
    }
}

impl CpalCaptureEngine {
    /// Halt without finalizing; the caller owns deleting `path` itself.
    async fn cancel_capture(&self, capture: ActiveCapture) {
        let has_spool = capture.has_separate_spool();
        if let Err(e) = self.halt(capture.thread).await {
            debug!("Capture thread ended with error during cancel: {}", e);
        }
        if has_spool {
            match tokio::fs::remove_file(&capture.spool).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(spool = %capture.spool.display(), "Failed to remove WAV spool: {}", e),
            }
        }
    }
}

/// File the capture thread writes for an output at `path`
fn spool_path(path: &Path, format: AudioFormat) -> PathBuf {
    match format {
        AudioFormat::Flac => path.with_extension("part.wav"),
        _ => path.to_path_buf(),
    }
}

/// Convert interleaved frames between channel counts.
/// Mono output averages every input channel; stereo output duplicates a
/// mono input or keeps the first two channels.
fn remap_channels(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    let from = from.max(1) as usize;
    match (from, to) {
        (f, t) if f == t as usize => samples.to_vec(),
        (_, 1) => samples
            .chunks(from)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect(),
        (1, _) => samples.iter().flat_map(|&s| [s, s]).collect(),
        _ => samples
            .chunks(from)
            .flat_map(|frame| {
                let left = frame[0];
                let right = frame.get(1).copied().unwrap_or(left);
                [left, right]
            })
            .collect(),
    }
}

/// Normalized peak of a buffer in [0, 1]
fn peak_level(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0f32, f32::max)
        .min(1.0)
}
