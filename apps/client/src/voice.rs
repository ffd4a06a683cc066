//! Voice capture controller: `idle → recording → transcribing → idle`.
//!
//! Any failure records `last_error`, raises a toast and lands back in `idle`.
//! Only one capture/transcription cycle exists at a time.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::audio::{AudioCapture, AudioPayload, CaptureFormat};
use crate::errors::{CaptureError, TransportError};
use crate::models::Toast;
use crate::notify::Notifier;
use crate::transport::TranscriptionBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoicePhase {
    Idle,
    Recording,
    Transcribing,
}

/// Snapshot of the voice session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceStatus {
    pub phase: VoicePhase,
    pub last_error: Option<String>,
}

impl VoiceStatus {
    pub fn is_recording(&self) -> bool {
        self.phase == VoicePhase::Recording
    }

    pub fn is_transcribing(&self) -> bool {
        self.phase == VoicePhase::Transcribing
    }
}

impl Default for VoiceStatus {
    fn default() -> Self {
        Self {
            phase: VoicePhase::Idle,
            last_error: None,
        }
    }
}

/// Receives the transcribed text on success.
pub type TranscriptCallback = Arc<dyn Fn(String) + Send + Sync>;

pub struct VoiceCapture {
    capture: Box<dyn AudioCapture>,
    status: Arc<Mutex<VoiceStatus>>,
    format: Option<CaptureFormat>,
    chunks: Vec<Vec<f32>>,
    backend: Arc<dyn TranscriptionBackend>,
    notifier: Arc<dyn Notifier>,
    on_result: TranscriptCallback,
}

impl VoiceCapture {
    pub fn new(
        capture: Box<dyn AudioCapture>,
        backend: Arc<dyn TranscriptionBackend>,
        notifier: Arc<dyn Notifier>,
        on_result: TranscriptCallback,
    ) -> Self {
        Self {
            capture,
            status: Arc::new(Mutex::new(VoiceStatus::default())),
            format: None,
            chunks: Vec::new(),
            backend,
            notifier,
            on_result,
        }
    }

    pub fn status(&self) -> VoiceStatus {
        self.status.lock().clone()
    }

    /// Opens the capture device. Returns `false` when nothing started: either a
    /// cycle is already running (no-op) or the device failed (error recorded).
    pub fn start_recording(&mut self) -> bool {
        {
            let mut status = self.status.lock();
            if status.phase != VoicePhase::Idle {
                debug!("start_recording ignored while {:?}", status.phase);
                return false;
            }
            status.last_error = None;
        }

        match self.capture.open_capture() {
            Ok(format) => {
                self.format = Some(format);
                self.chunks.clear();
                self.status.lock().phase = VoicePhase::Recording;
                info!("Recording started ({} Hz)", format.sample_rate);
                true
            }
            Err(e) => {
                self.fail(&e);
                false
            }
        }
    }

    /// Moves whatever the device has buffered into the recording.
    /// Returns the number of chunks taken; always 0 outside `recording`.
    pub fn pump(&mut self) -> usize {
        if self.status.lock().phase != VoicePhase::Recording {
            return 0;
        }
        match self.drain() {
            Ok(n) => n,
            Err(e) => {
                self.capture.close_capture();
                self.chunks.clear();
                self.fail(&e);
                0
            }
        }
    }

    /// Finalizes the recording and moves to `transcribing`. The returned
    /// [`PendingTranscription`] performs the network exchange when awaited.
    ///
    /// Returns `None` outside `recording`, or if the recording could not be
    /// packaged (in which case the controller is back in `idle` with an error).
    pub fn stop_recording(&mut self) -> Option<PendingTranscription> {
        if self.status.lock().phase != VoicePhase::Recording {
            debug!("stop_recording ignored: not recording");
            return None;
        }

        let drained = self.drain();
        self.capture.close_capture();
        let chunks = std::mem::take(&mut self.chunks);

        let payload = drained.and_then(|_| {
            let format = self.format.ok_or(CaptureError::Stream(
                "capture format unknown".to_string(),
            ))?;
            AudioPayload::from_chunks(&chunks, format)
        });

        let payload = match payload {
            Ok(p) => p,
            Err(e) => {
                self.fail(&e);
                return None;
            }
        };

        self.status.lock().phase = VoicePhase::Transcribing;
        info!(
            "Recording stopped: {} chunks, {} bytes",
            chunks.len(),
            payload.bytes.len()
        );

        Some(PendingTranscription {
            payload,
            backend: Arc::clone(&self.backend),
            notifier: Arc::clone(&self.notifier),
            on_result: Arc::clone(&self.on_result),
            guard: TranscribingGuard {
                status: Arc::clone(&self.status),
            },
        })
    }

    fn drain(&mut self) -> Result<usize, CaptureError> {
        let mut taken = 0;
        while let Some(chunk) = self.capture.read_chunk()? {
            if !chunk.is_empty() {
                self.chunks.push(chunk);
                taken += 1;
            }
        }
        Ok(taken)
    }

    fn fail(&self, error: &CaptureError) {
        warn!("Voice capture failed: {error}");
        {
            let mut status = self.status.lock();
            status.phase = VoicePhase::Idle;
            status.last_error = Some(error.to_string());
        }
        let toast = match error {
            CaptureError::Unavailable => Toast::error("Microphone not supported", None),
            other => Toast::error("Microphone error", Some(other.to_string())),
        };
        self.notifier.notify(toast);
    }
}

impl Drop for VoiceCapture {
    fn drop(&mut self) {
        if self.status.lock().phase == VoicePhase::Recording {
            self.capture.close_capture();
        }
    }
}

/// Resets a stuck `transcribing` phase to `idle` if the exchange is abandoned.
struct TranscribingGuard {
    status: Arc<Mutex<VoiceStatus>>,
}

impl Drop for TranscribingGuard {
    fn drop(&mut self) {
        let mut status = self.status.lock();
        if status.phase == VoicePhase::Transcribing {
            status.phase = VoicePhase::Idle;
        }
    }
}

/// A finalized recording awaiting transcription.
pub struct PendingTranscription {
    payload: AudioPayload,
    backend: Arc<dyn TranscriptionBackend>,
    notifier: Arc<dyn Notifier>,
    on_result: TranscriptCallback,
    guard: TranscribingGuard,
}

impl PendingTranscription {
    pub fn payload(&self) -> &AudioPayload {
        &self.payload
    }

    /// Submits the recording. On success the callback receives the text before
    /// the controller returns to `idle`; on failure the callback is not invoked.
    pub async fn finish(self) -> Result<String, TransportError> {
        let result = self.backend.transcribe(&self.payload).await;

        match &result {
            Ok(text) => {
                info!("Transcription received ({} chars)", text.len());
                (self.on_result)(text.clone());
                self.guard.status.lock().phase = VoicePhase::Idle;
            }
            Err(e) => {
                warn!("Transcription failed: {e}");
                {
                    let mut status = self.guard.status.lock();
                    status.phase = VoicePhase::Idle;
                    status.last_error = Some(e.to_string());
                }
                // `Http` means no response arrived at all (connect failure, timeout).
                let title = match e {
                    TransportError::Http(_) => "Voice to text error",
                    _ => "Transcription failed",
                };
                self.notifier.notify(Toast::error(title, Some(e.to_string())));
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MemoryCapture;
    use crate::notify::RecordingNotifier;
    use async_trait::async_trait;

    struct FixedTranscriber(Result<&'static str, u16>);

    #[async_trait]
    impl TranscriptionBackend for FixedTranscriber {
        async fn transcribe(&self, audio: &AudioPayload) -> Result<String, TransportError> {
            assert_eq!(audio.mime, "audio/wav");
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(status) => Err(TransportError::Status {
                    status,
                    message: "No speech found".to_string(),
                }),
            }
        }
    }

    struct Harness {
        voice: VoiceCapture,
        mic: MemoryCapture,
        notifier: Arc<RecordingNotifier>,
        results: Arc<Mutex<Vec<String>>>,
    }

    fn harness(mic: MemoryCapture, reply: Result<&'static str, u16>) -> Harness {
        let notifier = Arc::new(RecordingNotifier::new());
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&results);
        let voice = VoiceCapture::new(
            Box::new(mic.clone()),
            Arc::new(FixedTranscriber(reply)),
            notifier.clone(),
            Arc::new(move |text: String| sink.lock().push(text)),
        );
        Harness {
            voice,
            mic,
            notifier,
            results,
        }
    }

    #[test]
    fn test_unavailable_device_fails_fast() {
        let mut h = harness(MemoryCapture::unavailable(), Ok("unused"));

        assert!(!h.voice.start_recording());

        let status = h.voice.status();
        assert_eq!(status.phase, VoicePhase::Idle);
        assert_eq!(status.last_error.as_deref(), Some("Microphone not supported."));
        assert_eq!(h.notifier.errors()[0].title, "Microphone not supported");
    }

    #[test]
    fn test_start_while_recording_is_noop() {
        let mut h = harness(MemoryCapture::new(16_000), Ok("unused"));

        assert!(h.voice.start_recording());
        h.mic.push_chunk(vec![0.1; 32]);
        assert_eq!(h.voice.pump(), 1);

        assert!(!h.voice.start_recording());
        assert_eq!(h.mic.opened_count(), 1);
        assert_eq!(h.voice.status().phase, VoicePhase::Recording);
        assert!(h.notifier.toasts().is_empty());
    }

    #[test]
    fn test_stop_from_idle_has_no_effect() {
        let mut h = harness(MemoryCapture::new(16_000), Ok("unused"));
        assert!(h.voice.stop_recording().is_none());
        assert_eq!(h.voice.status(), VoiceStatus::default());
    }

    #[tokio::test]
    async fn test_full_cycle_invokes_callback() {
        let mut h = harness(MemoryCapture::new(16_000), Ok("hello there"));

        assert!(h.voice.start_recording());
        h.mic.push_chunk(vec![0.2; 160]);
        h.voice.pump();
        h.mic.push_chunk(vec![-0.2; 160]);

        let pending = h.voice.stop_recording().expect("was recording");
        assert_eq!(h.voice.status().phase, VoicePhase::Transcribing);
        assert!(!h.mic.is_open());

        // Remaining chunk is drained on stop.
        let reader =
            hound::WavReader::new(std::io::Cursor::new(pending.payload().bytes.clone())).unwrap();
        assert_eq!(reader.duration(), 320);

        // A second cycle cannot start while transcribing.
        assert!(!h.voice.start_recording());
        assert_eq!(h.mic.opened_count(), 1);

        let text = pending.finish().await.unwrap();
        assert_eq!(text, "hello there");
        assert_eq!(*h.results.lock(), vec!["hello there".to_string()]);
        assert_eq!(h.voice.status(), VoiceStatus::default());
    }

    #[tokio::test]
    async fn test_transcription_failure_skips_callback() {
        let mut h = harness(MemoryCapture::new(16_000), Err(500));

        h.voice.start_recording();
        h.mic.push_chunk(vec![0.0; 16]);
        let pending = h.voice.stop_recording().unwrap();

        assert!(pending.finish().await.is_err());

        let status = h.voice.status();
        assert_eq!(status.phase, VoicePhase::Idle);
        assert_eq!(status.last_error.as_deref(), Some("No speech found"));
        assert!(h.results.lock().is_empty());
        assert_eq!(h.notifier.errors()[0].title, "Transcription failed");
    }

    #[test]
    fn test_stream_failure_returns_to_idle() {
        let mut h = harness(MemoryCapture::new(16_000), Ok("unused"));

        h.voice.start_recording();
        h.mic.fail_stream("device unplugged");
        assert_eq!(h.voice.pump(), 0);

        let status = h.voice.status();
        assert_eq!(status.phase, VoicePhase::Idle);
        assert!(status.last_error.unwrap().contains("device unplugged"));
        assert!(!h.mic.is_open());
    }

    #[test]
    fn test_abandoned_transcription_resets_phase() {
        let mut h = harness(MemoryCapture::new(16_000), Ok("unused"));

        h.voice.start_recording();
        let pending = h.voice.stop_recording().unwrap();
        assert!(h.voice.status().is_transcribing());

        drop(pending);
        assert_eq!(h.voice.status().phase, VoicePhase::Idle);
    }

    #[test]
    fn test_drop_while_recording_closes_device() {
        let mut h = harness(MemoryCapture::new(16_000), Ok("unused"));
        h.voice.start_recording();
        assert!(h.mic.is_open());

        let mic = h.mic.clone();
        drop(h);
        assert!(!mic.is_open());
    }
}
