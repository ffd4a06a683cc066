//! Audio capture capability and packaging.
//!
//! [`AudioCapture`] is the seam between the voice controller and a microphone:
//! `cpal` behind the `audio-io` feature, [`MemoryCapture`] everywhere else.

#[cfg(feature = "audio-io")]
pub mod device;
pub mod memory;
pub mod wav;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};

use crate::errors::CaptureError;

pub use memory::MemoryCapture;

/// Shape of the samples a capture yields. Chunks are always mono.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub sample_rate: u32,
}

/// A microphone-like source of mono `f32` sample chunks.
///
/// Not `Send`: platform streams are tied to the thread that opened them.
pub trait AudioCapture {
    /// Opens the device and starts buffering. Fails fast when no device exists.
    fn open_capture(&mut self) -> Result<CaptureFormat, CaptureError>;

    /// Next buffered chunk, or `None` when nothing is pending right now.
    fn read_chunk(&mut self) -> Result<Option<Vec<f32>>, CaptureError>;

    /// Stops the device. Idempotent.
    fn close_capture(&mut self);
}

/// One finalized recording, ready to submit for transcription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

impl AudioPayload {
    /// Concatenates buffered chunks into a single WAV recording.
    pub fn from_chunks(chunks: &[Vec<f32>], format: CaptureFormat) -> Result<Self, CaptureError> {
        let samples: Vec<f32> = chunks.iter().flatten().copied().collect();
        let bytes = wav::encode_wav(&samples, format.sample_rate)
            .map_err(|e| CaptureError::Encode(e.to_string()))?;
        Ok(Self {
            bytes,
            mime: "audio/wav",
        })
    }

    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.bytes)
    }
}

/// The capture the terminal surface uses: the default input device when built
/// with `audio-io`, otherwise a device that reports itself unavailable.
pub fn platform_capture() -> Box<dyn AudioCapture> {
    #[cfg(feature = "audio-io")]
    {
        Box::new(device::CpalCapture::new())
    }
    #[cfg(not(feature = "audio-io"))]
    {
        Box::new(MemoryCapture::unavailable())
    }
}
