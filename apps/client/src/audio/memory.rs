use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{AudioCapture, CaptureFormat};
use crate::errors::CaptureError;

#[derive(Debug, Default)]
struct MemoryState {
    available: bool,
    open: bool,
    opened_count: usize,
    pending: VecDeque<Vec<f32>>,
    stream_failure: Option<String>,
}

/// In-memory capture device. Clones share state, so a test (or a demo) can keep
/// one handle to feed chunks while the voice controller owns the other.
#[derive(Debug, Clone)]
pub struct MemoryCapture {
    state: Arc<Mutex<MemoryState>>,
    sample_rate: u32,
}

impl MemoryCapture {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                available: true,
                ..MemoryState::default()
            })),
            sample_rate,
        }
    }

    /// A device that fails every open with [`CaptureError::Unavailable`].
    pub fn unavailable() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            sample_rate: 16_000,
        }
    }

    /// Queues a chunk; it is only delivered while the capture is open.
    pub fn push_chunk(&self, samples: Vec<f32>) {
        self.state.lock().pending.push_back(samples);
    }

    /// Makes the next `read_chunk` fail, as a dropped device would.
    pub fn fail_stream(&self, reason: impl Into<String>) {
        self.state.lock().stream_failure = Some(reason.into());
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn opened_count(&self) -> usize {
        self.state.lock().opened_count
    }
}

impl AudioCapture for MemoryCapture {
    fn open_capture(&mut self) -> Result<CaptureFormat, CaptureError> {
        let mut state = self.state.lock();
        if !state.available {
            return Err(CaptureError::Unavailable);
        }
        state.open = true;
        state.opened_count += 1;
        Ok(CaptureFormat {
            sample_rate: self.sample_rate,
        })
    }

    fn read_chunk(&mut self) -> Result<Option<Vec<f32>>, CaptureError> {
        let mut state = self.state.lock();
        if !state.open {
            return Ok(None);
        }
        if let Some(reason) = state.stream_failure.take() {
            return Err(CaptureError::Stream(reason));
        }
        Ok(state.pending.pop_front())
    }

    fn close_capture(&mut self) {
        self.state.lock().open = false;
    }
}
