use thiserror::Error;

/// Failures talking to the completion or transcription proxies.
///
/// Every variant is recoverable: controllers surface it as a toast and return to idle.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status. `message` is already user-facing.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Http(e) => e.status().map(|s| s.as_u16()),
            TransportError::Malformed(_) => None,
        }
    }
}

/// Failures of the audio capture device.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Microphone not supported.")]
    Unavailable,

    #[error("Could not start microphone: {0}")]
    Open(String),

    #[error("Microphone stream failed: {0}")]
    Stream(String),

    #[error("Failed to package audio: {0}")]
    Encode(String),
}
