//! Toast notifications raised by the controllers.
//!
//! Rendering is the surface's business; controllers only hand a [`Toast`] to a [`Notifier`].

use parking_lot::Mutex;

use crate::models::Toast;

pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Keeps every toast in memory, in order.
#[derive(Default)]
pub struct RecordingNotifier {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().clone()
    }

    pub fn errors(&self) -> Vec<Toast> {
        self.toasts
            .lock()
            .iter()
            .filter(|t| t.is_error())
            .cloned()
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, toast: Toast) {
        self.toasts.lock().push(toast);
    }
}
