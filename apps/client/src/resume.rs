//! The shared resume context: at most one extracted resume text, last write wins.

use std::sync::Arc;

use parking_lot::RwLock;

/// Cloneable handle to the single resume text slot.
///
/// Passed explicitly to the chat session and file ingestion; clones share the slot.
#[derive(Debug, Clone, Default)]
pub struct ResumeContext {
    text: Arc<RwLock<Option<String>>>,
}

impl ResumeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<String> {
        self.text.read().clone()
    }

    pub fn set(&self, text: Option<String>) {
        *self.text.write() = text;
    }

    pub fn clear(&self) {
        self.set(None);
    }

    pub fn is_set(&self) -> bool {
        self.text.read().is_some()
    }
}
