//! File ingestion: one selected file at a time, decoded off the caller's task.
//!
//! Selection is synchronous and raises its toast immediately; the decode is a
//! separate [`PendingDecode`] so the surface decides when to await it. Every
//! selection or removal bumps a generation counter, and a decode only lands if
//! its generation is still current.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::models::{MediaKind, Preview, Toast, UploadedFile};
use crate::notify::Notifier;
use crate::resume::ResumeContext;

/// Raw file handed to [`FileIngestion::select_file`].
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    /// Declared media type; may be empty.
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Reads a file from disk, declaring its type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime = mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default();
        Ok(Self { name, mime, bytes })
    }
}

/// What happened to a decode once it finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// The preview (and, for text, the resume) was stored.
    Applied(MediaKind),
    /// A later selection or removal superseded this decode; nothing changed.
    Stale,
    /// The file kind has no preview.
    NoPreview,
    Failed(String),
}

#[derive(Debug, Default)]
struct IngestState {
    generation: u64,
    current: Option<UploadedFile>,
}

struct IngestInner {
    state: Mutex<IngestState>,
    resume: ResumeContext,
    notifier: Arc<dyn Notifier>,
}

/// Cloneable handle to the upload slot.
#[derive(Clone)]
pub struct FileIngestion {
    inner: Arc<IngestInner>,
}

impl FileIngestion {
    pub fn new(resume: ResumeContext, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            inner: Arc::new(IngestInner {
                state: Mutex::new(IngestState::default()),
                resume,
                notifier,
            }),
        }
    }

    pub fn current(&self) -> Option<UploadedFile> {
        self.inner.state.lock().current.clone()
    }

    /// Replaces the uploaded file and clears the resume until the decode lands.
    pub fn select_file(&self, file: SelectedFile) -> PendingDecode {
        let kind = MediaKind::classify(&file.mime, &file.name);
        let size = file.bytes.len() as u64;

        let generation = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            state.current = Some(UploadedFile {
                name: file.name.clone(),
                size,
                kind,
                mime: file.mime.clone(),
                preview: None,
            });
            state.generation
        };
        self.inner.resume.clear();

        info!("Selected {} ({:?}, {} bytes)", file.name, kind, size);
        self.inner.notifier.notify(Toast::info(
            "File uploaded",
            Some(format!("{} ({})", file.name, format_size(size))),
        ));

        PendingDecode {
            inner: Arc::clone(&self.inner),
            generation,
            kind,
            file,
        }
    }

    /// Clears the uploaded file, its preview and the resume text.
    pub fn remove_file(&self) {
        let removed = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            state.current.take()
        };
        self.inner.resume.clear();

        if let Some(file) = removed {
            info!("Removed {}", file.name);
            self.inner
                .notifier
                .notify(Toast::info("File removed", Some(file.name)));
        }
    }
}

/// The asynchronous half of a selection.
pub struct PendingDecode {
    inner: Arc<IngestInner>,
    generation: u64,
    kind: MediaKind,
    file: SelectedFile,
}

impl PendingDecode {
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub async fn finish(self) -> DecodeOutcome {
        let kind = self.kind;
        if kind == MediaKind::Other {
            return DecodeOutcome::NoPreview;
        }

        let file = self.file;
        let decoded = tokio::task::spawn_blocking(move || render_preview(kind, &file)).await;
        let preview = match decoded {
            Ok(preview) => preview,
            Err(e) => {
                warn!("Decode task failed: {e}");
                return DecodeOutcome::Failed(e.to_string());
            }
        };

        let mut state = self.inner.state.lock();
        if state.generation != self.generation {
            debug!(
                "Dropping stale decode (generation {} != {})",
                self.generation, state.generation
            );
            return DecodeOutcome::Stale;
        }
        // Generation matches, so the slot still holds this file.
        let Some(current) = state.current.as_mut() else {
            return DecodeOutcome::Stale;
        };

        if let Preview::Text(text) = &preview {
            self.inner.resume.set(Some(text.clone()));
        }
        current.preview = Some(preview);
        DecodeOutcome::Applied(kind)
    }
}

fn render_preview(kind: MediaKind, file: &SelectedFile) -> Preview {
    match kind {
        MediaKind::Text => Preview::Text(String::from_utf8_lossy(&file.bytes).into_owned()),
        _ => {
            let mime = if file.mime.is_empty() {
                "application/octet-stream"
            } else {
                file.mime.as_str()
            };
            Preview::DataUrl(format!("data:{mime};base64,{}", BASE64.encode(&file.bytes)))
        }
    }
}

/// Human-readable byte count, e.g. `2.4 KB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;

    fn ingestion() -> (FileIngestion, ResumeContext, Arc<RecordingNotifier>) {
        let resume = ResumeContext::new();
        let notifier = Arc::new(RecordingNotifier::new());
        let ingest = FileIngestion::new(resume.clone(), notifier.clone());
        (ingest, resume, notifier)
    }

    #[tokio::test]
    async fn test_markdown_file_sets_resume() {
        let (ingest, resume, notifier) = ingestion();

        let pending = ingest.select_file(SelectedFile::new("notes.md", "", b"Hello".to_vec()));
        // Toast is raised before the decode completes.
        assert_eq!(notifier.toasts()[0].title, "File uploaded");
        assert!(ingest.current().unwrap().preview.is_none());

        assert_eq!(pending.finish().await, DecodeOutcome::Applied(MediaKind::Text));
        assert_eq!(resume.get().as_deref(), Some("Hello"));
        assert_eq!(
            ingest.current().unwrap().preview,
            Some(Preview::Text("Hello".to_string()))
        );
    }

    #[tokio::test]
    async fn test_image_after_text_clears_resume() {
        let (ingest, resume, _notifier) = ingestion();

        ingest
            .select_file(SelectedFile::new("cv.txt", "text/plain", b"Rust dev".to_vec()))
            .finish()
            .await;
        assert!(resume.is_set());

        let pending = ingest.select_file(SelectedFile::new("me.png", "image/png", vec![1, 2, 3]));
        assert!(!resume.is_set());
        assert_eq!(pending.finish().await, DecodeOutcome::Applied(MediaKind::Image));

        let current = ingest.current().unwrap();
        assert_eq!(current.kind, MediaKind::Image);
        assert_eq!(
            current.preview,
            Some(Preview::DataUrl("data:image/png;base64,AQID".to_string()))
        );
        assert!(!resume.is_set());
    }

    #[tokio::test]
    async fn test_other_kind_has_no_preview() {
        let (ingest, resume, _notifier) = ingestion();
        resume.set(Some("old".into()));

        let pending =
            ingest.select_file(SelectedFile::new("cv.pdf", "application/pdf", vec![0x25, 0x50]));
        assert_eq!(pending.finish().await, DecodeOutcome::NoPreview);
        assert!(ingest.current().unwrap().preview.is_none());
        assert!(!resume.is_set());
    }

    #[tokio::test]
    async fn test_remove_clears_file_preview_and_resume() {
        let (ingest, resume, notifier) = ingestion();
        ingest
            .select_file(SelectedFile::new("notes.md", "", b"Hello".to_vec()))
            .finish()
            .await;

        ingest.remove_file();

        assert!(ingest.current().is_none());
        assert!(!resume.is_set());
        assert_eq!(notifier.toasts().last().unwrap().title, "File removed");
    }

    #[tokio::test]
    async fn test_late_decode_after_remove_is_dropped() {
        let (ingest, resume, _notifier) = ingestion();

        let pending = ingest.select_file(SelectedFile::new("notes.md", "", b"Hello".to_vec()));
        ingest.remove_file();

        assert_eq!(pending.finish().await, DecodeOutcome::Stale);
        assert!(ingest.current().is_none());
        assert!(!resume.is_set());
    }

    #[tokio::test]
    async fn test_late_decode_after_reselect_is_dropped() {
        let (ingest, resume, _notifier) = ingestion();

        let first = ingest.select_file(SelectedFile::new("old.txt", "", b"old".to_vec()));
        let second = ingest.select_file(SelectedFile::new("new.txt", "", b"new".to_vec()));

        assert_eq!(second.finish().await, DecodeOutcome::Applied(MediaKind::Text));
        assert_eq!(first.finish().await, DecodeOutcome::Stale);
        assert_eq!(resume.get().as_deref(), Some("new"));
        assert_eq!(ingest.current().unwrap().name, "new.txt");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_decoded_lossily() {
        let (ingest, resume, _notifier) = ingestion();
        ingest
            .select_file(SelectedFile::new("cv.txt", "", vec![b'o', b'k', 0xff]))
            .finish()
            .await;
        assert_eq!(resume.get().as_deref(), Some("ok\u{fffd}"));
    }

    #[test]
    fn test_remove_without_file_is_silent() {
        let (ingest, _resume, notifier) = ingestion();
        ingest.remove_file();
        assert!(notifier.toasts().is_empty());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
