use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One transcript entry. Fields are read-only once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: Uuid,
    role: Role,
    content: String,
    timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Media classification of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Text,
    Other,
}

impl MediaKind {
    /// Classifies by declared MIME type, falling back to `.txt`/`.md` for text.
    pub fn classify(declared_mime: &str, file_name: &str) -> Self {
        let mime = declared_mime.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            MediaKind::Image
        } else if mime.starts_with("video/") {
            MediaKind::Video
        } else if mime.starts_with("text/") || has_text_extension(file_name) {
            MediaKind::Text
        } else {
            MediaKind::Other
        }
    }
}

fn has_text_extension(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    lower.ends_with(".txt") || lower.ends_with(".md")
}

/// Displayable rendering of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    DataUrl(String),
    Text(String),
}

/// The file currently selected in the upload widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub size: u64,
    pub kind: MediaKind,
    pub mime: String,
    /// `None` until the asynchronous decode lands, and always for `MediaKind::Other`.
    pub preview: Option<Preview>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastVariant {
    Default,
    Destructive,
}

/// A user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub description: Option<String>,
    pub variant: ToastVariant,
}

impl Toast {
    pub fn info(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            title: title.into(),
            description,
            variant: ToastVariant::Default,
        }
    }

    pub fn error(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            title: title.into(),
            description,
            variant: ToastVariant::Destructive,
        }
    }

    pub fn is_error(&self) -> bool {
        self.variant == ToastVariant::Destructive
    }
}
