//! Chat session controller: an append-only transcript plus one in-flight completion.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::errors::TransportError;
use crate::models::{Message, Toast};
use crate::notify::Notifier;
use crate::resume::ResumeContext;
use crate::transport::{CompletionBackend, CompletionRequest};

/// What a call to [`ChatSession::send_message`] did.
#[derive(Debug)]
pub enum SendOutcome {
    /// Blank input, or another send was in flight. Nothing changed.
    Ignored,
    /// The assistant reply that was appended.
    Replied(Message),
    /// The request failed; only the user message was appended.
    Failed(TransportError),
}

#[derive(Debug, Default)]
struct ChatState {
    messages: Vec<Message>,
    input: String,
    in_flight: bool,
}

struct ChatInner {
    state: Mutex<ChatState>,
    backend: Arc<dyn CompletionBackend>,
    notifier: Arc<dyn Notifier>,
    resume: ResumeContext,
    preamble: Option<String>,
}

/// Cloneable handle to a chat session. Clones share the transcript.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<ChatInner>,
}

/// Clears the in-flight flag however the send ends, including cancellation.
struct InFlightGuard<'a> {
    state: &'a Mutex<ChatState>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().in_flight = false;
    }
}

impl ChatSession {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        notifier: Arc<dyn Notifier>,
        resume: ResumeContext,
        preamble: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(ChatInner {
                state: Mutex::new(ChatState::default()),
                backend,
                notifier,
                resume,
                preamble,
            }),
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.state.lock().messages.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().in_flight
    }

    pub fn input(&self) -> String {
        self.inner.state.lock().input.clone()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.inner.state.lock().input = text.into();
    }

    /// Adds dictated text to the pending input, space-separated.
    pub fn append_input(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let mut state = self.inner.state.lock();
        if !state.input.trim().is_empty() && !state.input.ends_with(char::is_whitespace) {
            state.input.push(' ');
        }
        state.input.push_str(text);
    }

    /// Sends the pending input buffer.
    pub async fn submit_input(&self) -> SendOutcome {
        let text = self.input();
        self.send_message(&text).await
    }

    /// Appends `text` as a user message and requests a reply.
    ///
    /// The user message is appended, the input buffer cleared and the in-flight
    /// flag set before the request is issued. No retry on failure.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let request = {
            let mut state = self.inner.state.lock();
            if text.trim().is_empty() || state.in_flight {
                debug!(
                    "send_message ignored (blank={}, in_flight={})",
                    text.trim().is_empty(),
                    state.in_flight
                );
                return SendOutcome::Ignored;
            }
            state.messages.push(Message::user(text));
            state.input.clear();
            state.in_flight = true;
            CompletionRequest {
                system: self.system_instruction(),
                transcript: state.messages.clone(),
            }
        };
        let _guard = InFlightGuard {
            state: &self.inner.state,
        };

        info!("Sending transcript of {} messages", request.transcript.len());

        match self.inner.backend.complete(&request).await {
            Ok(reply) => {
                let message = Message::assistant(reply);
                self.inner.state.lock().messages.push(message.clone());
                SendOutcome::Replied(message)
            }
            Err(e) => {
                warn!("Error sending message: {e}");
                self.inner
                    .notifier
                    .notify(Toast::error("Error", Some(e.to_string())));
                SendOutcome::Failed(e)
            }
        }
    }

    /// The fixed preamble, followed by the resume text when one is loaded.
    fn system_instruction(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(preamble) = &self.inner.preamble {
            parts.push(preamble.clone());
        }
        if let Some(resume) = self.inner.resume.get() {
            parts.push(format!("Resume:\n{resume}"));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::notify::RecordingNotifier;
    use async_trait::async_trait;
    use tokio::sync::oneshot;

    /// Records every request and answers with a canned reply.
    struct ScriptedBackend {
        reply: Result<String, u16>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedBackend {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(status),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError> {
            self.seen.lock().push(request.clone());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(TransportError::Status {
                    status: *status,
                    message: "boom".to_string(),
                }),
            }
        }
    }

    /// Holds the request open until the test releases it.
    struct GatedBackend {
        gate: Mutex<Option<oneshot::Receiver<String>>>,
    }

    #[async_trait]
    impl CompletionBackend for GatedBackend {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, TransportError> {
            let rx = self.gate.lock().take().expect("single request");
            rx.await
                .map_err(|_| TransportError::Malformed("gate dropped".to_string()))
        }
    }

    fn session(
        backend: Arc<dyn CompletionBackend>,
        resume: ResumeContext,
    ) -> (ChatSession, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let chat = ChatSession::new(
            backend,
            notifier.clone(),
            resume,
            Some("You answer questions about a resume.".to_string()),
        );
        (chat, notifier)
    }

    #[tokio::test]
    async fn test_reply_is_appended_after_user_message() {
        let backend = ScriptedBackend::ok("Hello!");
        let (chat, notifier) = session(backend.clone(), ResumeContext::new());

        let outcome = chat.send_message("Hi").await;
        assert!(matches!(outcome, SendOutcome::Replied(ref m) if m.content() == "Hello!"));

        let messages = chat.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!((messages[0].role(), messages[0].content()), (Role::User, "Hi"));
        assert_eq!(
            (messages[1].role(), messages[1].content()),
            (Role::Assistant, "Hello!")
        );
        assert!(!chat.is_loading());
        assert!(notifier.toasts().is_empty());
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let backend = ScriptedBackend::ok("unused");
        let (chat, notifier) = session(backend.clone(), ResumeContext::new());

        for blank in ["", "   ", "\n\t "] {
            assert!(matches!(chat.send_message(blank).await, SendOutcome::Ignored));
        }

        assert!(chat.messages().is_empty());
        assert!(backend.seen.lock().is_empty());
        assert!(notifier.toasts().is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_only_user_message() {
        let (chat, notifier) = session(ScriptedBackend::failing(500), ResumeContext::new());

        let outcome = chat.send_message("Hi").await;
        assert!(matches!(outcome, SendOutcome::Failed(_)));

        let messages = chat.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role(), Role::User);
        assert!(!chat.is_loading());

        let errors = notifier.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].description.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_second_send_while_in_flight_is_ignored() {
        let (tx, rx) = oneshot::channel();
        let backend = Arc::new(GatedBackend {
            gate: Mutex::new(Some(rx)),
        });
        let (chat, _notifier) = session(backend, ResumeContext::new());

        let first = tokio::spawn({
            let chat = chat.clone();
            async move { chat.send_message("Hi").await }
        });
        while !chat.is_loading() {
            tokio::task::yield_now().await;
        }

        // User message is visible before the request resolves.
        let messages = chat.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content(), "Hi");

        chat.set_input("again");
        assert!(matches!(chat.submit_input().await, SendOutcome::Ignored));
        assert_eq!(chat.messages().len(), 1);
        assert_eq!(chat.input(), "again");

        tx.send("Hello!".to_string()).unwrap();
        assert!(matches!(first.await.unwrap(), SendOutcome::Replied(_)));
        assert!(!chat.is_loading());
        assert_eq!(chat.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_send_clears_in_flight() {
        let (_tx, rx) = oneshot::channel::<String>();
        let backend = Arc::new(GatedBackend {
            gate: Mutex::new(Some(rx)),
        });
        let (chat, _notifier) = session(backend, ResumeContext::new());

        let handle = tokio::spawn({
            let chat = chat.clone();
            async move { chat.send_message("Hi").await }
        });
        while !chat.is_loading() {
            tokio::task::yield_now().await;
        }
        handle.abort();
        let _ = handle.await;

        assert!(!chat.is_loading());
        assert_eq!(chat.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_clears_input_and_sends_full_transcript() {
        let backend = ScriptedBackend::ok("reply");
        let resume = ResumeContext::new();
        let (chat, _notifier) = session(backend.clone(), resume.clone());

        chat.set_input("first");
        chat.submit_input().await;
        assert_eq!(chat.input(), "");

        resume.set(Some("Ten years of Rust.".to_string()));
        chat.send_message("second").await;

        let seen = backend.seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].transcript.len(), 1);
        assert_eq!(
            seen[0].system.as_deref(),
            Some("You answer questions about a resume.")
        );

        let contents: Vec<&str> = seen[1].transcript.iter().map(|m| m.content()).collect();
        assert_eq!(contents, vec!["first", "reply", "second"]);
        assert_eq!(
            seen[1].system.as_deref(),
            Some("You answer questions about a resume.\n\nResume:\nTen years of Rust.")
        );
    }

    #[test]
    fn test_append_input_joins_with_space() {
        let (chat, _notifier) = session(ScriptedBackend::ok("unused"), ResumeContext::new());
        chat.append_input("  hello ");
        chat.append_input("world");
        assert_eq!(chat.input(), "hello world");
        chat.append_input("   ");
        assert_eq!(chat.input(), "hello world");
    }
}
