//! Line-oriented terminal host for the chat surfaces.

use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use super::{Controllers, SurfaceKind};
use crate::chat::SendOutcome;
use crate::ingest::{format_size, DecodeOutcome, SelectedFile};
use crate::models::{MediaKind, Preview, Toast};
use crate::notify::Notifier;

const PUMP_INTERVAL: Duration = Duration::from_millis(100);
const PREVIEW_CHARS: usize = 160;

/// Prints toasts inline with the conversation.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, toast: Toast) {
        let marker = if toast.is_error() { "!" } else { "*" };
        match toast.description {
            Some(description) => eprintln!("[{marker}] {}: {description}", toast.title),
            None => eprintln!("[{marker}] {}", toast.title),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    /// Send the pending input buffer (e.g. after dictation).
    Send,
    Upload(String),
    Remove,
    File,
    Record,
    Stop,
    Say(String),
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Option<Command> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Some(Command::Say(line.to_string()));
        };
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        let command = match name {
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "send" => Command::Send,
            "upload" if !arg.is_empty() => Command::Upload(arg.to_string()),
            "remove" => Command::Remove,
            "file" => Command::File,
            "record" => Command::Record,
            "stop" => Command::Stop,
            _ => Command::Unknown(line.to_string()),
        };
        Some(command)
    }

    fn sidebar_only(&self) -> bool {
        matches!(
            self,
            Command::Upload(_) | Command::Remove | Command::Record | Command::Stop
        )
    }
}

fn help_text(kind: SurfaceKind) -> String {
    let mut lines = vec![
        "Type a message and press enter to ask about the resume.",
        "  /send           send the dictated input",
        "  /file           show the uploaded file",
    ];
    if kind.allows_upload() {
        lines.push("  /upload <path>  upload a resume (.txt/.md) or media file");
        lines.push("  /remove         remove the uploaded file");
    }
    if kind.allows_voice() {
        lines.push("  /record         start dictation");
        lines.push("  /stop           stop dictation and transcribe");
    }
    lines.push("  /quit           leave");
    lines.join("\n")
}

/// Runs the surface until stdin closes or the user quits.
pub async fn run(kind: SurfaceKind, mut controllers: Controllers) -> Result<()> {
    println!("{}\n{}", kind.title(), help_text(kind));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(PUMP_INTERVAL);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(command) = Command::parse(&line) else { continue };
                if command == Command::Quit {
                    break;
                }
                handle(kind, &mut controllers, command).await?;
            }
            _ = ticker.tick() => {
                if controllers.voice.status().is_recording() {
                    controllers.voice.pump();
                }
            }
        }
    }

    info!("Surface closed");
    Ok(())
}

async fn handle(kind: SurfaceKind, controllers: &mut Controllers, command: Command) -> Result<()> {
    if command.sidebar_only() && kind == SurfaceKind::Page {
        println!("That command is only available in the sidebar chat.");
        return Ok(());
    }
    debug!("Handling {command:?}");

    match command {
        Command::Help => println!("{}", help_text(kind)),
        Command::Quit => {}
        Command::Say(text) => {
            // Typed text extends whatever was dictated.
            controllers.chat.append_input(&text);
            print_reply(controllers.chat.submit_input().await);
        }
        Command::Send => print_reply(controllers.chat.submit_input().await),
        Command::Upload(path) => match SelectedFile::from_path(&path).await {
            Ok(file) => {
                let outcome = controllers.ingest.select_file(file).finish().await;
                if let DecodeOutcome::Failed(reason) = outcome {
                    println!("Could not preview the file: {reason}");
                } else {
                    print_current_file(controllers);
                }
            }
            Err(e) => println!("Upload failed: {e:#}"),
        },
        Command::Remove => controllers.ingest.remove_file(),
        Command::File => print_current_file(controllers),
        Command::Record => {
            if controllers.voice.start_recording() {
                println!("Recording... type /stop to finish.");
            }
        }
        Command::Stop => {
            if let Some(pending) = controllers.voice.stop_recording() {
                println!("Transcribing...");
                if pending.finish().await.is_ok() {
                    println!("Input: {}", controllers.chat.input());
                    println!("Type /send to send it, or keep typing.");
                }
            }
        }
        Command::Unknown(line) => println!("Unknown command '{line}'. Type /help."),
    }
    Ok(())
}

fn print_reply(outcome: SendOutcome) {
    match outcome {
        SendOutcome::Replied(message) => println!("\n{}\n", message.content()),
        // Failures were already raised as toasts; blank sends are silent.
        SendOutcome::Failed(_) | SendOutcome::Ignored => {}
    }
}

fn print_current_file(controllers: &Controllers) {
    let Some(file) = controllers.ingest.current() else {
        println!("No file uploaded.");
        return;
    };
    println!("{} ({:?}, {})", file.name, file.kind, format_size(file.size));
    match (&file.preview, file.kind) {
        (Some(Preview::Text(text)), _) => {
            let excerpt: String = text.chars().take(PREVIEW_CHARS).collect();
            println!("{excerpt}");
            if controllers.resume.is_set() {
                println!("(answers will use this resume)");
            }
        }
        (Some(Preview::DataUrl(url)), _) => {
            println!("Preview ready ({} bytes data URL)", url.len())
        }
        (None, MediaKind::Other) => println!("No preview available for this file type."),
        (None, _) => println!("Preview pending."),
    }
}
