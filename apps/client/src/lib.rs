//! Client-side controllers for the Folio resume assistant.
//!
//! A surface wires one [`chat::ChatSession`], one [`ingest::FileIngestion`] and
//! one [`voice::VoiceCapture`] around a shared [`resume::ResumeContext`]; see
//! [`surfaces::wire`].

pub mod audio;
pub mod chat;
pub mod config;
pub mod errors;
pub mod ingest;
pub mod models;
pub mod notify;
pub mod resume;
pub mod surfaces;
pub mod transport;
pub mod voice;
