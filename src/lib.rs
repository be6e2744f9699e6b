//! Candy - voice gateway for a number-sense toy
//!
//! This library provides the core functionality for the candy gateway:
//! - Push-to-talk capture, transcription, and tiered speech output
//! - Local Chinese/Arabic numeral arithmetic on the transcript
//! - A remote responder for everything arithmetic cannot answer
//! - A thin HTTP proxy and realtime relay for the web client
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                        │
//! │     Push-to-talk (stdin)   │   Web client (HTTP/WS) │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Candy Gateway                        │
//! │  Recorder │ ASR │ Numerals │ Responder │ Speech     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              BigModel (vendor API)                   │
//! │   glm-asr  │  glm-4.7  │  glm-tts  │  realtime     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod actions;
pub mod api;
pub mod config;
pub mod daemon;
pub mod error;
pub mod levels;
pub mod numeral;
pub mod orchestrator;
pub mod state;
pub mod voice;

pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
