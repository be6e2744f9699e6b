//! Error types for the Candy voice gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Microphone denied or unsupported
    #[error("microphone unavailable: {0}")]
    Permission(String),

    /// Capture produced too little usable audio
    #[error("no audio captured")]
    NoAudio,

    /// Transcription succeeded but returned nothing
    #[error("empty transcript")]
    EmptyTranscript,

    /// Audio device or codec error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("ASR error: {0}")]
    Asr(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Remote responder error (network, non-success status, bad reply)
    #[error("responder error: {0}")]
    Responder(String),

    /// Realtime relay error
    #[error("relay error: {0}")]
    Relay(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
