//! Voice processing module
//!
//! Handles microphone capture, transcription, the remote responder, and
//! the tiered speech output chain.

pub mod asr;
pub mod playback;
pub mod recorder;
pub mod responder;
pub mod speech;
pub mod tts;

pub use asr::{BigModelAsr, Transcriber};
pub use playback::AudioPlayback;
pub use recorder::{AudioClip, Recorder, SAMPLE_RATE};
pub use responder::{BigModelResponder, Responder, ResponderReply};
pub use speech::{BundledClipTier, RemoteTtsTier, SpeechOutput, SpeechTier, SystemVoiceTier};
pub use tts::RemoteTts;
