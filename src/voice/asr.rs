//! Speech-to-text client
//!
//! Uploads a finalized clip to the vendor transcription endpoint. The
//! orchestrator talks to the [`Transcriber`] trait so tests can substitute
//! a canned implementation.

use async_trait::async_trait;

use crate::config::BigModelConfig;
use crate::voice::recorder::AudioClip;
use crate::{Error, Result};

/// Hotwords biasing the recognizer toward magnitude vocabulary
pub const MAGNITUDE_HOTWORDS: [&str; 9] = [
    "万", "亿", "万亿", "十万", "百万", "千万", "十亿", "一百亿", "一千亿",
];

/// Response from the vendor transcription API
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Turns an audio clip into a transcript
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one clip
    ///
    /// # Errors
    ///
    /// Returns `Error::Asr` on network failure or a non-success status.
    async fn transcribe(&self, clip: &AudioClip) -> Result<String>;
}

/// Vendor ASR client (multipart WAV upload)
pub struct BigModelAsr {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    hotwords: Vec<String>,
}

impl BigModelAsr {
    /// Create a transcription client from the vendor configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when no API key is set.
    pub fn new(config: &BigModelConfig) -> Result<Self> {
        let api_key = config.require_key()?.to_string();
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint("audio/transcriptions"),
            api_key,
            model: config.asr_model.clone(),
            hotwords: MAGNITUDE_HOTWORDS.iter().map(ToString::to_string).collect(),
        })
    }
}

#[async_trait]
impl Transcriber for BigModelAsr {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String> {
        let wav = clip.wav_bytes()?;
        tracing::debug!(audio_bytes = wav.len(), model = %self.model, "starting transcription");

        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .text("stream", "false")
            .text("hotwords", serde_json::to_string(&self.hotwords)?)
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Asr(e.to_string()))?,
            );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Asr(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Asr(format!("ASR API error {status}: {body}")));
        }

        let result: TranscriptionResponse =
            response.json().await.map_err(|e| Error::Asr(e.to_string()))?;
        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}
