//! Remote speech synthesis client
//!
//! Two remote modes share one client: server-mediated (a gateway `/api/tts`
//! route that hides the vendor credential) and direct-vendor (the BigModel
//! speech endpoint). Both return raw WAV bytes.

use serde_json::json;

use crate::config::{BigModelConfig, TtsConfig};
use crate::{Error, Result};

/// Vendor synthesis model
const TTS_MODEL: &str = "glm-tts";

enum TtsMode {
    /// POST to a gateway endpoint that holds the credential
    Server { endpoint: String },
    /// POST to the vendor speech endpoint with our own credential
    Vendor { endpoint: String, api_key: String },
}

/// Remote text-to-speech client
pub struct RemoteTts {
    client: reqwest::Client,
    mode: TtsMode,
    voice: String,
    speed: f64,
    volume: f64,
}

impl RemoteTts {
    /// Client for a server-mediated endpoint
    #[must_use]
    pub fn server(endpoint: String, tts: &TtsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            mode: TtsMode::Server { endpoint },
            voice: tts.voice.clone(),
            speed: tts.speed,
            volume: tts.volume,
        }
    }

    /// Client talking straight to the vendor speech endpoint
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when no API key is set.
    pub fn vendor(config: &BigModelConfig, tts: &TtsConfig) -> Result<Self> {
        let api_key = config.require_key()?.to_string();
        Ok(Self {
            client: reqwest::Client::new(),
            mode: TtsMode::Vendor {
                endpoint: config.endpoint("audio/speech"),
                api_key,
            },
            voice: tts.voice.clone(),
            speed: tts.speed,
            volume: tts.volume,
        })
    }

    /// Synthesize one phrase to WAV bytes
    ///
    /// # Errors
    ///
    /// Returns `Error::Tts` on network failure or a non-success status.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let request = match &self.mode {
            TtsMode::Server { endpoint } => self.client.post(endpoint).json(&json!({
                "text": text,
                "voice": self.voice,
                "speed": self.speed,
                "volume": self.volume,
            })),
            TtsMode::Vendor { endpoint, api_key } => self
                .client
                .post(endpoint)
                .header("Authorization", format!("Bearer {api_key}"))
                .json(&json!({
                    "model": TTS_MODEL,
                    "input": text,
                    "voice": self.voice,
                    "response_format": "wav",
                    "speed": self.speed,
                    "volume": self.volume,
                    "stream": false,
                })),
        };

        let response = request
            .send()
            .await
            .map_err(|e| Error::Tts(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "TTS API error");
            return Err(Error::Tts(format!("TTS API error {status}: {body}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Tts(e.to_string()))?;
        tracing::debug!(text = %text, audio_bytes = bytes.len(), "synthesis complete");
        Ok(bytes.to_vec())
    }
}
