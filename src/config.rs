//! Configuration for the Candy voice gateway
//!
//! Everything is environment-driven: vendor credentials and endpoints,
//! the speech-output provider selection, and the gateway listen address.

use std::path::PathBuf;

use crate::{Error, Result};

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind the HTTP server on
    pub host: String,

    /// Port to bind the HTTP server on
    pub port: u16,

    /// Vendor (BigModel) API access
    pub bigmodel: BigModelConfig,

    /// Speech output configuration
    pub tts: TtsConfig,

    /// Directory holding pre-generated clips for the canonical phrases
    pub audio_dir: PathBuf,

    /// Optional static files directory for the web UI
    pub static_dir: Option<PathBuf>,
}

/// Vendor API credentials and endpoints
#[derive(Debug, Clone)]
pub struct BigModelConfig {
    /// API key (`BIGMODEL_API_KEY` or `ZHIPUAI_API_KEY`)
    pub api_key: Option<String>,

    /// REST base URL
    pub base_url: String,

    /// Realtime voice WebSocket URL (relay upstream)
    pub realtime_url: String,

    /// Chat model for the responder
    pub text_model: String,

    /// Transcription model
    pub asr_model: String,
}

/// Speech output provider for the remote tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtsProvider {
    /// Only pre-generated clips, no remote or on-device synthesis
    BundledOnly,
    /// Remote synthesis through a gateway `/api/tts` endpoint
    ServerMediated,
    /// Remote synthesis straight against the vendor API
    DirectVendor,
    /// No remote tier, on-device synthesizer only
    #[default]
    OnDevice,
}

impl TtsProvider {
    /// Parse a provider name, accepting the web app's legacy aliases
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "bundled-only" | "bundled" => Self::BundledOnly,
            "server-mediated" | "server-tts" => Self::ServerMediated,
            "direct-vendor" | "zhipu-glm-tts" => Self::DirectVendor,
            _ => Self::OnDevice,
        }
    }

    /// Stable name for logs and the public config endpoint
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BundledOnly => "bundled-only",
            Self::ServerMediated => "server-mediated",
            Self::DirectVendor => "direct-vendor",
            Self::OnDevice => "on-device",
        }
    }
}

/// Speech output configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Remote tier selection
    pub provider: TtsProvider,

    /// Voice name for remote synthesis
    pub voice: String,

    /// Speech speed multiplier
    pub speed: f64,

    /// Output volume multiplier
    pub volume: f64,

    /// Endpoint for the server-mediated provider; defaults to this
    /// gateway's own `/api/tts` route
    pub server_endpoint: Option<String>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load the configuration from environment variables
    ///
    /// Reads the vendor credentials (`BIGMODEL_API_KEY` / `ZHIPUAI_API_KEY`,
    /// `BIGMODEL_BASE_URL`, `BIGMODEL_REALTIME_URL`, `BIGMODEL_TEXT_MODEL`,
    /// `BIGMODEL_ASR_MODEL`, `BIGMODEL_TTS_VOICE` / `_SPEED` / `_VOLUME`) and
    /// the gateway settings (`CANDY_HOST`, `CANDY_PORT`, `CANDY_TTS_PROVIDER`,
    /// `CANDY_TTS_ENDPOINT`, `CANDY_AUDIO_DIR`, `CANDY_STATIC_DIR`).
    #[must_use]
    pub fn from_env() -> Self {
        let api_key = std::env::var("BIGMODEL_API_KEY")
            .or_else(|_| std::env::var("ZHIPUAI_API_KEY"))
            .ok()
            .filter(|k| !k.is_empty());

        let bigmodel = BigModelConfig {
            api_key,
            base_url: env_or("BIGMODEL_BASE_URL", "https://open.bigmodel.cn"),
            realtime_url: env_or(
                "BIGMODEL_REALTIME_URL",
                "wss://open.bigmodel.cn/api/paas/v4/realtime",
            ),
            text_model: env_or("BIGMODEL_TEXT_MODEL", "glm-4.7"),
            asr_model: env_or("BIGMODEL_ASR_MODEL", "glm-asr-2512"),
        };

        let tts = TtsConfig {
            provider: TtsProvider::parse(&env_or("CANDY_TTS_PROVIDER", "on-device")),
            voice: env_or("BIGMODEL_TTS_VOICE", "tongtong"),
            speed: env_f64("BIGMODEL_TTS_SPEED", 1.0),
            volume: env_f64("BIGMODEL_TTS_VOLUME", 1.0),
            server_endpoint: std::env::var("CANDY_TTS_ENDPOINT").ok(),
        };

        Self {
            host: env_or("CANDY_HOST", "127.0.0.1"),
            port: std::env::var("CANDY_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5173),
            bigmodel,
            tts,
            audio_dir: std::env::var("CANDY_AUDIO_DIR")
                .map_or_else(|_| default_audio_dir(), PathBuf::from),
            static_dir: std::env::var("CANDY_STATIC_DIR").ok().map(PathBuf::from),
        }
    }
}

impl BigModelConfig {
    /// Build a REST endpoint URL under the vendor API root
    #[must_use]
    pub fn endpoint(&self, tail: &str) -> String {
        format!("{}/api/paas/v4/{tail}", self.base_url.trim_end_matches('/'))
    }

    /// The API key, or a configuration error naming the missing variable
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when no key is set.
    pub fn require_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| Error::Config("BIGMODEL_API_KEY (or ZHIPUAI_API_KEY) required".to_string()))
    }
}

/// Default bundled-clip directory under the XDG data dir
///
/// Falls back to a relative `audio/` when no home directory is available.
#[must_use]
pub fn default_audio_dir() -> PathBuf {
    directories::ProjectDirs::from("cn", "candy", "candy-voice")
        .map_or_else(|| PathBuf::from("audio"), |d| d.data_dir().join("audio"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parsing_accepts_aliases() {
        assert_eq!(TtsProvider::parse("direct-vendor"), TtsProvider::DirectVendor);
        assert_eq!(TtsProvider::parse("zhipu-glm-tts"), TtsProvider::DirectVendor);
        assert_eq!(TtsProvider::parse("server-tts"), TtsProvider::ServerMediated);
        assert_eq!(TtsProvider::parse("Bundled-Only"), TtsProvider::BundledOnly);
        assert_eq!(TtsProvider::parse("web-speech"), TtsProvider::OnDevice);
        assert_eq!(TtsProvider::parse("whatever"), TtsProvider::OnDevice);
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let cfg = BigModelConfig {
            api_key: None,
            base_url: "https://open.bigmodel.cn/".to_string(),
            realtime_url: String::new(),
            text_model: String::new(),
            asr_model: String::new(),
        };
        assert_eq!(
            cfg.endpoint("audio/speech"),
            "https://open.bigmodel.cn/api/paas/v4/audio/speech"
        );
    }
}
