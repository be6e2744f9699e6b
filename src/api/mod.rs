//! HTTP API server for the candy voice gateway
//!
//! A thin proxy in front of the vendor API so the browser client never
//! sees the credential: transcription, the responder, speech synthesis,
//! and a realtime WebSocket relay, plus static file serving for the
//! web UI.

pub mod relay;

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::voice::asr::MAGNITUDE_HOTWORDS;
use crate::voice::responder::{SYSTEM_PROMPT, reply_from_content};

/// Shared state for API handlers
pub struct ApiState {
    pub config: Arc<Config>,
    pub client: reqwest::Client,
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
}

impl ApiServer {
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            state: Arc::new(ApiState {
                config,
                client: reqwest::Client::new(),
            }),
        }
    }

    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .route("/api/health", get(health))
            .route("/api/config", get(public_config))
            .route("/api/asr", post(asr))
            .route("/api/brain", post(brain))
            .route("/api/tts", post(tts))
            .route("/api/realtime/relay", get(relay::upgrade))
            .with_state(self.state.clone());

        if let Some(static_dir) = &self.state.config.static_dir {
            let index_file = static_dir.join("index.html");
            let serve_dir = ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));
            router = router.fallback_service(serve_dir);
            tracing::info!(path = %static_dir.display(), "serving static files");
        }

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server on the configured address
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or run
    pub async fn run(self) -> crate::Result<()> {
        let addr = format!("{}:{}", self.state.config.host, self.state.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(addr = %addr, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<crate::Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Public, credential-free view of the configuration for the web client
async fn public_config(State(state): State<Arc<ApiState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "hasKey": config.bigmodel.api_key.is_some(),
        "textModel": config.bigmodel.text_model,
        "realtimeRelayUrl": "/api/realtime/relay",
        "asr": {
            "provider": "server-asr",
            "model": config.bigmodel.asr_model,
        },
        "tts": {
            "provider": config.tts.provider.name(),
            "voice": config.tts.voice,
            "speed": config.tts.speed,
            "volume": config.tts.volume,
        },
    }))
}

/// Transcription request forwarded to the vendor
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AsrPayload {
    wav_base64: Option<String>,
    model: Option<String>,
    prompt: Option<String>,
    hotwords: Option<Vec<String>>,
}

async fn asr(
    State(state): State<Arc<ApiState>>,
    Json(payload): Json<AsrPayload>,
) -> Result<Json<Value>, ApiError> {
    let api_key = require_key(&state)?;

    let wav_base64 = payload
        .wav_base64
        .filter(|b| !b.is_empty())
        .ok_or(ApiError::BadRequest("missing wavBase64"))?;
    let wav = BASE64
        .decode(&wav_base64)
        .map_err(|_| ApiError::BadRequest("invalid base64 audio"))?;

    let model = payload
        .model
        .unwrap_or_else(|| state.config.bigmodel.asr_model.clone());
    let hotwords = payload
        .hotwords
        .unwrap_or_else(|| MAGNITUDE_HOTWORDS.iter().map(ToString::to_string).collect());

    let mut form = reqwest::multipart::Form::new()
        .text("model", model)
        .text("stream", "false")
        .text(
            "hotwords",
            serde_json::to_string(&hotwords).unwrap_or_default(),
        );
    if let Some(prompt) = payload.prompt {
        form = form.text("prompt", prompt);
    }
    let form = form.part(
        "file",
        reqwest::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| ApiError::Upstream(StatusCode::BAD_GATEWAY, e.to_string()))?,
    );

    let response = state
        .client
        .post(state.config.bigmodel.endpoint("audio/transcriptions"))
        .header("Authorization", format!("Bearer {api_key}"))
        .multipart(form)
        .send()
        .await
        .map_err(|e| ApiError::Upstream(StatusCode::BAD_GATEWAY, e.to_string()))?;

    forward_json(response).await
}

/// Responder request from the web client
#[derive(Debug, Deserialize)]
struct BrainPayload {
    transcript: String,
    state: Option<Value>,
}

async fn brain(
    State(state): State<Arc<ApiState>>,
    Json(payload): Json<BrainPayload>,
) -> Result<Json<Value>, ApiError> {
    let api_key = require_key(&state)?;

    if payload.transcript.trim().is_empty() {
        return Err(ApiError::BadRequest("missing transcript"));
    }

    let user_content = json!({
        "transcript": payload.transcript,
        "state": payload.state.unwrap_or(Value::Null),
    })
    .to_string();

    let body = json!({
        "model": state.config.bigmodel.text_model,
        "stream": false,
        "temperature": 0.7,
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            { "role": "user", "content": user_content },
        ],
    });

    let response = state
        .client
        .post(state.config.bigmodel.endpoint("chat/completions"))
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&body)
        .send()
        .await
        .map_err(|e| ApiError::Upstream(StatusCode::BAD_GATEWAY, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let details = response.text().await.unwrap_or_default();
        return Err(ApiError::Upstream(
            StatusCode::BAD_GATEWAY,
            format!("responder API error {status}: {details}"),
        ));
    }

    let chat: Value = response
        .json()
        .await
        .map_err(|e| ApiError::Upstream(StatusCode::BAD_GATEWAY, e.to_string()))?;
    let content = chat
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ApiError::Upstream(StatusCode::BAD_GATEWAY, "reply without content".to_string())
        })?;

    let reply = reply_from_content(content);
    let actions: Vec<Value> = reply
        .actions
        .iter()
        .filter_map(|a| match a {
            crate::actions::Action::ShowLevel(v) => {
                Some(json!({ "type": "showLevel", "value": v }))
            }
            crate::actions::Action::Sparkle => Some(json!({ "type": "sparkle" })),
            crate::actions::Action::SetZoom(v) => Some(json!({ "type": "setZoom", "value": v })),
            crate::actions::Action::Noop => None,
        })
        .collect();

    Ok(Json(json!({ "sayText": reply.say_text, "actions": actions })))
}

/// Synthesis request from the web client
#[derive(Debug, Deserialize)]
struct TtsPayload {
    text: String,
    voice: Option<String>,
    speed: Option<f64>,
    volume: Option<f64>,
}

async fn tts(
    State(state): State<Arc<ApiState>>,
    Json(payload): Json<TtsPayload>,
) -> Result<Response, ApiError> {
    let api_key = require_key(&state)?;

    if payload.text.is_empty() {
        return Err(ApiError::BadRequest("missing text"));
    }

    let body = json!({
        "model": "glm-tts",
        "input": payload.text,
        "voice": payload.voice.unwrap_or_else(|| state.config.tts.voice.clone()),
        "response_format": "wav",
        "speed": payload.speed.unwrap_or(state.config.tts.speed),
        "volume": payload.volume.unwrap_or(state.config.tts.volume),
        "stream": false,
    });

    let response = state
        .client
        .post(state.config.bigmodel.endpoint("audio/speech"))
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&body)
        .send()
        .await
        .map_err(|e| ApiError::Upstream(StatusCode::BAD_GATEWAY, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let details = response.text().await.unwrap_or_default();
        return Err(ApiError::Upstream(
            StatusCode::BAD_GATEWAY,
            format!("TTS API error {status}: {details}"),
        ));
    }

    let audio: Bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::Upstream(StatusCode::BAD_GATEWAY, e.to_string()))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/wav"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        audio,
    )
        .into_response())
}

fn require_key(state: &ApiState) -> Result<&str, ApiError> {
    state
        .config
        .bigmodel
        .api_key
        .as_deref()
        .ok_or(ApiError::MissingKey)
}

/// Pass a vendor JSON response through, preserving failure status and body
async fn forward_json(response: reqwest::Response) -> Result<Json<Value>, ApiError> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| ApiError::Upstream(StatusCode::BAD_GATEWAY, e.to_string()))?;

    if status.is_success() {
        Ok(Json(body))
    } else {
        Err(ApiError::Upstream(
            StatusCode::BAD_GATEWAY,
            format!("vendor API error {status}: {body}"),
        ))
    }
}

/// Gateway API errors
#[derive(Debug)]
pub enum ApiError {
    /// No vendor credential configured
    MissingKey,
    /// Malformed client request
    BadRequest(&'static str),
    /// Vendor call failed
    Upstream(StatusCode, String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingKey => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Missing BIGMODEL_API_KEY".to_string(),
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.to_string()),
            Self::Upstream(status, msg) => (status, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
