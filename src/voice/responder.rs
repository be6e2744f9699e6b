//! Remote natural-language responder client
//!
//! Consulted only when the local numeral interpreter declines a transcript.
//! Sends the transcript and a visualization snapshot to the vendor chat
//! endpoint and expects a strict-JSON reply of spoken text plus display
//! actions; plain-text replies degrade to a sparkle.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::actions::{Action, actions_from_values};
use crate::config::BigModelConfig;
use crate::state::StateSnapshot;
use crate::{Error, Result};

/// System prompt constraining replies to the sayText/actions shape
pub const SYSTEM_PROMPT: &str = "你是糖果公主的语音助手，面向5岁儿童。\n\
你的任务：根据孩子的问题，给出一句简短回答，并产出要驱动网页的动作。\n\
请只输出严格 JSON：{ \"sayText\": string, \"actions\": Action[] }。\n\
Action 只能是：\n\
- {\"type\":\"showLevel\",\"value\":number}  // value 只能是以下之一：10,100,1000,10000,100000,1000000,10000000,100000000,1000000000,10000000000,100000000000,1000000000000,10000000000000,100000000000000,1000000000000000,10000000000000000\n\
- {\"type\":\"sparkle\"}\n\
- {\"type\":\"setZoom\",\"value\":number} // 0.8..1.35\n\
不要输出多余字段，不要输出 Markdown。";

/// Default spoken reply when the responder omits `sayText`
const DEFAULT_SAY_TEXT: &str = "好呀～";

/// A validated responder reply
#[derive(Debug, Clone, PartialEq)]
pub struct ResponderReply {
    /// Text to speak
    pub say_text: String,
    /// Display actions, already converted to the closed variant
    pub actions: Vec<Action>,
}

/// Answers transcripts the local interpreter declined
#[async_trait]
pub trait Responder: Send + Sync {
    /// Produce a reply for one transcript
    ///
    /// # Errors
    ///
    /// Returns `Error::Responder` on network failure, a non-success status,
    /// or a reply without content.
    async fn respond(&self, transcript: &str, state: &StateSnapshot) -> Result<ResponderReply>;
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(serde::Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Vendor chat-completion responder
pub struct BigModelResponder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl BigModelResponder {
    /// Create a responder client from the vendor configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when no API key is set.
    pub fn new(config: &BigModelConfig) -> Result<Self> {
        let api_key = config.require_key()?.to_string();
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint("chat/completions"),
            api_key,
            model: config.text_model.clone(),
        })
    }
}

#[async_trait]
impl Responder for BigModelResponder {
    async fn respond(&self, transcript: &str, state: &StateSnapshot) -> Result<ResponderReply> {
        let user_content = serde_json::to_string(&json!({
            "transcript": transcript,
            "state": state,
        }))?;

        let body = json!({
            "model": self.model,
            "stream": false,
            "temperature": 0.7,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_content },
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Responder(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %detail, "responder API error");
            return Err(Error::Responder(format!(
                "responder API error {status}: {detail}"
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Responder(e.to_string()))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Responder("reply without content".to_string()))?;

        let reply = reply_from_content(&content);
        tracing::info!(say_text = %reply.say_text, actions = reply.actions.len(), "responder reply");
        Ok(reply)
    }
}

/// Convert raw reply content to a validated reply
///
/// Strict JSON objects contribute `sayText` and `actions`; anything else is
/// treated as plain spoken text with a single sparkle action.
#[must_use]
pub fn reply_from_content(content: &str) -> ResponderReply {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(obj)) => {
            let say_text = obj
                .get("sayText")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_SAY_TEXT)
                .to_string();
            let actions = obj
                .get("actions")
                .and_then(Value::as_array)
                .map_or_else(Vec::new, |values| actions_from_values(values));
            ResponderReply { say_text, actions }
        }
        _ => ResponderReply {
            say_text: content.to_string(),
            actions: vec![Action::Sparkle],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_json_reply_is_validated() {
        let reply =
            reply_from_content(r#"{"sayText":"好呀","actions":[{"type":"showLevel","value":999}]}"#);
        assert_eq!(reply.say_text, "好呀");
        assert_eq!(reply.actions, vec![Action::ShowLevel(999.0)]);
    }

    #[test]
    fn missing_say_text_falls_back() {
        let reply = reply_from_content(r#"{"actions":[{"type":"sparkle"}]}"#);
        assert_eq!(reply.say_text, "好呀～");
        assert_eq!(reply.actions, vec![Action::Sparkle]);
    }

    #[test]
    fn plain_text_degrades_to_sparkle() {
        let reply = reply_from_content("糖果有好多好多呢！");
        assert_eq!(reply.say_text, "糖果有好多好多呢！");
        assert_eq!(reply.actions, vec![Action::Sparkle]);
    }

    #[test]
    fn malformed_actions_become_noops() {
        let reply = reply_from_content(
            r#"{"sayText":"嗯","actions":[{"type":"dance"},{"type":"setZoom","value":1.2}]}"#,
        );
        assert_eq!(reply.actions, vec![Action::Noop, Action::SetZoom(1.2)]);
    }
}
