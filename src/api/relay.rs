//! Realtime voice relay
//!
//! Bridges the browser's WebSocket to the vendor realtime endpoint,
//! attaching the credential server-side and forwarding frames verbatim
//! in both directions. The relay never inspects payloads; closing either
//! side closes the other with a matching code.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{self, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, http};

use super::ApiState;
use crate::{Error, Result};

/// Upgrade a client connection into a relay session
pub async fn upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = handle(socket, state).await {
            tracing::warn!(error = %e, "relay session ended with error");
        }
    })
}

async fn handle(mut client: WebSocket, state: Arc<ApiState>) -> Result<()> {
    let Some(api_key) = state.config.bigmodel.api_key.as_deref() else {
        tracing::warn!("relay refused, no API key configured");
        let frame = ws::CloseFrame {
            code: 1011,
            reason: "Missing BIGMODEL_API_KEY".into(),
        };
        client.send(ws::Message::Close(Some(frame))).await.ok();
        return Ok(());
    };

    let url = state.config.bigmodel.realtime_url.clone();
    let mut request = url
        .clone()
        .into_client_request()
        .map_err(|e| Error::Relay(e.to_string()))?;
    request.headers_mut().insert(
        http::header::AUTHORIZATION,
        http::HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| Error::Relay(e.to_string()))?,
    );

    let (upstream, _) = match connect_async(request).await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "relay upstream connect failed");
            let frame = ws::CloseFrame {
                code: 1011,
                reason: "upstream connect failed".into(),
            };
            client.send(ws::Message::Close(Some(frame))).await.ok();
            return Err(Error::Relay(e.to_string()));
        }
    };

    tracing::info!(url = %url, "relay session open");

    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    loop {
        tokio::select! {
            frame = client_rx.next() => match frame {
                Some(Ok(message)) => {
                    let closing = matches!(message, ws::Message::Close(_));
                    if let Some(converted) = to_upstream(message) {
                        if upstream_tx.send(converted).await.is_err() {
                            break;
                        }
                    }
                    if closing {
                        tracing::debug!("client closed relay");
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "client read error");
                    upstream_tx
                        .send(tungstenite::Message::Close(Some(CloseFrame {
                            code: CloseCode::Error,
                            reason: "client error".into(),
                        })))
                        .await
                        .ok();
                    break;
                }
                None => {
                    upstream_tx.send(tungstenite::Message::Close(None)).await.ok();
                    break;
                }
            },
            frame = upstream_rx.next() => match frame {
                Some(Ok(message)) => {
                    let closing = matches!(message, tungstenite::Message::Close(_));
                    if let Some(converted) = to_client(message) {
                        if client_tx.send(converted).await.is_err() {
                            break;
                        }
                    }
                    if closing {
                        tracing::debug!("upstream closed relay");
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "upstream read error");
                    let frame = ws::CloseFrame {
                        code: 1011,
                        reason: "upstream error".into(),
                    };
                    client_tx.send(ws::Message::Close(Some(frame))).await.ok();
                    break;
                }
                None => {
                    client_tx.send(ws::Message::Close(None)).await.ok();
                    break;
                }
            },
        }
    }

    tracing::info!("relay session closed");
    Ok(())
}

/// Convert a client frame for the upstream socket
fn to_upstream(message: ws::Message) -> Option<tungstenite::Message> {
    match message {
        ws::Message::Text(text) => Some(tungstenite::Message::text(text.to_string())),
        ws::Message::Binary(data) => Some(tungstenite::Message::binary(data.to_vec())),
        ws::Message::Ping(data) => Some(tungstenite::Message::Ping(data.to_vec().into())),
        ws::Message::Pong(data) => Some(tungstenite::Message::Pong(data.to_vec().into())),
        ws::Message::Close(frame) => Some(tungstenite::Message::Close(frame.map(|f| CloseFrame {
            code: CloseCode::from(f.code),
            reason: f.reason.to_string().into(),
        }))),
    }
}

/// Convert an upstream frame for the client socket
fn to_client(message: tungstenite::Message) -> Option<ws::Message> {
    match message {
        tungstenite::Message::Text(text) => Some(ws::Message::Text(text.to_string().into())),
        tungstenite::Message::Binary(data) => Some(ws::Message::Binary(data.to_vec().into())),
        tungstenite::Message::Ping(data) => Some(ws::Message::Ping(data.to_vec().into())),
        tungstenite::Message::Pong(data) => Some(ws::Message::Pong(data.to_vec().into())),
        tungstenite::Message::Close(frame) => {
            Some(ws::Message::Close(frame.map(|f| ws::CloseFrame {
                code: f.code.into(),
                reason: f.reason.to_string().into(),
            })))
        }
        tungstenite::Message::Frame(_) => None,
    }
}
