// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-lived event subscription over the platform's WebSocket endpoint.
//!
//! The production SDK's transport (frame encoding, reconnect, ack) is an
//! external collaborator; this module is the minimal long-connection
//! reader behind the [`EventSource`] seam: negotiate the connection URL
//! with the app credentials, then deliver each JSON event frame upstream.
//! Tests drive the gateway through scripted `EventSource` implementations
//! instead of this transport.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use larkbridge_core::{BridgeError, EventSource};

/// Endpoint that exchanges app credentials for a WebSocket URL.
const ENDPOINT_URL: &str = "https://open.feishu.cn/callback/ws/endpoint";

#[derive(Debug, Deserialize)]
struct EndpointResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<EndpointData>,
}

#[derive(Debug, Deserialize)]
struct EndpointData {
    #[serde(alias = "URL")]
    url: String,
}

/// WebSocket-backed [`EventSource`] for the platform event subscription.
pub struct WsEventSource {
    app_id: String,
    app_secret: String,
    http: reqwest::Client,
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

impl WsEventSource {
    pub fn new(app_id: String, app_secret: String) -> Self {
        Self {
            app_id,
            app_secret,
            http: reqwest::Client::new(),
            stream: None,
        }
    }
}

#[async_trait]
impl EventSource for WsEventSource {
    async fn connect(&mut self) -> Result<(), BridgeError> {
        let response = self
            .http
            .post(ENDPOINT_URL)
            .json(&serde_json::json!({
                "AppID": self.app_id,
                "AppSecret": self.app_secret,
            }))
            .send()
            .await
            .map_err(|e| BridgeError::Transport {
                message: format!("endpoint negotiation failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let body: EndpointResponse =
            response.json().await.map_err(|e| BridgeError::Transport {
                message: format!("failed to parse endpoint response: {e}"),
                source: Some(Box::new(e)),
            })?;

        if body.code != 0 {
            return Err(BridgeError::Platform {
                code: body.code,
                message: body
                    .msg
                    .unwrap_or_else(|| "endpoint negotiation rejected".into()),
            });
        }

        let url = body
            .data
            .ok_or_else(|| BridgeError::Internal("endpoint response missing data".into()))?
            .url;

        let (stream, _) = connect_async(url).await.map_err(|e| BridgeError::Transport {
            message: format!("websocket connect failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        info!("event subscription connected");
        self.stream = Some(stream);
        Ok(())
    }

    async fn next_event(&mut self) -> Result<serde_json::Value, BridgeError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| BridgeError::Internal("event source not connected".into()))?;

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<serde_json::Value>(&text) {
                        Ok(value) => return Ok(value),
                        Err(e) => {
                            warn!(error = %e, "dropping non-JSON event frame");
                        }
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    debug!("ping received, replying pong");
                    stream
                        .send(Message::Pong(payload))
                        .await
                        .map_err(|e| BridgeError::Transport {
                            message: format!("pong send failed: {e}"),
                            source: Some(Box::new(e)),
                        })?;
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(BridgeError::Transport {
                        message: "event subscription closed".into(),
                        source: None,
                    });
                }
                Some(Ok(_)) => {
                    // Binary/pong frames carry no events.
                }
                Some(Err(e)) => {
                    return Err(BridgeError::Transport {
                        message: format!("websocket read failed: {e}"),
                        source: Some(Box::new(e)),
                    });
                }
            }
        }
    }
}
