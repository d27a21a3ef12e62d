// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Feishu open platform.
//!
//! Provides [`FeishuClient`] which handles tenant access token caching,
//! plain text message delivery, and the CardKit calls in
//! [`cardkit`](crate::cardkit). All platform responses share the
//! `{code, msg, data}` envelope; a non-zero `code` is surfaced as
//! [`BridgeError::Platform`].

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use larkbridge_core::{BridgeError, ReplyTarget};

/// Base URL of the Feishu open platform.
const API_BASE_URL: &str = "https://open.feishu.cn";

/// Tokens are treated as expired this long before the server-reported
/// expiry so in-flight requests never race the real expiration.
const TOKEN_SAFETY_MARGIN: Duration = Duration::from_secs(300);

/// HTTP timeout for platform calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Generic `{code, msg, data}` response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope {
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    tenant_access_token: Option<String>,
    #[serde(default)]
    expire: Option<u64>,
}

/// Feishu platform client with a process-wide tenant token cache.
pub struct FeishuClient {
    http: reqwest::Client,
    app_id: String,
    app_secret: String,
    base_url: String,
    token: RwLock<Option<CachedToken>>,
}

impl FeishuClient {
    /// Creates a new client for the given app credentials.
    pub fn new(app_id: String, app_secret: String) -> Result<Self, BridgeError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| BridgeError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            http,
            app_id,
            app_secret,
            base_url: API_BASE_URL.to_string(),
            token: RwLock::new(None),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Returns a valid tenant access token, fetching a fresh one when the
    /// cached entry is missing or inside the safety margin.
    ///
    /// Read-lock fast path, then a double-checked write lock so concurrent
    /// callers perform at most one exchange.
    pub async fn tenant_access_token(&self) -> Result<String, BridgeError> {
        {
            let guard = self.token.read().await;
            if let Some(tok) = guard.as_ref()
                && Instant::now() < tok.expires_at
            {
                return Ok(tok.value.clone());
            }
        }

        let mut guard = self.token.write().await;
        if let Some(tok) = guard.as_ref()
            && Instant::now() < tok.expires_at
        {
            return Ok(tok.value.clone());
        }

        debug!("tenant token cache miss, exchanging credentials");
        let response = self
            .http
            .post(format!(
                "{}/open-apis/auth/v3/tenant_access_token/internal",
                self.base_url
            ))
            .json(&serde_json::json!({
                "app_id": self.app_id,
                "app_secret": self.app_secret,
            }))
            .send()
            .await
            .map_err(|e| BridgeError::Transport {
                message: format!("token exchange request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let body: TokenResponse = response.json().await.map_err(|e| BridgeError::Transport {
            message: format!("failed to parse token response: {e}"),
            source: Some(Box::new(e)),
        })?;

        if body.code != 0 {
            warn!(code = body.code, "token exchange rejected");
            return Err(BridgeError::Platform {
                code: body.code,
                message: body.msg.unwrap_or_else(|| "token exchange failed".into()),
            });
        }

        let value = body.tenant_access_token.ok_or_else(|| {
            BridgeError::Internal("token response missing tenant_access_token".into())
        })?;
        let expire = Duration::from_secs(body.expire.unwrap_or(0));
        let ttl = expire.saturating_sub(TOKEN_SAFETY_MARGIN);

        *guard = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + ttl,
        });

        Ok(value)
    }

    /// Sends one plain text message to the target.
    ///
    /// The platform requires the content field to be a JSON string of the
    /// form `{"text": "..."}`.
    pub async fn send_message(
        &self,
        target: &ReplyTarget,
        text: &str,
    ) -> Result<(), BridgeError> {
        let token = self.tenant_access_token().await?;
        let content = serde_json::json!({ "text": text }).to_string();

        let response = self
            .http
            .post(format!(
                "{}/open-apis/im/v1/messages?receive_id_type={}",
                self.base_url,
                target.id_type.as_str()
            ))
            .bearer_auth(token)
            .json(&serde_json::json!({
                "receive_id": target.id,
                "msg_type": "text",
                "content": content,
            }))
            .send()
            .await
            .map_err(|e| BridgeError::Transport {
                message: format!("message create request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let body: ApiEnvelope = response.json().await.map_err(|e| BridgeError::Transport {
            message: format!("failed to parse message create response: {e}"),
            source: Some(Box::new(e)),
        })?;

        if body.code != 0 {
            return Err(BridgeError::Platform {
                code: body.code,
                message: body.msg.unwrap_or_else(|| "message create failed".into()),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> FeishuClient {
        FeishuClient::new("cli_test".into(), "secret".into())
            .unwrap()
            .with_base_url(base_url.to_string())
    }

    fn token_ok(expire: u64) -> serde_json::Value {
        serde_json::json!({
            "code": 0,
            "msg": "ok",
            "tenant_access_token": "t-abc",
            "expire": expire,
        })
    }

    #[tokio::test]
    async fn token_is_cached_until_expiry() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/open-apis/auth/v3/tenant_access_token/internal"))
            .and(body_partial_json(serde_json::json!({
                "app_id": "cli_test",
                "app_secret": "secret",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_ok(7200)))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let first = client.tenant_access_token().await.unwrap();
        let second = client.tenant_access_token().await.unwrap();
        assert_eq!(first, "t-abc");
        assert_eq!(second, "t-abc");
    }

    #[tokio::test]
    async fn short_expiry_is_refetched() {
        let server = MockServer::start().await;

        // expire=300 leaves zero TTL after the safety margin, so the
        // second call must hit the endpoint again.
        Mock::given(method("POST"))
            .and(path("/open-apis/auth/v3/tenant_access_token/internal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_ok(300)))
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        client.tenant_access_token().await.unwrap();
        client.tenant_access_token().await.unwrap();
    }

    #[tokio::test]
    async fn token_error_code_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/open-apis/auth/v3/tenant_access_token/internal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 10014,
                "msg": "app secret invalid",
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.tenant_access_token().await.unwrap_err();
        match err {
            BridgeError::Platform { code, .. } => assert_eq!(code, 10014),
            other => panic!("expected Platform error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_message_wraps_text_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/open-apis/auth/v3/tenant_access_token/internal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_ok(7200)))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/open-apis/im/v1/messages"))
            .and(query_param("receive_id_type", "open_id"))
            .and(body_partial_json(serde_json::json!({
                "receive_id": "ou_X",
                "msg_type": "text",
                "content": "{\"text\":\"Hello!\"}",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0, "msg": "success", "data": {},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        client
            .send_message(&ReplyTarget::open_id("ou_X"), "Hello!")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn send_message_surfaces_platform_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/open-apis/auth/v3/tenant_access_token/internal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_ok(7200)))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/open-apis/im/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 230002,
                "msg": "bot is not in the chat",
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .send_message(&ReplyTarget::chat_id("oc_G"), "hi")
            .await
            .unwrap_err();
        match err {
            BridgeError::Platform { code, .. } => assert_eq!(code, 230002),
            other => panic!("expected Platform error, got {other:?}"),
        }
    }
}
