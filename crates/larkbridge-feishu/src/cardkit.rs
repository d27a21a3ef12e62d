// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CardKit streaming card creation and sequenced content updates.
//!
//! A streaming card is created once per relay run (schema 2.0,
//! `streaming_mode=true`, a single markdown element with a fixed element
//! id) and then updated in place via PUTs carrying the full cumulative
//! text and a strictly monotonic sequence. The server's returned
//! `sequence_number` is authoritative; a rejection carrying
//! `expected_sequence_number` is surfaced as
//! [`BridgeError::StaleSequence`] so the caller can correct its counter.

use serde::Deserialize;
use tracing::debug;

use larkbridge_core::{BridgeError, CardHandle, ReplyTarget};

use crate::client::{ApiEnvelope, FeishuClient};

/// Element id of the single markdown body element on every streaming card.
pub const CARD_ELEMENT_ID: &str = "content_markdown";

#[derive(Debug, Deserialize)]
struct CardCreateData {
    card_id: String,
    #[serde(default)]
    sequence_number: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CardUpdateData {
    #[serde(default)]
    sequence_number: Option<i64>,
    #[serde(default)]
    expected_sequence_number: Option<i64>,
}

impl FeishuClient {
    /// Creates a streaming card and posts it to the target as an
    /// interactive message.
    ///
    /// Returns the handle carrying the card id, element id, element uuid,
    /// and the server-reported initial sequence (0 when absent).
    pub async fn create_streaming_card(
        &self,
        target: &ReplyTarget,
        title: &str,
        placeholder: &str,
    ) -> Result<CardHandle, BridgeError> {
        let token = self.tenant_access_token().await?;
        let element_uuid = uuid::Uuid::new_v4().to_string();

        let card_json = serde_json::json!({
            "schema": "2.0",
            "header": {
                "title": { "content": title, "tag": "plain_text" },
            },
            "config": {
                "streaming_mode": true,
                "update_multi": true,
                "summary": { "content": "" },
                "streaming_config": {
                    "print_frequency_ms": { "default": 70, "android": 70, "ios": 70, "pc": 70 },
                    "print_step": { "default": 1, "android": 1, "ios": 1, "pc": 1 },
                    "print_strategy": "fast",
                },
            },
            "body": {
                "elements": [{
                    "tag": "markdown",
                    "content": placeholder,
                    "element_id": CARD_ELEMENT_ID,
                    "uuid": element_uuid,
                }],
            },
        });

        let response = self
            .http()
            .post(format!("{}/open-apis/cardkit/v1/cards", self.base_url()))
            .bearer_auth(&token)
            .json(&serde_json::json!({
                "type": "card_json",
                "data": card_json.to_string(),
            }))
            .send()
            .await
            .map_err(|e| BridgeError::Transport {
                message: format!("card create request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let body: ApiEnvelope = response.json().await.map_err(|e| BridgeError::Transport {
            message: format!("failed to parse card create response: {e}"),
            source: Some(Box::new(e)),
        })?;

        if body.code != 0 {
            return Err(BridgeError::Platform {
                code: body.code,
                message: body.msg.unwrap_or_else(|| "card create failed".into()),
            });
        }

        let data: CardCreateData = serde_json::from_value(body.data.unwrap_or_default())
            .map_err(|e| BridgeError::Internal(format!("card create data malformed: {e}")))?;
        let initial_sequence = data.sequence_number.unwrap_or(0);

        debug!(
            card_id = data.card_id.as_str(),
            initial_sequence, "streaming card created"
        );

        // Post the card to the chat as an interactive message.
        let content = serde_json::json!({
            "type": "card",
            "data": { "card_id": data.card_id },
        })
        .to_string();

        let response = self
            .http()
            .post(format!(
                "{}/open-apis/im/v1/messages?receive_id_type={}",
                self.base_url(),
                target.id_type.as_str()
            ))
            .bearer_auth(&token)
            .json(&serde_json::json!({
                "receive_id": target.id,
                "msg_type": "interactive",
                "content": content,
            }))
            .send()
            .await
            .map_err(|e| BridgeError::Transport {
                message: format!("card send request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let body: ApiEnvelope = response.json().await.map_err(|e| BridgeError::Transport {
            message: format!("failed to parse card send response: {e}"),
            source: Some(Box::new(e)),
        })?;

        if body.code != 0 {
            return Err(BridgeError::Platform {
                code: body.code,
                message: body.msg.unwrap_or_else(|| "card send failed".into()),
            });
        }

        Ok(CardHandle {
            card_id: data.card_id,
            element_id: CARD_ELEMENT_ID.to_string(),
            uuid: element_uuid,
            initial_sequence,
        })
    }

    /// Replaces the card element's content at the given sequence.
    ///
    /// Returns the server-confirmed sequence number (falling back to the
    /// local one when the server does not echo it).
    pub async fn update_card_content(
        &self,
        card: &CardHandle,
        content: &str,
        sequence: i64,
    ) -> Result<i64, BridgeError> {
        let token = self.tenant_access_token().await?;
        let update_uuid = uuid::Uuid::new_v4().to_string();

        let response = self
            .http()
            .put(format!(
                "{}/open-apis/cardkit/v1/cards/{}/elements/{}/content",
                self.base_url(),
                card.card_id,
                card.element_id
            ))
            .bearer_auth(&token)
            .json(&serde_json::json!({
                "uuid": update_uuid,
                "content": content,
                "sequence": sequence,
            }))
            .send()
            .await
            .map_err(|e| BridgeError::Transport {
                message: format!("card update request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let body: ApiEnvelope = response.json().await.map_err(|e| BridgeError::Transport {
            message: format!("failed to parse card update response: {e}"),
            source: Some(Box::new(e)),
        })?;

        let data: CardUpdateData =
            serde_json::from_value(body.data.clone().unwrap_or_default()).unwrap_or(
                CardUpdateData {
                    sequence_number: None,
                    expected_sequence_number: None,
                },
            );

        if body.code != 0 {
            if let Some(expected) = data.expected_sequence_number {
                return Err(BridgeError::StaleSequence { expected });
            }
            return Err(BridgeError::Platform {
                code: body.code,
                message: body.msg.unwrap_or_else(|| "card update failed".into()),
            });
        }

        Ok(data.sequence_number.unwrap_or(sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/open-apis/auth/v3/tenant_access_token/internal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0, "tenant_access_token": "t-abc", "expire": 7200,
            })))
            .mount(server)
            .await;
    }

    fn test_client(base_url: &str) -> FeishuClient {
        FeishuClient::new("cli_test".into(), "secret".into())
            .unwrap()
            .with_base_url(base_url.to_string())
    }

    fn handle() -> CardHandle {
        CardHandle {
            card_id: "card-1".into(),
            element_id: CARD_ELEMENT_ID.into(),
            uuid: "u-1".into(),
            initial_sequence: 0,
        }
    }

    #[tokio::test]
    async fn create_card_returns_handle_with_initial_sequence() {
        let server = MockServer::start().await;
        mock_token(&server).await;

        Mock::given(method("POST"))
            .and(path("/open-apis/cardkit/v1/cards"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "data": { "card_id": "card-42", "sequence_number": 3 },
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/open-apis/im/v1/messages"))
            .and(body_partial_json(serde_json::json!({
                "receive_id": "oc_G",
                "msg_type": "interactive",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0, "data": {},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let card = client
            .create_streaming_card(&ReplyTarget::chat_id("oc_G"), "Claude", "Thinking...")
            .await
            .unwrap();

        assert_eq!(card.card_id, "card-42");
        assert_eq!(card.element_id, CARD_ELEMENT_ID);
        assert_eq!(card.initial_sequence, 3);
        assert!(!card.uuid.is_empty());
    }

    #[tokio::test]
    async fn create_card_defaults_initial_sequence_to_zero() {
        let server = MockServer::start().await;
        mock_token(&server).await;

        Mock::given(method("POST"))
            .and(path("/open-apis/cardkit/v1/cards"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0, "data": { "card_id": "card-0" },
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/open-apis/im/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0, "data": {},
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let card = client
            .create_streaming_card(&ReplyTarget::chat_id("oc_G"), "Claude", "Thinking...")
            .await
            .unwrap();
        assert_eq!(card.initial_sequence, 0);
    }

    #[tokio::test]
    async fn update_returns_server_sequence() {
        let server = MockServer::start().await;
        mock_token(&server).await;

        Mock::given(method("PUT"))
            .and(path(
                "/open-apis/cardkit/v1/cards/card-1/elements/content_markdown/content",
            ))
            .and(body_partial_json(serde_json::json!({
                "content": "hello",
                "sequence": 5,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0, "data": { "sequence_number": 5 },
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let seq = client
            .update_card_content(&handle(), "hello", 5)
            .await
            .unwrap();
        assert_eq!(seq, 5);
    }

    #[tokio::test]
    async fn update_maps_expected_sequence_to_stale_error() {
        let server = MockServer::start().await;
        mock_token(&server).await;

        Mock::given(method("PUT"))
            .and(path(
                "/open-apis/cardkit/v1/cards/card-1/elements/content_markdown/content",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 300001,
                "msg": "sequence conflict",
                "data": { "expected_sequence_number": 9 },
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .update_card_content(&handle(), "hello", 5)
            .await
            .unwrap_err();
        match err {
            BridgeError::StaleSequence { expected } => assert_eq!(expected, 9),
            other => panic!("expected StaleSequence, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_surfaces_other_platform_errors() {
        let server = MockServer::start().await;
        mock_token(&server).await;

        Mock::given(method("PUT"))
            .and(path(
                "/open-apis/cardkit/v1/cards/card-1/elements/content_markdown/content",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 99999, "msg": "boom",
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .update_card_content(&handle(), "hello", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Platform { code: 99999, .. }));
    }
}
