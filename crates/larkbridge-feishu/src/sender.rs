// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`Sender`] implementation backed by the Feishu HTTP client.

use async_trait::async_trait;

use larkbridge_core::{BridgeError, CardHandle, ReplyTarget, Sender};

use crate::client::FeishuClient;

#[async_trait]
impl Sender for FeishuClient {
    async fn ensure_authenticated(&self) -> Result<(), BridgeError> {
        self.tenant_access_token().await.map(|_| ())
    }

    async fn send_text(&self, target: &ReplyTarget, text: &str) -> Result<(), BridgeError> {
        self.send_message(target, text).await
    }

    async fn create_card(
        &self,
        target: &ReplyTarget,
        title: &str,
        placeholder: &str,
    ) -> Result<CardHandle, BridgeError> {
        self.create_streaming_card(target, title, placeholder).await
    }

    async fn update_card(
        &self,
        card: &CardHandle,
        content: &str,
        sequence: i64,
    ) -> Result<i64, BridgeError> {
        self.update_card_content(card, content, sequence).await
    }
}
