//! HTTP client for the chat bridge sidecar

use super::{ChatTransport, Media, Profile, StickerOptions};
use crate::error::{BotError, BotResult};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

/// Chat transport backed by a bridge exposing the chat client over HTTP
pub struct BridgeTransport {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl BridgeTransport {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> BotResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> BotResult<String> {
        let response = self.authorize(request).send().await.map_err(|e| {
            if e.is_timeout() {
                BotError::transport(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                BotError::transport(format!("Connection failed: {e}"))
            } else {
                BotError::transport(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BotError::transport(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(BotError::transport(format!("Bridge returned {status}: {body}")));
        }
        Ok(body)
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> BotResult<()> {
        self.send(self.client.post(self.url(path)).json(body))
            .await
            .map(|_| ())
    }

    async fn get<R: DeserializeOwned>(&self, path: &str) -> BotResult<R> {
        let body = self.send(self.client.get(self.url(path))).await?;
        serde_json::from_str(&body)
            .map_err(|e| BotError::transport(format!("Failed to parse response: {e} - body: {body}")))
    }
}

#[async_trait]
impl ChatTransport for BridgeTransport {
    async fn contact_profile(&self, chat: &str) -> BotResult<Profile> {
        self.get(&format!("/contacts/{chat}")).await
    }

    async fn send_typing(&self, chat: &str) -> BotResult<()> {
        self.post(&format!("/chats/{chat}/state"), &json!({ "state": "typing" }))
            .await
    }

    async fn clear_presence(&self, chat: &str) -> BotResult<()> {
        self.post(&format!("/chats/{chat}/state"), &json!({ "state": "clear" }))
            .await
    }

    async fn send_text(&self, chat: &str, text: &str) -> BotResult<()> {
        self.post(&format!("/chats/{chat}/messages"), &json!({ "text": text }))
            .await
    }

    async fn send_media(&self, chat: &str, media: &Media, caption: Option<&str>) -> BotResult<()> {
        self.post(
            &format!("/chats/{chat}/messages"),
            &json!({ "media": media, "caption": caption }),
        )
        .await
    }

    async fn send_sticker(
        &self,
        chat: &str,
        media: &Media,
        options: &StickerOptions,
    ) -> BotResult<()> {
        self.post(
            &format!("/chats/{chat}/messages"),
            &json!({
                "media": media,
                "sendMediaAsSticker": true,
                "stickerAuthor": options.author,
                "stickerName": options.name,
                "stickerCategories": options.categories,
            }),
        )
        .await
    }

    async fn download_media(&self, message_id: &str) -> BotResult<Media> {
        self.get(&format!("/messages/{message_id}/media")).await
    }

    async fn close_chat(&self, chat: &str) -> BotResult<()> {
        self.post(&format!("/chats/{chat}/delete"), &json!({})).await
    }
}
