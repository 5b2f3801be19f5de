//! Chat transport capability
//!
//! The chat client itself (session, pairing, delivery, sticker encoding)
//! lives outside this process; these types describe what the bot consumes
//! from it and what it asks it to do.

mod bridge;

pub use bridge::BridgeTransport;

use crate::error::BotResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Suffix the transport appends to one-to-one chat addresses
pub const CONTACT_SUFFIX: &str = "@c.us";

/// Suffix of group chat addresses
pub const GROUP_SUFFIX: &str = "@g.us";

/// Strip the transport suffix from a sender address
pub fn identity_from_address(address: &str) -> &str {
    address.strip_suffix(CONTACT_SUFFIX).unwrap_or(address)
}

/// Chat address for a contact identity
pub fn address_for(identity: &str) -> String {
    if identity.ends_with(CONTACT_SUFFIX) {
        identity.to_string()
    } else {
        format!("{identity}{CONTACT_SUFFIX}")
    }
}

/// Inbound message event delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    /// Transport message id, used to download attached media
    pub message_id: String,
    /// Sender address (`<identity>@c.us`)
    pub from: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub has_media: bool,
    #[serde(default)]
    pub is_group_chat: bool,
}

impl InboundEvent {
    pub fn sender_identity(&self) -> &str {
        identity_from_address(&self.from)
    }

    /// Group traffic, by flag or by address when the flag is missing
    pub fn is_group(&self) -> bool {
        self.is_group_chat || self.from.ends_with(GROUP_SUFFIX)
    }
}

/// Sender profile as reported by the transport
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
}

/// Downloaded media payload (base64 encoded)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub mimetype: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Attribution metadata attached to a sticker send
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StickerOptions {
    #[serde(rename = "stickerAuthor")]
    pub author: String,
    #[serde(rename = "stickerName")]
    pub name: String,
    #[serde(rename = "stickerCategories")]
    pub categories: Vec<String>,
}

/// Operations the bot performs against a chat surface.
///
/// `chat` is always a chat address as produced by [`address_for`].
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Fetch the sender's current display name and picture
    async fn contact_profile(&self, chat: &str) -> BotResult<Profile>;

    /// Show the "typing..." presence
    async fn send_typing(&self, chat: &str) -> BotResult<()>;

    /// Clear any presence state
    async fn clear_presence(&self, chat: &str) -> BotResult<()>;

    async fn send_text(&self, chat: &str, text: &str) -> BotResult<()>;

    /// Send media, optionally captioned
    async fn send_media(&self, chat: &str, media: &Media, caption: Option<&str>) -> BotResult<()>;

    /// Send media converted to a sticker
    async fn send_sticker(&self, chat: &str, media: &Media, options: &StickerOptions)
        -> BotResult<()>;

    /// Download the media attached to an inbound message
    async fn download_media(&self, message_id: &str) -> BotResult<Media>;

    /// Archive/dismiss the chat on the transport UI (does not delete messages)
    async fn close_chat(&self, chat: &str) -> BotResult<()>;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn contact_profile(&self, chat: &str) -> BotResult<Profile> {
        (**self).contact_profile(chat).await
    }

    async fn send_typing(&self, chat: &str) -> BotResult<()> {
        (**self).send_typing(chat).await
    }

    async fn clear_presence(&self, chat: &str) -> BotResult<()> {
        (**self).clear_presence(chat).await
    }

    async fn send_text(&self, chat: &str, text: &str) -> BotResult<()> {
        (**self).send_text(chat, text).await
    }

    async fn send_media(&self, chat: &str, media: &Media, caption: Option<&str>) -> BotResult<()> {
        (**self).send_media(chat, media, caption).await
    }

    async fn send_sticker(
        &self,
        chat: &str,
        media: &Media,
        options: &StickerOptions,
    ) -> BotResult<()> {
        (**self).send_sticker(chat, media, options).await
    }

    async fn download_media(&self, message_id: &str) -> BotResult<Media> {
        (**self).download_media(message_id).await
    }

    async fn close_chat(&self, chat: &str) -> BotResult<()> {
        (**self).close_chat(chat).await
    }
}
