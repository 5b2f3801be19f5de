//! Database schema and record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS contacts (
    identity TEXT PRIMARY KEY,
    display_name TEXT NOT NULL DEFAULT '',
    picture_ref TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tokens (
    contact_identity TEXT PRIMARY KEY,
    count INTEGER NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY (contact_identity) REFERENCES contacts(identity)
);

CREATE TABLE IF NOT EXISTS messages (
    message_id TEXT PRIMARY KEY,
    contact_identity TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    has_media BOOLEAN NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (contact_identity) REFERENCES contacts(identity)
);

CREATE INDEX IF NOT EXISTS idx_messages_contact ON messages(contact_identity);
";

/// A chat participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Phone-equivalent address, immutable once created
    pub identity: String,
    pub display_name: String,
    pub picture_ref: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    pub fn new(
        identity: impl Into<String>,
        display_name: Option<String>,
        picture_ref: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            identity: identity.into(),
            display_name: display_name.unwrap_or_default(),
            picture_ref: picture_ref.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether applying `update` would change anything
    pub fn differs_from(&self, update: &ProfileUpdate) -> bool {
        update
            .display_name
            .as_ref()
            .is_some_and(|n| *n != self.display_name)
            || update
                .picture_ref
                .as_ref()
                .is_some_and(|p| *p != self.picture_ref)
    }
}

/// Partial profile update; `None` leaves the field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub picture_ref: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.picture_ref.is_none()
    }
}

/// Logged inbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    pub message_id: String,
    pub contact_identity: String,
    pub content: String,
    pub has_media: bool,
    pub created_at: DateTime<Utc>,
}

/// Result of a conditional decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Debit {
    /// Decrement applied; carries the new count
    Applied(i64),
    /// Balance existed but was lower than the amount; nothing changed
    Refused { balance: i64 },
}
