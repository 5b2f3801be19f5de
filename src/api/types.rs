//! API request and response types

use crate::db::{Contact, MessageRecord};
use serde::{Deserialize, Serialize};

/// Acknowledgement for an inbound webhook event
#[derive(Debug, Serialize)]
pub struct EventAccepted {
    /// False when the event was discarded (group chat, shutdown)
    pub queued: bool,
}

/// Response with the process-local contact list
#[derive(Debug, Serialize)]
pub struct ContactListResponse {
    pub contacts: Vec<Contact>,
}

/// Response with a single contact
#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub contact: Contact,
    /// Current balance, `None` when no balance record exists
    pub tokens: Option<i64>,
}

/// Balance for one contact
#[derive(Debug, Serialize)]
pub struct TokensResponse {
    pub identity: String,
    pub tokens: i64,
}

/// Administrative balance overwrite
#[derive(Debug, Deserialize)]
pub struct SetTokensRequest {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageRecord>,
}

/// Operator send to a phone number
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub phone: String,
    pub message: String,
    /// File name under the configured files directory
    #[serde(default)]
    pub media: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
