//! Best-effort log of inbound messages

use crate::runtime::MessageStore;

#[derive(Clone)]
pub struct MessageLog<S> {
    store: S,
}

impl<S: MessageStore> MessageLog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Append a record. Failures are logged and swallowed; a missing log
    /// entry never stops a reply.
    pub async fn append(&self, contact_id: &str, content: &str, has_media: bool) {
        if let Err(e) = self
            .store
            .append_message(contact_id, content, has_media)
            .await
        {
            tracing::warn!(contact = %contact_id, error = %e, "Failed to log inbound message");
        }
    }
}
