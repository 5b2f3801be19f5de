//! Contact registry
//!
//! Write-through cache over the contact store. The store is the source of
//! truth for whether an identity has been seen; the cache only saves reads.

use crate::db::{Contact, ProfileUpdate};
use crate::error::{BotError, BotResult};
use crate::ledger::{TokenLedger, WELCOME_GRANT};
use crate::runtime::{ContactStore, TokenStore};
use crate::transport::Profile;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Outcome of `create_if_absent`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub contact: Contact,
    /// True only when this call created the record
    pub created: bool,
}

pub struct ContactRegistry<S> {
    store: S,
    ledger: TokenLedger<S>,
    cache: RwLock<HashMap<String, Contact>>,
}

impl<S> ContactRegistry<S>
where
    S: ContactStore + TokenStore + Clone,
{
    pub fn new(store: S) -> Self {
        Self {
            ledger: TokenLedger::new(store.clone()),
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a contact: cache first, then the store.
    ///
    /// A store hit is cached before returning. Lookups never write: a
    /// contact whose balance row is missing stays that way.
    pub async fn resolve(&self, identity: &str) -> BotResult<Option<Contact>> {
        if let Some(contact) = self.cache.read().await.get(identity) {
            return Ok(Some(contact.clone()));
        }

        let Some(contact) = self.store.find_contact(identity).await? else {
            return Ok(None);
        };

        self.cache
            .write()
            .await
            .insert(identity.to_string(), contact.clone());
        Ok(Some(contact))
    }

    /// Create the contact and its opening balance unless it already exists.
    ///
    /// Safe to call repeatedly for the same identity: the store upserts, so
    /// a second call refreshes the profile and reports `created = false`.
    pub async fn create_if_absent(&self, identity: &str, profile: &Profile) -> BotResult<Resolved> {
        let candidate = Contact::new(
            identity,
            profile.display_name.clone(),
            profile.profile_picture_url.clone(),
        );

        let (contact, created) = self.store.create_contact(&candidate, WELCOME_GRANT).await?;
        if created {
            tracing::info!(contact = %identity, grant = WELCOME_GRANT, "Contact created");
        }

        self.cache
            .write()
            .await
            .insert(identity.to_string(), contact.clone());
        Ok(Resolved { contact, created })
    }

    /// Partial profile update; omitted fields are left unchanged
    pub async fn update(&self, identity: &str, update: &ProfileUpdate) -> BotResult<Contact> {
        if update.is_empty() {
            return self
                .resolve(identity)
                .await?
                .ok_or_else(|| BotError::not_found(format!("Contact not found: {identity}")));
        }

        let contact = self.store.update_contact(identity, update).await?;
        self.cache
            .write()
            .await
            .insert(identity.to_string(), contact.clone());
        Ok(contact)
    }

    /// Contacts seen by this process. Not authoritative.
    pub async fn list(&self) -> Vec<Contact> {
        let mut contacts: Vec<Contact> = self.cache.read().await.values().cloned().collect();
        contacts.sort_by(|a, b| a.identity.cmp(&b.identity));
        contacts
    }

    pub fn ledger(&self) -> &TokenLedger<S> {
        &self.ledger
    }
}
