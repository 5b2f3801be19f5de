//! Trait abstractions for storage I/O
//!
//! These traits let the ledger, registry and message log run against the
//! SQLite database in production and against wrappers in tests.

use crate::db::{Contact, Database, DbError, Debit, MessageRecord, ProfileUpdate};
use crate::error::{BotError, BotResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Storage for contact records
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Look up a contact, `None` when absent
    async fn find_contact(&self, identity: &str) -> BotResult<Option<Contact>>;

    /// Insert (or refresh) a contact and open its balance in one unit.
    /// Returns the stored contact and whether it was newly created.
    async fn create_contact(
        &self,
        contact: &Contact,
        opening_balance: i64,
    ) -> BotResult<(Contact, bool)>;

    async fn update_contact(&self, identity: &str, update: &ProfileUpdate) -> BotResult<Contact>;
}

/// Storage for token balances
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Current balance, `None` when no balance row exists
    async fn balance(&self, identity: &str) -> BotResult<Option<i64>>;

    /// Create the balance at `count` if absent; returns the current count
    async fn open_balance(&self, identity: &str, count: i64) -> BotResult<i64>;

    /// Atomic conditional decrement
    async fn debit(&self, identity: &str, amount: i64, recovery_balance: i64) -> BotResult<Debit>;

    async fn set_balance(&self, identity: &str, count: i64) -> BotResult<()>;
}

/// Append-only storage for inbound messages
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append_message(
        &self,
        identity: &str,
        content: &str,
        has_media: bool,
    ) -> BotResult<MessageRecord>;

    async fn messages_for(&self, identity: &str) -> BotResult<Vec<MessageRecord>>;
}

/// Combined storage trait for convenience
pub trait Storage: ContactStore + TokenStore + MessageStore {}
impl<T: ContactStore + TokenStore + MessageStore> Storage for T {}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ContactStore + ?Sized> ContactStore for Arc<T> {
    async fn find_contact(&self, identity: &str) -> BotResult<Option<Contact>> {
        (**self).find_contact(identity).await
    }

    async fn create_contact(
        &self,
        contact: &Contact,
        opening_balance: i64,
    ) -> BotResult<(Contact, bool)> {
        (**self).create_contact(contact, opening_balance).await
    }

    async fn update_contact(&self, identity: &str, update: &ProfileUpdate) -> BotResult<Contact> {
        (**self).update_contact(identity, update).await
    }
}

#[async_trait]
impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    async fn balance(&self, identity: &str) -> BotResult<Option<i64>> {
        (**self).balance(identity).await
    }

    async fn open_balance(&self, identity: &str, count: i64) -> BotResult<i64> {
        (**self).open_balance(identity, count).await
    }

    async fn debit(&self, identity: &str, amount: i64, recovery_balance: i64) -> BotResult<Debit> {
        (**self).debit(identity, amount, recovery_balance).await
    }

    async fn set_balance(&self, identity: &str, count: i64) -> BotResult<()> {
        (**self).set_balance(identity, count).await
    }
}

#[async_trait]
impl<T: MessageStore + ?Sized> MessageStore for Arc<T> {
    async fn append_message(
        &self,
        identity: &str,
        content: &str,
        has_media: bool,
    ) -> BotResult<MessageRecord> {
        (**self).append_message(identity, content, has_media).await
    }

    async fn messages_for(&self, identity: &str) -> BotResult<Vec<MessageRecord>> {
        (**self).messages_for(identity).await
    }
}

// ============================================================================
// Production Adapter
// ============================================================================

/// Adapter to use Database as Storage
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[allow(dead_code)] // Useful for tests
    pub fn inner(&self) -> &Database {
        &self.db
    }
}

impl From<DbError> for BotError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::ContactNotFound(_) => BotError::not_found(e.to_string()),
            DbError::Sqlite(_) => BotError::store(e.to_string()),
        }
    }
}

#[async_trait]
impl ContactStore for DatabaseStorage {
    async fn find_contact(&self, identity: &str) -> BotResult<Option<Contact>> {
        match self.db.get_contact(identity) {
            Ok(contact) => Ok(Some(contact)),
            Err(DbError::ContactNotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_contact(
        &self,
        contact: &Contact,
        opening_balance: i64,
    ) -> BotResult<(Contact, bool)> {
        Ok(self.db.create_contact(contact, opening_balance)?)
    }

    async fn update_contact(&self, identity: &str, update: &ProfileUpdate) -> BotResult<Contact> {
        Ok(self.db.update_contact(identity, update)?)
    }
}

#[async_trait]
impl TokenStore for DatabaseStorage {
    async fn balance(&self, identity: &str) -> BotResult<Option<i64>> {
        Ok(self.db.get_balance(identity)?)
    }

    async fn open_balance(&self, identity: &str, count: i64) -> BotResult<i64> {
        Ok(self.db.open_balance(identity, count)?)
    }

    async fn debit(&self, identity: &str, amount: i64, recovery_balance: i64) -> BotResult<Debit> {
        Ok(self.db.debit(identity, amount, recovery_balance)?)
    }

    async fn set_balance(&self, identity: &str, count: i64) -> BotResult<()> {
        Ok(self.db.set_balance(identity, count)?)
    }
}

#[async_trait]
impl MessageStore for DatabaseStorage {
    async fn append_message(
        &self,
        identity: &str,
        content: &str,
        has_media: bool,
    ) -> BotResult<MessageRecord> {
        let id = uuid::Uuid::new_v4().to_string();
        Ok(self.db.add_message(&id, identity, content, has_media)?)
    }

    async fn messages_for(&self, identity: &str) -> BotResult<Vec<MessageRecord>> {
        Ok(self.db.get_messages(identity)?)
    }
}
