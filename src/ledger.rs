//! Per-contact token ledger
//!
//! Sole owner of balance mutation. One token buys one sticker conversion.

use crate::db::Debit;
use crate::error::{BotError, BotResult};
use crate::runtime::TokenStore;

/// Free grant credited when a contact is first saved
pub const WELCOME_GRANT: i64 = 5;

/// Balance opened when a spend hits a contact that never had one
pub const RECOVERY_GRANT: i64 = 100;

#[derive(Clone)]
pub struct TokenLedger<S> {
    store: S,
}

impl<S: TokenStore> TokenLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Open the balance at the welcome grant. Idempotent: an existing
    /// balance is returned untouched.
    ///
    /// Contacts normally get their balance in the same transaction that
    /// creates them (`ContactStore::create_contact`).
    #[allow(dead_code)]
    pub async fn initialize(&self, contact_id: &str) -> BotResult<i64> {
        self.store.open_balance(contact_id, WELCOME_GRANT).await
    }

    /// Read the balance. `NotFound` is distinct from a zero balance.
    pub async fn get(&self, contact_id: &str) -> BotResult<i64> {
        self.store
            .balance(contact_id)
            .await?
            .ok_or_else(|| BotError::not_found(format!("No token balance for {contact_id}")))
    }

    /// Spend `amount` tokens and return the new balance.
    ///
    /// The decrement is conditional at the store level: a balance lower than
    /// `amount` is left unchanged and reported as `InsufficientTokens`.
    /// A contact with no balance row gets the recovery grant first; the
    /// contact record itself must exist.
    pub async fn spend(&self, contact_id: &str, amount: i64) -> BotResult<i64> {
        if amount <= 0 {
            return Err(BotError::invalid(format!(
                "Spend amount must be positive, got {amount}"
            )));
        }

        match self.store.debit(contact_id, amount, RECOVERY_GRANT).await? {
            Debit::Applied(count) => {
                tracing::debug!(contact = %contact_id, amount, remaining = count, "Tokens spent");
                Ok(count)
            }
            Debit::Refused { balance } => Err(BotError::insufficient_tokens(format!(
                "Balance {balance} cannot cover {amount} for {contact_id}"
            ))),
        }
    }

    /// Administrative overwrite
    pub async fn set(&self, contact_id: &str, count: i64) -> BotResult<()> {
        self.store.set_balance(contact_id, count).await?;
        tracing::info!(contact = %contact_id, count, "Token balance set");
        Ok(())
    }
}
