//! Database module for the sticker bot
//!
//! Provides persistence for contacts, token balances and the inbound message log.

mod schema;

pub use schema::*;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Contact not found: {0}")]
    ContactNotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Contact Operations ====================

    /// Get contact by identity
    pub fn get_contact(&self, identity: &str) -> DbResult<Contact> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT identity, display_name, picture_ref, created_at, updated_at
             FROM contacts WHERE identity = ?1",
            params![identity],
            parse_contact_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::ContactNotFound(identity.to_string()),
            other => DbError::Sqlite(other),
        })
    }

    /// Create a contact together with its opening token balance.
    ///
    /// Both rows are written in one transaction. An existing contact gets its
    /// profile refreshed instead of a duplicate, and an existing balance is
    /// never reset. Returns the stored contact and whether it was new.
    pub fn create_contact(
        &self,
        contact: &Contact,
        opening_balance: i64,
    ) -> DbResult<(Contact, bool)> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let existed: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM contacts WHERE identity = ?1)",
            params![contact.identity],
            |row| row.get(0),
        )?;

        if existed {
            tx.execute(
                "UPDATE contacts SET display_name = ?1, picture_ref = ?2, updated_at = ?3
                 WHERE identity = ?4",
                params![contact.display_name, contact.picture_ref, now, contact.identity],
            )?;
        } else {
            tx.execute(
                "INSERT INTO contacts (identity, display_name, picture_ref, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    contact.identity,
                    contact.display_name,
                    contact.picture_ref,
                    contact.created_at.to_rfc3339(),
                    contact.updated_at.to_rfc3339(),
                ],
            )?;
        }

        tx.execute(
            "INSERT OR IGNORE INTO tokens (contact_identity, count, updated_at) VALUES (?1, ?2, ?3)",
            params![contact.identity, opening_balance, now],
        )?;

        let stored = tx.query_row(
            "SELECT identity, display_name, picture_ref, created_at, updated_at
             FROM contacts WHERE identity = ?1",
            params![contact.identity],
            parse_contact_row,
        )?;
        tx.commit()?;

        Ok((stored, !existed))
    }

    /// Partial profile update
    pub fn update_contact(&self, identity: &str, update: &ProfileUpdate) -> DbResult<Contact> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let updated = conn.execute(
            "UPDATE contacts SET
                display_name = COALESCE(?1, display_name),
                picture_ref = COALESCE(?2, picture_ref),
                updated_at = ?3
             WHERE identity = ?4",
            params![update.display_name, update.picture_ref, now.to_rfc3339(), identity],
        )?;

        if updated == 0 {
            return Err(DbError::ContactNotFound(identity.to_string()));
        }

        conn.query_row(
            "SELECT identity, display_name, picture_ref, created_at, updated_at
             FROM contacts WHERE identity = ?1",
            params![identity],
            parse_contact_row,
        )
        .map_err(DbError::from)
    }

    // ==================== Token Operations ====================

    /// Current balance, `None` when no balance row exists
    pub fn get_balance(&self, identity: &str) -> DbResult<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT count FROM tokens WHERE contact_identity = ?1",
            params![identity],
            |row| row.get(0),
        )
        .optional()
        .map_err(DbError::from)
    }

    /// Create a balance row if absent and return the current count
    pub fn open_balance(&self, identity: &str, count: i64) -> DbResult<i64> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        conn.execute(
            "INSERT OR IGNORE INTO tokens (contact_identity, count, updated_at) VALUES (?1, ?2, ?3)",
            params![identity, count, now.to_rfc3339()],
        )?;

        conn.query_row(
            "SELECT count FROM tokens WHERE contact_identity = ?1",
            params![identity],
            |row| row.get(0),
        )
        .map_err(DbError::from)
    }

    /// Remove a balance row, leaving the contact in place
    #[cfg(test)]
    pub fn remove_balance(&self, identity: &str) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM tokens WHERE contact_identity = ?1",
            params![identity],
        )?;
        Ok(())
    }

    /// Conditional decrement.
    ///
    /// Never takes a balance below zero. A missing balance row is created at
    /// `recovery_balance` and the decrement applied to it; the contact row
    /// must already exist.
    pub fn debit(&self, identity: &str, amount: i64, recovery_balance: i64) -> DbResult<Debit> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let applied: Option<i64> = tx
            .query_row(
                "UPDATE tokens SET count = count - ?1, updated_at = ?2
                 WHERE contact_identity = ?3 AND count >= ?1
                 RETURNING count",
                params![amount, now, identity],
                |row| row.get(0),
            )
            .optional()?;

        let debit = if let Some(count) = applied {
            Debit::Applied(count)
        } else {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT count FROM tokens WHERE contact_identity = ?1",
                    params![identity],
                    |row| row.get(0),
                )
                .optional()?;

            match existing {
                Some(balance) => Debit::Refused { balance },
                None if amount > recovery_balance => {
                    tx.execute(
                        "INSERT INTO tokens (contact_identity, count, updated_at) VALUES (?1, ?2, ?3)",
                        params![identity, recovery_balance, now],
                    )?;
                    Debit::Refused {
                        balance: recovery_balance,
                    }
                }
                None => {
                    let count = recovery_balance - amount;
                    tx.execute(
                        "INSERT INTO tokens (contact_identity, count, updated_at) VALUES (?1, ?2, ?3)",
                        params![identity, count, now],
                    )?;
                    Debit::Applied(count)
                }
            }
        };

        tx.commit()?;
        Ok(debit)
    }

    /// Absolute overwrite of a balance, creating it if needed
    pub fn set_balance(&self, identity: &str, count: i64) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO tokens (contact_identity, count, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(contact_identity) DO UPDATE SET count = excluded.count, updated_at = excluded.updated_at",
            params![identity, count, now.to_rfc3339()],
        )?;
        Ok(())
    }

    // ==================== Message Operations ====================

    /// Append an inbound message to the log
    pub fn add_message(
        &self,
        message_id: &str,
        identity: &str,
        content: &str,
        has_media: bool,
    ) -> DbResult<MessageRecord> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO messages (message_id, contact_identity, content, has_media, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![message_id, identity, content, has_media, now.to_rfc3339()],
        )?;

        Ok(MessageRecord {
            message_id: message_id.to_string(),
            contact_identity: identity.to_string(),
            content: content.to_string(),
            has_media,
            created_at: now,
        })
    }

    /// Logged messages for a contact, oldest first
    pub fn get_messages(&self, identity: &str) -> DbResult<Vec<MessageRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT message_id, contact_identity, content, has_media, created_at
             FROM messages WHERE contact_identity = ?1 ORDER BY rowid ASC",
        )?;

        let rows = stmt.query_map(params![identity], |row| {
            Ok(MessageRecord {
                message_id: row.get(0)?,
                contact_identity: row.get(1)?,
                content: row.get(2)?,
                has_media: row.get(3)?,
                created_at: parse_datetime(&row.get::<_, String>(4)?),
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }
}

fn parse_contact_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        identity: row.get(0)?,
        display_name: row.get(1)?,
        picture_ref: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        updated_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
