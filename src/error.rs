//! Failure taxonomy shared by the ledger, registry, flow and transport

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Classified failure surfaced to the flow controller and dispatcher
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct BotError {
    pub kind: ErrorKind,
    pub message: String,
}

impl BotError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StoreUnavailable, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransportFailure, message)
    }

    pub fn insufficient_tokens(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InsufficientTokens, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Backing store unreachable or query failed. Balance is unknown, not zero.
    StoreUnavailable,
    /// Expected record absent (contact or balance)
    NotFound,
    /// Send, download or profile fetch against the chat surface failed
    TransportFailure,
    /// Conditional decrement refused: balance lower than the amount
    InsufficientTokens,
    /// Argument rejected before reaching the store
    InvalidInput,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::StoreUnavailable => write!(f, "store_unavailable"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::TransportFailure => write!(f, "transport_failure"),
            ErrorKind::InsufficientTokens => write!(f, "insufficient_tokens"),
            ErrorKind::InvalidInput => write!(f, "invalid_input"),
        }
    }
}

pub type BotResult<T> = Result<T, BotError>;
