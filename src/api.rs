//! HTTP API for the sticker bot
//!
//! Receives inbound events from the chat bridge and exposes contacts,
//! balances and the message log for administration.

mod handlers;
mod types;

pub use handlers::create_router;

use crate::runtime::{Dispatcher, Storage};
use crate::transport::ChatTransport;
use std::path::PathBuf;
use std::sync::Arc;

/// Application state shared across handlers
pub struct AppState<S, T>
where
    S: Storage + Clone + 'static,
    T: ChatTransport + 'static,
{
    pub dispatcher: Arc<Dispatcher<S, T>>,
    /// Directory operator sends may attach files from
    pub files_dir: Arc<PathBuf>,
}

impl<S, T> AppState<S, T>
where
    S: Storage + Clone + 'static,
    T: ChatTransport + 'static,
{
    pub fn new(dispatcher: Arc<Dispatcher<S, T>>, files_dir: PathBuf) -> Self {
        Self {
            dispatcher,
            files_dir: Arc::new(files_dir),
        }
    }
}

impl<S, T> Clone for AppState<S, T>
where
    S: Storage + Clone + 'static,
    T: ChatTransport + 'static,
{
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            files_dir: Arc::clone(&self.files_dir),
        }
    }
}
